// Adapter implementations for outbound ports
//
// Implements the port traits on the concrete database and supervisor types
// so the trading services only ever see the traits.

use super::{AccountDirectory, RoutingRepository};
use crate::db::Database;
use crate::instances::InstanceSupervisor;
use crate::models::{Account, CopyPair, WebhookAccount};
use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

// ============================================================================
// RoutingRepository Adapter
// ============================================================================

#[async_trait]
impl RoutingRepository for Database {
    async fn copy_pairs_by_api_key(&self, api_key: &str) -> anyhow::Result<Vec<CopyPair>> {
        Database::copy_pairs_by_api_key(self, api_key).await
    }

    async fn list_webhook_accounts(&self) -> anyhow::Result<Vec<WebhookAccount>> {
        Database::list_webhook_accounts(self).await
    }
}

// ============================================================================
// AccountDirectory Adapter
// ============================================================================

#[async_trait]
impl AccountDirectory for InstanceSupervisor {
    async fn refresh_account(&self, account: &str) -> anyhow::Result<Option<Account>> {
        self.refresh(account).await
    }

    async fn lock_account(&self, account: &str) -> OwnedMutexGuard<()> {
        InstanceSupervisor::lock_account(self, account).await
    }
}
