//! Application services
//!
//! Orchestrate the domain logic over the outbound ports: the webhook fan-out
//! and copy-trade signal processing.

pub mod copy_trade;
pub mod webhook;

pub use copy_trade::{CopyTradeError, CopyTradeService};
pub use webhook::WebhookService;

use crate::domain::services::SymbolMapper;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The mapper is shared with the symbol API, which edits custom mappings
pub type SharedSymbolMapper = Arc<RwLock<SymbolMapper>>;
