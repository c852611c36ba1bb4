use super::instance_dir;
use crate::ports::BalanceSource;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Reads the `balance` field of `MQL5/Files/account_info.json`, which the EA
/// refreshes periodically.
pub struct AccountInfoBalanceSource {
    instances_dir: PathBuf,
}

impl AccountInfoBalanceSource {
    pub fn new(instances_dir: impl Into<PathBuf>) -> Self {
        Self {
            instances_dir: instances_dir.into(),
        }
    }

    fn info_path(&self, account: &str) -> Option<PathBuf> {
        instance_dir(&self.instances_dir, account)
            .map(|dir| dir.join("MQL5").join("Files").join("account_info.json"))
    }
}

fn parse_balance(raw: &[u8]) -> Option<f64> {
    let doc: Value = serde_json::from_slice(raw).ok()?;
    match doc.get("balance")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl BalanceSource for AccountInfoBalanceSource {
    async fn balance(&self, account: &str) -> Option<f64> {
        let path = self.info_path(account)?;
        match tokio::fs::read(&path).await {
            Ok(raw) => {
                let balance = parse_balance(&raw);
                if balance.is_none() {
                    tracing::warn!(account = %account, file = %path.display(), "account_info.json has no usable balance");
                }
                balance
            }
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "Balance file not readable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance(br#"{"balance": 10000.5}"#), Some(10000.5));
        assert_eq!(parse_balance(br#"{"balance": "2500"}"#), Some(2500.0));
        assert_eq!(parse_balance(br#"{"equity": 1}"#), None);
        assert_eq!(parse_balance(b"not json"), None);
    }

    #[tokio::test]
    async fn test_reads_instance_file() {
        let dir = TempDir::new().unwrap();
        let files = dir.path().join("1001").join("MQL5").join("Files");
        std::fs::create_dir_all(&files).unwrap();
        std::fs::write(files.join("account_info.json"), r#"{"balance": 5000}"#).unwrap();

        let source = AccountInfoBalanceSource::new(dir.path());
        assert_eq!(source.balance("1001").await, Some(5000.0));
        assert_eq!(source.balance("2002").await, None);
    }
}
