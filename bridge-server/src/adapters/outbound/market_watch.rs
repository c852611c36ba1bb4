use super::instance_dir;
use crate::ports::SymbolSource;
use async_trait::async_trait;
use std::path::PathBuf;

/// Market Watch symbols of an instance, scraped from `config/symbols.sel`.
///
/// The file is binary; symbol names are recovered by scanning for runs of
/// symbol-like ASCII characters.
pub struct MarketWatchSymbolSource {
    instances_dir: PathBuf,
}

impl MarketWatchSymbolSource {
    pub fn new(instances_dir: impl Into<PathBuf>) -> Self {
        Self {
            instances_dir: instances_dir.into(),
        }
    }
}

fn is_symbol_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'#' | b'-')
}

fn looks_like_symbol(token: &str) -> bool {
    (3..=20).contains(&token.len())
        && token.as_bytes()[0].is_ascii_uppercase()
        && token.bytes().filter(|b| b.is_ascii_uppercase()).count() >= 2
}

pub(crate) fn scan_symbols(raw: &[u8]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for token in raw.split(|b| !is_symbol_byte(*b)) {
        let Ok(token) = std::str::from_utf8(token) else {
            continue;
        };
        if looks_like_symbol(token) && !symbols.iter().any(|s| s == token) {
            symbols.push(token.to_string());
        }
    }
    symbols
}

#[async_trait]
impl SymbolSource for MarketWatchSymbolSource {
    async fn available_symbols(&self, account: &str) -> Vec<String> {
        let Some(path) = instance_dir(&self.instances_dir, account)
            .map(|dir| dir.join("config").join("symbols.sel"))
        else {
            return Vec::new();
        };

        match tokio::fs::read(&path).await {
            Ok(raw) => {
                let symbols = scan_symbols(&raw);
                tracing::debug!(account = %account, count = symbols.len(), "Parsed symbols.sel");
                symbols
            }
            Err(e) => {
                tracing::debug!(account = %account, error = %e, "symbols.sel not readable");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_binary_blob() {
        let mut raw = vec![0u8, 1, 2];
        raw.extend_from_slice(b"XAUUSD.a");
        raw.extend_from_slice(&[0, 0, 7]);
        raw.extend_from_slice(b"EURUSD");
        raw.extend_from_slice(&[0xff, 0]);
        raw.extend_from_slice(b"ab");
        raw.push(0);
        raw.extend_from_slice(b"EURUSD");

        assert_eq!(scan_symbols(&raw), vec!["XAUUSD.a", "EURUSD"]);
    }

    #[test]
    fn test_rejects_noise_tokens() {
        assert!(!looks_like_symbol("Ab"));
        assert!(!looks_like_symbol("abcdef"));
        assert!(looks_like_symbol("US30"));
        assert!(looks_like_symbol("NAS100"));
    }
}
