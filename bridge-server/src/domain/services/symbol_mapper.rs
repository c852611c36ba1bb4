//! Symbol mapping
//!
//! Resolves a symbol as sent by a signal source ("XAUUSDM", "GOLD", "EURUSD.")
//! to the spelling a destination terminal actually lists.
//!
//! Lookup order:
//! 1. exact case-insensitive match against the destination's symbols
//! 2. static alias table
//! 3. custom user mappings
//! 4. fuzzy match by normalized Levenshtein similarity

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.6;

const BROKER_SUFFIXES: [&str; 14] = [
    ".m", ".", "_m", "m", "_mini", ".mini", "_micro", ".micro", ".cash", "_cash", ".spot",
    "_spot", "_fx", ".fx",
];

const BROKER_PREFIXES: [&str; 6] = ["m_", "mini_", "micro_", "fx_", "forex_", "cfd_"];

const STATIC_ALIASES: [(&str, &str); 33] = [
    ("eurusd", "EURUSD"),
    ("gbpusd", "GBPUSD"),
    ("usdjpy", "USDJPY"),
    ("usdchf", "USDCHF"),
    ("usdcad", "USDCAD"),
    ("audusd", "AUDUSD"),
    ("nzdusd", "NZDUSD"),
    ("xauusd", "XAUUSD"),
    ("xauusdm", "XAUUSD"),
    ("gold", "XAUUSD"),
    ("xagusd", "XAGUSD"),
    ("silver", "XAGUSD"),
    ("usoil", "USOIL"),
    ("wti", "USOIL"),
    ("ukoil", "UKOIL"),
    ("brent", "UKOIL"),
    ("btcusd", "BTCUSD"),
    ("bitcoin", "BTCUSD"),
    ("ethusd", "ETHUSD"),
    ("ethereum", "ETHUSD"),
    ("us30", "US30"),
    ("us500", "US500"),
    ("nas100", "NAS100"),
    ("ger30", "GER30"),
    ("uk100", "UK100"),
    ("jp225", "JP225"),
    ("aus200", "AUS200"),
    ("eurusd.", "EURUSD"),
    ("eurusd.m", "EURUSD"),
    ("eurusdm", "EURUSD"),
    ("m_eurusd", "EURUSD"),
    ("forex_eurusd", "EURUSD"),
    ("eurusd_m", "EURUSD"),
];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    #[error("Symbol not found: {0}")]
    NotFound(String),
    #[error("Symbol is empty")]
    Empty,
    #[error("Fuzzy match threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// Which lookup step produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Alias,
    Custom,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub kind: MatchKind,
    /// 1.0 for table hits, similarity for fuzzy hits
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingStats {
    pub alias_count: usize,
    pub custom_count: usize,
    pub fuzzy_match_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingTestResult {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped: Option<SymbolMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct SymbolMapper {
    aliases: HashMap<String, String>,
    custom: HashMap<String, String>,
    threshold: f64,
}

impl SymbolMapper {
    pub fn new(threshold: f64) -> Result<Self, MappingError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(MappingError::InvalidThreshold(threshold));
        }

        let aliases = STATIC_ALIASES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Self {
            aliases,
            custom: HashMap::new(),
            threshold,
        })
    }

    pub fn with_custom_mappings(mut self, mappings: HashMap<String, String>) -> Self {
        for (input, target) in mappings {
            self.set_custom(&input, &target);
        }
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Add or replace a custom mapping. Keys are case-insensitive.
    pub fn set_custom(&mut self, input: &str, target: &str) {
        self.custom
            .insert(input.trim().to_lowercase(), target.trim().to_uppercase());
    }

    pub fn remove_custom(&mut self, input: &str) -> bool {
        self.custom.remove(&input.trim().to_lowercase()).is_some()
    }

    pub fn custom_mappings(&self) -> &HashMap<String, String> {
        &self.custom
    }

    pub fn stats(&self) -> MappingStats {
        MappingStats {
            alias_count: self.aliases.len(),
            custom_count: self.custom.len(),
            fuzzy_match_threshold: self.threshold,
        }
    }

    /// Map `raw` onto one of `available`. An empty `available` list means the
    /// destination's symbols are unknown; table targets are then trusted as-is.
    pub fn map_symbol(&self, raw: &str, available: &[String]) -> Result<SymbolMatch, MappingError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MappingError::Empty);
        }

        // 1. Exact
        if let Some(found) = available.iter().find(|s| s.eq_ignore_ascii_case(trimmed)) {
            return Ok(SymbolMatch {
                symbol: found.clone(),
                kind: MatchKind::Exact,
                score: 1.0,
            });
        }

        let normalized = normalize_symbol(trimmed);
        let mut hints: Vec<String> = Vec::new();

        // 2. Alias, then 3. custom
        for (kind, table) in [(MatchKind::Alias, &self.aliases), (MatchKind::Custom, &self.custom)] {
            if let Some(target) = lookup(table, trimmed, &normalized) {
                if available.is_empty() {
                    return Ok(SymbolMatch {
                        symbol: target.to_string(),
                        kind,
                        score: 1.0,
                    });
                }
                if let Some(found) = available.iter().find(|s| s.eq_ignore_ascii_case(target)) {
                    return Ok(SymbolMatch {
                        symbol: found.clone(),
                        kind,
                        score: 1.0,
                    });
                }
                hints.push(target.to_string());
            }
        }

        // 4. Fuzzy
        let candidates: Vec<&String> = if available.is_empty() {
            let mut targets: Vec<&String> =
                self.aliases.values().chain(self.custom.values()).collect();
            targets.sort();
            targets.dedup();
            targets
        } else {
            available.iter().collect()
        };

        let mut queries: Vec<String> = hints.iter().map(|h| normalize_symbol(h)).collect();
        queries.push(normalized);

        self.best_fuzzy_match(&queries, &candidates)
            .ok_or_else(|| MappingError::NotFound(trimmed.to_string()))
    }

    /// Map several inputs at once, for diagnostics
    pub fn test_mapping(&self, inputs: &[String], available: &[String]) -> Vec<MappingTestResult> {
        inputs
            .iter()
            .map(|input| match self.map_symbol(input, available) {
                Ok(m) => MappingTestResult {
                    input: input.clone(),
                    mapped: Some(m),
                    error: None,
                },
                Err(e) => MappingTestResult {
                    input: input.clone(),
                    mapped: None,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    fn best_fuzzy_match(&self, queries: &[String], candidates: &[&String]) -> Option<SymbolMatch> {
        let mut best: Option<(f64, &String)> = None;

        for &candidate in candidates {
            let normalized_candidate = normalize_symbol(candidate);
            if normalized_candidate.is_empty() {
                continue;
            }

            let score = queries
                .iter()
                .filter(|q| !q.is_empty())
                .map(|q| similarity(q, &normalized_candidate))
                .fold(0.0_f64, f64::max);

            if score < self.threshold {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_score, best_candidate)) => {
                    score > best_score
                        || (score == best_score
                            && (candidate.len(), candidate.as_str())
                                < (best_candidate.len(), best_candidate.as_str()))
                }
            };
            if better {
                best = Some((score, candidate));
            }
        }

        best.map(|(score, symbol)| {
            tracing::debug!(symbol = %symbol, score, "Fuzzy symbol match");
            SymbolMatch {
                symbol: symbol.clone(),
                kind: MatchKind::Fuzzy,
                score,
            }
        })
    }
}

fn lookup<'a>(table: &'a HashMap<String, String>, raw: &str, normalized: &str) -> Option<&'a str> {
    table
        .get(&raw.to_lowercase())
        .or_else(|| table.get(normalized))
        .map(String::as_str)
}

/// Strip broker decorations: case, one known suffix, one known prefix,
/// punctuation and a trailing contract number.
pub fn normalize_symbol(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();

    if let Some(suffix) = BROKER_SUFFIXES
        .iter()
        .find(|suffix| s.len() > suffix.len() && s.ends_with(*suffix))
    {
        s.truncate(s.len() - suffix.len());
    }

    if let Some(prefix) = BROKER_PREFIXES
        .iter()
        .find(|prefix| s.len() > prefix.len() && s.starts_with(*prefix))
    {
        s = s[prefix.len()..].to_string();
    }

    let mut s: String = s.chars().filter(|c| c.is_ascii_alphanumeric()).collect();

    let without_digits = s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if without_digits >= 6 {
        s.truncate(without_digits);
    }

    s
}

/// Levenshtein edit distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - distance / max_len`, in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> SymbolMapper {
        SymbolMapper::new(DEFAULT_FUZZY_THRESHOLD).unwrap()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_documented_aliases_without_watchlist() {
        let m = mapper();
        assert_eq!(m.map_symbol("XAUUSDM", &[]).unwrap().symbol, "XAUUSD");
        assert_eq!(m.map_symbol("GOLD", &[]).unwrap().symbol, "XAUUSD");
        assert_eq!(m.map_symbol("EURUSD.", &[]).unwrap().symbol, "EURUSD");
        assert_eq!(m.map_symbol("silver", &[]).unwrap().symbol, "XAGUSD");
        assert_eq!(m.map_symbol("forex_eurusd", &[]).unwrap().symbol, "EURUSD");
        assert_eq!(m.map_symbol("US30", &[]).unwrap().kind, MatchKind::Alias);
    }

    #[test]
    fn test_exact_match_returns_destination_spelling() {
        let m = mapper();
        let available = symbols(&["XAUUSD.a", "EURUSD.a"]);
        let result = m.map_symbol("xauusd.A", &available).unwrap();
        assert_eq!(result.symbol, "XAUUSD.a");
        assert_eq!(result.kind, MatchKind::Exact);
    }

    #[test]
    fn test_alias_validated_against_watchlist() {
        let m = mapper();
        let available = symbols(&["XAUUSD", "EURUSD"]);
        let result = m.map_symbol("GOLD", &available).unwrap();
        assert_eq!(result.symbol, "XAUUSD");
        assert_eq!(result.kind, MatchKind::Alias);
    }

    #[test]
    fn test_alias_hint_reaches_broker_suffixed_symbol() {
        let m = mapper();
        let available = symbols(&["XAUUSD.a", "XAGUSD.a", "EURUSD.a"]);
        let result = m.map_symbol("GOLD", &available).unwrap();
        assert_eq!(result.symbol, "XAUUSD.a");
        assert_eq!(result.kind, MatchKind::Fuzzy);
    }

    #[test]
    fn test_custom_mapping_is_case_insensitive() {
        let mut m = mapper();
        m.set_custom("Dax", "de40");
        assert_eq!(m.map_symbol("DAX", &[]).unwrap().symbol, "DE40");
        assert_eq!(m.map_symbol("dax", &[]).unwrap().kind, MatchKind::Custom);

        assert!(m.remove_custom("DAX"));
        assert!(!m.remove_custom("DAX"));
    }

    #[test]
    fn test_alias_wins_over_custom() {
        let mut m = mapper();
        m.set_custom("gold", "GOLDSPOT");
        assert_eq!(m.map_symbol("gold", &[]).unwrap().symbol, "XAUUSD");
    }

    #[test]
    fn test_unknown_symbol_is_not_found() {
        let m = mapper();
        assert_eq!(
            m.map_symbol("ZZQQ", &[]),
            Err(MappingError::NotFound("ZZQQ".to_string()))
        );
        assert_eq!(m.map_symbol("   ", &[]), Err(MappingError::Empty));
    }

    #[test]
    fn test_fuzzy_never_below_threshold() {
        let m = SymbolMapper::new(0.8).unwrap();
        let available = symbols(&["EURUSD", "GBPUSD", "USDJPY", "XAUUSD", "US500"]);
        for input in ["EURUSX", "GBPUSD_raw", "USDJP", "XAU", "US5000", "ABCDEF"] {
            if let Ok(found) = m.map_symbol(input, &available) {
                if found.kind == MatchKind::Fuzzy {
                    assert!(found.score >= 0.8, "{} scored {}", input, found.score);
                }
            }
        }
    }

    #[test]
    fn test_fuzzy_tie_prefers_shortest_candidate() {
        let m = mapper();
        // Both normalize to "eurusd"
        let available = symbols(&["EURUSD.cash", "EURUSD_m"]);
        let result = m.map_symbol("EURUSDZ", &available).unwrap();
        assert_eq!(result.kind, MatchKind::Fuzzy);
        assert_eq!(result.symbol, "EURUSD_m");
    }

    #[test]
    fn test_index_names_do_not_collapse() {
        let m = mapper();
        let available = symbols(&["US30.cash", "US500.cash"]);
        assert_eq!(m.map_symbol("US500", &available).unwrap().symbol, "US500.cash");
        assert_eq!(m.map_symbol("US30", &available).unwrap().symbol, "US30.cash");
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("XAUUSDm"), "xauusd");
        assert_eq!(normalize_symbol("EURUSD."), "eurusd");
        assert_eq!(normalize_symbol("EURUSD.cash"), "eurusd");
        assert_eq!(normalize_symbol("fx_GBPUSD"), "gbpusd");
        assert_eq!(normalize_symbol("EURUSD2"), "eurusd");
        assert_eq!(normalize_symbol("US30"), "us30");
        assert_eq!(normalize_symbol("m"), "m");
    }

    #[test]
    fn test_levenshtein_and_similarity() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "abce"), 0.75);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        assert!(matches!(
            SymbolMapper::new(1.2),
            Err(MappingError::InvalidThreshold(_))
        ));
        assert!(SymbolMapper::new(0.0).is_ok());
        assert!(SymbolMapper::new(1.0).is_ok());
    }

    #[test]
    fn test_mapping_batch_and_stats() {
        let mut m = mapper();
        m.set_custom("dax", "DE40");
        let results = m.test_mapping(&symbols(&["GOLD", "NOPE"]), &[]);
        assert_eq!(results.len(), 2);
        assert!(results[0].mapped.is_some());
        assert!(results[1].error.is_some());

        let stats = m.stats();
        assert_eq!(stats.alias_count, STATIC_ALIASES.len());
        assert_eq!(stats.custom_count, 1);
        assert_eq!(stats.fuzzy_match_threshold, 0.6);
    }
}
