//! Export Transformer - Pairs joined with tokens into `sushi_pools.json`
//!
//! Tokens are looked up by symbol. A pair whose token symbols cannot be
//! resolved is skipped, never fatal. Symbols shared by several token
//! addresses resolve to the last one listed and are logged;
//! `SymbolPolicy::Strict` refuses them instead.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AnalyticsError, Result};
use crate::types::{Pair, Token, TokenRef};

/// Output filename of the pool export
pub const EXPORT_FILENAME: &str = "sushi_pools.json";
/// MIME type of the pool export
pub const EXPORT_MIME: &str = "application/json";
/// Fee tier written for every pool. Pools are not told apart by their real tier.
pub const DEFAULT_FEE_TIER: u32 = 3000;

/// How to treat two token addresses sharing one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SymbolPolicy {
    /// Refuse to export when a pair joins on a shared symbol
    Strict,
    /// Keep the last token seen and log the collision
    #[default]
    LastWriteWins,
}

impl SymbolPolicy {
    pub fn from_allow_duplicates(allow: bool) -> Self {
        if allow {
            SymbolPolicy::LastWriteWins
        } else {
            SymbolPolicy::Strict
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LookupEntry<'a> {
    address: &'a str,
    decimals: u32,
}

/// Two distinct addresses seen under one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolCollision {
    pub symbol: String,
    /// Address that was replaced
    pub first: String,
    /// Address that now owns the symbol
    pub second: String,
}

/// Symbol -> decimals, rebuilt for every export
#[derive(Debug, Default)]
pub struct TokenLookup<'a> {
    by_symbol: HashMap<&'a str, LookupEntry<'a>>,
    collisions: Vec<SymbolCollision>,
}

impl<'a> TokenLookup<'a> {
    pub fn build(tokens: &'a [Token]) -> Self {
        let mut lookup = Self::default();
        for token in tokens {
            let entry = LookupEntry {
                address: token.id.as_str(),
                decimals: token.decimals,
            };
            if let Some(previous) = lookup.by_symbol.insert(token.symbol.as_str(), entry) {
                if !previous.address.eq_ignore_ascii_case(&token.id) {
                    lookup.collisions.push(SymbolCollision {
                        symbol: token.symbol.clone(),
                        first: previous.address.to_string(),
                        second: token.id.clone(),
                    });
                }
            }
        }
        lookup
    }

    pub fn decimals(&self, symbol: &str) -> Option<u32> {
        self.by_symbol.get(symbol).map(|e| e.decimals)
    }

    pub fn collisions(&self) -> &[SymbolCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

/// Token side of an exported pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportToken {
    pub address: String,
    pub decimals: u32,
    #[serde(rename = "derivedETH")]
    pub derived_eth: String,
    pub name: String,
    pub symbol: String,
}

/// One exported pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(rename = "poolAddress")]
    pub pool_address: String,
    pub token0: ExportToken,
    pub token1: ExportToken,
    #[serde(rename = "feeTier")]
    pub fee_tier: u32,
}

/// Pair left out of the export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub pair: String,
    pub unresolved_symbol: String,
}

/// Result of one export run
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub records: Vec<ExportRecord>,
    pub skipped: Vec<SkippedPair>,
}

/// Join `pairs` against `tokens`, keeping pair order.
pub fn build_export(pairs: &[Pair], tokens: &[Token], policy: SymbolPolicy) -> Result<ExportReport> {
    let lookup = TokenLookup::build(tokens);

    // Only symbols some pair joins on can attach the wrong token
    let referenced: HashSet<&str> = pairs
        .iter()
        .flat_map(|p| [p.token0.symbol.as_str(), p.token1.symbol.as_str()])
        .collect();
    let mut relevant = lookup
        .collisions()
        .iter()
        .filter(|c| referenced.contains(c.symbol.as_str()));

    match policy {
        SymbolPolicy::Strict => {
            if let Some(collision) = relevant.next() {
                return Err(AnalyticsError::AmbiguousSymbol {
                    symbol: collision.symbol.clone(),
                    first: collision.first.clone(),
                    second: collision.second.clone(),
                });
            }
        }
        SymbolPolicy::LastWriteWins => {
            for c in relevant {
                warn!(
                    symbol = %c.symbol,
                    replaced = %c.first,
                    kept = %c.second,
                    "duplicate token symbol, last one wins"
                );
            }
        }
    }

    let mut report = ExportReport::default();
    for pair in pairs {
        let resolved = resolve(&lookup, &pair.token0).and_then(|t0| {
            resolve(&lookup, &pair.token1).map(|t1| (t0, t1))
        });

        match resolved {
            Ok((token0, token1)) => report.records.push(ExportRecord {
                pool_address: pair.id.clone(),
                token0,
                token1,
                fee_tier: DEFAULT_FEE_TIER,
            }),
            Err(symbol) => {
                warn!(pair = %pair.id, symbol = %symbol, "unrecognized token, skipping pair");
                report.skipped.push(SkippedPair {
                    pair: pair.id.clone(),
                    unresolved_symbol: symbol.to_string(),
                });
            }
        }
    }

    Ok(report)
}

fn resolve<'t>(lookup: &TokenLookup<'_>, token: &'t TokenRef) -> Result<ExportToken, &'t str> {
    let decimals = lookup.decimals(&token.symbol).ok_or(token.symbol.as_str())?;
    Ok(ExportToken {
        address: token.id.clone(),
        decimals,
        derived_eth: token.derived_eth.clone(),
        name: token.name.clone(),
        symbol: token.symbol.clone(),
    })
}

/// Serialized export ready for download or disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: &'static str,
    pub mime: &'static str,
    pub body: Vec<u8>,
}

impl ExportArtifact {
    /// Compact JSON array of `records`
    pub fn from_records(records: &[ExportRecord]) -> Result<Self> {
        Ok(Self {
            filename: EXPORT_FILENAME,
            mime: EXPORT_MIME,
            body: serde_json::to_vec(records)?,
        })
    }

    /// `Content-Disposition` value for an HTTP download
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    /// Write into `dir`, replacing any previous export
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(self.filename);
        let tmp = dir.join(format!(".{}.tmp", self.filename));
        tokio::fs::write(&tmp, &self.body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!("💾 Exported {} bytes to {}", self.body.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: &str, symbol: &str, decimals: u32) -> Token {
        Token {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: format!("{} token", symbol),
            decimals,
            derived_eth: "0.5".to_string(),
        }
    }

    fn token_ref(id: &str, symbol: &str) -> TokenRef {
        TokenRef {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: format!("{} token", symbol),
            derived_eth: "0.25".to_string(),
        }
    }

    fn pair(id: &str, s0: &str, s1: &str) -> Pair {
        Pair {
            id: id.to_string(),
            token0: token_ref(&format!("0x{}", s0), s0),
            token1: token_ref(&format!("0x{}", s1), s1),
            reserve_usd: None,
            volume_usd: None,
        }
    }

    #[test]
    fn unresolved_token_skips_whole_pair() {
        let pairs = vec![pair("0xP", "A", "B")];
        let tokens = vec![token("0xA", "A", 18), token("0xC", "C", 6)];

        let report = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(
            report.skipped,
            vec![SkippedPair {
                pair: "0xP".to_string(),
                unresolved_symbol: "B".to_string()
            }]
        );
    }

    #[test]
    fn record_takes_decimals_from_lookup_and_rest_from_pair() {
        let pairs = vec![pair("0xPOOL", "WETH", "USDC")];
        let tokens = vec![token("0xWETH", "WETH", 18), token("0xUSDC", "USDC", 6)];

        let report = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        let record = &report.records[0];
        assert_eq!(record.pool_address, "0xPOOL");
        assert_eq!(record.fee_tier, DEFAULT_FEE_TIER);
        assert_eq!(record.token0.address, "0xWETH");
        assert_eq!(record.token0.decimals, 18);
        assert_eq!(record.token1.decimals, 6);
        // derivedETH comes from the pair's embedded token, not the token list
        assert_eq!(record.token1.derived_eth, "0.25");
        assert_eq!(record.token1.name, "USDC token");
    }

    #[test]
    fn zero_decimals_token_still_resolves() {
        let pairs = vec![pair("0xP", "A", "B")];
        let tokens = vec![token("0xA", "A", 0), token("0xB", "B", 18)];

        let report = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].token0.decimals, 0);
    }

    #[test]
    fn output_length_matches_resolvable_pairs_and_keeps_order() {
        let pairs = vec![
            pair("0x1", "A", "B"),
            pair("0x2", "A", "Z"),
            pair("0x3", "B", "C"),
        ];
        let tokens = vec![token("0xA", "A", 18), token("0xB", "B", 8), token("0xC", "C", 6)];

        let report = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        let ids: Vec<_> = report.records.iter().map(|r| r.pool_address.as_str()).collect();
        assert_eq!(ids, vec!["0x1", "0x3"]);
        assert_eq!(report.records.len() + report.skipped.len(), pairs.len());
    }

    #[test]
    fn strict_policy_rejects_shared_symbol_used_by_a_pair() {
        let pairs = vec![pair("0xP", "SUSHI", "WETH")];
        let tokens = vec![
            token("0xA1", "SUSHI", 18),
            token("0xWETH", "WETH", 18),
            token("0xA2", "SUSHI", 9),
        ];
        let err = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap_err();
        match err {
            AnalyticsError::AmbiguousSymbol { symbol, first, second } => {
                assert_eq!(symbol, "SUSHI");
                assert_eq!(first, "0xA1");
                assert_eq!(second, "0xA2");
            }
            other => panic!("expected AmbiguousSymbol, got {:?}", other),
        }
    }

    #[test]
    fn last_write_wins_policy_uses_latest_decimals() {
        let pairs = vec![pair("0xP", "SUSHI", "WETH")];
        let tokens = vec![
            token("0xA1", "SUSHI", 18),
            token("0xWETH", "WETH", 18),
            token("0xA2", "SUSHI", 9),
        ];

        let report = build_export(&pairs, &tokens, SymbolPolicy::LastWriteWins).unwrap();
        assert_eq!(report.records[0].token0.decimals, 9);
    }

    #[test]
    fn unrelated_shared_symbol_does_not_block_export() {
        let pairs = vec![pair("0xp", "A", "B")];
        let tokens = vec![
            token("0xA", "A", 18),
            token("0xB", "B", 6),
            token("0xclone1", "SCAM", 18),
            token("0xclone2", "SCAM", 9),
        ];

        let report = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].token1.decimals, 6);
    }

    #[test]
    fn default_policy_exports_despite_clone_ticker() {
        let pairs = vec![pair("0xp", "A", "B")];
        let tokens = vec![
            token("0xA", "A", 18),
            token("0xb", "B", 6),
            token("0xscam", "B", 18),
        ];

        let policy = SymbolPolicy::from_allow_duplicates(
            crate::config::AppConfig::default().export.allow_duplicate_symbols,
        );
        assert_eq!(policy, SymbolPolicy::LastWriteWins);
        assert_eq!(policy, SymbolPolicy::default());

        let report = build_export(&pairs, &tokens, policy).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].token1.decimals, 18);
    }

    #[test]
    fn same_address_listed_twice_is_not_a_collision() {
        let tokens = vec![token("0xAbC", "X", 18), token("0xabc", "X", 18)];
        let lookup = TokenLookup::build(&tokens);
        assert!(lookup.collisions().is_empty());
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn export_is_byte_identical_across_runs() {
        let pairs = vec![pair("0x1", "A", "B"), pair("0x2", "B", "A")];
        let tokens = vec![token("0xA", "A", 18), token("0xB", "B", 6)];

        let first = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        let second = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        let a = ExportArtifact::from_records(&first.records).unwrap();
        let b = ExportArtifact::from_records(&second.records).unwrap();
        assert_eq!(a.body, b.body);
    }

    #[test]
    fn artifact_uses_expected_field_names() {
        let pairs = vec![pair("0xP", "A", "B")];
        let tokens = vec![token("0xA", "A", 18), token("0xB", "B", 6)];
        let report = build_export(&pairs, &tokens, SymbolPolicy::Strict).unwrap();
        let artifact = ExportArtifact::from_records(&report.records).unwrap();

        assert_eq!(artifact.filename, "sushi_pools.json");
        assert_eq!(artifact.mime, "application/json");

        let json: serde_json::Value = serde_json::from_slice(&artifact.body).unwrap();
        let first = &json.as_array().unwrap()[0];
        assert_eq!(first["poolAddress"], "0xP");
        assert_eq!(first["feeTier"], 3000);
        assert_eq!(first["token0"]["address"], "0xA");
        assert_eq!(first["token0"]["derivedETH"], "0.25");
        assert_eq!(first["token1"]["decimals"], 6);
    }

    #[test]
    fn empty_export_is_empty_array() {
        let artifact = ExportArtifact::from_records(&[]).unwrap();
        assert_eq!(artifact.body, b"[]");
    }

    #[tokio::test]
    async fn write_to_creates_file_in_dir() {
        let dir = std::env::temp_dir().join(format!("sushidash-export-{}", std::process::id()));
        let artifact = ExportArtifact::from_records(&[]).unwrap();

        let path = artifact.write_to(&dir).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "sushi_pools.json");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"[]");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
