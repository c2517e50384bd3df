// Security catalog: bucket classification rules and CSV import.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Database;
use crate::model::{Bucket, Price, Security};

/// Market-cap floor for LARGE_CAP classification ($10B).
pub const LARGE_CAP_MIN: f64 = 10_000_000_000.0;
/// Market-cap floor for MID_CAP classification ($2B).
pub const MID_CAP_MIN: f64 = 2_000_000_000.0;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Bucket classification
// ---------------------------------------------------------------------------

/// Hardwired classifications for the symbols that ship with the seed data.
/// Consulted last, after the catalog row (if any) has had its say.
pub fn static_bucket(symbol: &str) -> Option<Bucket> {
    let bucket = match symbol.trim().to_uppercase().as_str() {
        "VTI" | "VOO" => Bucket::Etf,
        "SHOP" | "KO" => Bucket::SmallCap,
        "AAPL" | "MSFT" | "TSLA" | "GOOGL" | "AMZN" | "NVDA" | "META" | "ADBE" | "NFLX"
        | "PG" | "SHEL" | "BABA" => Bucket::LargeCap,
        _ => return None,
    };
    Some(bucket)
}

/// Classify by market cap alone. Any positive cap lands in a bucket; zero
/// and negative caps stay unclassified.
pub fn bucket_from_market_cap(market_cap: f64) -> Option<Bucket> {
    if market_cap >= LARGE_CAP_MIN {
        Some(Bucket::LargeCap)
    } else if market_cap >= MID_CAP_MIN {
        Some(Bucket::MidCap)
    } else if market_cap > 0.0 {
        Some(Bucket::SmallCap)
    } else {
        None
    }
}

/// Full classification chain for a symbol: the cached bucket on the catalog
/// row, then the ETF flag, then market-cap thresholds, then the static table.
pub fn classify(symbol: &str, security: Option<&Security>) -> Option<Bucket> {
    if let Some(sec) = security {
        if let Some(bucket) = sec.primary_bucket {
            return Some(bucket);
        }
        if sec.is_etf {
            return Some(Bucket::Etf);
        }
        if let Some(bucket) = sec.market_cap.and_then(bucket_from_market_cap) {
            return Some(bucket);
        }
    }
    static_bucket(symbol)
}

/// Look the symbol up in the catalog and classify it. `None` means the
/// symbol cannot be placed in any bucket with the data on hand.
pub fn resolve_bucket(db: &Database, symbol: &str) -> anyhow::Result<Option<Bucket>> {
    let security = db.get_security(symbol)?;
    Ok(classify(symbol, security.as_ref()))
}

// ---------------------------------------------------------------------------
// CSV import
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
}

/// Securities CSV row. Extra columns are silently ignored; aliases cover the
/// common header capitalizations.
#[derive(Debug, Deserialize)]
struct RawSecurityRow {
    #[serde(alias = "Symbol", alias = "Ticker", alias = "ticker")]
    symbol: String,
    #[serde(default, alias = "Name")]
    name: Option<String>,
    #[serde(default, alias = "Sector")]
    sector: Option<String>,
    #[serde(default, alias = "ETF", alias = "etf")]
    is_etf: Option<String>,
    #[serde(default, alias = "MarketCap", alias = "Market Cap")]
    market_cap: Option<f64>,
    #[serde(default, alias = "Bucket", alias = "bucket")]
    primary_bucket: Option<String>,
    #[serde(default, alias = "ADP")]
    adp: Option<f64>,
    #[serde(default, alias = "ProjPoints", alias = "projected_points")]
    proj_points: Option<f64>,
}

/// Daily price CSV row.
#[derive(Debug, Deserialize)]
struct RawPriceRow {
    #[serde(alias = "Symbol", alias = "Ticker", alias = "ticker")]
    symbol: String,
    #[serde(alias = "Date")]
    date: String,
    #[serde(default, alias = "Open")]
    open: Option<f64>,
    #[serde(default, alias = "Close", alias = "adj_close")]
    close: Option<f64>,
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim).map(str::to_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("y")
    )
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn load_securities_from_reader<R: Read>(rdr: R) -> Result<Vec<Security>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut securities = Vec::new();
    for result in reader.deserialize::<RawSecurityRow>() {
        match result {
            Ok(raw) => {
                let symbol = raw.symbol.trim().to_uppercase();
                if symbol.is_empty() {
                    warn!("skipping security row with an empty symbol");
                    continue;
                }
                securities.push(Security {
                    symbol,
                    name: clean(raw.name),
                    sector: clean(raw.sector),
                    is_etf: parse_flag(raw.is_etf.as_deref()),
                    market_cap: raw.market_cap,
                    primary_bucket: raw.primary_bucket.as_deref().and_then(Bucket::parse),
                    adp: raw.adp,
                    proj_points: raw.proj_points,
                });
            }
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => return Err(err),
            Err(err) => warn!("skipping malformed security row: {err}"),
        }
    }
    Ok(securities)
}

fn load_prices_from_reader<R: Read>(rdr: R) -> Result<Vec<Price>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut prices = Vec::new();
    for result in reader.deserialize::<RawPriceRow>() {
        match result {
            Ok(raw) => {
                let symbol = raw.symbol.trim().to_uppercase();
                if symbol.is_empty() {
                    warn!("skipping price row with an empty symbol");
                    continue;
                }
                let date = match NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d") {
                    Ok(date) => date,
                    Err(err) => {
                        warn!("skipping price row for '{symbol}': bad date '{}': {err}", raw.date);
                        continue;
                    }
                };
                prices.push(Price {
                    symbol,
                    date,
                    open: raw.open,
                    close: raw.close,
                });
            }
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => return Err(err),
            Err(err) => warn!("skipping malformed price row: {err}"),
        }
    }
    Ok(prices)
}

/// Upsert securities from a CSV file into the catalog.
pub fn import_securities(db: &Database, path: &Path) -> Result<ImportSummary, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let securities = load_securities_from_reader(file).map_err(|source| CatalogError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    for security in &securities {
        db.upsert_security(security)?;
    }
    info!("imported {} securities from {}", securities.len(), path.display());
    Ok(ImportSummary {
        imported: securities.len(),
    })
}

/// Upsert daily prices from a CSV file.
pub fn import_prices(db: &Database, path: &Path) -> Result<ImportSummary, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let prices = load_prices_from_reader(file).map_err(|source| CatalogError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    for price in &prices {
        db.upsert_price(price)?;
    }
    info!("imported {} price rows from {}", prices.len(), path.display());
    Ok(ImportSummary {
        imported: prices.len(),
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
