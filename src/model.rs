// Core domain types: buckets, scoring modes, fixed roster rules, and entities.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Buckets and starter roles
// ---------------------------------------------------------------------------

/// Primary classification of a security. This is the only bucket value that
/// is ever persisted on a roster slot; FLEX exists solely as a computed
/// starter role and as a wildcard placeholder in lineup validation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Bucket {
    #[serde(rename = "LARGE_CAP")]
    LargeCap,
    #[serde(rename = "MID_CAP")]
    MidCap,
    #[serde(rename = "SMALL_CAP")]
    SmallCap,
    #[serde(rename = "ETF")]
    Etf,
}

impl Bucket {
    /// All primary buckets in FLEX fill order. Deficit filling and
    /// round-robin placeholder assignment both walk this order.
    pub const ALL: [Bucket; 4] = [Bucket::LargeCap, Bucket::MidCap, Bucket::SmallCap, Bucket::Etf];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::LargeCap => "LARGE_CAP",
            Bucket::MidCap => "MID_CAP",
            Bucket::SmallCap => "SMALL_CAP",
            Bucket::Etf => "ETF",
        }
    }

    /// Parse a bucket label, tolerating whitespace and lowercase input.
    /// Returns `None` for anything that is not one of the four primaries
    /// (including the literal "FLEX", which is never a stored bucket).
    pub fn parse(label: &str) -> Option<Bucket> {
        match label.trim().to_uppercase().as_str() {
            "LARGE_CAP" => Some(Bucket::LargeCap),
            "MID_CAP" => Some(Bucket::MidCap),
            "SMALL_CAP" => Some(Bucket::SmallCap),
            "ETF" => Some(Bucket::Etf),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wildcard label accepted by lineup validation.
pub const FLEX_LABEL: &str = "FLEX";

/// Role a starter occupies in a lineup breakdown. Unlike [`Bucket`], this
/// can be FLEX; it is always computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StarterRole {
    #[serde(rename = "LARGE_CAP")]
    LargeCap,
    #[serde(rename = "MID_CAP")]
    MidCap,
    #[serde(rename = "SMALL_CAP")]
    SmallCap,
    #[serde(rename = "ETF")]
    Etf,
    #[serde(rename = "FLEX")]
    Flex,
}

impl StarterRole {
    pub fn as_str(self) -> &'static str {
        match self {
            StarterRole::LargeCap => "LARGE_CAP",
            StarterRole::MidCap => "MID_CAP",
            StarterRole::SmallCap => "SMALL_CAP",
            StarterRole::Etf => "ETF",
            StarterRole::Flex => FLEX_LABEL,
        }
    }

    /// The primary bucket behind this role, or `None` for FLEX.
    pub fn bucket(self) -> Option<Bucket> {
        match self {
            StarterRole::LargeCap => Some(Bucket::LargeCap),
            StarterRole::MidCap => Some(Bucket::MidCap),
            StarterRole::SmallCap => Some(Bucket::SmallCap),
            StarterRole::Etf => Some(Bucket::Etf),
            StarterRole::Flex => None,
        }
    }

    /// Parse a starter-role label: any primary bucket label or "FLEX".
    pub fn parse(label: &str) -> Option<StarterRole> {
        if label.trim().eq_ignore_ascii_case(FLEX_LABEL) {
            return Some(StarterRole::Flex);
        }
        Bucket::parse(label).map(StarterRole::from)
    }
}

impl From<Bucket> for StarterRole {
    fn from(bucket: Bucket) -> Self {
        match bucket {
            Bucket::LargeCap => StarterRole::LargeCap,
            Bucket::MidCap => StarterRole::MidCap,
            Bucket::SmallCap => StarterRole::SmallCap,
            Bucket::Etf => StarterRole::Etf,
        }
    }
}

impl fmt::Display for StarterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Scoring mode
// ---------------------------------------------------------------------------

/// How a league turns rosters into match points: static projections or live
/// weekly price returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringMode {
    #[default]
    #[serde(rename = "PROJECTIONS")]
    Projections,
    #[serde(rename = "LIVE")]
    Live,
}

impl ScoringMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoringMode::Projections => "PROJECTIONS",
            ScoringMode::Live => "LIVE",
        }
    }

    pub fn parse(label: &str) -> Option<ScoringMode> {
        match label.trim().to_uppercase().as_str() {
            "PROJECTIONS" => Some(ScoringMode::Projections),
            "LIVE" => Some(ScoringMode::Live),
            _ => None,
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fixed roster rules
// ---------------------------------------------------------------------------

/// Per-bucket starter minimums plus the FLEX seat count. Every league is
/// stamped with the same table at creation; settings writes may not change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRequirements {
    #[serde(rename = "LARGE_CAP")]
    pub large_cap: u32,
    #[serde(rename = "MID_CAP")]
    pub mid_cap: u32,
    #[serde(rename = "SMALL_CAP")]
    pub small_cap: u32,
    #[serde(rename = "ETF")]
    pub etf: u32,
    #[serde(rename = "FLEX")]
    pub flex: u32,
}

impl Default for BucketRequirements {
    fn default() -> Self {
        Self {
            large_cap: 2,
            mid_cap: 1,
            small_cap: 2,
            etf: 1,
            flex: 2,
        }
    }
}

impl BucketRequirements {
    /// Requirement for a single primary bucket.
    pub fn primary(&self, bucket: Bucket) -> u32 {
        match bucket {
            Bucket::LargeCap => self.large_cap,
            Bucket::MidCap => self.mid_cap,
            Bucket::SmallCap => self.small_cap,
            Bucket::Etf => self.etf,
        }
    }

    /// Primary requirements in FLEX fill order.
    pub fn primaries(&self) -> [(Bucket, u32); 4] {
        [
            (Bucket::LargeCap, self.large_cap),
            (Bucket::MidCap, self.mid_cap),
            (Bucket::SmallCap, self.small_cap),
            (Bucket::Etf, self.etf),
        ]
    }

    /// Total starter seats implied by the table (primaries + FLEX).
    pub fn starters_total(&self) -> u32 {
        self.large_cap + self.mid_cap + self.small_cap + self.etf + self.flex
    }
}

/// League-wide fixed sizes. These are constants, not configuration: a league
/// row carries copies, and the settings operation rejects attempts to change
/// them.
pub struct RosterRules;

impl RosterRules {
    pub const ROSTER_SLOTS: u32 = 14;
    pub const STARTERS: u32 = 8;

    pub const BENCH: u32 = Self::ROSTER_SLOTS - Self::STARTERS;
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    /// Total roster capacity (starters + bench). Fixed at 14.
    pub roster_slots: u32,
    /// Active starter capacity. Fixed at 8.
    pub starters: u32,
    pub bucket_requirements: BucketRequirements,
    pub scoring_mode: ScoringMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub league_id: i64,
    pub name: String,
    pub owner: Option<String>,
}

/// One rostered security on a team. `bucket` is `None` until resolution
/// succeeds; an unresolved slot can never be activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSlot {
    pub id: i64,
    pub team_id: i64,
    pub symbol: String,
    pub is_active: bool,
    pub bucket: Option<Bucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPick {
    pub id: i64,
    pub league_id: i64,
    pub team_id: i64,
    pub symbol: String,
    pub round: u32,
    /// Strictly increasing per league, assigned as pick count + 1.
    pub pick_no: u32,
}

/// A scheduled head-to-head game. Null points mean "not yet scored"; a null
/// winner with non-null points means a tie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub league_id: i64,
    /// Period label: an ISO week ("2026-W34"), a round-robin week
    /// ("2026-W34+Wk3"), or a playoff week ("2026-W34-PO-SF").
    pub week: String,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_points: Option<f64>,
    pub away_points: Option<f64>,
    pub winner_team_id: Option<i64>,
}

impl Match {
    pub fn is_scored(&self) -> bool {
        self.home_points.is_some() && self.away_points.is_some()
    }
}

/// Snapshot of a team's points for one period, upserted by the scorer.
/// Unique per (league, team, period).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamScore {
    pub id: i64,
    pub league_id: i64,
    pub team_id: i64,
    pub period: String,
    pub points: f64,
}

/// Catalog entry for a draftable security. All derived fields are nullable;
/// scoring reads missing data as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub is_etf: bool,
    pub market_cap: Option<f64>,
    /// Cached bucket classification; consulted before any derivation.
    pub primary_bucket: Option<Bucket>,
    pub adp: Option<f64>,
    pub proj_points: Option<f64>,
}

/// One day of price history for a symbol. Open and close are independently
/// nullable; the weekly-return computation falls back across them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub symbol: String,
    pub date: chrono::NaiveDate,
    pub open: Option<f64>,
    pub close: Option<f64>,
}

/// Sort orders accepted by the free-agent listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeAgentSort {
    Symbol,
    MarketCap,
    Adp,
    ProjPoints,
}

impl FreeAgentSort {
    pub fn parse(label: &str) -> Option<FreeAgentSort> {
        match label.trim().to_lowercase().as_str() {
            "symbol" => Some(FreeAgentSort::Symbol),
            "market_cap" => Some(FreeAgentSort::MarketCap),
            "adp" => Some(FreeAgentSort::Adp),
            "proj_points" => Some(FreeAgentSort::ProjPoints),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
