// Draft picks and free agency: acquisitions, drops, and the free-agent pool.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::catalog;
use crate::db::Database;
use crate::model::{Bucket, DraftPick, FreeAgentSort, League, RosterSlot, Team};
use crate::roster::placement::{auto_place, Placement, PlacementError};

const UNRESOLVED_HINT: &str =
    "no bucket mapping for this symbol; the slot stays benched until one is set";

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("league {0} not found")]
    LeagueNotFound(i64),
    #[error("team {0} not found")]
    TeamNotFound(i64),
    #[error("team {team_id} is not in league {league_id}")]
    WrongLeague { team_id: i64, league_id: i64 },
    #[error("a non-empty symbol is required")]
    EmptySymbol,
    #[error("team {team_id} already rosters `{symbol}`")]
    AlreadyRostered { team_id: i64, symbol: String },
    #[error("roster is full ({capacity} slots)")]
    RosterFull { capacity: u32 },
    #[error("invalid bucket `{0}`")]
    InvalidBucket(String),
    #[error("`{symbol}` is not on team {team_id}")]
    NotRostered { team_id: i64, symbol: String },
    #[error("roster slot {0} not found")]
    SlotNotFound(i64),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct PickOutcome {
    pub pick: DraftPick,
    pub slot: RosterSlot,
    pub bucket_resolved: bool,
    pub placement: Option<Placement>,
    pub hint: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ClaimOutcome {
    pub slot: RosterSlot,
    pub bucket_resolved: bool,
    pub placement: Option<Placement>,
    pub hint: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DropOutcome {
    pub team_id: i64,
    pub symbol: String,
    pub was_active: bool,
}

/// One row of the free-agent pool, catalog data plus classification.
#[derive(Debug, Serialize)]
pub struct FreeAgent {
    pub symbol: String,
    pub name: String,
    pub bucket: Option<Bucket>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub is_etf: bool,
    pub adp: Option<f64>,
    pub proj_points: Option<f64>,
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

fn normalize_symbol(symbol: &str) -> Result<String, DraftError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(DraftError::EmptySymbol);
    }
    Ok(symbol)
}

fn guard_acquisition(
    db: &Database,
    league: &League,
    team: &Team,
    symbol: &str,
) -> Result<(), DraftError> {
    if db.roster_count(team.id)? >= league.roster_slots {
        return Err(DraftError::RosterFull {
            capacity: league.roster_slots,
        });
    }
    if db.get_slot_by_symbol(team.id, symbol)?.is_some() {
        return Err(DraftError::AlreadyRostered {
            team_id: team.id,
            symbol: symbol.to_string(),
        });
    }
    Ok(())
}

fn create_and_place(
    db: &Database,
    league: &League,
    team: &Team,
    symbol: &str,
    bucket: Option<Bucket>,
) -> Result<(RosterSlot, Option<Placement>), DraftError> {
    let mut slot = db.create_slot(team.id, symbol, false, bucket)?;
    let placement = match bucket {
        Some(bucket) => {
            let placement = auto_place(db, league, team.id, slot.id, bucket)?;
            slot.is_active = placement.activated;
            slot.bucket = Some(placement.bucket);
            Some(placement)
        }
        None => None,
    };
    Ok((slot, placement))
}

/// Draft a symbol for a team.
///
/// Pick numbers are league-wide and strictly increasing; the round is
/// always 1 in this single-round acquisition draft. The new slot is
/// auto-placed when the bucket resolves, otherwise it stays benched until
/// a bucket is assigned.
pub fn make_pick(db: &Database, team_id: i64, symbol: &str) -> Result<PickOutcome, DraftError> {
    let team = db
        .get_team(team_id)?
        .ok_or(DraftError::TeamNotFound(team_id))?;
    let league = db
        .get_league(team.league_id)?
        .ok_or(DraftError::LeagueNotFound(team.league_id))?;

    let symbol = normalize_symbol(symbol)?;
    guard_acquisition(db, &league, &team, &symbol)?;

    let resolved = catalog::resolve_bucket(db, &symbol)?;
    let pick_no = db.pick_count(league.id)? + 1;
    let pick = db.record_pick(league.id, team.id, &symbol, 1, pick_no)?;
    let (slot, placement) = create_and_place(db, &league, &team, &symbol, resolved)?;

    info!("pick {pick_no}: team {team_id} drafted {symbol}");
    Ok(PickOutcome {
        pick,
        slot,
        bucket_resolved: resolved.is_some(),
        placement,
        hint: resolved.is_none().then_some(UNRESOLVED_HINT),
    })
}

/// Claim a free agent outside the draft. An explicit bucket label skips
/// catalog resolution, which keeps catalog-less symbols usable.
pub fn claim(
    db: &Database,
    league_id: i64,
    team_id: i64,
    symbol: &str,
    bucket: Option<&str>,
) -> Result<ClaimOutcome, DraftError> {
    let league = db
        .get_league(league_id)?
        .ok_or(DraftError::LeagueNotFound(league_id))?;
    let team = db
        .get_team(team_id)?
        .ok_or(DraftError::TeamNotFound(team_id))?;
    if team.league_id != league.id {
        return Err(DraftError::WrongLeague { team_id, league_id });
    }

    let symbol = normalize_symbol(symbol)?;
    let resolved = match bucket {
        Some(label) => Some(
            Bucket::parse(label).ok_or_else(|| DraftError::InvalidBucket(label.to_string()))?,
        ),
        None => catalog::resolve_bucket(db, &symbol)?,
    };

    guard_acquisition(db, &league, &team, &symbol)?;
    let (slot, placement) = create_and_place(db, &league, &team, &symbol, resolved)?;

    info!("team {team_id} claimed {symbol} in league {league_id}");
    Ok(ClaimOutcome {
        slot,
        bucket_resolved: resolved.is_some(),
        placement,
        hint: resolved.is_none().then_some(UNRESOLVED_HINT),
    })
}

/// Drop a rostered symbol back to free agency.
pub fn drop_symbol(
    db: &Database,
    league_id: i64,
    team_id: i64,
    symbol: &str,
) -> Result<DropOutcome, DraftError> {
    let league = db
        .get_league(league_id)?
        .ok_or(DraftError::LeagueNotFound(league_id))?;
    let team = db
        .get_team(team_id)?
        .ok_or(DraftError::TeamNotFound(team_id))?;
    if team.league_id != league.id {
        return Err(DraftError::WrongLeague { team_id, league_id });
    }

    let symbol = normalize_symbol(symbol)?;
    let slot = db
        .get_slot_by_symbol(team.id, &symbol)?
        .ok_or_else(|| DraftError::NotRostered {
            team_id: team.id,
            symbol: symbol.clone(),
        })?;
    db.delete_slot(slot.id)?;

    info!("team {team_id} dropped {symbol}");
    Ok(DropOutcome {
        team_id: team.id,
        symbol,
        was_active: slot.is_active,
    })
}

/// Reassign the bucket on a slot, the repair path for symbols the catalog
/// cannot classify. Activation is left untouched.
pub fn set_slot_bucket(db: &Database, slot_id: i64, bucket: &str) -> Result<RosterSlot, DraftError> {
    let mut slot = db
        .get_slot(slot_id)?
        .ok_or(DraftError::SlotNotFound(slot_id))?;
    let bucket =
        Bucket::parse(bucket).ok_or_else(|| DraftError::InvalidBucket(bucket.to_string()))?;
    if slot.bucket != Some(bucket) {
        db.update_slot_placement(slot.id, Some(bucket), slot.is_active)?;
        slot.bucket = Some(bucket);
        info!("slot {slot_id} reassigned to {bucket}");
    }
    Ok(slot)
}

/// Full roster for a team, id-ascending.
pub fn team_roster(db: &Database, team_id: i64) -> Result<Vec<RosterSlot>, DraftError> {
    let team = db
        .get_team(team_id)?
        .ok_or(DraftError::TeamNotFound(team_id))?;
    Ok(db.list_slots(team.id)?)
}

// ---------------------------------------------------------------------------
// Free-agent pool
// ---------------------------------------------------------------------------

/// List unrostered catalog entries. `query` substring-matches symbol or
/// name; `bucket` filters on the classified bucket, so cap-derived
/// classifications count even when no bucket is cached.
pub fn free_agents(
    db: &Database,
    league_id: i64,
    query: Option<&str>,
    bucket: Option<Bucket>,
    sort: FreeAgentSort,
    limit: usize,
) -> Result<Vec<FreeAgent>, DraftError> {
    let league = db
        .get_league(league_id)?
        .ok_or(DraftError::LeagueNotFound(league_id))?;

    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let rows = db.list_unrostered_securities(league.id, query, sort)?;

    let mut agents = Vec::new();
    for sec in rows {
        if agents.len() >= limit {
            break;
        }
        let classified = catalog::classify(&sec.symbol, Some(&sec));
        if let Some(wanted) = bucket {
            if classified != Some(wanted) {
                continue;
            }
        }
        let name = sec.name.clone().unwrap_or_else(|| sec.symbol.clone());
        agents.push(FreeAgent {
            symbol: sec.symbol,
            name,
            bucket: classified,
            sector: sec.sector,
            market_cap: sec.market_cap,
            is_etf: sec.is_etf,
            adp: sec.adp,
            proj_points: sec.proj_points,
        });
    }
    Ok(agents)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BucketRequirements, RosterRules, ScoringMode, Security};
    use std::path::Path;

    fn test_db() -> Database {
        Database::open(Path::new(":memory:")).expect("in-memory database")
    }

    fn test_league(db: &Database) -> League {
        db.create_league(
            "Draft League",
            RosterRules::ROSTER_SLOTS,
            RosterRules::STARTERS,
            &BucketRequirements::default(),
            ScoringMode::Projections,
        )
        .expect("create league")
    }

    fn seed_security(db: &Database, symbol: &str, market_cap: Option<f64>, is_etf: bool) {
        db.upsert_security(&Security {
            symbol: symbol.to_string(),
            name: Some(format!("{symbol} Co")),
            sector: None,
            is_etf,
            market_cap,
            primary_bucket: None,
            adp: None,
            proj_points: None,
        })
        .expect("seed security");
    }

    // -- make_pick ----------------------------------------------------------

    #[test]
    fn picks_number_league_wide() {
        let db = test_db();
        let league = test_league(&db);
        let bulls = db.create_team(league.id, "Bulls", None).unwrap();
        let bears = db.create_team(league.id, "Bears", None).unwrap();

        let first = make_pick(&db, bulls.id, "aapl").unwrap();
        let second = make_pick(&db, bears.id, "MSFT").unwrap();
        assert_eq!(first.pick.pick_no, 1);
        assert_eq!(second.pick.pick_no, 2);
        assert_eq!(first.pick.round, 1);
        assert_eq!(second.pick.round, 1);
        assert_eq!(first.pick.symbol, "AAPL");
    }

    #[test]
    fn pick_resolves_and_auto_places() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        seed_security(&db, "AAPL", Some(3.0e12), false);

        let outcome = make_pick(&db, team.id, "AAPL").unwrap();
        assert!(outcome.bucket_resolved);
        assert_eq!(outcome.slot.bucket, Some(Bucket::LargeCap));
        assert!(outcome.slot.is_active);
        assert!(outcome.placement.as_ref().is_some_and(|p| p.activated));
        assert_eq!(outcome.hint, None);
    }

    #[test]
    fn unresolved_pick_stays_benched_until_repaired() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();

        let outcome = make_pick(&db, team.id, "ZZZZ").unwrap();
        assert!(!outcome.bucket_resolved);
        assert!(!outcome.slot.is_active);
        assert_eq!(outcome.slot.bucket, None);
        assert!(outcome.placement.is_none());
        assert!(outcome.hint.is_some());

        // Manual bucket assignment repairs the slot without activating it.
        let repaired = set_slot_bucket(&db, outcome.slot.id, "small_cap").unwrap();
        assert_eq!(repaired.bucket, Some(Bucket::SmallCap));
        assert!(!repaired.is_active);
    }

    #[test]
    fn duplicate_symbol_rejected_per_team_not_per_league() {
        let db = test_db();
        let league = test_league(&db);
        let bulls = db.create_team(league.id, "Bulls", None).unwrap();
        let bears = db.create_team(league.id, "Bears", None).unwrap();

        make_pick(&db, bulls.id, "AAPL").unwrap();
        let dup = make_pick(&db, bulls.id, "AAPL").unwrap_err();
        assert!(matches!(dup, DraftError::AlreadyRostered { .. }));
        // No pick row was burned by the rejected attempt.
        assert_eq!(db.pick_count(league.id).unwrap(), 1);

        // Another team may roster the same symbol.
        assert!(make_pick(&db, bears.id, "AAPL").is_ok());
    }

    #[test]
    fn full_roster_rejects_further_picks() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        for i in 0..RosterRules::ROSTER_SLOTS {
            db.create_slot(team.id, &format!("SYM{i}"), false, None).unwrap();
        }

        let err = make_pick(&db, team.id, "AAPL").unwrap_err();
        assert!(matches!(err, DraftError::RosterFull { capacity: 14 }));
    }

    #[test]
    fn pick_validates_team_and_symbol() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();

        assert!(matches!(
            make_pick(&db, 99, "AAPL").unwrap_err(),
            DraftError::TeamNotFound(99)
        ));
        assert!(matches!(
            make_pick(&db, team.id, "   ").unwrap_err(),
            DraftError::EmptySymbol
        ));
    }

    // -- claim / drop -------------------------------------------------------

    #[test]
    fn claim_accepts_an_explicit_bucket() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();

        let outcome = claim(&db, league.id, team.id, "MYSTERY", Some("small_cap")).unwrap();
        assert!(outcome.bucket_resolved);
        assert_eq!(outcome.slot.bucket, Some(Bucket::SmallCap));
        assert!(outcome.slot.is_active);

        let bad = claim(&db, league.id, team.id, "OTHER", Some("MEGA_CAP")).unwrap_err();
        assert!(matches!(bad, DraftError::InvalidBucket(_)));
    }

    #[test]
    fn claim_checks_league_membership() {
        let db = test_db();
        let league = test_league(&db);
        let other = db
            .create_league(
                "Other League",
                RosterRules::ROSTER_SLOTS,
                RosterRules::STARTERS,
                &BucketRequirements::default(),
                ScoringMode::Projections,
            )
            .unwrap();
        let team = db.create_team(other.id, "Strays", None).unwrap();

        let err = claim(&db, league.id, team.id, "AAPL", None).unwrap_err();
        assert!(matches!(err, DraftError::WrongLeague { .. }));
    }

    #[test]
    fn drop_round_trip() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        claim(&db, league.id, team.id, "AAPL", None).unwrap();

        let outcome = drop_symbol(&db, league.id, team.id, "aapl").unwrap();
        assert_eq!(outcome.symbol, "AAPL");
        assert!(outcome.was_active);
        assert!(db.get_slot_by_symbol(team.id, "AAPL").unwrap().is_none());

        let again = drop_symbol(&db, league.id, team.id, "AAPL").unwrap_err();
        assert!(matches!(again, DraftError::NotRostered { .. }));
    }

    // -- free agents --------------------------------------------------------

    #[test]
    fn free_agents_classify_filter_and_limit() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();

        seed_security(&db, "AAPL", Some(3.0e12), false);
        seed_security(&db, "KO", Some(1.0e9), false);
        seed_security(&db, "VTI", None, true);
        seed_security(&db, "MYSTERY", None, false);
        db.create_slot(team.id, "AAPL", false, None).unwrap();

        let all = free_agents(&db, league.id, None, None, FreeAgentSort::Symbol, 50).unwrap();
        let symbols: Vec<&str> = all.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["KO", "MYSTERY", "VTI"]);
        assert_eq!(all[0].bucket, Some(Bucket::SmallCap));
        assert_eq!(all[1].bucket, None);

        let etfs = free_agents(&db, league.id, None, Some(Bucket::Etf), FreeAgentSort::Symbol, 50)
            .unwrap();
        assert_eq!(etfs.len(), 1);
        assert_eq!(etfs[0].symbol, "VTI");

        let limited = free_agents(&db, league.id, None, None, FreeAgentSort::Symbol, 1).unwrap();
        assert_eq!(limited.len(), 1);

        let queried = free_agents(&db, league.id, Some("ko"), None, FreeAgentSort::Symbol, 50)
            .unwrap();
        assert_eq!(queried.len(), 1);
        assert_eq!(queried[0].symbol, "KO");
    }
}
