// Lineup selection and validation against the fixed starter requirements.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::anyhow;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::db::Database;
use crate::model::{Bucket, BucketRequirements, StarterRole};

const EXPLAIN: &str = "FLEX seats are covered by starters in surplus of the primary minimums";

#[derive(Debug, Error)]
pub enum LineupError {
    #[error("team {0} not found")]
    TeamNotFound(i64),
    #[error("exactly {need} slot ids are required, got {got}")]
    WrongCount { need: u32, got: usize },
    #[error("unknown or duplicate slot ids: {slot_ids:?}")]
    UnknownSlots { slot_ids: Vec<i64> },
    #[error("slots not owned by team {team_id}: {slot_ids:?}")]
    ForeignSlots { team_id: i64, slot_ids: Vec<i64> },
    #[error("slots without a resolved bucket: {slot_ids:?}")]
    UnresolvedBuckets { slot_ids: Vec<i64> },
    #[error("lineup does not satisfy the starter requirements")]
    Invalid(LineupReport),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// One violated rule in a proposed lineup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineupProblem {
    WrongStarterCount { need: u32, got: u32 },
    PrimaryShort { bucket: Bucket, need: u32, got: u32, missing: u32 },
    FlexShort { need: u32, got: u32 },
}

/// Full validation verdict, suitable for returning to the caller verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct LineupReport {
    pub ok: bool,
    pub required: BucketRequirements,
    pub counts: BTreeMap<Bucket, u32>,
    pub problems: Vec<LineupProblem>,
    pub explain: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LineupOutcome {
    pub team_id: i64,
    pub starters: Vec<i64>,
    pub validation: LineupReport,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Resolve literal FLEX placeholders in a selection to primary buckets.
/// Placeholders first cover primary deficits in fill order, then spill
/// round-robin across the primaries as surplus. Length is preserved.
fn resolve_placeholders(roles: &[StarterRole], requirements: &BucketRequirements) -> Vec<Bucket> {
    let mut primaries: Vec<Bucket> = Vec::with_capacity(roles.len());
    let mut placeholders = 0usize;
    for role in roles {
        match role.bucket() {
            Some(bucket) => primaries.push(bucket),
            None => placeholders += 1,
        }
    }

    let mut counts: BTreeMap<Bucket, u32> = BTreeMap::new();
    for bucket in &primaries {
        *counts.entry(*bucket).or_insert(0) += 1;
    }

    for (bucket, need) in requirements.primaries() {
        if placeholders == 0 {
            break;
        }
        let have = counts.get(&bucket).copied().unwrap_or(0);
        let missing = need.saturating_sub(have) as usize;
        let take = missing.min(placeholders);
        if take > 0 {
            primaries.extend(std::iter::repeat(bucket).take(take));
            *counts.entry(bucket).or_insert(0) += take as u32;
            placeholders -= take;
        }
    }

    let mut i = 0usize;
    while placeholders > 0 {
        primaries.push(Bucket::ALL[i % Bucket::ALL.len()]);
        i += 1;
        placeholders -= 1;
    }

    primaries.truncate(roles.len());
    primaries
}

/// Validate a proposed starter selection. FLEX entries are placeholders and
/// are resolved before counting; everything else must be a primary bucket.
pub fn validate_selection(
    roles: &[StarterRole],
    requirements: &BucketRequirements,
    starters: u32,
) -> LineupReport {
    let buckets = resolve_placeholders(roles, requirements);

    let mut counts: BTreeMap<Bucket, u32> = BTreeMap::new();
    for bucket in &buckets {
        *counts.entry(*bucket).or_insert(0) += 1;
    }

    let mut problems = Vec::new();
    let got_total = buckets.len() as u32;
    if got_total != starters {
        problems.push(LineupProblem::WrongStarterCount {
            need: starters,
            got: got_total,
        });
    }

    let mut surplus = 0u32;
    for (bucket, need) in requirements.primaries() {
        let got = counts.get(&bucket).copied().unwrap_or(0);
        if got < need {
            problems.push(LineupProblem::PrimaryShort {
                bucket,
                need,
                got,
                missing: need - got,
            });
        }
        surplus += got.saturating_sub(need);
    }
    if surplus < requirements.flex {
        problems.push(LineupProblem::FlexShort {
            need: requirements.flex,
            got: surplus,
        });
    }

    LineupReport {
        ok: problems.is_empty(),
        required: *requirements,
        counts,
        problems,
        explain: EXPLAIN,
    }
}

// ---------------------------------------------------------------------------
// Lineup operations
// ---------------------------------------------------------------------------

/// Activate exactly the given slots as the team's starters.
///
/// The selection must name exactly `starters` distinct slots, all owned by
/// the team and all with a resolved bucket, and the resulting bucket
/// distribution must satisfy the requirements. On success every other slot
/// on the team is benched.
pub fn set_lineup(
    db: &Database,
    team_id: i64,
    slot_ids: &[i64],
) -> Result<LineupOutcome, LineupError> {
    let team = db
        .get_team(team_id)?
        .ok_or(LineupError::TeamNotFound(team_id))?;
    let league = db
        .get_league(team.league_id)?
        .ok_or_else(|| anyhow!("team {team_id} references missing league {}", team.league_id))?;

    if slot_ids.len() != league.starters as usize {
        return Err(LineupError::WrongCount {
            need: league.starters,
            got: slot_ids.len(),
        });
    }

    let mut seen = BTreeSet::new();
    let mut unknown = Vec::new();
    let mut foreign = Vec::new();
    let mut unresolved = Vec::new();
    let mut roles = Vec::with_capacity(slot_ids.len());
    for &slot_id in slot_ids {
        if !seen.insert(slot_id) {
            unknown.push(slot_id);
            continue;
        }
        match db.get_slot(slot_id)? {
            None => unknown.push(slot_id),
            Some(slot) if slot.team_id != team.id => foreign.push(slot_id),
            Some(slot) => match slot.bucket {
                Some(bucket) => roles.push(StarterRole::from(bucket)),
                None => unresolved.push(slot_id),
            },
        }
    }
    if !unknown.is_empty() {
        return Err(LineupError::UnknownSlots { slot_ids: unknown });
    }
    if !foreign.is_empty() {
        return Err(LineupError::ForeignSlots {
            team_id: team.id,
            slot_ids: foreign,
        });
    }
    if !unresolved.is_empty() {
        return Err(LineupError::UnresolvedBuckets {
            slot_ids: unresolved,
        });
    }

    let validation = validate_selection(&roles, &league.bucket_requirements, league.starters);
    if !validation.ok {
        return Err(LineupError::Invalid(validation));
    }

    db.activate_only(team.id, slot_ids)?;
    info!("set lineup for team {team_id}: {} starters", slot_ids.len());

    let mut starters: Vec<i64> = slot_ids.to_vec();
    starters.sort_unstable();
    Ok(LineupOutcome {
        team_id: team.id,
        starters,
        validation,
    })
}

/// Validate the team's currently active slots without changing anything.
pub fn check_team_lineup(db: &Database, team_id: i64) -> Result<LineupReport, LineupError> {
    let team = db
        .get_team(team_id)?
        .ok_or(LineupError::TeamNotFound(team_id))?;
    let league = db
        .get_league(team.league_id)?
        .ok_or_else(|| anyhow!("team {team_id} references missing league {}", team.league_id))?;

    let mut unresolved = Vec::new();
    let mut roles = Vec::new();
    for slot in db.list_active_slots(team.id)? {
        match slot.bucket {
            Some(bucket) => roles.push(StarterRole::from(bucket)),
            None => unresolved.push(slot.id),
        }
    }
    if !unresolved.is_empty() {
        return Err(LineupError::UnresolvedBuckets {
            slot_ids: unresolved,
        });
    }

    Ok(validate_selection(
        &roles,
        &league.bucket_requirements,
        league.starters,
    ))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{League, RosterRules, ScoringMode, Team};
    use std::path::Path;

    fn test_db() -> Database {
        Database::open(Path::new(":memory:")).expect("in-memory database")
    }

    fn test_league(db: &Database) -> League {
        db.create_league(
            "Lineup League",
            RosterRules::ROSTER_SLOTS,
            RosterRules::STARTERS,
            &BucketRequirements::default(),
            ScoringMode::Projections,
        )
        .expect("create league")
    }

    fn roles(labels: &[&str]) -> Vec<StarterRole> {
        labels
            .iter()
            .map(|l| StarterRole::parse(l).expect("valid role label"))
            .collect()
    }

    /// Eight slots that satisfy 2/1/2/1 + 2 FLEX.
    fn valid_spread(db: &Database, team: &Team) -> Vec<i64> {
        [
            ("AAPL", Bucket::LargeCap),
            ("MSFT", Bucket::LargeCap),
            ("UBER", Bucket::MidCap),
            ("KO", Bucket::SmallCap),
            ("PLTR", Bucket::SmallCap),
            ("VTI", Bucket::Etf),
            ("NVDA", Bucket::LargeCap),
            ("VOO", Bucket::Etf),
        ]
        .iter()
        .map(|(symbol, bucket)| {
            db.create_slot(team.id, symbol, false, Some(*bucket))
                .expect("create slot")
                .id
        })
        .collect()
    }

    // -- validate_selection -------------------------------------------------

    #[test]
    fn valid_distribution_passes() {
        let report = validate_selection(
            &roles(&[
                "LARGE_CAP", "LARGE_CAP", "MID_CAP", "SMALL_CAP", "SMALL_CAP", "ETF",
                "LARGE_CAP", "ETF",
            ]),
            &BucketRequirements::default(),
            8,
        );
        assert!(report.ok, "{:?}", report.problems);
        assert_eq!(report.counts[&Bucket::LargeCap], 3);
        assert_eq!(report.counts[&Bucket::Etf], 2);
    }

    #[test]
    fn flex_placeholders_cover_deficits_first() {
        // One LARGE_CAP seat short; a placeholder fills it before any
        // surplus assignment.
        let report = validate_selection(
            &roles(&[
                "LARGE_CAP", "FLEX", "MID_CAP", "SMALL_CAP", "SMALL_CAP", "ETF", "FLEX",
                "FLEX",
            ]),
            &BucketRequirements::default(),
            8,
        );
        assert!(report.ok, "{:?}", report.problems);
        // 1 placeholder to LARGE_CAP, 2 left round-robin from LARGE_CAP.
        assert_eq!(report.counts[&Bucket::LargeCap], 3);
        assert_eq!(report.counts[&Bucket::MidCap], 2);
    }

    #[test]
    fn leftover_placeholders_round_robin_as_surplus() {
        let report = validate_selection(
            &roles(&[
                "LARGE_CAP", "LARGE_CAP", "MID_CAP", "SMALL_CAP", "SMALL_CAP", "ETF",
                "FLEX", "FLEX",
            ]),
            &BucketRequirements::default(),
            8,
        );
        assert!(report.ok);
        assert_eq!(report.counts[&Bucket::LargeCap], 3);
        assert_eq!(report.counts[&Bucket::MidCap], 2);
    }

    #[test]
    fn wrong_starter_count_is_reported() {
        let report = validate_selection(
            &roles(&["LARGE_CAP", "LARGE_CAP", "MID_CAP"]),
            &BucketRequirements::default(),
            8,
        );
        assert!(!report.ok);
        assert!(report
            .problems
            .contains(&LineupProblem::WrongStarterCount { need: 8, got: 3 }));
    }

    #[test]
    fn primary_deficits_are_itemized() {
        let report = validate_selection(
            &roles(&[
                "LARGE_CAP", "LARGE_CAP", "LARGE_CAP", "LARGE_CAP", "LARGE_CAP",
                "LARGE_CAP", "LARGE_CAP", "LARGE_CAP",
            ]),
            &BucketRequirements::default(),
            8,
        );
        assert!(!report.ok);
        assert!(report.problems.contains(&LineupProblem::PrimaryShort {
            bucket: Bucket::MidCap,
            need: 1,
            got: 0,
            missing: 1,
        }));
        assert!(report.problems.contains(&LineupProblem::PrimaryShort {
            bucket: Bucket::SmallCap,
            need: 2,
            got: 0,
            missing: 2,
        }));
        // Six surplus large caps easily cover FLEX; no flex problem.
        assert!(!report
            .problems
            .iter()
            .any(|p| matches!(p, LineupProblem::FlexShort { .. })));
    }

    #[test]
    fn flex_shortfall_surfaces_with_wider_flex_rules() {
        // Three FLEX seats but only two starters in surplus.
        let requirements = BucketRequirements {
            flex: 3,
            ..BucketRequirements::default()
        };
        let report = validate_selection(
            &roles(&[
                "LARGE_CAP", "LARGE_CAP", "LARGE_CAP", "MID_CAP", "MID_CAP", "SMALL_CAP",
                "SMALL_CAP", "ETF",
            ]),
            &requirements,
            8,
        );
        assert!(report
            .problems
            .contains(&LineupProblem::FlexShort { need: 3, got: 2 }));
    }

    // -- set_lineup ---------------------------------------------------------

    #[test]
    fn set_lineup_activates_exactly_the_selection() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        let ids = valid_spread(&db, &team);
        // Two bench slots beyond the selection, one previously active.
        let bench = db
            .create_slot(team.id, "TSLA", true, Some(Bucket::LargeCap))
            .unwrap();
        db.create_slot(team.id, "PG", false, Some(Bucket::LargeCap))
            .unwrap();

        let outcome = set_lineup(&db, team.id, &ids).unwrap();
        assert!(outcome.validation.ok);
        let mut expected = ids.clone();
        expected.sort_unstable();
        assert_eq!(outcome.starters, expected);

        let active: Vec<i64> = db
            .list_active_slots(team.id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, expected);
        assert!(!db.get_slot(bench.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn set_lineup_requires_exactly_eight_ids() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        let ids = valid_spread(&db, &team);

        let err = set_lineup(&db, team.id, &ids[..5]).unwrap_err();
        assert!(matches!(err, LineupError::WrongCount { need: 8, got: 5 }));
    }

    #[test]
    fn set_lineup_rejects_unknown_and_duplicate_ids() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        let mut ids = valid_spread(&db, &team);

        ids[7] = 9999;
        let err = set_lineup(&db, team.id, &ids).unwrap_err();
        assert!(matches!(err, LineupError::UnknownSlots { ref slot_ids } if slot_ids == &[9999]));

        let mut dup = valid_spread(&db, &db.create_team(league.id, "Bears", None).unwrap());
        dup[7] = dup[0];
        let err = set_lineup(&db, team.id, &dup).unwrap_err();
        // Bears' slots are foreign to Bulls, but the duplicate is caught first.
        assert!(matches!(err, LineupError::UnknownSlots { ref slot_ids } if slot_ids == &[dup[0]]));
    }

    #[test]
    fn set_lineup_rejects_foreign_slots() {
        let db = test_db();
        let league = test_league(&db);
        let bulls = db.create_team(league.id, "Bulls", None).unwrap();
        let bears = db.create_team(league.id, "Bears", None).unwrap();
        let mut ids = valid_spread(&db, &bulls);
        let foreign = db
            .create_slot(bears.id, "TSLA", false, Some(Bucket::LargeCap))
            .unwrap();
        ids[0] = foreign.id;

        let err = set_lineup(&db, bulls.id, &ids).unwrap_err();
        assert!(
            matches!(err, LineupError::ForeignSlots { team_id, ref slot_ids }
                if team_id == bulls.id && slot_ids == &[foreign.id])
        );
    }

    #[test]
    fn set_lineup_rejects_unresolved_buckets() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        let mut ids = valid_spread(&db, &team);
        let unresolved = db.create_slot(team.id, "MYSTERY", false, None).unwrap();
        ids[7] = unresolved.id;

        let err = set_lineup(&db, team.id, &ids).unwrap_err();
        assert!(
            matches!(err, LineupError::UnresolvedBuckets { ref slot_ids }
                if slot_ids == &[unresolved.id])
        );
    }

    #[test]
    fn set_lineup_rejects_bad_distributions() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        let ids: Vec<i64> = (0..8)
            .map(|i| {
                db.create_slot(team.id, &format!("LC{i}"), false, Some(Bucket::LargeCap))
                    .unwrap()
                    .id
            })
            .collect();

        let err = set_lineup(&db, team.id, &ids).unwrap_err();
        let LineupError::Invalid(report) = err else {
            panic!("expected an invalid-lineup error");
        };
        assert!(!report.ok);
        // Nothing was activated.
        assert!(db.list_active_slots(team.id).unwrap().is_empty());
    }

    #[test]
    fn set_lineup_unknown_team() {
        let db = test_db();
        let err = set_lineup(&db, 42, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap_err();
        assert!(matches!(err, LineupError::TeamNotFound(42)));
    }

    // -- check_team_lineup --------------------------------------------------

    #[test]
    fn check_reports_on_the_active_slots() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        let ids = valid_spread(&db, &team);

        // Nothing active yet: everything is short.
        let report = check_team_lineup(&db, team.id).unwrap();
        assert!(!report.ok);
        assert!(report
            .problems
            .contains(&LineupProblem::WrongStarterCount { need: 8, got: 0 }));

        set_lineup(&db, team.id, &ids).unwrap();
        let report = check_team_lineup(&db, team.id).unwrap();
        assert!(report.ok);
    }
}
