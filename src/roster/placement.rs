// Automatic starter placement for newly acquired or reclassified slots.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::db::Database;
use crate::model::{Bucket, BucketRequirements, League};

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("roster slot {0} not found")]
    SlotNotFound(i64),
    #[error("roster slot {slot_id} does not belong to team {team_id}")]
    ForeignSlot { slot_id: i64, team_id: i64 },
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    pub team_id: i64,
    pub slot_id: i64,
    pub symbol: String,
    pub bucket: Bucket,
    pub activated: bool,
}

/// Decide whether a slot classified as `incoming` should start, given the
/// current active bucket counts (excluding the slot itself).
///
/// A bucket still under its minimum starts if the remaining open seats can
/// still cover every other minimum afterwards. A bucket at or over its
/// minimum may take a FLEX seat under the same remaining-capacity rule.
/// Everything else benches, as does any pick once the lineup is full.
pub fn should_activate(
    counts: &BTreeMap<Bucket, u32>,
    active_total: u32,
    requirements: &BucketRequirements,
    starters: u32,
    incoming: Bucket,
) -> bool {
    if active_total >= starters {
        return false;
    }

    let got = counts.get(&incoming).copied().unwrap_or(0);
    let need = requirements.primary(incoming);

    if got < need {
        fits_remaining(counts, active_total, requirements, starters, incoming)
    } else {
        let surplus: u32 = requirements
            .primaries()
            .into_iter()
            .map(|(bucket, need)| {
                counts.get(&bucket).copied().unwrap_or(0).saturating_sub(need)
            })
            .sum();
        if surplus + 1 <= requirements.flex {
            fits_remaining(counts, active_total, requirements, starters, incoming)
        } else {
            false
        }
    }
}

/// After hypothetically starting `incoming`, can the seats left still cover
/// every unmet primary minimum?
fn fits_remaining(
    counts: &BTreeMap<Bucket, u32>,
    active_total: u32,
    requirements: &BucketRequirements,
    starters: u32,
    incoming: Bucket,
) -> bool {
    let after_total = active_total + 1;
    let remaining_seats = starters - after_total;
    let remaining_deficit: u32 = requirements
        .primaries()
        .into_iter()
        .map(|(bucket, need)| {
            let mut got = counts.get(&bucket).copied().unwrap_or(0);
            if bucket == incoming {
                got += 1;
            }
            need.saturating_sub(got)
        })
        .sum();
    remaining_seats >= remaining_deficit
}

/// Pin a slot's bucket to `bucket` and start or bench it per
/// [`should_activate`]. The row is only rewritten when something changes.
pub fn auto_place(
    db: &Database,
    league: &League,
    team_id: i64,
    slot_id: i64,
    bucket: Bucket,
) -> Result<Placement, PlacementError> {
    let slot = db
        .get_slot(slot_id)?
        .ok_or(PlacementError::SlotNotFound(slot_id))?;
    if slot.team_id != team_id {
        return Err(PlacementError::ForeignSlot { slot_id, team_id });
    }

    let mut counts: BTreeMap<Bucket, u32> = BTreeMap::new();
    let mut active_total = 0u32;
    for active in db.list_active_slots(team_id)? {
        // The slot being placed never counts against itself.
        if active.id == slot_id {
            continue;
        }
        active_total += 1;
        if let Some(b) = active.bucket {
            *counts.entry(b).or_insert(0) += 1;
        }
    }

    let activated = should_activate(
        &counts,
        active_total,
        &league.bucket_requirements,
        league.starters,
        bucket,
    );
    if slot.bucket != Some(bucket) || slot.is_active != activated {
        db.update_slot_placement(slot_id, Some(bucket), activated)?;
    }
    info!(
        "placed {} (slot {slot_id}) as {bucket} for team {team_id}, active: {activated}",
        slot.symbol
    );

    Ok(Placement {
        team_id,
        slot_id,
        symbol: slot.symbol,
        bucket,
        activated,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RosterRules, ScoringMode};
    use std::path::Path;

    fn test_db() -> Database {
        Database::open(Path::new(":memory:")).expect("in-memory database")
    }

    fn test_league(db: &Database) -> League {
        db.create_league(
            "Placement League",
            RosterRules::ROSTER_SLOTS,
            RosterRules::STARTERS,
            &BucketRequirements::default(),
            ScoringMode::Projections,
        )
        .expect("create league")
    }

    fn counts(pairs: &[(Bucket, u32)]) -> BTreeMap<Bucket, u32> {
        pairs.iter().copied().collect()
    }

    // -- should_activate ----------------------------------------------------

    #[test]
    fn full_lineup_always_benches() {
        let req = BucketRequirements::default();
        let c = counts(&[
            (Bucket::LargeCap, 4),
            (Bucket::MidCap, 1),
            (Bucket::SmallCap, 2),
            (Bucket::Etf, 1),
        ]);
        assert!(!should_activate(&c, 8, &req, 8, Bucket::LargeCap));
        assert!(!should_activate(&c, 8, &req, 8, Bucket::MidCap));
    }

    #[test]
    fn deficit_pick_starts_when_capacity_remains() {
        let req = BucketRequirements::default();
        // Empty lineup: the first pick of any bucket starts.
        assert!(should_activate(&counts(&[]), 0, &req, 8, Bucket::MidCap));
        // Minimums met except ETF, one seat left: the ETF starts.
        let c = counts(&[
            (Bucket::LargeCap, 3),
            (Bucket::MidCap, 1),
            (Bucket::SmallCap, 3),
        ]);
        assert!(should_activate(&c, 7, &req, 8, Bucket::Etf));
    }

    #[test]
    fn deficit_pick_benches_when_capacity_cannot_recover() {
        let req = BucketRequirements::default();
        // Five large caps are already active; starting a MID_CAP leaves two
        // seats for a three-seat deficit (SC 2 + ETF 1).
        let c = counts(&[(Bucket::LargeCap, 5)]);
        assert!(!should_activate(&c, 5, &req, 8, Bucket::MidCap));
    }

    #[test]
    fn surplus_pick_takes_flex_until_flex_is_full() {
        let req = BucketRequirements::default();
        // Third and fourth large caps ride the two FLEX seats.
        let c3 = counts(&[(Bucket::LargeCap, 2)]);
        assert!(should_activate(&c3, 2, &req, 8, Bucket::LargeCap));
        let c4 = counts(&[(Bucket::LargeCap, 3)]);
        assert!(should_activate(&c4, 3, &req, 8, Bucket::LargeCap));
        // The fifth has no FLEX seat left.
        let c5 = counts(&[(Bucket::LargeCap, 4)]);
        assert!(!should_activate(&c5, 4, &req, 8, Bucket::LargeCap));
    }

    #[test]
    fn surplus_pick_still_checks_remaining_capacity() {
        let req = BucketRequirements::default();
        // Surplus seat nominally free, but starting it would strand a
        // primary deficit: 2 LC + 2 SC active, a third SC wants FLEX,
        // leaving 3 seats for MC + ETF + nothing else. 3 >= 2, starts.
        let c = counts(&[(Bucket::LargeCap, 2), (Bucket::SmallCap, 2)]);
        assert!(should_activate(&c, 4, &req, 8, Bucket::SmallCap));
        // With four large caps both FLEX seats are already spent; a third
        // small cap has nowhere to sit.
        let c = counts(&[(Bucket::LargeCap, 4), (Bucket::SmallCap, 2)]);
        assert!(!should_activate(&c, 6, &req, 8, Bucket::SmallCap));
    }

    #[test]
    fn draft_sequence_fills_exactly_eight_seats() {
        let req = BucketRequirements::default();
        let picks = [
            Bucket::LargeCap,
            Bucket::LargeCap,
            Bucket::MidCap,
            Bucket::SmallCap,
            Bucket::SmallCap,
            Bucket::Etf,
            Bucket::LargeCap, // FLEX 1
            Bucket::Etf,      // FLEX 2
            Bucket::MidCap,   // lineup full
            Bucket::SmallCap, // lineup full
        ];
        let mut c: BTreeMap<Bucket, u32> = BTreeMap::new();
        let mut total = 0u32;
        let mut outcomes = Vec::new();
        for pick in picks {
            let start = should_activate(&c, total, &req, 8, pick);
            outcomes.push(start);
            if start {
                *c.entry(pick).or_insert(0) += 1;
                total += 1;
            }
        }
        assert_eq!(outcomes, vec![true, true, true, true, true, true, true, true, false, false]);
        assert_eq!(total, 8);
    }

    // -- auto_place ---------------------------------------------------------

    #[test]
    fn auto_place_persists_bucket_and_activation() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();
        let slot = db.create_slot(team.id, "AAPL", false, None).unwrap();

        let placement = auto_place(&db, &league, team.id, slot.id, Bucket::LargeCap).unwrap();
        assert!(placement.activated);
        assert_eq!(placement.bucket, Bucket::LargeCap);
        assert_eq!(placement.symbol, "AAPL");

        let stored = db.get_slot(slot.id).unwrap().unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.bucket, Some(Bucket::LargeCap));
    }

    #[test]
    fn auto_place_benches_once_the_lineup_is_full() {
        let db = test_db();
        let league = test_league(&db);
        let team = db.create_team(league.id, "Bulls", None).unwrap();

        let sequence = [
            ("AAPL", Bucket::LargeCap),
            ("MSFT", Bucket::LargeCap),
            ("UBER", Bucket::MidCap),
            ("KO", Bucket::SmallCap),
            ("PLTR", Bucket::SmallCap),
            ("VTI", Bucket::Etf),
            ("NVDA", Bucket::LargeCap),
            ("VOO", Bucket::Etf),
        ];
        for (symbol, bucket) in sequence {
            let slot = db.create_slot(team.id, symbol, false, None).unwrap();
            let placement = auto_place(&db, &league, team.id, slot.id, bucket).unwrap();
            assert!(placement.activated, "{symbol} should start");
        }

        let ninth = db.create_slot(team.id, "TSLA", false, None).unwrap();
        let placement = auto_place(&db, &league, team.id, ninth.id, Bucket::LargeCap).unwrap();
        assert!(!placement.activated);
        assert_eq!(db.list_active_slots(team.id).unwrap().len(), 8);
        // The benched slot still carries its classification.
        assert_eq!(
            db.get_slot(ninth.id).unwrap().unwrap().bucket,
            Some(Bucket::LargeCap)
        );
    }

    #[test]
    fn auto_place_rejects_missing_and_foreign_slots() {
        let db = test_db();
        let league = test_league(&db);
        let bulls = db.create_team(league.id, "Bulls", None).unwrap();
        let bears = db.create_team(league.id, "Bears", None).unwrap();
        let slot = db.create_slot(bears.id, "AAPL", false, None).unwrap();

        let missing = auto_place(&db, &league, bulls.id, 999, Bucket::LargeCap).unwrap_err();
        assert!(matches!(missing, PlacementError::SlotNotFound(999)));

        let foreign = auto_place(&db, &league, bulls.id, slot.id, Bucket::LargeCap).unwrap_err();
        assert!(matches!(foreign, PlacementError::ForeignSlot { .. }));
    }
}
