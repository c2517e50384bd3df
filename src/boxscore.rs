// Box score: starter-role breakdown of a team's active slots for one period.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::db::Database;
use crate::model::{Bucket, BucketRequirements};

#[derive(Debug, Error)]
pub enum BoxScoreError {
    #[error("league {0} not found")]
    LeagueNotFound(i64),
    #[error("team {team_id} not found in league {league_id}")]
    TeamNotFound { team_id: i64, league_id: i64 },
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// One active slot with its projection points attached.
#[derive(Debug, Clone, Serialize)]
pub struct SlotLine {
    pub slot_id: i64,
    pub symbol: String,
    pub bucket: Option<Bucket>,
    pub points: f64,
}

/// Point totals, rounded to four decimals.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BoxScoreTotals {
    pub primary_points: f64,
    pub flex_points: f64,
    pub grand_total: f64,
}

/// Starter-role breakdown for one team and period. Primaries are filled
/// best-first up to each bucket's requirement, FLEX takes the best of what
/// is left, and everything else is listed unused.
#[derive(Debug, Serialize)]
pub struct BoxScore {
    pub league_id: i64,
    pub team_id: i64,
    pub team_name: String,
    pub week: String,
    pub requirements: BucketRequirements,
    pub primary: BTreeMap<Bucket, Vec<SlotLine>>,
    pub flex: Vec<SlotLine>,
    pub unused_active: Vec<SlotLine>,
    pub totals: BoxScoreTotals,
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

// Best points first; equal points fall back to slot id so the breakdown is
// stable across runs.
fn best_first(lines: &mut [SlotLine]) {
    lines.sort_by(|a, b| b.points.total_cmp(&a.points).then(a.slot_id.cmp(&b.slot_id)));
}

/// Break a team's active slots into primary, FLEX, and unused groups.
///
/// The breakdown always reads catalog projections, even for live-scored
/// leagues; missing catalog data is worth zero. Slots without a resolved
/// bucket can fill no role and land directly in the unused group.
pub fn team_box_score(
    db: &Database,
    league_id: i64,
    team_id: i64,
    week: &str,
) -> Result<BoxScore, BoxScoreError> {
    let league = db
        .get_league(league_id)?
        .ok_or(BoxScoreError::LeagueNotFound(league_id))?;
    let team = db
        .get_team(team_id)?
        .filter(|t| t.league_id == league_id)
        .ok_or(BoxScoreError::TeamNotFound { team_id, league_id })?;

    let mut by_bucket: BTreeMap<Bucket, Vec<SlotLine>> = BTreeMap::new();
    let mut unresolved = Vec::new();
    for slot in db.list_active_slots(team_id)? {
        let points = db
            .get_security(&slot.symbol)?
            .and_then(|sec| sec.proj_points)
            .unwrap_or(0.0);
        let line = SlotLine {
            slot_id: slot.id,
            symbol: slot.symbol,
            bucket: slot.bucket,
            points,
        };
        match line.bucket {
            Some(bucket) => by_bucket.entry(bucket).or_default().push(line),
            None => unresolved.push(line),
        }
    }

    let requirements = league.bucket_requirements;
    let mut primary: BTreeMap<Bucket, Vec<SlotLine>> = BTreeMap::new();
    let mut leftovers: Vec<SlotLine> = Vec::new();
    for (bucket, need) in requirements.primaries() {
        let mut candidates = by_bucket.remove(&bucket).unwrap_or_default();
        best_first(&mut candidates);
        let rest = candidates.split_off((need as usize).min(candidates.len()));
        primary.insert(bucket, candidates);
        leftovers.extend(rest);
    }

    best_first(&mut leftovers);
    let flex_seats = (requirements.flex as usize).min(leftovers.len());
    let overflow = leftovers.split_off(flex_seats);
    let flex = leftovers;

    let mut unused_active = overflow;
    unused_active.extend(unresolved);
    unused_active.sort_by_key(|line| line.slot_id);

    let primary_points: f64 = primary.values().flatten().map(|l| l.points).sum();
    let flex_points: f64 = flex.iter().map(|l| l.points).sum();
    let totals = BoxScoreTotals {
        primary_points: round4(primary_points),
        flex_points: round4(flex_points),
        grand_total: round4(primary_points + flex_points),
    };

    Ok(BoxScore {
        league_id,
        team_id,
        team_name: team.name,
        week: week.to_string(),
        requirements,
        primary,
        flex,
        unused_active,
        totals,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
