// Weekly scoring: projection and live point computation, week and season closes.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::db::Database;
use crate::model::{League, ScoringMode};
use crate::pricing;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("league {0} not found")]
    LeagueNotFound(i64),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// Result of closing one week of matches.
#[derive(Debug, Serialize)]
pub struct WeekClose {
    pub league_id: i64,
    pub week: String,
    pub mode: ScoringMode,
    pub matches_scored: usize,
    /// Team id to points for every team that played this week, including
    /// teams whose match was already closed before the call.
    pub totals: BTreeMap<i64, f64>,
}

#[derive(Debug, Serialize)]
pub struct ClosedWeek {
    pub week: String,
    pub matches_scored: usize,
}

#[derive(Debug, Serialize)]
pub struct SeasonClose {
    pub league_id: i64,
    /// Newly scored matches across all weeks; re-closes contribute zero.
    pub matches_scored: usize,
    pub closed_weeks: Vec<ClosedWeek>,
}

// ---------------------------------------------------------------------------
// Point computation
// ---------------------------------------------------------------------------

fn starter_symbols(db: &Database, team_id: i64, starters: u32) -> anyhow::Result<Vec<String>> {
    let slots = db.list_active_slots(team_id)?;
    Ok(slots
        .into_iter()
        .take(starters as usize)
        .map(|slot| slot.symbol)
        .collect())
}

/// Points for a team's starters under the league's scoring mode.
///
/// Active slots count in id order, trimmed to the league starter limit.
/// Projections sum `proj_points` with missing catalog data worth zero;
/// live mode sums each starter's percent return over the week.
pub fn team_points(
    db: &Database,
    league: &League,
    team_id: i64,
    week: &str,
) -> anyhow::Result<f64> {
    let symbols = starter_symbols(db, team_id, league.starters)?;
    let mut total = 0.0;
    for symbol in &symbols {
        total += match league.scoring_mode {
            ScoringMode::Projections => db
                .get_security(symbol)?
                .and_then(|sec| sec.proj_points)
                .unwrap_or(0.0),
            ScoringMode::Live => pricing::week_return_pct(db, symbol, week)?,
        };
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Closing
// ---------------------------------------------------------------------------

/// Close every open match in a week.
///
/// Already-scored matches are left untouched; their stored points still
/// land in the totals so the response covers the whole week. Equal points
/// leave the winner null.
pub fn close_week(db: &Database, league_id: i64, week: &str) -> Result<WeekClose, ScoringError> {
    let league = db
        .get_league(league_id)?
        .ok_or(ScoringError::LeagueNotFound(league_id))?;

    let matches = db.list_matches_for_week(league.id, week)?;
    let mut totals = BTreeMap::new();
    let mut matches_scored = 0;

    for m in &matches {
        if m.is_scored() {
            totals.insert(m.home_team_id, m.home_points.unwrap_or(0.0));
            totals.insert(m.away_team_id, m.away_points.unwrap_or(0.0));
            continue;
        }

        let home_pts = team_points(db, &league, m.home_team_id, week)?;
        let away_pts = team_points(db, &league, m.away_team_id, week)?;
        let winner = if home_pts > away_pts {
            Some(m.home_team_id)
        } else if away_pts > home_pts {
            Some(m.away_team_id)
        } else {
            None
        };
        db.record_match_result(m.id, home_pts, away_pts, winner)?;

        for (team_id, pts) in [(m.home_team_id, home_pts), (m.away_team_id, away_pts)] {
            db.upsert_team_score(league.id, team_id, week, pts)?;
            totals.insert(team_id, pts);
        }
        matches_scored += 1;
    }

    info!("closed week {week} for league {league_id}: {matches_scored} matches scored");
    Ok(WeekClose {
        league_id: league.id,
        week: week.to_string(),
        mode: league.scoring_mode,
        matches_scored,
        totals,
    })
}

/// Close every week that has matches, ascending by label.
///
/// Weeks that were fully closed before the call still show up in the
/// report, scoring zero new matches.
pub fn close_season(db: &Database, league_id: i64) -> Result<SeasonClose, ScoringError> {
    let league = db
        .get_league(league_id)?
        .ok_or(ScoringError::LeagueNotFound(league_id))?;

    let weeks = db.list_weeks(league.id)?;
    let mut closed_weeks = Vec::with_capacity(weeks.len());
    let mut matches_scored = 0;
    for week in weeks {
        let close = close_week(db, league.id, &week)?;
        matches_scored += close.matches_scored;
        closed_weeks.push(ClosedWeek {
            week,
            matches_scored: close.matches_scored,
        });
    }

    info!(
        "closed season for league {league_id}: {matches_scored} matches over {} weeks",
        closed_weeks.len()
    );
    Ok(SeasonClose {
        league_id: league.id,
        matches_scored,
        closed_weeks,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
