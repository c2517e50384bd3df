// The league record book: single-week highs, blowouts, and streaks.

use serde::Serialize;

use super::{
    current_streak, first_max_by, first_min_by, longest_run, name_for, require_league,
    scored_matches, summarize, team_names, timelines, GameResult, HighGame, MarginGame,
    ScorePeak, StandingsError,
};
use crate::db::Database;
use crate::model::Match;

#[derive(Debug, Serialize)]
pub struct StreakRecord {
    pub team_id: i64,
    pub team_name: String,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct CurrentStreak {
    pub team_id: i64,
    pub team_name: String,
    pub streak: String,
}

#[derive(Debug, Serialize)]
pub struct LeagueRecords {
    pub league_id: i64,
    pub team_week_high: Option<ScorePeak>,
    pub game_total_high: Option<HighGame>,
    pub blowout_high: Option<MarginGame>,
    pub narrowest_win: Option<MarginGame>,
    pub longest_win_streak: Option<StreakRecord>,
    pub longest_unbeaten_streak: Option<StreakRecord>,
    pub current: Vec<CurrentStreak>,
}

fn game_total(m: &Match) -> f64 {
    m.home_points.unwrap_or(0.0) + m.away_points.unwrap_or(0.0)
}

fn game_margin(m: &Match) -> f64 {
    (m.home_points.unwrap_or(0.0) - m.away_points.unwrap_or(0.0)).abs()
}

/// The record book, derived from scored matches and weekly snapshots.
///
/// The narrowest win needs a real margin, so ties never hold it. The
/// unbeaten streak lets ties through; the win streak does not. Earlier
/// games keep a record when a later one merely equals it.
pub fn league_records(db: &Database, league_id: i64) -> Result<LeagueRecords, StandingsError> {
    require_league(db, league_id)?;

    let names = team_names(db, league_id)?;
    let matches = scored_matches(db, league_id)?;
    let scores = db.list_team_scores(league_id)?;

    let team_week_high = first_max_by(&scores, |s| s.points).map(|best| ScorePeak {
        team_id: best.team_id,
        team_name: name_for(&names, best.team_id),
        period: best.period.clone(),
        points: best.points,
    });

    let game_total_high = first_max_by(&matches, game_total).map(|m| HighGame {
        game: summarize(m, &names),
        total_points: game_total(m),
    });
    let blowout_high = first_max_by(&matches, game_margin).map(|m| MarginGame {
        game: summarize(m, &names),
        margin: game_margin(m),
    });

    let decisive: Vec<&Match> = matches.iter().filter(|m| game_margin(m) != 0.0).collect();
    let narrowest_win = first_min_by(&decisive, |m| game_margin(m)).map(|&m| MarginGame {
        game: summarize(m, &names),
        margin: game_margin(m),
    });

    let mut longest_win_streak: Option<StreakRecord> = None;
    let mut longest_unbeaten_streak: Option<StreakRecord> = None;
    let mut current = Vec::new();
    if !matches.is_empty() {
        let lines = timelines(&matches, names.keys().copied());
        for (&team_id, results) in &lines {
            let wins = longest_run(results, |r| r == GameResult::Win);
            let unbeaten = longest_run(results, |r| r != GameResult::Loss);
            if wins > longest_win_streak.as_ref().map_or(0, |s| s.length) {
                longest_win_streak = Some(StreakRecord {
                    team_id,
                    team_name: name_for(&names, team_id),
                    length: wins,
                });
            }
            if unbeaten > longest_unbeaten_streak.as_ref().map_or(0, |s| s.length) {
                longest_unbeaten_streak = Some(StreakRecord {
                    team_id,
                    team_name: name_for(&names, team_id),
                    length: unbeaten,
                });
            }
            current.push(CurrentStreak {
                team_id,
                team_name: name_for(&names, team_id),
                streak: current_streak(results),
            });
        }
    }

    Ok(LeagueRecords {
        league_id,
        team_week_high,
        game_total_high,
        blowout_high,
        narrowest_win,
        longest_win_streak,
        longest_unbeaten_streak,
        current,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
