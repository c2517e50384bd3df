// League analytics: standings tables, tiebreakers, ratings, records, awards.

pub mod awards;
pub mod insights;
pub mod ratings;
pub mod records;
pub mod table;
pub mod tiebreak;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::db::Database;
use crate::model::Match;

#[derive(Debug, Error)]
pub enum StandingsError {
    #[error("league {0} not found")]
    LeagueNotFound(i64),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Shared output shapes
// ---------------------------------------------------------------------------

/// A scored match with team names attached, as the analytics views report it.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub match_id: i64,
    pub week: String,
    pub home_team_id: i64,
    pub home_team_name: String,
    pub home_points: f64,
    pub away_team_id: i64,
    pub away_team_name: String,
    pub away_points: f64,
    pub winner_team_id: Option<i64>,
}

/// A single team-week score with its period.
#[derive(Debug, Clone, Serialize)]
pub struct ScorePeak {
    pub team_id: i64,
    pub team_name: String,
    pub period: String,
    pub points: f64,
}

#[derive(Debug, Serialize)]
pub struct HighGame {
    #[serde(flatten)]
    pub game: MatchSummary,
    pub total_points: f64,
}

#[derive(Debug, Serialize)]
pub struct MarginGame {
    #[serde(flatten)]
    pub game: MatchSummary,
    pub margin: f64,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub(crate) fn require_league(db: &Database, league_id: i64) -> Result<(), StandingsError> {
    if db.get_league(league_id)?.is_none() {
        return Err(StandingsError::LeagueNotFound(league_id));
    }
    Ok(())
}

/// Team names keyed by id.
pub(crate) fn team_names(db: &Database, league_id: i64) -> anyhow::Result<BTreeMap<i64, String>> {
    Ok(db
        .list_teams(league_id)?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect())
}

pub(crate) fn name_for(names: &BTreeMap<i64, String>, team_id: i64) -> String {
    names
        .get(&team_id)
        .cloned()
        .unwrap_or_else(|| format!("Team {team_id}"))
}

/// Scored matches in id order, the chronological record of the league.
pub(crate) fn scored_matches(db: &Database, league_id: i64) -> anyhow::Result<Vec<Match>> {
    Ok(db
        .list_matches(league_id)?
        .into_iter()
        .filter(Match::is_scored)
        .collect())
}

pub(crate) fn summarize(m: &Match, names: &BTreeMap<i64, String>) -> MatchSummary {
    MatchSummary {
        match_id: m.id,
        week: m.week.clone(),
        home_team_id: m.home_team_id,
        home_team_name: name_for(names, m.home_team_id),
        home_points: m.home_points.unwrap_or(0.0),
        away_team_id: m.away_team_id,
        away_team_name: name_for(names, m.away_team_id),
        away_points: m.away_points.unwrap_or(0.0),
        winner_team_id: m.winner_team_id,
    }
}

pub(crate) fn win_pct(wins: u32, ties: u32, games: u32) -> f64 {
    if games == 0 {
        0.0
    } else {
        (f64::from(wins) + 0.5 * f64::from(ties)) / f64::from(games)
    }
}

/// Points for and against with games played.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PfPa {
    pub pf: f64,
    pub pa: f64,
    pub games: u32,
}

pub(crate) fn pf_pa_totals(matches: &[Match]) -> BTreeMap<i64, PfPa> {
    let mut out: BTreeMap<i64, PfPa> = BTreeMap::new();
    for m in matches {
        let hp = m.home_points.unwrap_or(0.0);
        let ap = m.away_points.unwrap_or(0.0);
        let home = out.entry(m.home_team_id).or_default();
        home.pf += hp;
        home.pa += ap;
        home.games += 1;
        let away = out.entry(m.away_team_id).or_default();
        away.pf += ap;
        away.pa += hp;
        away.games += 1;
    }
    out
}

// ---------------------------------------------------------------------------
// Result timelines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameResult {
    Win,
    Loss,
    Tie,
}

impl GameResult {
    fn letter(self) -> char {
        match self {
            GameResult::Win => 'W',
            GameResult::Loss => 'L',
            GameResult::Tie => 'T',
        }
    }
}

/// Chronological W/L/T sequence per team over the scored matches.
pub(crate) fn timelines(
    matches: &[Match],
    team_ids: impl IntoIterator<Item = i64>,
) -> BTreeMap<i64, Vec<GameResult>> {
    let mut out: BTreeMap<i64, Vec<GameResult>> =
        team_ids.into_iter().map(|id| (id, Vec::new())).collect();
    for m in matches {
        let hp = m.home_points.unwrap_or(0.0);
        let ap = m.away_points.unwrap_or(0.0);
        let (home, away) = if hp > ap {
            (GameResult::Win, GameResult::Loss)
        } else if ap > hp {
            (GameResult::Loss, GameResult::Win)
        } else {
            (GameResult::Tie, GameResult::Tie)
        };
        if let Some(t) = out.get_mut(&m.home_team_id) {
            t.push(home);
        }
        if let Some(t) = out.get_mut(&m.away_team_id) {
            t.push(away);
        }
    }
    out
}

/// Current streak like "W3" or "T1"; empty before any game.
pub(crate) fn current_streak(results: &[GameResult]) -> String {
    let Some(&last) = results.last() else {
        return String::new();
    };
    let run = results.iter().rev().take_while(|&&r| r == last).count();
    format!("{}{run}", last.letter())
}

/// Record over the last five games as "W-L-T".
pub(crate) fn last_five(results: &[GameResult]) -> String {
    let chunk = &results[results.len().saturating_sub(5)..];
    let wins = chunk.iter().filter(|&&r| r == GameResult::Win).count();
    let losses = chunk.iter().filter(|&&r| r == GameResult::Loss).count();
    let ties = chunk.iter().filter(|&&r| r == GameResult::Tie).count();
    format!("{wins}-{losses}-{ties}")
}

pub(crate) fn longest_run(results: &[GameResult], counts: impl Fn(GameResult) -> bool) -> usize {
    let mut best = 0;
    let mut cur = 0;
    for &r in results {
        if counts(r) {
            cur += 1;
            best = best.max(cur);
        } else {
            cur = 0;
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Deterministic extrema
// ---------------------------------------------------------------------------

/// First element with the strictly largest key. Earlier elements win ties,
/// which keeps record holders stable as new data arrives.
pub(crate) fn first_max_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let k = key(item);
        match best {
            Some((_, bk)) if k <= bk => {}
            _ => best = Some((item, k)),
        }
    }
    best.map(|(item, _)| item)
}

/// First element with the strictly smallest key.
pub(crate) fn first_min_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let k = key(item);
        match best {
            Some((_, bk)) if k >= bk => {}
            _ => best = Some((item, k)),
        }
    }
    best.map(|(item, _)| item)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
