// Playoffs: seeded bracket generation and the idempotent season advance loop.

use std::collections::BTreeMap;

use anyhow::bail;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::db::Database;
use crate::model::Match;
use crate::periods::{
    base_week, current_week_label, FINAL_SUFFIX, SEMIFINAL_SUFFIX, THIRD_PLACE_SUFFIX,
};
use crate::scoring::{self, ScoringError};
use crate::standings::tiebreak;
use crate::standings::{name_for, team_names, StandingsError};

/// Bracket size. Seeds below this line miss the postseason.
pub const PLAYOFF_TEAMS: usize = 4;

#[derive(Debug, Error)]
pub enum SeasonError {
    #[error("league {0} not found")]
    LeagueNotFound(i64),
    #[error("playoffs need {need} teams, league has {have}")]
    NotEnoughTeams { have: usize, need: usize },
    #[error("semifinals are not decided yet")]
    SemisNotDecided,
    #[error(transparent)]
    Standings(#[from] StandingsError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// Season phase, derived on every query from which playoff matches exist
/// and whether they are scored. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonState {
    Regular,
    Semis,
    Finals,
    Complete,
}

/// A playoff game with team names attached; points stay null until scored.
#[derive(Debug, Clone, Serialize)]
pub struct PlayoffMatch {
    pub match_id: i64,
    pub week: String,
    pub home_team_id: i64,
    pub home_team_name: String,
    pub away_team_id: i64,
    pub away_team_name: String,
    pub home_points: Option<f64>,
    pub away_points: Option<f64>,
    pub winner_team_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Champion {
    pub team_id: i64,
    pub team_name: String,
}

#[derive(Debug, Serialize)]
pub struct Semifinals {
    pub league_id: i64,
    pub week: String,
    pub matches: Vec<PlayoffMatch>,
    pub state: SeasonState,
}

#[derive(Debug, Serialize)]
pub struct FinalsAndBronze {
    pub league_id: i64,
    pub finals_week: String,
    #[serde(rename = "final")]
    pub final_match: PlayoffMatch,
    pub bronze_week: String,
    pub bronze: PlayoffMatch,
    pub state: SeasonState,
}

/// Everything known about the postseason in one shape.
#[derive(Debug, Serialize)]
pub struct Bracket {
    pub league_id: i64,
    pub state: SeasonState,
    pub seeds: Vec<i64>,
    pub semifinals_week: Option<String>,
    pub semifinals: Vec<PlayoffMatch>,
    pub bronze_week: Option<String>,
    pub bronze: Option<PlayoffMatch>,
    pub finals_week: Option<String>,
    #[serde(rename = "final")]
    pub final_match: Option<PlayoffMatch>,
    pub champion: Option<Champion>,
}

/// One step of the season loop; exactly one action happens per call.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Idle {
        state: SeasonState,
    },
    ScoredWeek {
        week: String,
        matches_scored: usize,
        state: SeasonState,
    },
    GeneratedSemifinals {
        week: String,
        matches: Vec<PlayoffMatch>,
        state: SeasonState,
    },
    GeneratedFinals {
        finals_week: String,
        #[serde(rename = "final")]
        final_match: PlayoffMatch,
        bronze_week: String,
        bronze: PlayoffMatch,
        state: SeasonState,
    },
    SemisPending {
        state: SeasonState,
    },
    FinalPending {
        week: String,
        #[serde(rename = "final")]
        final_match: PlayoffMatch,
        state: SeasonState,
    },
    SeasonComplete {
        champion: Champion,
        state: SeasonState,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn require_league(db: &Database, league_id: i64) -> Result<(), SeasonError> {
    if db.get_league(league_id)?.is_none() {
        return Err(SeasonError::LeagueNotFound(league_id));
    }
    Ok(())
}

fn describe(m: &Match, names: &BTreeMap<i64, String>) -> PlayoffMatch {
    PlayoffMatch {
        match_id: m.id,
        week: m.week.clone(),
        home_team_id: m.home_team_id,
        home_team_name: name_for(names, m.home_team_id),
        away_team_id: m.away_team_id,
        away_team_name: name_for(names, m.away_team_id),
        home_points: m.home_points,
        away_points: m.away_points,
        winner_team_id: m.winner_team_id,
    }
}

/// Earliest week carrying the given playoff suffix, if the round exists.
fn playoff_week(db: &Database, league_id: i64, suffix: &str) -> anyhow::Result<Option<String>> {
    Ok(db
        .list_weeks_with_suffix(league_id, suffix)?
        .into_iter()
        .next())
}

/// The match of a one-game round. More than one is corrupt data.
fn single_match(db: &Database, league_id: i64, week: &str) -> anyhow::Result<Match> {
    let mut matches = db.list_matches_for_week(league_id, week)?;
    if matches.len() != 1 {
        bail!(
            "week {week} should hold exactly one match, found {}",
            matches.len()
        );
    }
    Ok(matches.remove(0))
}

/// Winner and loser of a scored match. An explicit winner settles it; a tie
/// goes to the home side, which is always the better seed in our brackets.
fn winner_loser(m: &Match) -> (i64, i64) {
    if let Some(winner) = m.winner_team_id {
        let loser = if winner == m.home_team_id {
            m.away_team_id
        } else {
            m.home_team_id
        };
        return (winner, loser);
    }
    let hp = m.home_points.unwrap_or(0.0);
    let ap = m.away_points.unwrap_or(0.0);
    if ap > hp {
        (m.away_team_id, m.home_team_id)
    } else {
        (m.home_team_id, m.away_team_id)
    }
}

struct DecidedSemis {
    week: String,
    winners: Vec<i64>,
    losers: Vec<i64>,
}

/// Winners and losers of the semifinal round, or `None` while the round is
/// missing or not fully scored.
fn decided_semis(db: &Database, league_id: i64) -> anyhow::Result<Option<DecidedSemis>> {
    let Some(week) = playoff_week(db, league_id, SEMIFINAL_SUFFIX)? else {
        return Ok(None);
    };
    let semis = db.list_matches_for_week(league_id, &week)?;
    if semis.len() != 2 {
        bail!(
            "semifinal week {week} should hold exactly two matches, found {}",
            semis.len()
        );
    }
    if !semis.iter().all(Match::is_scored) {
        return Ok(None);
    }
    let mut winners = Vec::with_capacity(2);
    let mut losers = Vec::with_capacity(2);
    for m in &semis {
        let (winner, loser) = winner_loser(m);
        winners.push(winner);
        losers.push(loser);
    }
    Ok(Some(DecidedSemis {
        week,
        winners,
        losers,
    }))
}

fn seed_ranks(seeds: &[i64]) -> BTreeMap<i64, usize> {
    seeds.iter().enumerate().map(|(i, &id)| (id, i)).collect()
}

/// Order a pair so the better seed comes first (and hosts).
fn better_seeded(ranks: &BTreeMap<i64, usize>, a: i64, b: i64) -> (i64, i64) {
    let rank = |id: i64| ranks.get(&id).copied().unwrap_or(usize::MAX);
    if rank(b) < rank(a) {
        (b, a)
    } else {
        (a, b)
    }
}

/// Champion from a scored final: the explicit winner, else the better seed.
fn champion_of(m: &Match, ranks: &BTreeMap<i64, usize>, names: &BTreeMap<i64, String>) -> Champion {
    let team_id = m.winner_team_id.unwrap_or_else(|| {
        let (better, _) = better_seeded(ranks, m.home_team_id, m.away_team_id);
        better
    });
    Champion {
        team_id,
        team_name: name_for(names, team_id),
    }
}

fn derive_state(db: &Database, league_id: i64) -> anyhow::Result<SeasonState> {
    if let Some(week) = playoff_week(db, league_id, FINAL_SUFFIX)? {
        let finals = db.list_matches_for_week(league_id, &week)?;
        if !finals.is_empty() && finals.iter().all(Match::is_scored) {
            return Ok(SeasonState::Complete);
        }
        return Ok(SeasonState::Finals);
    }
    if playoff_week(db, league_id, SEMIFINAL_SUFFIX)?.is_some() {
        return Ok(SeasonState::Semis);
    }
    Ok(SeasonState::Regular)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Current season phase.
pub fn current_state(db: &Database, league_id: i64) -> Result<SeasonState, SeasonError> {
    require_league(db, league_id)?;
    Ok(derive_state(db, league_id)?)
}

/// Create the two semifinal matches from the top four seeds, exactly once.
///
/// Seed 1 hosts seed 4 and seed 2 hosts seed 3 in week
/// `<current>-PO-SF`. If a semifinal week already exists its matches come
/// back unchanged, whatever the standings say now.
pub fn generate_semifinals(db: &Database, league_id: i64) -> Result<Semifinals, SeasonError> {
    require_league(db, league_id)?;
    let names = team_names(db, league_id)?;

    if let Some(week) = playoff_week(db, league_id, SEMIFINAL_SUFFIX)? {
        let matches = db.list_matches_for_week(league_id, &week)?;
        return Ok(Semifinals {
            league_id,
            matches: matches.iter().map(|m| describe(m, &names)).collect(),
            week,
            state: derive_state(db, league_id)?,
        });
    }

    let seeds = tiebreak::seed_order(db, league_id)?;
    if seeds.len() < PLAYOFF_TEAMS {
        return Err(SeasonError::NotEnoughTeams {
            have: seeds.len(),
            need: PLAYOFF_TEAMS,
        });
    }

    let week = format!("{}{SEMIFINAL_SUFFIX}", current_week_label());
    let pairings = [(seeds[0], seeds[3]), (seeds[1], seeds[2])];
    let mut matches = Vec::with_capacity(pairings.len());
    for (home, away) in pairings {
        let m = db.create_match(league_id, &week, home, away)?;
        matches.push(describe(&m, &names));
    }
    info!("created semifinals for league {league_id} in {week}");
    Ok(Semifinals {
        league_id,
        week,
        matches,
        state: derive_state(db, league_id)?,
    })
}

// Return the round's existing match or create it, never both.
fn ensure_single(
    db: &Database,
    league_id: i64,
    week: &str,
    home: i64,
    away: i64,
) -> anyhow::Result<Match> {
    let mut existing = db.list_matches_for_week(league_id, week)?;
    match existing.len() {
        0 => Ok(db.create_match(league_id, week, home, away)?),
        1 => Ok(existing.remove(0)),
        n => bail!("week {week} should hold exactly one match, found {n}"),
    }
}

/// Create the final and the third-place game from decided semifinals.
///
/// The better-seeded semifinal winner hosts the final; the better-seeded
/// loser hosts the bronze. Each game is existence-checked separately, so a
/// partially created round heals on the next call.
pub fn generate_finals_and_bronze(
    db: &Database,
    league_id: i64,
) -> Result<FinalsAndBronze, SeasonError> {
    require_league(db, league_id)?;
    let names = team_names(db, league_id)?;

    let Some(semis) = decided_semis(db, league_id)? else {
        return Err(SeasonError::SemisNotDecided);
    };
    let ranks = seed_ranks(&tiebreak::seed_order(db, league_id)?);
    let base = base_week(&semis.week).to_string();

    let finals_week = format!("{base}{FINAL_SUFFIX}");
    let (home, away) = better_seeded(&ranks, semis.winners[0], semis.winners[1]);
    let final_row = ensure_single(db, league_id, &finals_week, home, away)?;

    let bronze_week = format!("{base}{THIRD_PLACE_SUFFIX}");
    let (home, away) = better_seeded(&ranks, semis.losers[0], semis.losers[1]);
    let bronze_row = ensure_single(db, league_id, &bronze_week, home, away)?;

    info!("finals round ready for league {league_id}: {finals_week} and {bronze_week}");
    Ok(FinalsAndBronze {
        league_id,
        finals_week,
        final_match: describe(&final_row, &names),
        bronze_week,
        bronze: describe(&bronze_row, &names),
        state: derive_state(db, league_id)?,
    })
}

/// Full bracket view: seeds, every playoff game, and the champion once the
/// final is in the books.
pub fn bracket(db: &Database, league_id: i64) -> Result<Bracket, SeasonError> {
    require_league(db, league_id)?;
    let names = team_names(db, league_id)?;
    let seeds = tiebreak::seed_order(db, league_id)?;
    let ranks = seed_ranks(&seeds);

    let semifinals_week = playoff_week(db, league_id, SEMIFINAL_SUFFIX)?;
    let semifinals = match &semifinals_week {
        Some(week) => db
            .list_matches_for_week(league_id, week)?
            .iter()
            .map(|m| describe(m, &names))
            .collect(),
        None => Vec::new(),
    };

    let bronze_week = playoff_week(db, league_id, THIRD_PLACE_SUFFIX)?;
    let bronze = match &bronze_week {
        Some(week) => db
            .list_matches_for_week(league_id, week)?
            .first()
            .map(|m| describe(m, &names)),
        None => None,
    };

    let finals_week = playoff_week(db, league_id, FINAL_SUFFIX)?;
    let final_row = match &finals_week {
        Some(week) => db.list_matches_for_week(league_id, week)?.into_iter().next(),
        None => None,
    };
    let champion = final_row
        .as_ref()
        .filter(|m| m.is_scored())
        .map(|m| champion_of(m, &ranks, &names));
    let final_match = final_row.as_ref().map(|m| describe(m, &names));

    Ok(Bracket {
        league_id,
        state: derive_state(db, league_id)?,
        seeds,
        semifinals_week,
        semifinals,
        bronze_week,
        bronze,
        finals_week,
        final_match,
        champion,
    })
}

/// Drive the season forward by exactly one step.
///
/// In order: close the earliest week with an open match, then create the
/// semifinals, then the finals round, then report the champion. A loop of
/// advances therefore walks a league from its first unscored week all the
/// way to a completed season, and calling it after completion keeps
/// reporting the champion.
pub fn advance(db: &Database, league_id: i64) -> Result<AdvanceOutcome, SeasonError> {
    require_league(db, league_id)?;
    let names = team_names(db, league_id)?;

    if db.list_weeks(league_id)?.is_empty() {
        return Ok(AdvanceOutcome::Idle {
            state: derive_state(db, league_id)?,
        });
    }

    if let Some(week) = db.list_unscored_weeks(league_id)?.into_iter().next() {
        let close = scoring::close_week(db, league_id, &week)?;
        return Ok(AdvanceOutcome::ScoredWeek {
            week,
            matches_scored: close.matches_scored,
            state: derive_state(db, league_id)?,
        });
    }

    if playoff_week(db, league_id, SEMIFINAL_SUFFIX)?.is_none() {
        let semis = generate_semifinals(db, league_id)?;
        return Ok(AdvanceOutcome::GeneratedSemifinals {
            week: semis.week,
            matches: semis.matches,
            state: semis.state,
        });
    }

    let finals_week = match (
        playoff_week(db, league_id, FINAL_SUFFIX)?,
        playoff_week(db, league_id, THIRD_PLACE_SUFFIX)?,
    ) {
        (Some(finals), Some(_bronze)) => finals,
        _ => {
            if decided_semis(db, league_id)?.is_none() {
                return Ok(AdvanceOutcome::SemisPending {
                    state: derive_state(db, league_id)?,
                });
            }
            let round = generate_finals_and_bronze(db, league_id)?;
            return Ok(AdvanceOutcome::GeneratedFinals {
                finals_week: round.finals_week,
                final_match: round.final_match,
                bronze_week: round.bronze_week,
                bronze: round.bronze,
                state: round.state,
            });
        }
    };

    let final_row = single_match(db, league_id, &finals_week)?;
    if !final_row.is_scored() {
        return Ok(AdvanceOutcome::FinalPending {
            week: finals_week,
            final_match: describe(&final_row, &names),
            state: derive_state(db, league_id)?,
        });
    }

    let ranks = seed_ranks(&tiebreak::seed_order(db, league_id)?);
    Ok(AdvanceOutcome::SeasonComplete {
        champion: champion_of(&final_row, &ranks, &names),
        state: derive_state(db, league_id)?,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
