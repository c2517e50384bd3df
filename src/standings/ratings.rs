// Ratings: Pythagorean power rankings, strength of schedule, and Elo.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{
    current_streak, last_five, pf_pa_totals, require_league, scored_matches, team_names,
    timelines, PfPa, StandingsError,
};
use crate::db::Database;
use crate::model::Match;

pub const DEFAULT_ELO_K: f64 = 32.0;
const ELO_BASE: f64 = 1500.0;

#[derive(Debug, Serialize)]
pub struct PowerRow {
    pub team_id: i64,
    pub team_name: String,
    pub pf: f64,
    pub pa: f64,
    pub pr: f64,
    pub sos: f64,
    pub streak: String,
    pub last5: String,
}

#[derive(Debug, Serialize)]
pub struct EloRow {
    pub team_id: i64,
    pub team_name: String,
    pub elo: f64,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub games_played: u32,
}

/// Pythagorean expectation pf^2 / (pf^2 + pa^2); an even 0.5 before any
/// points exist.
pub(crate) fn pythagorean(pf: f64, pa: f64) -> f64 {
    if pf <= 0.0 && pa <= 0.0 {
        return 0.5;
    }
    (pf * pf) / (pf * pf + pa * pa)
}

/// Strength of schedule: the average of opponents' season points-for per
/// game, over the games a team has played.
pub(crate) fn sos_map(matches: &[Match], totals: &BTreeMap<i64, PfPa>) -> BTreeMap<i64, f64> {
    let pf_per_game: BTreeMap<i64, f64> = totals
        .iter()
        .map(|(&id, rec)| (id, rec.pf / f64::from(rec.games.max(1))))
        .collect();

    let mut sums: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for m in matches {
        let home = sums.entry(m.home_team_id).or_default();
        home.0 += pf_per_game.get(&m.away_team_id).copied().unwrap_or(0.0);
        home.1 += 1;
        let away = sums.entry(m.away_team_id).or_default();
        away.0 += pf_per_game.get(&m.home_team_id).copied().unwrap_or(0.0);
        away.1 += 1;
    }

    sums.into_iter()
        .map(|(id, (sum, games))| {
            let sos = if games > 0 { sum / f64::from(games) } else { 0.0 };
            (id, sos)
        })
        .collect()
}

/// Power rankings by Pythagorean expectation, with schedule strength and
/// streak context. Nothing is persisted.
pub fn power_rankings(db: &Database, league_id: i64) -> Result<Vec<PowerRow>, StandingsError> {
    require_league(db, league_id)?;

    let names = team_names(db, league_id)?;
    let matches = scored_matches(db, league_id)?;
    let totals = pf_pa_totals(&matches);
    let sos = sos_map(&matches, &totals);
    let lines = timelines(&matches, names.keys().copied());

    let mut rows: Vec<PowerRow> = names
        .iter()
        .map(|(&team_id, team_name)| {
            let rec = totals.get(&team_id).copied().unwrap_or_default();
            let results = lines.get(&team_id).map(Vec::as_slice).unwrap_or(&[]);
            PowerRow {
                team_id,
                team_name: team_name.clone(),
                pf: rec.pf,
                pa: rec.pa,
                pr: pythagorean(rec.pf, rec.pa),
                sos: sos.get(&team_id).copied().unwrap_or(0.0),
                streak: current_streak(results),
                last5: last_five(results),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.pr.total_cmp(&a.pr));
    Ok(rows)
}

fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

#[derive(Default, Clone, Copy)]
struct EloRecord {
    wins: u32,
    losses: u32,
    ties: u32,
    games: u32,
}

/// Elo ratings replayed over scored matches in id order. Everyone starts
/// at 1500; a tie scores half for both sides. Nothing is persisted.
pub fn elo(db: &Database, league_id: i64, k: f64) -> Result<Vec<EloRow>, StandingsError> {
    require_league(db, league_id)?;

    let names = team_names(db, league_id)?;
    let mut rating: BTreeMap<i64, f64> = names.keys().map(|&id| (id, ELO_BASE)).collect();
    let mut records: BTreeMap<i64, EloRecord> =
        names.keys().map(|&id| (id, EloRecord::default())).collect();

    for m in scored_matches(db, league_id)? {
        let Some((&home_rating, &away_rating)) = rating
            .get(&m.home_team_id)
            .zip(rating.get(&m.away_team_id))
        else {
            continue;
        };
        let hp = m.home_points.unwrap_or(0.0);
        let ap = m.away_points.unwrap_or(0.0);
        let (home_score, away_score) = if hp > ap {
            (1.0, 0.0)
        } else if ap > hp {
            (0.0, 1.0)
        } else {
            (0.5, 0.5)
        };

        for (team_id, won, lost) in [
            (m.home_team_id, hp > ap, ap > hp),
            (m.away_team_id, ap > hp, hp > ap),
        ] {
            if let Some(rec) = records.get_mut(&team_id) {
                rec.games += 1;
                if won {
                    rec.wins += 1;
                } else if lost {
                    rec.losses += 1;
                } else {
                    rec.ties += 1;
                }
            }
        }

        if let Some(r) = rating.get_mut(&m.home_team_id) {
            *r = home_rating + k * (home_score - expected_score(home_rating, away_rating));
        }
        if let Some(r) = rating.get_mut(&m.away_team_id) {
            *r = away_rating + k * (away_score - expected_score(away_rating, home_rating));
        }
    }

    let mut rows: Vec<EloRow> = names
        .iter()
        .map(|(&team_id, team_name)| {
            let rec = records.get(&team_id).copied().unwrap_or_default();
            EloRow {
                team_id,
                team_name: team_name.clone(),
                elo: rating.get(&team_id).copied().unwrap_or(ELO_BASE),
                wins: rec.wins,
                losses: rec.losses,
                ties: rec.ties,
                games_played: rec.games,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.elo.total_cmp(&a.elo));
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
