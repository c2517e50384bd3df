// Composite insight report: rankings, schedule strength, streaks, highlights.

use serde::Serialize;

use super::ratings::{pythagorean, sos_map};
use super::{
    current_streak, first_max_by, first_min_by, last_five, name_for, pf_pa_totals, require_league,
    scored_matches, team_names, timelines, ScorePeak, StandingsError,
};
use crate::db::Database;

/// Power-ranking line with its 1-based rank.
#[derive(Debug, Serialize)]
pub struct PrRankRow {
    pub team_id: i64,
    pub team_name: String,
    pub pf: f64,
    pub pa: f64,
    pub pr: f64,
    pub rank: usize,
}

/// Strength-of-schedule line with its 1-based rank.
#[derive(Debug, Serialize)]
pub struct SosRankRow {
    pub team_id: i64,
    pub team_name: String,
    pub sos: f64,
    pub rank: usize,
}

#[derive(Debug, Serialize)]
pub struct StreakRow {
    pub team_id: i64,
    pub team_name: String,
    pub streak: String,
    pub last5: String,
}

/// The most lopsided game. Unlike match rows, the winner label here is
/// never null: a tied blowout (margin zero) credits the home side.
#[derive(Debug, Serialize)]
pub struct BlowoutHighlight {
    pub match_id: i64,
    pub week: String,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_points: f64,
    pub away_points: f64,
    pub margin: f64,
    pub winner_team_id: i64,
}

#[derive(Debug, Serialize)]
pub struct Highlights {
    pub best_week: Option<ScorePeak>,
    pub worst_week: Option<ScorePeak>,
    pub biggest_blowout: Option<BlowoutHighlight>,
}

#[derive(Debug, Serialize)]
pub struct LeagueInsights {
    pub league_id: i64,
    pub power: Vec<PrRankRow>,
    pub sos: Vec<SosRankRow>,
    pub streaks: Vec<StreakRow>,
    pub highs: Highlights,
}

/// One-call season narrative: ranked power and schedule-strength lists,
/// per-team streaks, and the single-week and single-game highlights.
pub fn league_insights(db: &Database, league_id: i64) -> Result<LeagueInsights, StandingsError> {
    require_league(db, league_id)?;

    let names = team_names(db, league_id)?;
    let matches = scored_matches(db, league_id)?;
    let totals = pf_pa_totals(&matches);

    let mut power: Vec<PrRankRow> = names
        .iter()
        .map(|(&id, name)| {
            let rec = totals.get(&id).copied().unwrap_or_default();
            PrRankRow {
                team_id: id,
                team_name: name.clone(),
                pf: rec.pf,
                pa: rec.pa,
                pr: pythagorean(rec.pf, rec.pa),
                rank: 0,
            }
        })
        .collect();
    power.sort_by(|a, b| b.pr.total_cmp(&a.pr));
    for (i, row) in power.iter_mut().enumerate() {
        row.rank = i + 1;
    }

    let sos_by_team = sos_map(&matches, &totals);
    let mut sos: Vec<SosRankRow> = names
        .iter()
        .map(|(&id, name)| SosRankRow {
            team_id: id,
            team_name: name.clone(),
            sos: sos_by_team.get(&id).copied().unwrap_or(0.0),
            rank: 0,
        })
        .collect();
    sos.sort_by(|a, b| b.sos.total_cmp(&a.sos));
    for (i, row) in sos.iter_mut().enumerate() {
        row.rank = i + 1;
    }

    let lines = timelines(&matches, names.keys().copied());
    let streaks: Vec<StreakRow> = names
        .iter()
        .map(|(&id, name)| {
            let line = lines.get(&id).map(Vec::as_slice).unwrap_or(&[]);
            StreakRow {
                team_id: id,
                team_name: name.clone(),
                streak: current_streak(line),
                last5: last_five(line),
            }
        })
        .collect();

    let scores = db.list_team_scores(league_id)?;
    let peak = |s: &crate::model::TeamScore| ScorePeak {
        team_id: s.team_id,
        team_name: name_for(&names, s.team_id),
        period: s.period.clone(),
        points: s.points,
    };
    let best_week = first_max_by(&scores, |s| s.points).map(peak);
    let worst_week = first_min_by(&scores, |s| s.points).map(peak);

    let biggest_blowout = first_max_by(&matches, |m| {
        (m.home_points.unwrap_or(0.0) - m.away_points.unwrap_or(0.0)).abs()
    })
    .map(|m| {
        let hp = m.home_points.unwrap_or(0.0);
        let ap = m.away_points.unwrap_or(0.0);
        let winner = m.winner_team_id.unwrap_or(if hp >= ap {
            m.home_team_id
        } else {
            m.away_team_id
        });
        BlowoutHighlight {
            match_id: m.id,
            week: m.week.clone(),
            home_team_id: m.home_team_id,
            away_team_id: m.away_team_id,
            home_points: hp,
            away_points: ap,
            margin: (hp - ap).abs(),
            winner_team_id: winner,
        }
    });

    Ok(LeagueInsights {
        league_id,
        power,
        sos,
        streaks,
        highs: Highlights {
            best_week,
            worst_week,
            biggest_blowout,
        },
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
