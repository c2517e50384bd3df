// The aggregate standings table and weekly score history.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{name_for, require_league, scored_matches, team_names, win_pct, StandingsError};
use crate::db::Database;

/// One line of the aggregate standings table.
#[derive(Debug, Clone, Serialize)]
pub struct TableRow {
    pub team_id: i64,
    pub team_name: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub games_played: u32,
    pub points_for: f64,
    pub points_against: f64,
    pub point_diff: f64,
    pub win_pct: f64,
}

/// A weekly score snapshot with the team name attached.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRow {
    pub team_id: i64,
    pub team_name: String,
    pub period: String,
    pub points: f64,
}

#[derive(Default)]
struct Record {
    wins: u32,
    losses: u32,
    ties: u32,
    games: u32,
    pf: f64,
    pa: f64,
}

/// Standings over all scored matches, best record first.
///
/// Ordered by win percentage, then point differential. A tied match
/// counts half a win for both sides. Teams without a game yet still get
/// a zeroed row.
pub fn table(db: &Database, league_id: i64) -> Result<Vec<TableRow>, StandingsError> {
    require_league(db, league_id)?;

    let teams = db.list_teams(league_id)?;
    let mut records: BTreeMap<i64, Record> =
        teams.iter().map(|t| (t.id, Record::default())).collect();

    for m in scored_matches(db, league_id)? {
        let hp = m.home_points.unwrap_or(0.0);
        let ap = m.away_points.unwrap_or(0.0);
        if let Some(home) = records.get_mut(&m.home_team_id) {
            home.games += 1;
            home.pf += hp;
            home.pa += ap;
            if hp > ap {
                home.wins += 1;
            } else if ap > hp {
                home.losses += 1;
            } else {
                home.ties += 1;
            }
        }
        if let Some(away) = records.get_mut(&m.away_team_id) {
            away.games += 1;
            away.pf += ap;
            away.pa += hp;
            if ap > hp {
                away.wins += 1;
            } else if hp > ap {
                away.losses += 1;
            } else {
                away.ties += 1;
            }
        }
    }

    let mut rows: Vec<TableRow> = teams
        .into_iter()
        .map(|t| {
            let rec = records.remove(&t.id).unwrap_or_default();
            TableRow {
                team_id: t.id,
                team_name: t.name,
                wins: rec.wins,
                losses: rec.losses,
                ties: rec.ties,
                games_played: rec.games,
                points_for: rec.pf,
                points_against: rec.pa,
                point_diff: rec.pf - rec.pa,
                win_pct: win_pct(rec.wins, rec.ties, rec.games),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.win_pct
            .total_cmp(&a.win_pct)
            .then(b.point_diff.total_cmp(&a.point_diff))
    });
    Ok(rows)
}

/// Every weekly snapshot, ordered by period then team.
pub fn history(db: &Database, league_id: i64) -> Result<Vec<ScoreRow>, StandingsError> {
    require_league(db, league_id)?;

    let names = team_names(db, league_id)?;
    let rows = db
        .list_team_scores(league_id)?
        .into_iter()
        .map(|s| ScoreRow {
            team_id: s.team_id,
            team_name: name_for(&names, s.team_id),
            period: s.period,
            points: s.points,
        })
        .collect();
    Ok(rows)
}

/// Per-team points for the most recently scored period; empty before any
/// week has closed.
pub fn latest_scores(db: &Database, league_id: i64) -> Result<Vec<ScoreRow>, StandingsError> {
    require_league(db, league_id)?;

    let Some(period) = db.latest_scored_period(league_id)? else {
        return Ok(Vec::new());
    };
    let names = team_names(db, league_id)?;
    let rows = db
        .scores_for_period(league_id, &period)?
        .into_iter()
        .map(|s| ScoreRow {
            team_id: s.team_id,
            team_name: name_for(&names, s.team_id),
            period: s.period,
            points: s.points,
        })
        .collect();
    Ok(rows)
}

/// One head-to-head cell: the row team's record against the column team.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct H2hCell {
    pub gp: u32,
    pub w: u32,
    pub l: u32,
    pub t: u32,
    pub pf: f64,
    pub pa: f64,
}

/// Matrix axis entry.
#[derive(Debug, Clone, Serialize)]
pub struct TeamRef {
    pub team_id: i64,
    pub team_name: String,
}

/// Full head-to-head grid for a league. `matrix[i][j]` holds `teams[i]`'s
/// record against `teams[j]`; the diagonal stays zeroed.
#[derive(Debug, Clone, Serialize)]
pub struct H2hMatrix {
    pub league_id: i64,
    pub teams: Vec<TeamRef>,
    pub matrix: Vec<Vec<H2hCell>>,
}

/// Head-to-head records between every pair of teams, axes in team id order.
pub fn h2h_matrix(db: &Database, league_id: i64) -> Result<H2hMatrix, StandingsError> {
    require_league(db, league_id)?;

    let teams = db.list_teams(league_id)?;
    let index: BTreeMap<i64, usize> = teams.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
    let mut matrix = vec![vec![H2hCell::default(); teams.len()]; teams.len()];

    for m in scored_matches(db, league_id)? {
        let (Some(&hi), Some(&ai)) = (index.get(&m.home_team_id), index.get(&m.away_team_id))
        else {
            continue;
        };
        if hi == ai {
            continue;
        }
        let hp = m.home_points.unwrap_or(0.0);
        let ap = m.away_points.unwrap_or(0.0);

        {
            let cell = &mut matrix[hi][ai];
            cell.gp += 1;
            cell.pf += hp;
            cell.pa += ap;
            if hp > ap {
                cell.w += 1;
            } else if ap > hp {
                cell.l += 1;
            } else {
                cell.t += 1;
            }
        }
        {
            let cell = &mut matrix[ai][hi];
            cell.gp += 1;
            cell.pf += ap;
            cell.pa += hp;
            if ap > hp {
                cell.w += 1;
            } else if hp > ap {
                cell.l += 1;
            } else {
                cell.t += 1;
            }
        }
    }

    Ok(H2hMatrix {
        league_id,
        teams: teams
            .into_iter()
            .map(|t| TeamRef {
                team_id: t.id,
                team_name: t.name,
            })
            .collect(),
        matrix,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BucketRequirements, League, RosterRules, ScoringMode};
    use std::path::Path;

    fn test_db() -> Database {
        Database::open(Path::new(":memory:")).expect("in-memory database")
    }

    fn league_with_teams(db: &Database, count: usize) -> (League, Vec<i64>) {
        let league = db
            .create_league(
                "Table League",
                RosterRules::ROSTER_SLOTS,
                RosterRules::STARTERS,
                &BucketRequirements::default(),
                ScoringMode::Projections,
            )
            .expect("create league");
        let ids = (0..count)
            .map(|i| {
                db.create_team(league.id, &format!("Team {i}"), None)
                    .expect("create team")
                    .id
            })
            .collect();
        (league, ids)
    }

    fn play(db: &Database, league_id: i64, week: &str, home: i64, away: i64, hp: f64, ap: f64) {
        let m = db.create_match(league_id, week, home, away).unwrap();
        let winner = if hp > ap {
            Some(home)
        } else if ap > hp {
            Some(away)
        } else {
            None
        };
        db.record_match_result(m.id, hp, ap, winner).unwrap();
        db.upsert_team_score(league_id, home, week, hp).unwrap();
        db.upsert_team_score(league_id, away, week, ap).unwrap();
    }

    #[test]
    fn table_orders_by_record_then_diff() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 3);
        // t0 beats t1 big, t1 beats t2 small, t2 beats t0 small.
        play(&db, league.id, "2026-W10", t[0], t[1], 30.0, 10.0);
        play(&db, league.id, "2026-W11", t[1], t[2], 12.0, 10.0);
        play(&db, league.id, "2026-W12", t[2], t[0], 11.0, 10.0);

        let rows = table(&db, league.id).unwrap();
        // Everyone is 1-1; point diff settles it: t0 +19, t2 -1, t1 -18.
        let order: Vec<i64> = rows.iter().map(|r| r.team_id).collect();
        assert_eq!(order, vec![t[0], t[2], t[1]]);
        assert_eq!(rows[0].wins, 1);
        assert_eq!(rows[0].losses, 1);
        assert_eq!(rows[0].games_played, 2);
        assert!((rows[0].point_diff - 19.0).abs() < 1e-9);
        assert!((rows[0].win_pct - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ties_count_half_a_win() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 2);
        play(&db, league.id, "2026-W10", t[0], t[1], 10.0, 10.0);

        let rows = table(&db, league.id).unwrap();
        assert_eq!(rows[0].ties, 1);
        assert!((rows[0].win_pct - 0.5).abs() < 1e-9);
        assert_eq!(rows[0].wins, 0);
    }

    #[test]
    fn teams_without_games_show_zeroed_rows() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 3);
        play(&db, league.id, "2026-W10", t[0], t[1], 12.0, 8.0);

        let rows = table(&db, league.id).unwrap();
        assert_eq!(rows.len(), 3);
        let idle = rows.iter().find(|r| r.team_id == t[2]).unwrap();
        assert_eq!(idle.games_played, 0);
        assert_eq!(idle.win_pct, 0.0);
    }

    #[test]
    fn history_orders_by_period_then_team() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 2);
        play(&db, league.id, "2026-W11", t[0], t[1], 9.0, 7.0);
        play(&db, league.id, "2026-W10", t[0], t[1], 12.0, 8.0);

        let rows = history(&db, league.id).unwrap();
        let keys: Vec<(String, i64)> = rows
            .iter()
            .map(|r| (r.period.clone(), r.team_id))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2026-W10".to_string(), t[0]),
                ("2026-W10".to_string(), t[1]),
                ("2026-W11".to_string(), t[0]),
                ("2026-W11".to_string(), t[1]),
            ]
        );
    }

    #[test]
    fn latest_scores_pick_the_newest_period() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 2);
        assert!(latest_scores(&db, league.id).unwrap().is_empty());

        play(&db, league.id, "2026-W10", t[0], t[1], 12.0, 8.0);
        play(&db, league.id, "2026-W11", t[0], t[1], 9.0, 7.0);

        let rows = latest_scores(&db, league.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.period == "2026-W11"));
    }

    #[test]
    fn h2h_matrix_mirrors_and_keeps_the_diagonal_zeroed() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 3);
        play(&db, league.id, "2026-W10", t[0], t[1], 20.0, 10.0);
        play(&db, league.id, "2026-W11", t[1], t[0], 15.0, 15.0);

        let grid = h2h_matrix(&db, league.id).unwrap();
        let axis: Vec<i64> = grid.teams.iter().map(|r| r.team_id).collect();
        assert_eq!(axis, t);

        let a = grid.matrix[0][1];
        assert_eq!((a.gp, a.w, a.l, a.t), (2, 1, 0, 1));
        assert!((a.pf - 35.0).abs() < 1e-9);
        assert!((a.pa - 25.0).abs() < 1e-9);

        let b = grid.matrix[1][0];
        assert_eq!((b.gp, b.w, b.l, b.t), (2, 0, 1, 1));
        assert!((b.pf - 25.0).abs() < 1e-9);
        assert!((b.pa - 35.0).abs() < 1e-9);

        for i in 0..3 {
            assert_eq!(grid.matrix[i][i].gp, 0);
        }
        // t2 never played; its whole row stays empty.
        assert!(grid.matrix[2].iter().all(|c| c.gp == 0));
    }

    #[test]
    fn unknown_league_is_rejected() {
        let db = test_db();
        assert!(matches!(
            table(&db, 7).unwrap_err(),
            StandingsError::LeagueNotFound(7)
        ));
    }
}
