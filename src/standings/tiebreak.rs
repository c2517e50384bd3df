// Tiebreakers: deterministic ordering for teams with identical records.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sha1::{Digest, Sha1};

use super::table::table;
use super::{require_league, scored_matches, win_pct, StandingsError};
use crate::db::Database;

/// One team's resolved position with the metrics that decided it.
#[derive(Debug, Serialize)]
pub struct TiebreakRow {
    pub team_id: i64,
    pub team_name: String,
    pub win_pct: f64,
    pub h2h_win_pct: f64,
    pub point_diff: f64,
    pub points_for: f64,
    pub coin: f64,
    /// First key separating this team from the one ranked below it; the
    /// last row has nothing left to separate.
    pub reason: Option<&'static str>,
}

/// Stable coin flip in [0, 1) derived from the league and team ids, so
/// repeated runs and restarts order dead-even teams the same way.
pub(crate) fn deterministic_coin(league_id: i64, team_id: i64) -> f64 {
    let digest = Sha1::digest(format!("{league_id}:{team_id}").as_bytes());
    let shard = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    f64::from(shard) / f64::from(u32::MAX)
}

#[derive(Default)]
struct HeadToHead {
    wins: u32,
    losses: u32,
    ties: u32,
}

/// Win percentage restricted to games where both sides are in `group`.
fn h2h_win_pct(
    db: &Database,
    league_id: i64,
    group: &BTreeSet<i64>,
) -> anyhow::Result<BTreeMap<i64, f64>> {
    let mut stats: BTreeMap<i64, HeadToHead> =
        group.iter().map(|&id| (id, HeadToHead::default())).collect();

    for m in scored_matches(db, league_id)? {
        if !(group.contains(&m.home_team_id) && group.contains(&m.away_team_id)) {
            continue;
        }
        let hp = m.home_points.unwrap_or(0.0);
        let ap = m.away_points.unwrap_or(0.0);
        let (home_field, away_field) = if hp > ap {
            (0, 1)
        } else if ap > hp {
            (1, 0)
        } else {
            (2, 2)
        };
        for (team_id, field) in [(m.home_team_id, home_field), (m.away_team_id, away_field)] {
            if let Some(h) = stats.get_mut(&team_id) {
                match field {
                    0 => h.wins += 1,
                    1 => h.losses += 1,
                    _ => h.ties += 1,
                }
            }
        }
    }

    Ok(stats
        .into_iter()
        .map(|(id, h)| {
            let games = h.wins + h.losses + h.ties;
            (id, win_pct(h.wins, h.ties, games))
        })
        .collect())
}

fn separating_key(upper: &TiebreakRow, lower: &TiebreakRow) -> Option<&'static str> {
    if upper.win_pct != lower.win_pct {
        Some("win_pct")
    } else if upper.h2h_win_pct != lower.h2h_win_pct {
        Some("h2h_win_pct")
    } else if upper.point_diff != lower.point_diff {
        Some("point_diff")
    } else if upper.points_for != lower.points_for {
        Some("points_for")
    } else if upper.coin != lower.coin {
        Some("coin")
    } else {
        None
    }
}

/// Order teams by the tiebreak ladder: overall win percentage, head-to-head
/// win percentage within the group, point differential, points for, then a
/// deterministic coin.
///
/// With no explicit group the whole league is ranked. Each row names the
/// first key that separated it from the row below, so a reported "coin"
/// means everything measurable was even.
pub fn resolve(
    db: &Database,
    league_id: i64,
    team_ids: Option<&[i64]>,
) -> Result<Vec<TiebreakRow>, StandingsError> {
    require_league(db, league_id)?;

    let mut base = table(db, league_id)?;
    if let Some(ids) = team_ids {
        let want: BTreeSet<i64> = ids.iter().copied().collect();
        base.retain(|row| want.contains(&row.team_id));
    }

    let group: BTreeSet<i64> = base.iter().map(|r| r.team_id).collect();
    let h2h = h2h_win_pct(db, league_id, &group)?;

    let mut rows: Vec<TiebreakRow> = base
        .into_iter()
        .map(|r| TiebreakRow {
            team_id: r.team_id,
            team_name: r.team_name,
            win_pct: r.win_pct,
            h2h_win_pct: h2h.get(&r.team_id).copied().unwrap_or(0.0),
            point_diff: r.point_diff,
            points_for: r.points_for,
            coin: deterministic_coin(league_id, r.team_id),
            reason: None,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.win_pct
            .total_cmp(&a.win_pct)
            .then(b.h2h_win_pct.total_cmp(&a.h2h_win_pct))
            .then(b.point_diff.total_cmp(&a.point_diff))
            .then(b.points_for.total_cmp(&a.points_for))
            .then(b.coin.total_cmp(&a.coin))
    });

    for i in 0..rows.len().saturating_sub(1) {
        rows[i].reason = separating_key(&rows[i], &rows[i + 1]);
    }
    Ok(rows)
}

/// Team ids for the whole league in tiebreak order, best first. Playoff
/// seeding reads straight off this.
pub fn seed_order(db: &Database, league_id: i64) -> Result<Vec<i64>, StandingsError> {
    Ok(resolve(db, league_id, None)?
        .into_iter()
        .map(|row| row.team_id)
        .collect())
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
                "Tiebreak League",
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
    }

    #[test]
    fn coin_is_stable_and_bounded() {
        let a = deterministic_coin(1, 2);
        assert_eq!(a, deterministic_coin(1, 2));
        assert!((0.0..=1.0).contains(&a));
        assert_ne!(a, deterministic_coin(1, 3));
        assert_ne!(a, deterministic_coin(2, 2));
    }

    #[test]
    fn head_to_head_splits_equal_records() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 4);
        // t0 and t1 both finish 2-1, and t1 even carries the better point
        // differential, but t0 won their meeting.
        play(&db, league.id, "2026-W10", t[0], t[1], 20.0, 10.0);
        play(&db, league.id, "2026-W11", t[1], t[2], 20.0, 10.0);
        play(&db, league.id, "2026-W12", t[2], t[0], 15.0, 14.0);
        play(&db, league.id, "2026-W13", t[0], t[3], 20.0, 10.0);
        play(&db, league.id, "2026-W14", t[1], t[3], 30.0, 10.0);

        let rows = resolve(&db, league.id, Some(&[t[0], t[1]])).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team_id, t[0]);
        assert_eq!(rows[0].reason, Some("h2h_win_pct"));
        assert_eq!(rows[1].reason, None);
    }

    #[test]
    fn dead_even_teams_fall_to_the_coin() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 3);
        // Identical results against t2 and a head-to-head tie leave t0 and
        // t1 indistinguishable on every measurable key.
        play(&db, league.id, "2026-W10", t[0], t[2], 20.0, 10.0);
        play(&db, league.id, "2026-W11", t[1], t[2], 20.0, 10.0);
        play(&db, league.id, "2026-W12", t[0], t[1], 15.0, 15.0);

        let rows = resolve(&db, league.id, Some(&[t[0], t[1]])).unwrap();
        assert_eq!(rows[0].reason, Some("coin"));

        let first = deterministic_coin(league.id, t[0]);
        let second = deterministic_coin(league.id, t[1]);
        let expected_top = if first > second { t[0] } else { t[1] };
        assert_eq!(rows[0].team_id, expected_top);
    }

    #[test]
    fn whole_league_resolve_ranks_everyone() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 3);
        play(&db, league.id, "2026-W10", t[0], t[2], 20.0, 10.0);
        play(&db, league.id, "2026-W11", t[1], t[2], 20.0, 10.0);
        play(&db, league.id, "2026-W12", t[0], t[1], 15.0, 14.0);

        let rows = resolve(&db, league.id, None).unwrap();
        let order: Vec<i64> = rows.iter().map(|r| r.team_id).collect();
        assert_eq!(order, vec![t[0], t[1], t[2]]);
        // The winless team is separated from t1 by record, not the coin.
        assert_eq!(rows[1].reason, Some("win_pct"));

        assert_eq!(seed_order(&db, league.id).unwrap(), order);
    }
}
