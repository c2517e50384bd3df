// Match scheduling: single-week pairing and circle-method round robins.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::db::Database;
use crate::periods;

const BYE: i64 = 0;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("league {0} not found")]
    LeagueNotFound(i64),
    #[error("league {league_id} needs at least 2 teams to schedule, has {teams}")]
    NotEnoughTeams { league_id: i64, teams: usize },
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct WeekSchedule {
    pub league_id: i64,
    pub week: String,
    pub matches_created: usize,
}

#[derive(Debug, Serialize)]
pub struct SeasonSchedule {
    pub league_id: i64,
    pub weeks_created: usize,
    pub matches_created: usize,
}

fn league_team_ids(db: &Database, league_id: i64) -> Result<Vec<i64>, ScheduleError> {
    let teams = db.list_teams(league_id)?;
    if teams.len() < 2 {
        return Err(ScheduleError::NotEnoughTeams {
            league_id,
            teams: teams.len(),
        });
    }
    Ok(teams.into_iter().map(|t| t.id).collect())
}

// ---------------------------------------------------------------------------
// Single week
// ---------------------------------------------------------------------------

/// Create one week of matchups by pairing teams in id order (1v2, 3v4, ...),
/// alternating home and away across the pairs.
///
/// Idempotent per label: if the week already holds matches, nothing is
/// created. An odd team count gives the last team a bye.
pub fn schedule_week(
    db: &Database,
    league_id: i64,
    week: &str,
) -> Result<WeekSchedule, ScheduleError> {
    let league = db
        .get_league(league_id)?
        .ok_or(ScheduleError::LeagueNotFound(league_id))?;
    let mut ids = league_team_ids(db, league.id)?;

    if db.week_has_matches(league.id, week)? {
        return Ok(WeekSchedule {
            league_id: league.id,
            week: week.to_string(),
            matches_created: 0,
        });
    }

    if ids.len() % 2 == 1 {
        ids.pop();
    }

    let mut created = 0;
    for (idx, pair) in ids.chunks(2).enumerate() {
        let (home, away) = if idx % 2 == 0 {
            (pair[0], pair[1])
        } else {
            (pair[1], pair[0])
        };
        db.create_match(league.id, week, home, away)?;
        created += 1;
    }

    info!("scheduled week {week} for league {league_id}: {created} matches");
    Ok(WeekSchedule {
        league_id: league.id,
        week: week.to_string(),
        matches_created: created,
    })
}

// ---------------------------------------------------------------------------
// Round-robin season
// ---------------------------------------------------------------------------

/// Generate a round-robin season with the circle method.
///
/// Week labels extend the base week with "+WkN" so a season never collides
/// with a single-week schedule under the same base. `weeks` caps the round
/// count; zero means one full round robin (n - 1 rounds). Rounds whose
/// label already holds matches are skipped, so re-running fills only new
/// weeks. An odd team count rotates a bye through the field.
pub fn schedule_season(
    db: &Database,
    league_id: i64,
    base_week: &str,
    weeks: u32,
) -> Result<SeasonSchedule, ScheduleError> {
    let league = db
        .get_league(league_id)?
        .ok_or(ScheduleError::LeagueNotFound(league_id))?;
    let mut arr = league_team_ids(db, league.id)?;

    if arr.len() % 2 == 1 {
        arr.push(BYE);
    }
    let n = arr.len();
    let rounds = if weeks == 0 { n - 1 } else { weeks as usize };

    let mut matches_created = 0;
    let mut weeks_created = 0;

    for rnd in 0..rounds {
        let mut pairs = Vec::with_capacity(n / 2);
        for i in 0..n / 2 {
            let a = arr[i];
            let b = arr[n - 1 - i];
            if a == BYE || b == BYE {
                continue;
            }
            // Alternate home and away each round.
            if rnd % 2 == 0 {
                pairs.push((a, b));
            } else {
                pairs.push((b, a));
            }
        }

        let label = periods::round_robin_label(base_week, rnd + 1);
        if !db.week_has_matches(league.id, &label)? {
            for &(home, away) in &pairs {
                db.create_match(league.id, &label, home, away)?;
                matches_created += 1;
            }
            if !pairs.is_empty() {
                weeks_created += 1;
            }
        }

        // Rotate the circle, first seat fixed.
        let mut next = Vec::with_capacity(n);
        next.push(arr[0]);
        next.push(arr[n - 1]);
        next.extend_from_slice(&arr[1..n - 1]);
        arr = next;
    }

    info!(
        "scheduled season for league {league_id}: {weeks_created} weeks, {matches_created} matches"
    );
    Ok(SeasonSchedule {
        league_id: league.id,
        weeks_created,
        matches_created,
    })
}

/// Distinct week labels for a league, ascending. Round-robin and playoff
/// labels are included.
pub fn list_weeks(db: &Database, league_id: i64) -> Result<Vec<String>, ScheduleError> {
    let league = db
        .get_league(league_id)?
        .ok_or(ScheduleError::LeagueNotFound(league_id))?;
    Ok(db.list_weeks(league.id)?)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BucketRequirements, League, RosterRules, ScoringMode};
    use std::collections::BTreeMap;
    use std::path::Path;

    fn test_db() -> Database {
        Database::open(Path::new(":memory:")).expect("in-memory database")
    }

    fn league_with_teams(db: &Database, count: usize) -> (League, Vec<i64>) {
        let league = db
            .create_league(
                "Schedule League",
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

    // -- schedule_week ------------------------------------------------------

    #[test]
    fn week_pairs_in_id_order_with_alternating_home() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 4);

        let out = schedule_week(&db, league.id, "2026-W10").unwrap();
        assert_eq!(out.matches_created, 2);

        let matches = db.list_matches_for_week(league.id, "2026-W10").unwrap();
        assert_eq!(matches[0].home_team_id, t[0]);
        assert_eq!(matches[0].away_team_id, t[1]);
        // Second pair flips home and away.
        assert_eq!(matches[1].home_team_id, t[3]);
        assert_eq!(matches[1].away_team_id, t[2]);
    }

    #[test]
    fn week_generation_is_idempotent() {
        let db = test_db();
        let (league, _) = league_with_teams(&db, 4);

        schedule_week(&db, league.id, "2026-W10").unwrap();
        let again = schedule_week(&db, league.id, "2026-W10").unwrap();
        assert_eq!(again.matches_created, 0);
        assert_eq!(
            db.list_matches_for_week(league.id, "2026-W10").unwrap().len(),
            2
        );
    }

    #[test]
    fn odd_team_count_byes_the_last_team() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 5);

        let out = schedule_week(&db, league.id, "2026-W10").unwrap();
        assert_eq!(out.matches_created, 2);

        let matches = db.list_matches_for_week(league.id, "2026-W10").unwrap();
        let playing: Vec<i64> = matches
            .iter()
            .flat_map(|m| [m.home_team_id, m.away_team_id])
            .collect();
        assert!(!playing.contains(&t[4]));
    }

    #[test]
    fn scheduling_needs_two_teams() {
        let db = test_db();
        let (league, _) = league_with_teams(&db, 1);

        let err = schedule_week(&db, league.id, "2026-W10").unwrap_err();
        assert!(matches!(err, ScheduleError::NotEnoughTeams { teams: 1, .. }));
        assert!(matches!(
            schedule_week(&db, 99, "2026-W10").unwrap_err(),
            ScheduleError::LeagueNotFound(99)
        ));
    }

    // -- schedule_season ----------------------------------------------------

    fn games_per_team(db: &Database, league_id: i64) -> BTreeMap<i64, usize> {
        let mut games = BTreeMap::new();
        for week in db.list_weeks(league_id).unwrap() {
            for m in db.list_matches_for_week(league_id, &week).unwrap() {
                *games.entry(m.home_team_id).or_default() += 1;
                *games.entry(m.away_team_id).or_default() += 1;
            }
        }
        games
    }

    #[test]
    fn season_round_robin_plays_everyone_once() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 4);

        let out = schedule_season(&db, league.id, "2026-W10", 0).unwrap();
        assert_eq!(out.weeks_created, 3);
        assert_eq!(out.matches_created, 6);

        let weeks = db.list_weeks(league.id).unwrap();
        assert_eq!(weeks, vec!["2026-W10+Wk1", "2026-W10+Wk2", "2026-W10+Wk3"]);

        let games = games_per_team(&db, league.id);
        for id in &t {
            assert_eq!(games[id], 3, "team {id} should play every round");
        }
    }

    #[test]
    fn season_with_odd_teams_rotates_the_bye() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 3);

        let out = schedule_season(&db, league.id, "2026-W10", 0).unwrap();
        assert_eq!(out.weeks_created, 3);
        assert_eq!(out.matches_created, 3);

        let games = games_per_team(&db, league.id);
        for id in &t {
            assert_eq!(games[id], 2, "team {id} sits out exactly one round");
        }
    }

    #[test]
    fn season_honors_the_week_cap() {
        let db = test_db();
        let (league, _) = league_with_teams(&db, 4);

        let out = schedule_season(&db, league.id, "2026-W10", 2).unwrap();
        assert_eq!(out.weeks_created, 2);
        assert_eq!(out.matches_created, 4);
        assert_eq!(
            db.list_weeks(league.id).unwrap(),
            vec!["2026-W10+Wk1", "2026-W10+Wk2"]
        );
    }

    #[test]
    fn season_skips_rounds_that_already_exist() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 4);
        db.create_match(league.id, "2026-W10+Wk1", t[0], t[1]).unwrap();

        let out = schedule_season(&db, league.id, "2026-W10", 0).unwrap();
        assert_eq!(out.weeks_created, 2);
        assert_eq!(out.matches_created, 4);
        // The pre-existing week keeps its single match.
        assert_eq!(
            db.list_matches_for_week(league.id, "2026-W10+Wk1").unwrap().len(),
            1
        );
    }

    #[test]
    fn list_weeks_sorts_labels() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 2);
        db.create_match(league.id, "2026-W12", t[0], t[1]).unwrap();
        db.create_match(league.id, "2026-W10", t[0], t[1]).unwrap();
        db.create_match(league.id, "2026-W10-PO-SF", t[0], t[1]).unwrap();

        let weeks = list_weeks(&db, league.id).unwrap();
        assert_eq!(weeks, vec!["2026-W10", "2026-W10-PO-SF", "2026-W12"]);
    }
}
