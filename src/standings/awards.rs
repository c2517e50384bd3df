// Awards: weekly honors and season superlatives.

use serde::Serialize;

use super::table::{table, TableRow};
use super::{
    first_max_by, first_min_by, name_for, require_league, scored_matches, summarize, team_names,
    HighGame, MarginGame, MatchSummary, ScorePeak, StandingsError,
};
use crate::db::Database;
use crate::model::Match;

#[derive(Debug, Serialize)]
pub struct TopScorer {
    pub team_id: i64,
    pub team_name: String,
    pub points: f64,
}

#[derive(Debug, Serialize)]
pub struct WeeklyAwards {
    pub league_id: i64,
    pub period: Option<String>,
    pub top_scorer: Option<TopScorer>,
    pub narrowest_win: Option<MatchSummary>,
    pub blowout: Option<MatchSummary>,
    pub highest_scoring_game: Option<MatchSummary>,
}

#[derive(Debug, Serialize)]
pub struct Winningest {
    pub team_id: i64,
    pub team_name: String,
    pub win_pct: f64,
    pub point_diff: f64,
}

#[derive(Debug, Serialize)]
pub struct MvpOffense {
    pub team_id: i64,
    pub team_name: String,
    pub points_for: f64,
}

#[derive(Debug, Serialize)]
pub struct BestDefense {
    pub team_id: i64,
    pub team_name: String,
    pub points_against: f64,
}

#[derive(Debug, Serialize)]
pub struct SeasonAwards {
    pub league_id: i64,
    pub winningest_team: Option<Winningest>,
    pub mvp_offense: Option<MvpOffense>,
    pub best_defense: Option<BestDefense>,
    pub highest_single_week_team: Option<ScorePeak>,
    pub highest_scoring_game: Option<HighGame>,
    pub biggest_blowout: Option<MarginGame>,
}

fn game_total(m: &Match) -> f64 {
    m.home_points.unwrap_or(0.0) + m.away_points.unwrap_or(0.0)
}

fn game_margin(m: &Match) -> f64 {
    (m.home_points.unwrap_or(0.0) - m.away_points.unwrap_or(0.0)).abs()
}

/// Weekly honors for one period, defaulting to the latest scored week.
/// Tied games are excluded from the margin awards.
pub fn weekly(
    db: &Database,
    league_id: i64,
    period: Option<&str>,
) -> Result<WeeklyAwards, StandingsError> {
    require_league(db, league_id)?;

    let period = match period {
        Some(p) => Some(p.to_string()),
        None => db.latest_scored_period(league_id)?,
    };
    let Some(period) = period else {
        return Ok(WeeklyAwards {
            league_id,
            period: None,
            top_scorer: None,
            narrowest_win: None,
            blowout: None,
            highest_scoring_game: None,
        });
    };

    let names = team_names(db, league_id)?;
    let scores = db.scores_for_period(league_id, &period)?;
    let top_scorer = first_max_by(&scores, |s| s.points).map(|best| TopScorer {
        team_id: best.team_id,
        team_name: name_for(&names, best.team_id),
        points: best.points,
    });

    let matches: Vec<Match> = db
        .list_matches_for_week(league_id, &period)?
        .into_iter()
        .filter(Match::is_scored)
        .collect();

    let decisive: Vec<&Match> = matches.iter().filter(|m| game_margin(m) != 0.0).collect();
    let narrowest_win = first_min_by(&decisive, |m| game_margin(m)).map(|&m| summarize(m, &names));
    let blowout = first_max_by(&decisive, |m| game_margin(m)).map(|&m| summarize(m, &names));
    let highest_scoring_game = first_max_by(&matches, game_total).map(|m| summarize(m, &names));

    Ok(WeeklyAwards {
        league_id,
        period: Some(period),
        top_scorer,
        narrowest_win,
        blowout,
        highest_scoring_game,
    })
}

/// Season superlatives to date.
///
/// The winningest team breaks record ties on point differential; best
/// defense requires at least one game played.
pub fn season(db: &Database, league_id: i64) -> Result<SeasonAwards, StandingsError> {
    require_league(db, league_id)?;

    let rows = table(db, league_id)?;
    let names = team_names(db, league_id)?;
    let matches = scored_matches(db, league_id)?;
    let scores = db.list_team_scores(league_id)?;

    // The table is already sorted by win_pct then point_diff.
    let winningest_team = rows.first().map(|r| Winningest {
        team_id: r.team_id,
        team_name: r.team_name.clone(),
        win_pct: r.win_pct,
        point_diff: r.point_diff,
    });

    let mvp_offense = first_max_by(&rows, |r| r.points_for).map(|r| MvpOffense {
        team_id: r.team_id,
        team_name: r.team_name.clone(),
        points_for: r.points_for,
    });

    let with_games: Vec<&TableRow> = rows.iter().filter(|r| r.games_played > 0).collect();
    let best_defense = first_min_by(&with_games, |r| r.points_against).map(|&r| BestDefense {
        team_id: r.team_id,
        team_name: r.team_name.clone(),
        points_against: r.points_against,
    });

    let highest_single_week_team = first_max_by(&scores, |s| s.points).map(|best| ScorePeak {
        team_id: best.team_id,
        team_name: name_for(&names, best.team_id),
        period: best.period.clone(),
        points: best.points,
    });

    let highest_scoring_game = first_max_by(&matches, game_total).map(|m| HighGame {
        game: summarize(m, &names),
        total_points: game_total(m),
    });
    let biggest_blowout = first_max_by(&matches, game_margin).map(|m| MarginGame {
        game: summarize(m, &names),
        margin: game_margin(m),
    });

    Ok(SeasonAwards {
        league_id,
        winningest_team,
        mvp_offense,
        best_defense,
        highest_single_week_team,
        highest_scoring_game,
        biggest_blowout,
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
                "Awards League",
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
    fn weekly_defaults_to_latest_period_and_handles_empty() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 2);

        let empty = weekly(&db, league.id, None).unwrap();
        assert_eq!(empty.period, None);
        assert!(empty.top_scorer.is_none());

        play(&db, league.id, "2026-W10", t[0], t[1], 20.0, 10.0);
        play(&db, league.id, "2026-W11", t[1], t[0], 25.0, 5.0);

        let awards = weekly(&db, league.id, None).unwrap();
        assert_eq!(awards.period.as_deref(), Some("2026-W11"));
        let top = awards.top_scorer.unwrap();
        assert_eq!(top.team_id, t[1]);
        assert!((top.points - 25.0).abs() < 1e-9);
    }

    #[test]
    fn weekly_margins_skip_ties() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 4);
        play(&db, league.id, "2026-W10", t[0], t[1], 20.0, 20.0);
        play(&db, league.id, "2026-W10", t[2], t[3], 30.0, 10.0);

        let awards = weekly(&db, league.id, Some("2026-W10")).unwrap();
        let narrow = awards.narrowest_win.unwrap();
        assert_eq!(narrow.home_team_id, t[2]);
        let blow = awards.blowout.unwrap();
        assert_eq!(blow.home_team_id, t[2]);
        // The tie still counts for total points.
        let high = awards.highest_scoring_game.unwrap();
        assert_eq!(high.home_team_id, t[0]);
    }

    #[test]
    fn season_superlatives() {
        let db = test_db();
        let (league, t) = league_with_teams(&db, 3);
        // t0 wins twice with modest offense; t1 racks up points but loses
        // the games that matter; t2 allows the fewest points.
        play(&db, league.id, "2026-W10", t[0], t[1], 30.0, 28.0);
        play(&db, league.id, "2026-W11", t[0], t[2], 10.0, 5.0);
        play(&db, league.id, "2026-W12", t[1], t[2], 40.0, 41.0);

        let awards = season(&db, league.id).unwrap();
        assert_eq!(awards.winningest_team.unwrap().team_id, t[0]);
        let mvp = awards.mvp_offense.unwrap();
        assert_eq!(mvp.team_id, t[1]);
        assert!((mvp.points_for - 68.0).abs() < 1e-9);

        let best_d = awards.best_defense.unwrap();
        // t0 allowed 33, t1 allowed 71, t2 allowed 50.
        assert_eq!(best_d.team_id, t[0]);
        assert!((best_d.points_against - 33.0).abs() < 1e-9);

        let week_high = awards.highest_single_week_team.unwrap();
        assert_eq!(week_high.team_id, t[2]);
        assert!((week_high.points - 41.0).abs() < 1e-9);

        let blowout = awards.biggest_blowout.unwrap();
        assert_eq!(blowout.game.week, "2026-W11");
    }

    #[test]
    fn empty_league_yields_no_awards() {
        let db = test_db();
        let league = db
            .create_league(
                "Empty League",
                RosterRules::ROSTER_SLOTS,
                RosterRules::STARTERS,
                &BucketRequirements::default(),
                ScoringMode::Projections,
            )
            .unwrap();

        let awards = season(&db, league.id).unwrap();
        assert!(awards.winningest_team.is_none());
        assert!(awards.mvp_offense.is_none());
        assert!(awards.best_defense.is_none());
    }
}
