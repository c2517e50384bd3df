// SQLite persistence. A single connection behind a mutex is plenty for a
// CLI-driven league; WAL mode keeps concurrent readers out of each other's way.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{
    Bucket, BucketRequirements, DraftPick, FreeAgentSort, League, Match, Price, RosterSlot,
    ScoringMode, Security, Team, TeamScore,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS leagues (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL UNIQUE,
    roster_slots        INTEGER NOT NULL,
    starters            INTEGER NOT NULL,
    bucket_requirements TEXT NOT NULL,
    scoring_mode        TEXT NOT NULL,
    created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS teams (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    league_id  INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
    name       TEXT NOT NULL,
    owner      TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (league_id, name)
);

CREATE TABLE IF NOT EXISTS roster_slots (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id    INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    symbol     TEXT NOT NULL,
    is_active  INTEGER NOT NULL DEFAULT 0,
    bucket     TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (team_id, symbol)
);

CREATE TABLE IF NOT EXISTS draft_picks (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    league_id  INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
    team_id    INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    symbol     TEXT NOT NULL,
    round      INTEGER NOT NULL,
    pick_no    INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS matches (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    league_id      INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
    week           TEXT NOT NULL,
    home_team_id   INTEGER NOT NULL REFERENCES teams(id),
    away_team_id   INTEGER NOT NULL REFERENCES teams(id),
    home_points    REAL,
    away_points    REAL,
    winner_team_id INTEGER REFERENCES teams(id),
    created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_matches_league_week ON matches (league_id, week);

CREATE TABLE IF NOT EXISTS team_scores (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    league_id INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
    team_id   INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    period    TEXT NOT NULL,
    points    REAL NOT NULL,
    UNIQUE (league_id, team_id, period)
);

CREATE INDEX IF NOT EXISTS idx_team_scores_league_period ON team_scores (league_id, period);

CREATE TABLE IF NOT EXISTS securities (
    symbol         TEXT PRIMARY KEY,
    name           TEXT,
    sector         TEXT,
    is_etf         INTEGER NOT NULL DEFAULT 0,
    market_cap     REAL,
    primary_bucket TEXT,
    adp            REAL,
    proj_points    REAL
);

CREATE TABLE IF NOT EXISTS prices (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date   TEXT NOT NULL,
    open   REAL,
    close  REAL,
    UNIQUE (symbol, date)
);

CREATE TABLE IF NOT EXISTS idempotency_entries (
    key        TEXT PRIMARY KEY,
    response   TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn league_from_row(row: &Row<'_>) -> rusqlite::Result<League> {
    let requirements: String = row.get(4)?;
    let mode: String = row.get(5)?;
    Ok(League {
        id: row.get(0)?,
        name: row.get(1)?,
        roster_slots: row.get(2)?,
        starters: row.get(3)?,
        bucket_requirements: serde_json::from_str(&requirements).unwrap_or_default(),
        scoring_mode: ScoringMode::parse(&mode).unwrap_or_default(),
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        league_id: row.get(1)?,
        name: row.get(2)?,
        owner: row.get(3)?,
    })
}

fn slot_from_row(row: &Row<'_>) -> rusqlite::Result<RosterSlot> {
    let bucket: Option<String> = row.get(4)?;
    Ok(RosterSlot {
        id: row.get(0)?,
        team_id: row.get(1)?,
        symbol: row.get(2)?,
        is_active: row.get(3)?,
        bucket: bucket.as_deref().and_then(Bucket::parse),
    })
}

fn pick_from_row(row: &Row<'_>) -> rusqlite::Result<DraftPick> {
    Ok(DraftPick {
        id: row.get(0)?,
        league_id: row.get(1)?,
        team_id: row.get(2)?,
        symbol: row.get(3)?,
        round: row.get(4)?,
        pick_no: row.get(5)?,
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<Match> {
    Ok(Match {
        id: row.get(0)?,
        league_id: row.get(1)?,
        week: row.get(2)?,
        home_team_id: row.get(3)?,
        away_team_id: row.get(4)?,
        home_points: row.get(5)?,
        away_points: row.get(6)?,
        winner_team_id: row.get(7)?,
    })
}

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<TeamScore> {
    Ok(TeamScore {
        id: row.get(0)?,
        league_id: row.get(1)?,
        team_id: row.get(2)?,
        period: row.get(3)?,
        points: row.get(4)?,
    })
}

fn security_from_row(row: &Row<'_>) -> rusqlite::Result<Security> {
    let primary_bucket: Option<String> = row.get(5)?;
    Ok(Security {
        symbol: row.get(0)?,
        name: row.get(1)?,
        sector: row.get(2)?,
        is_etf: row.get(3)?,
        market_cap: row.get(4)?,
        primary_bucket: primary_bucket.as_deref().and_then(Bucket::parse),
        adp: row.get(6)?,
        proj_points: row.get(7)?,
    })
}

fn price_from_row(row: &Row<'_>) -> rusqlite::Result<Price> {
    let date: String = row.get(1)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(Price {
        symbol: row.get(0)?,
        date,
        open: row.get(2)?,
        close: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL mode")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("failed to set busy timeout")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign key enforcement")?;

        conn.execute_batch(SCHEMA)
            .context("failed to initialize database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // -----------------------------------------------------------------------
    // Leagues
    // -----------------------------------------------------------------------

    pub fn create_league(
        &self,
        name: &str,
        roster_slots: u32,
        starters: u32,
        requirements: &BucketRequirements,
        mode: ScoringMode,
    ) -> Result<League> {
        let requirements_json = serde_json::to_string(requirements)
            .context("failed to serialize bucket requirements")?;
        let id: i64 = self
            .conn()
            .query_row(
                "INSERT INTO leagues (name, roster_slots, starters, bucket_requirements, scoring_mode)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id",
                params![name, roster_slots, starters, requirements_json, mode.as_str()],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to create league `{name}`"))?;
        Ok(League {
            id,
            name: name.to_string(),
            roster_slots,
            starters,
            bucket_requirements: *requirements,
            scoring_mode: mode,
        })
    }

    pub fn league_name_exists(&self, name: &str) -> Result<bool> {
        let hit = self
            .conn()
            .query_row("SELECT 1 FROM leagues WHERE name = ?1", params![name], |_| Ok(()))
            .optional()
            .context("failed to check league name")?;
        Ok(hit.is_some())
    }

    pub fn get_league(&self, id: i64) -> Result<Option<League>> {
        self.conn()
            .query_row(
                "SELECT id, name, roster_slots, starters, bucket_requirements, scoring_mode
                 FROM leagues WHERE id = ?1",
                params![id],
                league_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load league {id}"))
    }

    pub fn list_leagues(&self) -> Result<Vec<League>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, roster_slots, starters, bucket_requirements, scoring_mode
             FROM leagues ORDER BY id",
        )?;
        let rows = stmt.query_map([], league_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to list leagues")
    }

    pub fn set_scoring_mode(&self, league_id: i64, mode: ScoringMode) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE leagues SET scoring_mode = ?2 WHERE id = ?1",
                params![league_id, mode.as_str()],
            )
            .with_context(|| format!("failed to update scoring mode for league {league_id}"))?;
        Ok(())
    }

    /// Rewrite the fixed-rule columns on a league row. Used to repair rows
    /// whose stored values have drifted from the house rules.
    pub fn update_league_rules(
        &self,
        league_id: i64,
        roster_slots: u32,
        starters: u32,
        requirements: &BucketRequirements,
    ) -> Result<()> {
        let requirements_json = serde_json::to_string(requirements)
            .context("failed to serialize bucket requirements")?;
        self.conn()
            .execute(
                "UPDATE leagues
                 SET roster_slots = ?2, starters = ?3, bucket_requirements = ?4
                 WHERE id = ?1",
                params![league_id, roster_slots, starters, requirements_json],
            )
            .with_context(|| format!("failed to update rules for league {league_id}"))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Teams
    // -----------------------------------------------------------------------

    pub fn create_team(&self, league_id: i64, name: &str, owner: Option<&str>) -> Result<Team> {
        let id: i64 = self
            .conn()
            .query_row(
                "INSERT INTO teams (league_id, name, owner) VALUES (?1, ?2, ?3) RETURNING id",
                params![league_id, name, owner],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to create team `{name}` in league {league_id}"))?;
        Ok(Team {
            id,
            league_id,
            name: name.to_string(),
            owner: owner.map(str::to_string),
        })
    }

    pub fn team_name_exists(&self, league_id: i64, name: &str) -> Result<bool> {
        let hit = self
            .conn()
            .query_row(
                "SELECT 1 FROM teams WHERE league_id = ?1 AND name = ?2",
                params![league_id, name],
                |_| Ok(()),
            )
            .optional()
            .context("failed to check team name")?;
        Ok(hit.is_some())
    }

    pub fn get_team(&self, id: i64) -> Result<Option<Team>> {
        self.conn()
            .query_row(
                "SELECT id, league_id, name, owner FROM teams WHERE id = ?1",
                params![id],
                team_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load team {id}"))
    }

    pub fn list_teams(&self, league_id: i64) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, league_id, name, owner FROM teams WHERE league_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![league_id], team_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list teams for league {league_id}"))
    }

    // -----------------------------------------------------------------------
    // Roster slots
    // -----------------------------------------------------------------------

    pub fn create_slot(
        &self,
        team_id: i64,
        symbol: &str,
        is_active: bool,
        bucket: Option<Bucket>,
    ) -> Result<RosterSlot> {
        let id: i64 = self
            .conn()
            .query_row(
                "INSERT INTO roster_slots (team_id, symbol, is_active, bucket)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                params![team_id, symbol, is_active, bucket.map(Bucket::as_str)],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to roster `{symbol}` on team {team_id}"))?;
        Ok(RosterSlot {
            id,
            team_id,
            symbol: symbol.to_string(),
            is_active,
            bucket,
        })
    }

    pub fn get_slot(&self, id: i64) -> Result<Option<RosterSlot>> {
        self.conn()
            .query_row(
                "SELECT id, team_id, symbol, is_active, bucket FROM roster_slots WHERE id = ?1",
                params![id],
                slot_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load roster slot {id}"))
    }

    pub fn get_slot_by_symbol(&self, team_id: i64, symbol: &str) -> Result<Option<RosterSlot>> {
        self.conn()
            .query_row(
                "SELECT id, team_id, symbol, is_active, bucket
                 FROM roster_slots WHERE team_id = ?1 AND symbol = ?2",
                params![team_id, symbol],
                slot_from_row,
            )
            .optional()
            .with_context(|| format!("failed to look up `{symbol}` on team {team_id}"))
    }

    pub fn list_slots(&self, team_id: i64) -> Result<Vec<RosterSlot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, team_id, symbol, is_active, bucket
             FROM roster_slots WHERE team_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![team_id], slot_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list roster for team {team_id}"))
    }

    pub fn list_active_slots(&self, team_id: i64) -> Result<Vec<RosterSlot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, team_id, symbol, is_active, bucket
             FROM roster_slots WHERE team_id = ?1 AND is_active = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![team_id], slot_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list active slots for team {team_id}"))
    }

    pub fn roster_count(&self, team_id: i64) -> Result<u32> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM roster_slots WHERE team_id = ?1",
                params![team_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to count roster slots for team {team_id}"))
    }

    pub fn update_slot_placement(
        &self,
        slot_id: i64,
        bucket: Option<Bucket>,
        is_active: bool,
    ) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE roster_slots SET bucket = ?2, is_active = ?3 WHERE id = ?1",
                params![slot_id, bucket.map(Bucket::as_str), is_active],
            )
            .with_context(|| format!("failed to update placement for slot {slot_id}"))?;
        Ok(())
    }

    /// Activate exactly `slot_ids` on the team and bench every other slot,
    /// in one transaction.
    pub fn activate_only(&self, team_id: i64, slot_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin lineup transaction")?;
        tx.execute(
            "UPDATE roster_slots SET is_active = 0 WHERE team_id = ?1",
            params![team_id],
        )
        .with_context(|| format!("failed to bench roster for team {team_id}"))?;
        {
            let mut stmt = tx
                .prepare("UPDATE roster_slots SET is_active = 1 WHERE id = ?1 AND team_id = ?2")?;
            for slot_id in slot_ids {
                stmt.execute(params![slot_id, team_id])
                    .with_context(|| format!("failed to activate slot {slot_id}"))?;
            }
        }
        tx.commit().context("failed to commit lineup transaction")
    }

    /// Remove a slot; returns false when no such slot existed.
    pub fn delete_slot(&self, slot_id: i64) -> Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM roster_slots WHERE id = ?1", params![slot_id])
            .with_context(|| format!("failed to delete slot {slot_id}"))?;
        Ok(changed > 0)
    }

    /// Every symbol rostered by any team in the league.
    pub fn rostered_symbols(&self, league_id: i64) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT rs.symbol FROM roster_slots rs
             JOIN teams t ON t.id = rs.team_id
             WHERE t.league_id = ?1
             ORDER BY rs.symbol",
        )?;
        let rows = stmt.query_map(params![league_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list rostered symbols for league {league_id}"))
    }

    // -----------------------------------------------------------------------
    // Draft picks
    // -----------------------------------------------------------------------

    pub fn pick_count(&self, league_id: i64) -> Result<u32> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM draft_picks WHERE league_id = ?1",
                params![league_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to count picks for league {league_id}"))
    }

    pub fn record_pick(
        &self,
        league_id: i64,
        team_id: i64,
        symbol: &str,
        round: u32,
        pick_no: u32,
    ) -> Result<DraftPick> {
        let id: i64 = self
            .conn()
            .query_row(
                "INSERT INTO draft_picks (league_id, team_id, symbol, round, pick_no)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id",
                params![league_id, team_id, symbol, round, pick_no],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to record pick {pick_no} in league {league_id}"))?;
        Ok(DraftPick {
            id,
            league_id,
            team_id,
            symbol: symbol.to_string(),
            round,
            pick_no,
        })
    }

    pub fn list_picks(&self, league_id: i64) -> Result<Vec<DraftPick>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, league_id, team_id, symbol, round, pick_no
             FROM draft_picks WHERE league_id = ?1 ORDER BY pick_no",
        )?;
        let rows = stmt.query_map(params![league_id], pick_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list picks for league {league_id}"))
    }

    // -----------------------------------------------------------------------
    // Matches
    // -----------------------------------------------------------------------

    pub fn create_match(
        &self,
        league_id: i64,
        week: &str,
        home_team_id: i64,
        away_team_id: i64,
    ) -> Result<Match> {
        let id: i64 = self
            .conn()
            .query_row(
                "INSERT INTO matches (league_id, week, home_team_id, away_team_id)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                params![league_id, week, home_team_id, away_team_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to create match in week {week}"))?;
        Ok(Match {
            id,
            league_id,
            week: week.to_string(),
            home_team_id,
            away_team_id,
            home_points: None,
            away_points: None,
            winner_team_id: None,
        })
    }

    pub fn get_match(&self, id: i64) -> Result<Option<Match>> {
        self.conn()
            .query_row(
                "SELECT id, league_id, week, home_team_id, away_team_id,
                        home_points, away_points, winner_team_id
                 FROM matches WHERE id = ?1",
                params![id],
                match_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load match {id}"))
    }

    pub fn list_matches(&self, league_id: i64) -> Result<Vec<Match>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, league_id, week, home_team_id, away_team_id,
                    home_points, away_points, winner_team_id
             FROM matches WHERE league_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![league_id], match_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list matches for league {league_id}"))
    }

    pub fn list_matches_for_week(&self, league_id: i64, week: &str) -> Result<Vec<Match>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, league_id, week, home_team_id, away_team_id,
                    home_points, away_points, winner_team_id
             FROM matches WHERE league_id = ?1 AND week = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![league_id, week], match_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list matches for week {week}"))
    }

    pub fn week_has_matches(&self, league_id: i64, week: &str) -> Result<bool> {
        let hit = self
            .conn()
            .query_row(
                "SELECT 1 FROM matches WHERE league_id = ?1 AND week = ?2 LIMIT 1",
                params![league_id, week],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("failed to check matches for week {week}"))?;
        Ok(hit.is_some())
    }

    /// Distinct week labels, ascending. Label format makes this chronological
    /// within a season.
    pub fn list_weeks(&self, league_id: i64) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT week FROM matches WHERE league_id = ?1 ORDER BY week",
        )?;
        let rows = stmt.query_map(params![league_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list weeks for league {league_id}"))
    }

    /// Weeks that still contain at least one unscored match, ascending.
    pub fn list_unscored_weeks(&self, league_id: i64) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT week FROM matches
             WHERE league_id = ?1 AND (home_points IS NULL OR away_points IS NULL)
             ORDER BY week",
        )?;
        let rows = stmt.query_map(params![league_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list unscored weeks for league {league_id}"))
    }

    pub fn list_weeks_with_suffix(&self, league_id: i64, suffix: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT week FROM matches
             WHERE league_id = ?1 AND week LIKE '%' || ?2
             ORDER BY week",
        )?;
        let rows = stmt.query_map(params![league_id, suffix], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list `{suffix}` weeks for league {league_id}"))
    }

    pub fn record_match_result(
        &self,
        match_id: i64,
        home_points: f64,
        away_points: f64,
        winner_team_id: Option<i64>,
    ) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE matches
                 SET home_points = ?2, away_points = ?3, winner_team_id = ?4
                 WHERE id = ?1",
                params![match_id, home_points, away_points, winner_team_id],
            )
            .with_context(|| format!("failed to record result for match {match_id}"))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Team scores
    // -----------------------------------------------------------------------

    pub fn upsert_team_score(
        &self,
        league_id: i64,
        team_id: i64,
        period: &str,
        points: f64,
    ) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO team_scores (league_id, team_id, period, points)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (league_id, team_id, period)
                 DO UPDATE SET points = excluded.points",
                params![league_id, team_id, period, points],
            )
            .with_context(|| format!("failed to upsert score for team {team_id} in {period}"))?;
        Ok(())
    }

    pub fn scores_for_period(&self, league_id: i64, period: &str) -> Result<Vec<TeamScore>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, league_id, team_id, period, points
             FROM team_scores WHERE league_id = ?1 AND period = ?2 ORDER BY team_id",
        )?;
        let rows = stmt.query_map(params![league_id, period], score_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list scores for period {period}"))
    }

    /// All weekly snapshots for a league, ordered by period then team.
    pub fn list_team_scores(&self, league_id: i64) -> Result<Vec<TeamScore>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, league_id, team_id, period, points
             FROM team_scores WHERE league_id = ?1 ORDER BY period, team_id",
        )?;
        let rows = stmt.query_map(params![league_id], score_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list scores for league {league_id}"))
    }

    /// Most recent scored period by label order, if any period has been closed.
    pub fn latest_scored_period(&self, league_id: i64) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT MAX(period) FROM team_scores WHERE league_id = ?1",
                params![league_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to find latest scored period for league {league_id}"))
    }

    // -----------------------------------------------------------------------
    // Securities catalog
    // -----------------------------------------------------------------------

    pub fn upsert_security(&self, security: &Security) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO securities
                     (symbol, name, sector, is_etf, market_cap, primary_bucket, adp, proj_points)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (symbol) DO UPDATE SET
                     name = excluded.name,
                     sector = excluded.sector,
                     is_etf = excluded.is_etf,
                     market_cap = excluded.market_cap,
                     primary_bucket = excluded.primary_bucket,
                     adp = excluded.adp,
                     proj_points = excluded.proj_points",
                params![
                    security.symbol,
                    security.name,
                    security.sector,
                    security.is_etf,
                    security.market_cap,
                    security.primary_bucket.map(Bucket::as_str),
                    security.adp,
                    security.proj_points,
                ],
            )
            .with_context(|| format!("failed to upsert security `{}`", security.symbol))?;
        Ok(())
    }

    pub fn get_security(&self, symbol: &str) -> Result<Option<Security>> {
        self.conn()
            .query_row(
                "SELECT symbol, name, sector, is_etf, market_cap, primary_bucket, adp, proj_points
                 FROM securities WHERE symbol = ?1",
                params![symbol],
                security_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load security `{symbol}`"))
    }

    /// Catalog entries no team in the league has rostered, optionally filtered
    /// by a symbol/name substring. Null sort keys always sort last.
    pub fn list_unrostered_securities(
        &self,
        league_id: i64,
        query: Option<&str>,
        sort: FreeAgentSort,
    ) -> Result<Vec<Security>> {
        let order = match sort {
            FreeAgentSort::Symbol => "symbol ASC",
            FreeAgentSort::MarketCap => "market_cap IS NULL, market_cap DESC, symbol ASC",
            FreeAgentSort::Adp => "adp IS NULL, adp ASC, symbol ASC",
            FreeAgentSort::ProjPoints => "proj_points IS NULL, proj_points DESC, symbol ASC",
        };
        let sql = format!(
            "SELECT symbol, name, sector, is_etf, market_cap, primary_bucket, adp, proj_points
             FROM securities
             WHERE symbol NOT IN (
                 SELECT rs.symbol FROM roster_slots rs
                 JOIN teams t ON t.id = rs.team_id
                 WHERE t.league_id = ?1
             )
             AND (?2 IS NULL OR symbol LIKE '%' || ?2 || '%' OR name LIKE '%' || ?2 || '%')
             ORDER BY {order}"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![league_id, query], security_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to list free agents for league {league_id}"))
    }

    // -----------------------------------------------------------------------
    // Prices
    // -----------------------------------------------------------------------

    pub fn upsert_price(&self, price: &Price) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO prices (symbol, date, open, close)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (symbol, date) DO UPDATE SET
                     open = excluded.open,
                     close = excluded.close",
                params![
                    price.symbol,
                    price.date.format("%Y-%m-%d").to_string(),
                    price.open,
                    price.close,
                ],
            )
            .with_context(|| format!("failed to upsert price for `{}`", price.symbol))?;
        Ok(())
    }

    /// Price rows for `symbol` within `[start, end]`, date-ascending.
    pub fn prices_in_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Price>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT symbol, date, open, close
             FROM prices
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date",
        )?;
        let rows = stmt.query_map(
            params![
                symbol,
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string(),
            ],
            price_from_row,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to load prices for `{symbol}`"))
    }

    // -----------------------------------------------------------------------
    // Idempotency entries
    // -----------------------------------------------------------------------

    pub fn idempotency_lookup(&self, key: &str) -> Result<Option<(String, String)>> {
        self.conn()
            .query_row(
                "SELECT response, created_at FROM idempotency_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("failed to look up idempotency entry")
    }

    pub fn idempotency_store(&self, key: &str, response: &str, created_at: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO idempotency_entries (key, response, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET
                     response = excluded.response,
                     created_at = excluded.created_at",
                params![key, response, created_at],
            )
            .context("failed to store idempotency entry")?;
        Ok(())
    }

    /// Drop entries created before `cutoff`; timestamps share a fixed format,
    /// so string comparison is chronological.
    pub fn idempotency_purge_older_than(&self, cutoff: &str) -> Result<usize> {
        self.conn()
            .execute(
                "DELETE FROM idempotency_entries WHERE created_at < ?1",
                params![cutoff],
            )
            .context("failed to purge idempotency entries")
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
