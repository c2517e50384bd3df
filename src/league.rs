// League and team lifecycle: creation, membership, fixed-rule settings.

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::db::Database;
use crate::model::{BucketRequirements, League, RosterRules, ScoringMode, Team};

#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("league {0} not found")]
    NotFound(i64),
    #[error("league name `{0}` is already taken")]
    NameTaken(String),
    #[error("team name `{name}` is already taken in league {league_id}")]
    TeamNameTaken { league_id: i64, name: String },
    #[error("a non-empty name is required")]
    EmptyName,
    #[error("fixed rules cannot be changed: {fields:?}")]
    FixedRules { fields: Vec<&'static str> },
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// Create a league stamped with the house rules: 14 roster slots, 8
/// starters, and the standard bucket table.
pub fn create_league(db: &Database, name: &str, mode: ScoringMode) -> Result<League, LeagueError> {
    if name.trim().is_empty() {
        return Err(LeagueError::EmptyName);
    }
    if db.league_name_exists(name)? {
        return Err(LeagueError::NameTaken(name.to_string()));
    }
    let league = db.create_league(
        name,
        RosterRules::ROSTER_SLOTS,
        RosterRules::STARTERS,
        &BucketRequirements::default(),
        mode,
    )?;
    info!("created league {} (`{}`)", league.id, league.name);
    Ok(league)
}

/// Add a team to a league. Team names are unique per league and trimmed
/// before storage; a blank owner is stored as none.
pub fn join_team(
    db: &Database,
    league_id: i64,
    name: &str,
    owner: Option<&str>,
) -> Result<Team, LeagueError> {
    let league = db
        .get_league(league_id)?
        .ok_or(LeagueError::NotFound(league_id))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(LeagueError::EmptyName);
    }
    if db.team_name_exists(league.id, name)? {
        return Err(LeagueError::TeamNameTaken {
            league_id: league.id,
            name: name.to_string(),
        });
    }

    let owner = owner.map(str::trim).filter(|o| !o.is_empty());
    let team = db.create_team(league.id, name, owner)?;
    info!("team {} (`{}`) joined league {}", team.id, team.name, league.id);
    Ok(team)
}

/// Switch how the league scores matches. No-op when already in `mode`.
pub fn set_scoring_mode(
    db: &Database,
    league_id: i64,
    mode: ScoringMode,
) -> Result<League, LeagueError> {
    let mut league = db
        .get_league(league_id)?
        .ok_or(LeagueError::NotFound(league_id))?;
    if league.scoring_mode != mode {
        db.set_scoring_mode(league.id, mode)?;
        league.scoring_mode = mode;
        info!("league {} scoring mode set to {mode}", league.id);
    }
    Ok(league)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub roster_slots: Option<u32>,
    pub starters: Option<u32>,
    pub bucket_requirements: Option<BucketRequirements>,
}

/// Apply a settings request.
///
/// Roster size, starter count, and the bucket table are house rules:
/// naming any of them fails, whatever the value. An empty patch re-stamps
/// the stored row, repairing any drift, and returns the effective settings.
pub fn update_settings(
    db: &Database,
    league_id: i64,
    patch: &SettingsPatch,
) -> Result<League, LeagueError> {
    let mut league = db
        .get_league(league_id)?
        .ok_or(LeagueError::NotFound(league_id))?;

    let mut fields: Vec<&'static str> = Vec::new();
    if patch.roster_slots.is_some() {
        fields.push("roster_slots");
    }
    if patch.starters.is_some() {
        fields.push("starters");
    }
    if patch.bucket_requirements.is_some() {
        fields.push("bucket_requirements");
    }
    if !fields.is_empty() {
        return Err(LeagueError::FixedRules { fields });
    }

    let fixed = BucketRequirements::default();
    if league.roster_slots != RosterRules::ROSTER_SLOTS
        || league.starters != RosterRules::STARTERS
        || league.bucket_requirements != fixed
    {
        db.update_league_rules(
            league.id,
            RosterRules::ROSTER_SLOTS,
            RosterRules::STARTERS,
            &fixed,
        )?;
        info!("repaired drifted rule columns on league {}", league.id);
        league.roster_slots = RosterRules::ROSTER_SLOTS;
        league.starters = RosterRules::STARTERS;
        league.bucket_requirements = fixed;
    }
    Ok(league)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
