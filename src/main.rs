// League manager CLI entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Initialize tracing (log to file, not the terminal)
// 3. Load config
// 4. Open the database
// 5. Dispatch the subcommand, print the result as pretty JSON

use league_manager::boxscore;
use league_manager::catalog;
use league_manager::config;
use league_manager::db::Database;
use league_manager::draft;
use league_manager::idempotency::IdempotencyCache;
use league_manager::league;
use league_manager::model::{Bucket, FreeAgentSort, ScoringMode};
use league_manager::periods;
use league_manager::roster::lineup;
use league_manager::schedule;
use league_manager::scoring;
use league_manager::season;
use league_manager::standings;

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "bullpen")]
#[command(about = "Fantasy securities league manager", version)]
struct Cli {
    /// Path to the config file (default: bullpen.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a league under the fixed house rules
    CreateLeague {
        /// League name (must be unique)
        name: String,
        /// Scoring mode: PROJECTIONS or LIVE
        #[arg(long, default_value = "PROJECTIONS")]
        mode: String,
    },

    /// Add a team to a league
    AddTeam {
        league_id: i64,
        /// Team name (must be unique within the league)
        name: String,
        /// Owner display name
        #[arg(long)]
        owner: Option<String>,
    },

    /// Switch a league's scoring mode
    SetMode {
        league_id: i64,
        /// Scoring mode: PROJECTIONS or LIVE
        mode: String,
    },

    /// Show a league's effective settings, repairing any drift
    Settings { league_id: i64 },

    /// Seed the security catalog from a CSV file
    SeedSecurities {
        /// CSV with symbol,name,sector,is_etf,market_cap,primary_bucket,adp,proj_points
        path: PathBuf,
    },

    /// Import price history from a CSV file
    ImportPrices {
        /// CSV with symbol,date,open,close
        path: PathBuf,
    },

    /// Record a draft pick for a team
    Pick { team_id: i64, symbol: String },

    /// Claim a free agent for a team
    Claim {
        league_id: i64,
        team_id: i64,
        symbol: String,
        /// Bucket label for catalog-less symbols (e.g. SMALL_CAP)
        #[arg(long)]
        bucket: Option<String>,
    },

    /// Drop a rostered symbol back to free agency
    Drop {
        league_id: i64,
        team_id: i64,
        symbol: String,
    },

    /// Reassign the bucket on a roster slot
    SetBucket { slot_id: i64, bucket: String },

    /// List a team's roster slots
    Roster { team_id: i64 },

    /// List unrostered catalog securities
    FreeAgents {
        league_id: i64,
        /// Substring match on symbol or name
        #[arg(long)]
        query: Option<String>,
        /// Restrict to one bucket (e.g. LARGE_CAP)
        #[arg(long)]
        bucket: Option<String>,
        /// Sort order: adp, proj_points, market_cap, or symbol
        #[arg(long, default_value = "adp")]
        sort: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Activate exactly the given slots as the team's lineup
    SetLineup {
        team_id: i64,
        /// Slot ids to activate; everything else goes to the bench
        slot_ids: Vec<i64>,
    },

    /// Validate a team's current lineup against the starting requirements
    CheckLineup { team_id: i64 },

    /// Create one week of matchups
    ScheduleWeek {
        league_id: i64,
        /// Week label (default: the current ISO week)
        #[arg(long)]
        week: Option<String>,
    },

    /// Generate a round-robin season
    ScheduleSeason {
        league_id: i64,
        /// Base week label (default: the current ISO week)
        #[arg(long)]
        base_week: Option<String>,
        /// Rounds to generate; 0 plays one full round robin
        #[arg(long, default_value = "0")]
        weeks: u32,
    },

    /// Score and close one week (idempotency-guarded)
    CloseWeek {
        league_id: i64,
        week: String,
        /// Caller token for replay protection
        #[arg(long, default_value = "cli")]
        caller: String,
    },

    /// Close every remaining unscored week (idempotency-guarded)
    CloseSeason {
        league_id: i64,
        /// Caller token for replay protection
        #[arg(long, default_value = "cli")]
        caller: String,
    },

    /// Take the next step in the season: close a week or move the playoffs along
    Advance { league_id: i64 },

    /// Show the playoff bracket
    Bracket { league_id: i64 },

    /// Show the season state (regular, semis, finals, complete)
    State { league_id: i64 },

    /// League standings with ranks and games back
    Standings { league_id: i64 },

    /// Every team-week score on record
    History { league_id: i64 },

    /// Rank teams by the tiebreak ladder; no ids means the whole league
    Tiebreak {
        league_id: i64,
        team_ids: Vec<i64>,
    },

    /// Pythagorean power rankings
    Power { league_id: i64 },

    /// Elo ratings from the scored match history
    Elo {
        league_id: i64,
        /// K-factor override (default from config)
        #[arg(long)]
        k: Option<f64>,
    },

    /// League record book
    Records { league_id: i64 },

    /// Weekly awards, or season awards with --season
    Awards {
        league_id: i64,
        /// Week label (default: the latest scored week)
        #[arg(long)]
        week: Option<String>,
        /// Full-season awards instead of a single week
        #[arg(long)]
        season: bool,
    },

    /// Box score for one team and week
    Boxscore {
        league_id: i64,
        team_id: i64,
        /// Week label (default: the current ISO week)
        #[arg(long)]
        week: Option<String>,
    },

    /// Head-to-head matrix across the league
    H2h { league_id: i64 },

    /// Power, SOS, streak, and highlight report
    Insights { league_id: i64 },
}

fn main() -> anyhow::Result<()> {
    // 1. Parse the command line
    let cli = Cli::parse();

    // 2. Initialize tracing (log to file, not the terminal)
    init_tracing()?;
    info!("bullpen starting up");

    // 3. Load config
    let config = config::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    // 4. Open the database
    let db_path = config.db_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("database opened at {}", db_path.display());

    // 5. Dispatch the subcommand, print the result as pretty JSON
    let value = run_command(&db, &config, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&value)?);

    Ok(())
}

/// Run one subcommand against the database and return its JSON response.
fn run_command(db: &Database, config: &config::Config, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::CreateLeague { name, mode } => {
            let mode = parse_mode(&mode)?;
            Ok(serde_json::to_value(league::create_league(db, &name, mode)?)?)
        }

        Command::AddTeam {
            league_id,
            name,
            owner,
        } => Ok(serde_json::to_value(league::join_team(
            db,
            league_id,
            &name,
            owner.as_deref(),
        )?)?),

        Command::SetMode { league_id, mode } => {
            let mode = parse_mode(&mode)?;
            Ok(serde_json::to_value(league::set_scoring_mode(
                db, league_id, mode,
            )?)?)
        }

        Command::Settings { league_id } => Ok(serde_json::to_value(league::update_settings(
            db,
            league_id,
            &league::SettingsPatch::default(),
        )?)?),

        Command::SeedSecurities { path } => {
            Ok(serde_json::to_value(catalog::import_securities(db, &path)?)?)
        }

        Command::ImportPrices { path } => {
            Ok(serde_json::to_value(catalog::import_prices(db, &path)?)?)
        }

        Command::Pick { team_id, symbol } => {
            Ok(serde_json::to_value(draft::make_pick(db, team_id, &symbol)?)?)
        }

        Command::Claim {
            league_id,
            team_id,
            symbol,
            bucket,
        } => Ok(serde_json::to_value(draft::claim(
            db,
            league_id,
            team_id,
            &symbol,
            bucket.as_deref(),
        )?)?),

        Command::Drop {
            league_id,
            team_id,
            symbol,
        } => Ok(serde_json::to_value(draft::drop_symbol(
            db, league_id, team_id, &symbol,
        )?)?),

        Command::SetBucket { slot_id, bucket } => Ok(serde_json::to_value(
            draft::set_slot_bucket(db, slot_id, &bucket)?,
        )?),

        Command::Roster { team_id } => Ok(serde_json::to_value(draft::team_roster(db, team_id)?)?),

        Command::FreeAgents {
            league_id,
            query,
            bucket,
            sort,
            limit,
        } => {
            let bucket = bucket.as_deref().map(parse_bucket).transpose()?;
            let sort = parse_sort(&sort)?;
            Ok(serde_json::to_value(draft::free_agents(
                db,
                league_id,
                query.as_deref(),
                bucket,
                sort,
                limit,
            )?)?)
        }

        Command::SetLineup { team_id, slot_ids } => Ok(serde_json::to_value(
            lineup::set_lineup(db, team_id, &slot_ids)?,
        )?),

        Command::CheckLineup { team_id } => Ok(serde_json::to_value(lineup::check_team_lineup(
            db, team_id,
        )?)?),

        Command::ScheduleWeek { league_id, week } => {
            let week = week.unwrap_or_else(periods::current_week_label);
            Ok(serde_json::to_value(schedule::schedule_week(
                db, league_id, &week,
            )?)?)
        }

        Command::ScheduleSeason {
            league_id,
            base_week,
            weeks,
        } => {
            let base = base_week.unwrap_or_else(periods::current_week_label);
            Ok(serde_json::to_value(schedule::schedule_season(
                db, league_id, &base, weeks,
            )?)?)
        }

        Command::CloseWeek {
            league_id,
            week,
            caller,
        } => {
            let cache = IdempotencyCache::new(db, config.idempotency.ttl_hours);
            let args = serde_json::json!({ "league_id": league_id, "week": week });
            let (mut value, replayed) = cache.guard(&caller, "close_week", &args, || {
                Ok(serde_json::to_value(scoring::close_week(
                    db, league_id, &week,
                )?)?)
            })?;
            annotate_replay(&mut value, replayed);
            Ok(value)
        }

        Command::CloseSeason { league_id, caller } => {
            let cache = IdempotencyCache::new(db, config.idempotency.ttl_hours);
            let args = serde_json::json!({ "league_id": league_id });
            let (mut value, replayed) = cache.guard(&caller, "close_season", &args, || {
                Ok(serde_json::to_value(scoring::close_season(db, league_id)?)?)
            })?;
            annotate_replay(&mut value, replayed);
            Ok(value)
        }

        Command::Advance { league_id } => Ok(serde_json::to_value(season::advance(db, league_id)?)?),

        Command::Bracket { league_id } => Ok(serde_json::to_value(season::bracket(db, league_id)?)?),

        Command::State { league_id } => {
            let state = season::current_state(db, league_id)?;
            Ok(serde_json::json!({ "league_id": league_id, "state": state }))
        }

        Command::Standings { league_id } => Ok(serde_json::to_value(standings::table::table(
            db, league_id,
        )?)?),

        Command::History { league_id } => Ok(serde_json::to_value(standings::table::history(
            db, league_id,
        )?)?),

        Command::Tiebreak {
            league_id,
            team_ids,
        } => {
            let among = if team_ids.is_empty() {
                None
            } else {
                Some(team_ids.as_slice())
            };
            Ok(serde_json::to_value(standings::tiebreak::resolve(
                db, league_id, among,
            )?)?)
        }

        Command::Power { league_id } => Ok(serde_json::to_value(
            standings::ratings::power_rankings(db, league_id)?,
        )?),

        Command::Elo { league_id, k } => {
            let k = k.unwrap_or(config.ratings.elo_k);
            Ok(serde_json::to_value(standings::ratings::elo(
                db, league_id, k,
            )?)?)
        }

        Command::Records { league_id } => Ok(serde_json::to_value(
            standings::records::league_records(db, league_id)?,
        )?),

        Command::Awards {
            league_id,
            week,
            season,
        } => {
            if season {
                Ok(serde_json::to_value(standings::awards::season(
                    db, league_id,
                )?)?)
            } else {
                Ok(serde_json::to_value(standings::awards::weekly(
                    db,
                    league_id,
                    week.as_deref(),
                )?)?)
            }
        }

        Command::Boxscore {
            league_id,
            team_id,
            week,
        } => {
            let week = week.unwrap_or_else(periods::current_week_label);
            Ok(serde_json::to_value(boxscore::team_box_score(
                db, league_id, team_id, &week,
            )?)?)
        }

        Command::H2h { league_id } => Ok(serde_json::to_value(standings::table::h2h_matrix(
            db, league_id,
        )?)?),

        Command::Insights { league_id } => Ok(serde_json::to_value(
            standings::insights::league_insights(db, league_id)?,
        )?),
    }
}

/// Stamp the replay flag onto a close response.
fn annotate_replay(value: &mut Value, replayed: bool) {
    if let Some(object) = value.as_object_mut() {
        object.insert("replayed".to_string(), Value::Bool(replayed));
    }
}

fn parse_mode(label: &str) -> anyhow::Result<ScoringMode> {
    ScoringMode::parse(label).ok_or_else(|| anyhow!("unknown scoring mode: {label}"))
}

fn parse_bucket(label: &str) -> anyhow::Result<Bucket> {
    Bucket::parse(label).ok_or_else(|| anyhow!("unknown bucket: {label}"))
}

fn parse_sort(label: &str) -> anyhow::Result<FreeAgentSort> {
    FreeAgentSort::parse(label).ok_or_else(|| anyhow!("unknown sort order: {label}"))
}

/// Initialize tracing to log to a file (not the terminal, which carries the
/// command's JSON output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("bullpen.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("league_manager=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
