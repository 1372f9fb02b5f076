use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use pitchrs::logging::init_logging;
use pitchrs::store::{MetricsStore, PlayerRegistry, PredictionStore, SampleStore};
use pitchrs::{
    AnalyticsConfig, AnalyticsEngine, ImportManager, InMemoryStore, LogLevel, Player, Prediction,
    Sample, SessionMetrics, SqliteStore,
};

/// PitchRS - Football GPS Analytics CLI
///
/// Turns wearable tracker telemetry into per-session movement, load and
/// tactical metrics, and scores fatigue, injury risk, performance and
/// positioning.
#[derive(Parser)]
#[command(name = "pitchrs")]
#[command(author = "PitchRS Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Football GPS Analytics CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// SQLite database to persist samples, metrics and predictions
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute session metrics for every player and session in a samples file
    Metrics {
        /// Samples file or directory (CSV, JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Only this session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Score a player or session
    Score {
        /// Samples file or directory (CSV, JSON)
        #[arg(short, long, global = true)]
        file: Option<PathBuf>,

        #[command(subcommand)]
        scorer: ScoreCommand,
    },
}

#[derive(Subcommand)]
enum ScoreCommand {
    /// In-session fatigue for one player
    Fatigue {
        #[arg(short, long)]
        player: String,
        #[arg(short, long)]
        session: String,
    },

    /// Injury risk from the player's recent session history
    Injury {
        #[arg(short, long)]
        player: String,
    },

    /// Performance plan from the player's recent session history
    Performance {
        #[arg(short, long)]
        player: String,

        /// Playing role (forward, midfielder, defender, goalkeeper)
        #[arg(short, long)]
        role: Option<String>,

        /// JSON file with registered players
        #[arg(long, value_name = "FILE")]
        players: Option<PathBuf>,
    },

    /// Team tactical analysis for a session
    Tactical {
        #[arg(short, long)]
        session: String,
    },

    /// Positioning advice for one player in a session
    Position {
        #[arg(short, long)]
        player: String,
        #[arg(short, long)]
        session: String,
    },
}

#[derive(Tabled)]
struct MetricsRow {
    #[tabled(rename = "Player")]
    player: String,
    #[tabled(rename = "Session")]
    session: String,
    #[tabled(rename = "Distance (m)")]
    distance: String,
    #[tabled(rename = "Max (km/h)")]
    max_speed: String,
    #[tabled(rename = "Sprints")]
    sprints: u32,
    #[tabled(rename = "HI dist (m)")]
    high_intensity: String,
    #[tabled(rename = "Load")]
    player_load: String,
    #[tabled(rename = "ACWR")]
    ratio: String,
    #[tabled(rename = "Coverage (%)")]
    coverage: String,
}

impl From<&SessionMetrics> for MetricsRow {
    fn from(metrics: &SessionMetrics) -> Self {
        MetricsRow {
            player: metrics.player_id.clone(),
            session: metrics.session_id.clone(),
            distance: format!("{:.0}", metrics.movement.total_distance),
            max_speed: format!("{:.1}", metrics.movement.max_speed),
            sprints: metrics.movement.sprint_count,
            high_intensity: format!("{:.0}", metrics.movement.high_intensity_distance),
            player_load: format!("{:.1}", metrics.movement.player_load),
            ratio: format!("{:.2}", metrics.load.acute_chronic_ratio),
            coverage: format!("{:.0}", metrics.tactical.field_coverage),
        }
    }
}

#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalyticsConfig::load_from_file(path)?,
        None => AnalyticsConfig::load_or_default(),
    };
    if cli.verbose > 0 {
        config.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    config.validate()?;
    init_logging(&config.logging)?;

    match &cli.db {
        Some(path) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("Failed to open database: {}", path.display()))?;
            run(&cli, config, Arc::new(store))
        }
        None => run(&cli, config, Arc::new(InMemoryStore::new())),
    }
}

fn run<S>(cli: &Cli, config: AnalyticsConfig, store: Arc<S>) -> Result<()>
where
    S: SampleStore + MetricsStore + PlayerRegistry + PredictionStore + 'static,
{
    let engine = AnalyticsEngine::with_store(config, store.clone());

    match &cli.command {
        Commands::Metrics { file, session } => {
            println!("{}", "Computing session metrics...".green().bold());
            let samples = load_samples(file)?;
            let mut computed = materialize_metrics(&engine, store.as_ref(), &samples)?;
            if let Some(session) = session {
                computed.retain(|m| &m.session_id == session);
            }

            if computed.is_empty() {
                println!("{}", "No session had enough samples".yellow());
                return Ok(());
            }

            let rows: Vec<MetricsRow> = computed.iter().map(MetricsRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!("{}", format!("✓ {} session metrics computed", computed.len()).green());
        }

        Commands::Score { file, scorer } => {
            let reference = match file {
                Some(file) => {
                    let samples = load_samples(file)?;
                    materialize_metrics(&engine, store.as_ref(), &samples)?;
                    samples.iter().map(|s| s.timestamp).max()
                }
                None => None,
            };
            let as_of = reference.unwrap_or_else(Utc::now);

            let prediction = match scorer {
                ScoreCommand::Fatigue { player, session } => {
                    println!("{}", "Scoring fatigue...".cyan().bold());
                    engine.score_fatigue(player, session)?
                }
                ScoreCommand::Injury { player } => {
                    println!("{}", "Scoring injury risk...".red().bold());
                    engine.score_injury_risk_as_of(player, as_of)?
                }
                ScoreCommand::Performance {
                    player,
                    role,
                    players,
                } => {
                    println!("{}", "Scoring performance...".blue().bold());
                    if let Some(path) = players {
                        register_players(store.as_ref(), path)?;
                    }
                    if store.player(player)?.is_none() {
                        store.register_player(adhoc_player(player, role.clone()))?;
                    }
                    engine.score_performance_as_of(player, as_of)?
                }
                ScoreCommand::Tactical { session } => {
                    println!("{}", "Scoring tactical analysis...".magenta().bold());
                    engine.score_tactical(session)?
                }
                ScoreCommand::Position { player, session } => {
                    println!("{}", "Scoring optimal position...".yellow().bold());
                    engine.score_optimal_position(player, session)?
                }
            };

            print_prediction(&prediction);
        }
    }

    Ok(())
}

fn load_samples(path: &Path) -> Result<Vec<Sample>> {
    let manager = ImportManager::new();
    if path.is_dir() {
        manager.import_directory(path)
    } else {
        manager.import_file(path)
    }
}

/// Store samples and persist full-session metrics for each player and session
///
/// Each session's metrics are stamped with its last sample so that history
/// windows line up with when the sessions took place.
fn materialize_metrics<S>(
    engine: &AnalyticsEngine,
    store: &S,
    samples: &[Sample],
) -> Result<Vec<SessionMetrics>>
where
    S: SampleStore + MetricsStore,
{
    for sample in samples {
        store.append(sample.clone())?;
    }

    // Oldest first, so each session sees the ones before it as load history
    let mut last_seen: Vec<(DateTime<Utc>, String, String)> = session_end_times(samples)
        .into_iter()
        .map(|((player_id, session_id), ended)| (ended, player_id, session_id))
        .collect();
    last_seen.sort();

    let mut computed = Vec::new();
    for (ended, player_id, session_id) in last_seen {
        if let Some(metrics) = engine.compute_session_metrics_as_of(&player_id, &session_id, ended)? {
            store.save_metrics(&metrics)?;
            computed.push(metrics);
        }
    }
    Ok(computed)
}

/// Timestamp of the last sample of each (player, session)
fn session_end_times(samples: &[Sample]) -> BTreeMap<(String, String), DateTime<Utc>> {
    let mut ends: BTreeMap<(String, String), DateTime<Utc>> = BTreeMap::new();
    for sample in samples {
        let ended = ends
            .entry((sample.player_id.clone(), sample.session_id.clone()))
            .or_insert(sample.timestamp);
        if sample.timestamp > *ended {
            *ended = sample.timestamp;
        }
    }
    ends
}

fn register_players<S: PlayerRegistry>(store: &S, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read players file: {}", path.display()))?;
    let players: Vec<Player> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse players file: {}", path.display()))?;

    for player in players {
        store.register_player(player)?;
    }
    Ok(())
}

fn adhoc_player(player_id: &str, role: Option<String>) -> Player {
    Player {
        id: player_id.to_string(),
        name: player_id.to_string(),
        position: role,
        jersey_number: None,
        team_id: None,
        date_of_birth: None,
        height: None,
        weight: None,
        device_id: None,
        active: true,
        profile: None,
    }
}

fn print_prediction(prediction: &Prediction) {
    println!(
        "  {} {}",
        prediction.prediction_type.as_str().bold(),
        format!("(confidence {:.2})", prediction.confidence).dimmed()
    );

    let rows: Vec<OutputRow> = prediction
        .output
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(field, value)| OutputRow {
                    field: field.clone(),
                    value: display_value(value),
                })
                .collect()
        })
        .unwrap_or_default();

    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:.3}", f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pitchrs::{Movement, Position};

    fn create_sample(player_id: &str, session_id: &str, seconds: i64) -> Sample {
        Sample {
            player_id: player_id.to_string(),
            session_id: session_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 9, 14, 19, 45, 0).unwrap()
                + Duration::seconds(seconds),
            position: Position {
                latitude: 0.0004,
                longitude: 0.0004,
                altitude: 0.0,
                accuracy: 2.0,
                satellites: 9,
            },
            movement: Movement {
                speed: 12.0,
                acceleration: 0.0,
                direction: 0.0,
                imu: None,
            },
            biometrics: None,
            environmental: None,
        }
    }

    #[test]
    fn test_session_end_times_takes_latest_sample() {
        let samples = vec![
            create_sample("p1", "s1", 30),
            create_sample("p1", "s1", 90),
            create_sample("p1", "s1", 10),
            create_sample("p2", "s1", 5),
            create_sample("p1", "s2", 600),
        ];
        let start = samples[0].timestamp - Duration::seconds(30);

        let ends = session_end_times(&samples);
        assert_eq!(ends.len(), 3);
        assert_eq!(ends[&("p1".to_string(), "s1".to_string())], start + Duration::seconds(90));
        assert_eq!(ends[&("p2".to_string(), "s1".to_string())], start + Duration::seconds(5));
        assert_eq!(ends[&("p1".to_string(), "s2".to_string())], start + Duration::seconds(600));
        assert!(session_end_times(&[]).is_empty());
    }
}
