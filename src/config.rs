use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PitchRsError;
use crate::logging::LogConfig;

/// Main analytics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Speed, acceleration and heart-rate thresholds
    pub thresholds: ThresholdConfig,

    /// History and trailing-window sizes
    pub windows: WindowConfig,

    /// Synthetic field calibration
    pub field: FieldConfig,

    /// Team-shape analysis parameters
    pub tactical: TacticalConfig,

    /// Which acute/chronic load model to use
    pub load_model: LoadModelKind,

    /// Logging setup
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Named thresholds for feature extraction and scoring
///
/// Speed bands are in km/h. A speed belongs to the band whose lower bound it
/// strictly exceeds, so exactly 24.0 km/h is high intensity, not sprinting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Upper bound of the walking band
    pub walking_max_kmh: f64,

    /// Upper bound of the jogging band
    pub jogging_max_kmh: f64,

    /// Upper bound of the running band
    pub running_max_kmh: f64,

    /// Upper bound of the high-intensity band, above which a player is sprinting
    pub sprint_kmh: f64,

    /// Acceleration/deceleration event threshold in m/s²
    pub acceleration_ms2: f64,

    /// Vertical accelerometer reading that counts as a jump, in m/s²
    pub jump_vertical_ms2: f64,

    /// Multiplier applied to accelerometer magnitude for player load
    pub player_load_scale: f64,

    /// Speed above which a sample counts as a high-intensity effort for fatigue analysis
    pub effort_speed_kmh: f64,

    /// Assumed maximum heart rate when no profile value is known
    pub assumed_max_hr: u16,

    /// Fraction of max heart rate where the high heart-rate zone starts
    pub high_hr_zone_fraction: f64,
}

impl ThresholdConfig {
    /// Lower bound of the high-intensity band
    pub fn high_intensity_kmh(&self) -> f64 {
        self.running_max_kmh
    }

    /// Heart rate above which a reading is in zone 4 or higher
    pub fn high_hr_zone_bpm(&self) -> f64 {
        (self.assumed_max_hr as f64 * self.high_hr_zone_fraction).floor()
    }
}

/// History and trailing window sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Trailing window for real-time metrics, in seconds
    pub incremental_window_secs: i64,

    /// History used for injury-risk scoring, in days
    pub injury_history_days: i64,

    /// History used for performance optimisation, in days
    pub performance_history_days: i64,

    /// Acute window for the rolling load model, in days
    pub acute_load_days: i64,

    /// Chronic window for the rolling load model, in days
    pub chronic_load_days: i64,
}

/// Synthetic field calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Degrees-to-field-unit multiplier of the linear projection
    pub projection_scale: f64,

    /// Grid divisions per axis for heat maps
    pub grid_divisions: u32,

    /// Field extent in field units along each axis
    pub field_size: f64,
}

/// Team-shape analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalConfig {
    /// Minimum distinct players for formation and compactness analysis
    pub min_players: usize,

    /// Average Y below which a player is considered too deep
    pub defensive_line_y: f64,

    /// Average Y above which a player is considered too advanced
    pub attacking_line_y: f64,

    /// Speed above which a sample counts towards transition efficiency, in km/h
    pub transition_speed_kmh: f64,

    /// Speed above which a sample counts towards average transition speed, in km/h
    pub transition_tracking_speed_kmh: f64,

    /// Positional spread, in field units, above which a player counts as mobile
    pub mobile_variability: f64,
}

/// Acute/chronic load model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadModelKind {
    /// Per-session proxy: chronic derived from acute, ratio fixed at 1.25
    Proxy,
    /// Rolling windows over stored session history
    Rolling,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let now = Utc::now();

        AnalyticsConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            thresholds: ThresholdConfig::default(),
            windows: WindowConfig::default(),
            field: FieldConfig::default(),
            tactical: TacticalConfig::default(),
            load_model: LoadModelKind::Proxy,
            logging: LogConfig::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            walking_max_kmh: 7.0,
            jogging_max_kmh: 14.0,
            running_max_kmh: 19.8,
            sprint_kmh: 24.0,
            acceleration_ms2: 3.0,
            jump_vertical_ms2: 15.0,
            player_load_scale: 0.01,
            effort_speed_kmh: 20.0,
            assumed_max_hr: 190,
            high_hr_zone_fraction: 0.85,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            incremental_window_secs: 300,
            injury_history_days: 30,
            performance_history_days: 14,
            acute_load_days: 7,
            chronic_load_days: 28,
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        FieldConfig {
            projection_scale: 100_000.0,
            grid_divisions: 3,
            field_size: 100.0,
        }
    }
}

impl Default for TacticalConfig {
    fn default() -> Self {
        TacticalConfig {
            min_players: 7,
            defensive_line_y: 30.0,
            attacking_line_y: 70.0,
            transition_speed_kmh: 20.0,
            transition_tracking_speed_kmh: 15.0,
            mobile_variability: 5.0,
        }
    }
}

/// Configuration management implementation
impl AnalyticsConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AnalyticsConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pitchrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %err,
                    "Config file not loaded, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Check that thresholds are ordered and windows are positive
    pub fn validate(&self) -> crate::error::Result<()> {
        let t = &self.thresholds;
        if !(t.walking_max_kmh < t.jogging_max_kmh
            && t.jogging_max_kmh < t.running_max_kmh
            && t.running_max_kmh < t.sprint_kmh)
        {
            return Err(PitchRsError::Configuration(format!(
                "speed bands must be strictly increasing: {} < {} < {} < {}",
                t.walking_max_kmh, t.jogging_max_kmh, t.running_max_kmh, t.sprint_kmh
            )));
        }

        if self.field.grid_divisions == 0 || self.field.field_size <= 0.0 {
            return Err(PitchRsError::Configuration(
                "field grid needs at least one division and a positive size".to_string(),
            ));
        }

        let w = &self.windows;
        if w.incremental_window_secs <= 0
            || w.injury_history_days <= 0
            || w.performance_history_days <= 0
            || w.acute_load_days <= 0
            || w.chronic_load_days < w.acute_load_days
        {
            return Err(PitchRsError::Configuration(
                "window sizes must be positive and the chronic window must cover the acute one"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
