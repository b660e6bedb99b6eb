use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};
use thiserror::Error;

use crate::world::{Pose, Region, WorldState};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io failure: {message}")]
    Io { message: String },
    #[error("config parse failure: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration of one coding exercise: identity, progress metadata,
/// and the engine/world tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseConfig {
    pub exercise_id: String,

    /// Learning path this exercise belongs to, the progress-record key.
    #[serde(default = "default_path")]
    pub path: String,

    /// Difficulty level; completing an exercise above the learner's
    /// current level raises it and awards a badge.
    #[serde(default = "default_level")]
    pub level: u32,

    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub world: WorldConfig,
}

impl ExerciseConfig {
    pub fn new(exercise_id: &str) -> Self {
        Self {
            exercise_id: exercise_id.to_string(),
            path: default_path(),
            level: default_level(),
            event_buffer_size: default_event_buffer_size(),
            engine: EngineConfig::default(),
            world: WorldConfig::default(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        from_file(path)
    }
}

/// Execution-engine tuning: how long one animated step takes and how
/// many world units one Move unit covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_step_duration", with = "duration_ms")]
    pub step_duration: Duration,

    #[serde(default = "default_step_scale")]
    pub step_scale: f64,
}

impl EngineConfig {
    /// Distance of one Move unit in world units, also the lookahead
    /// step used by path conditions.
    pub fn unit_step(&self) -> f64 {
        self.step_scale
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_duration: default_step_duration(),
            step_scale: default_step_scale(),
        }
    }
}

/// Static world layout: start pose, character size, and the obstacle
/// and goal regions of the exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub start: Pose,

    #[serde(default = "default_character_width")]
    pub character_width: f64,

    #[serde(default)]
    pub obstacles: Vec<Region>,

    #[serde(default)]
    pub goals: Vec<Region>,
}

impl WorldConfig {
    pub fn build(&self) -> WorldState {
        WorldState::new(
            self.start,
            self.character_width,
            self.obstacles.clone(),
            self.goals.clone(),
        )
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            start: Pose::default(),
            character_width: default_character_width(),
            obstacles: Vec::new(),
            goals: Vec::new(),
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> ConfigResult<T> {
    let file = File::open(path).map_err(|e| ConfigError::Io {
        message: e.to_string(),
    })?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

fn default_path() -> String {
    "coding".to_string()
}

fn default_level() -> u32 {
    1
}

fn default_event_buffer_size() -> usize {
    100
}

fn default_step_duration() -> Duration {
    Duration::from_millis(500)
}

fn default_step_scale() -> f64 {
    50.0
}

fn default_character_width() -> f64 {
    40.0
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
