//! Progress and badge bookkeeping, one record set per learning path.
//!
//! Every record is a JSON document in the key-value store. A record
//! that fails to parse falls back to its empty default rather than
//! erroring; progress data is best-effort by design of the product.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{KeyValueStore, StoreError};

const COMPLETION_POINTS: u32 = 10;

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialize failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type ProgressResult<T> = Result<T, ProgressError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub name: String,
    pub icon: String,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonEntry {
    pub exercise_id: String,
    pub completed_at: DateTime<Utc>,
}

/// Accumulated progress on one learning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default = "default_level")]
    pub level: u32,

    #[serde(default)]
    pub completed_lessons: Vec<LessonEntry>,

    #[serde(default)]
    pub badges: Vec<Badge>,

    #[serde(default)]
    pub points: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            level: default_level(),
            completed_lessons: Vec::new(),
            badges: Vec::new(),
            points: 0,
        }
    }
}

fn default_level() -> u32 {
    1
}

/// Reads and updates progress records in the key-value store.
pub struct ProgressTracker {
    store: Arc<dyn KeyValueStore>,
}

impl ProgressTracker {
    const HINTS_KEY: &'static str = "hints_used";

    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn completed_key(path: &str) -> String {
        format!("completed_{path}")
    }

    fn progress_key(path: &str) -> String {
        format!("progress_{path}")
    }

    pub async fn completed(&self, path: &str) -> ProgressResult<Vec<String>> {
        self.read_or_default(&Self::completed_key(path)).await
    }

    pub async fn is_completed(&self, path: &str, exercise_id: &str) -> ProgressResult<bool> {
        Ok(self
            .completed(path)
            .await?
            .iter()
            .any(|id| id == exercise_id))
    }

    pub async fn progress(&self, path: &str) -> ProgressResult<Progress> {
        self.read_or_default(&Self::progress_key(path)).await
    }

    /// Records a first-time completion: appends to the completed set,
    /// adds points and a timestamped lesson entry, and raises the level
    /// (with a badge) when `level` exceeds the stored one. Completing
    /// an already-completed exercise changes nothing.
    pub async fn record_completion(
        &self,
        path: &str,
        exercise_id: &str,
        level: u32,
    ) -> ProgressResult<Progress> {
        let mut completed = self.completed(path).await?;
        if completed.iter().any(|id| id == exercise_id) {
            debug!(exercise_id, "exercise already completed, progress unchanged");
            return self.progress(path).await;
        }
        completed.push(exercise_id.to_string());
        self.write(&Self::completed_key(path), &completed).await?;

        let mut progress = self.progress(path).await?;
        progress.completed_lessons.push(LessonEntry {
            exercise_id: exercise_id.to_string(),
            completed_at: Utc::now(),
        });
        progress.points += COMPLETION_POINTS;
        if level > progress.level {
            progress.level = level;
            progress.badges.push(Badge {
                name: format!("Level {level} Master"),
                icon: "🏆".to_string(),
                awarded_at: Utc::now(),
            });
        }
        self.write(&Self::progress_key(path), &progress).await?;
        Ok(progress)
    }

    pub async fn hints_used(&self) -> ProgressResult<Vec<String>> {
        self.read_or_default(Self::HINTS_KEY).await
    }

    /// Marks a hint as viewed for an exercise, once.
    pub async fn record_hint_used(&self, exercise_id: &str) -> ProgressResult<()> {
        let mut hints = self.hints_used().await?;
        if hints.iter().any(|id| id == exercise_id) {
            return Ok(());
        }
        hints.push(exercise_id.to_string());
        self.write(Self::HINTS_KEY, &hints).await
    }

    async fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> ProgressResult<T> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(key, error = %e, "corrupted progress record, starting fresh");
                Ok(T::default())
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> ProgressResult<()> {
        let json = serde_json::to_string(value)?;
        self.store.put(key, &json).await?;
        Ok(())
    }
}
