// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::PathBuf, time::Duration};

use beacon_queue::queue_file_path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smart_default::SmartDefault;
use snafu::{ResultExt, ensure};

use crate::error::{InvalidConfigSnafu, QueueSnafu, Result};

/// Hard cap on queued elements; the oldest is evicted beyond it.
pub const MAX_QUEUE_SIZE: usize = 1000;
/// Largest serialized payload accepted into the queue, in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 15_000;
/// Upper bound on the element bytes of one upload batch.
pub const MAX_BATCH_SIZE: usize = 475_000;

pub const DEFAULT_FLUSH_QUEUE_SIZE: usize = 20;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
/// Largest accepted `flush_queue_size`.
pub const MAX_FLUSH_QUEUE_SIZE: usize = 250;

/// Per-instance dispatcher configuration.
///
/// ```
/// use beacon_dispatcher::DispatcherConfig;
///
/// let config: DispatcherConfig =
///     serde_json::from_str(r#"{"tag":"mobile","flush_queue_size":50}"#).unwrap();
/// assert_eq!(config.flush_interval.as_secs(), 30);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Identity of the dispatcher; names its queue file.
    #[default("beacon".to_string())]
    pub tag: String,

    /// Directory holding the queue file.
    #[default(PathBuf::from("./beacon-disk-queue"))]
    pub directory: PathBuf,

    /// Queue size that triggers a flush.
    #[default(DEFAULT_FLUSH_QUEUE_SIZE)]
    pub flush_queue_size: usize,

    /// Period of the flush timer.
    #[default(DEFAULT_FLUSH_INTERVAL)]
    #[serde(rename = "flush_interval_ms", with = "duration_ms")]
    pub flush_interval: Duration,

    /// Settings of the integrations bundled into the host application,
    /// merged into every payload's `integrations` object.
    pub bundled_integrations: Map<String, Value>,
}

impl DispatcherConfig {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(tag: S, directory: P) -> Self {
        Self {
            tag: tag.into(),
            directory: directory.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn with_flush_queue_size(mut self, size: usize) -> Self {
        self.flush_queue_size = size;
        self
    }

    #[must_use]
    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use]
    pub fn with_bundled_integration<K: Into<String>>(mut self, key: K, settings: Value) -> Self {
        self.bundled_integrations.insert(key.into(), settings);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_FLUSH_QUEUE_SIZE).contains(&self.flush_queue_size),
            InvalidConfigSnafu {
                reason: format!(
                    "flush_queue_size must be in 1..={MAX_FLUSH_QUEUE_SIZE}, got {}",
                    self.flush_queue_size
                ),
            }
        );
        ensure!(
            !self.flush_interval.is_zero(),
            InvalidConfigSnafu {
                reason: "flush_interval must be greater than zero",
            }
        );
        queue_file_path(&self.directory, &self.tag).context(QueueSnafu {
            directory: &self.directory,
        })?;
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::DispatcherError;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.flush_queue_size, 20);
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert!(config.bundled_integrations.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_deserialize_interval_in_millis() {
        let config: DispatcherConfig =
            serde_json::from_str(r#"{"flush_interval_ms":1500,"directory":"/tmp/q"}"#).unwrap();
        assert_eq!(config.flush_interval, Duration::from_millis(1500));
        assert_eq!(config.directory, PathBuf::from("/tmp/q"));
        assert_eq!(config.tag, "beacon");
    }

    #[test_case(0 ; "zero")]
    #[test_case(251 ; "above maximum")]
    fn test_rejects_flush_queue_size(size: usize) {
        let err = DispatcherConfig::default()
            .with_flush_queue_size(size)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DispatcherError::InvalidConfig { .. }));
    }

    #[test_case(1 ; "minimum")]
    #[test_case(250 ; "maximum")]
    fn test_accepts_flush_queue_size(size: usize) {
        DispatcherConfig::default()
            .with_flush_queue_size(size)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = DispatcherConfig::default()
            .with_flush_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DispatcherError::InvalidConfig { .. }));
    }

    #[test]
    fn test_rejects_path_like_tag() {
        let err = DispatcherConfig::new("../escape", "/tmp")
            .validate()
            .unwrap_err();
        assert!(matches!(err, DispatcherError::Queue { .. }));
    }
}
