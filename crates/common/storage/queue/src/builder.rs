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

use std::path::PathBuf;

use tracing::error;

use crate::{
    FlushMode, PayloadQueue, QueueConfig, Result, durable::DurableQueue, memory::MemoryQueue,
    path::queue_file_path, recovery::discard_corrupted,
};

/// Fluent construction of a [`DurableQueue`] under `directory/tag`.
///
/// ```no_run
/// use beacon_queue::{FlushMode, QueueBuilder};
///
/// let queue = QueueBuilder::new("/var/lib/beacon")
///     .tag("default")
///     .flush_mode(FlushMode::Sync)
///     .open_or_fallback();
/// ```
pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            config: QueueConfig {
                directory: directory.into(),
                ..Default::default()
            },
        }
    }

    pub const fn from_config(config: QueueConfig) -> Self { Self { config } }

    pub fn tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.config.tag = tag.into();
        self
    }

    pub const fn initial_length(mut self, length: u64) -> Self {
        self.config.initial_length = length;
        self
    }

    pub const fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.config.flush_mode = mode;
        self
    }

    pub const fn verify_on_startup(mut self, verify: bool) -> Self {
        self.config.verify_on_startup = verify;
        self
    }

    /// Opens the queue file, failing on any error including corruption.
    pub fn open(&self) -> Result<DurableQueue> {
        let path = queue_file_path(&self.config.directory, &self.config.tag)?;
        DurableQueue::open(
            path,
            self.config.initial_length,
            self.config.flush_mode,
            self.config.verify_on_startup,
        )
    }

    /// Opens the queue file; if it is corrupted, deletes it and starts over
    /// with an empty one.
    pub fn open_or_recreate(&self) -> Result<DurableQueue> {
        match self.open() {
            Err(e) if e.is_corruption() => {
                error!(
                    tag = %self.config.tag,
                    error = %e,
                    "Queue file corrupted, discarding its elements and recreating"
                );
                let path = queue_file_path(&self.config.directory, &self.config.tag)?;
                discard_corrupted(&path)?;
                self.open()
            }
            other => other,
        }
    }

    /// Opens the durable queue, or an in-memory queue if no usable file can
    /// be opened. Never fails; events queued in memory are lost on exit.
    pub fn open_or_fallback(&self) -> Box<dyn PayloadQueue> {
        match self.open_or_recreate() {
            Ok(queue) => Box::new(queue),
            Err(e) => {
                error!(
                    tag = %self.config.tag,
                    directory = ?self.config.directory,
                    error = %e,
                    "Could not open queue file, falling back to memory queue"
                );
                Box::new(MemoryQueue::new())
            }
        }
    }

    pub const fn config(&self) -> &QueueConfig { &self.config }
}
