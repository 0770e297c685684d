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

use crate::header::INITIAL_LENGTH;

/// Durable queue configuration.
///
/// The backing file lives at `directory/tag`.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub directory:         PathBuf,
    pub tag:               String,
    pub initial_length:    u64,
    pub flush_mode:        FlushMode,
    pub verify_on_startup: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            directory:         PathBuf::from("./beacon-disk-queue"),
            tag:               "default".to_string(),
            initial_length:    INITIAL_LENGTH,
            flush_mode:        FlushMode::Sync,
            verify_on_startup: true,
        }
    }
}

/// When written bytes are forced to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// `sync_data` after the element write and after every header commit.
    #[default]
    Sync,
    /// Leave write-back to the OS. Survives process kills, not power loss.
    Async,
}
