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

//! Durable, bounded-by-disk FIFO of byte blobs.
//!
//! [`DurableQueue`] keeps elements in a single ring-buffer file that survives
//! process kills at any instruction. [`MemoryQueue`] offers the same
//! [`PayloadQueue`] surface without persistence and is used when no file can
//! be opened.

mod builder;
mod config;
mod crc;
mod durable;
mod error;
mod file;
mod header;
mod memory;
mod path;
mod queue;
mod recovery;

pub use builder::QueueBuilder;
pub use config::{FlushMode, QueueConfig};
pub use durable::DurableQueue;
pub use error::{QueueError, Result};
pub use header::{HEADER_LENGTH, INITIAL_LENGTH};
pub use memory::MemoryQueue;
pub use path::queue_file_path;
pub use queue::PayloadQueue;
