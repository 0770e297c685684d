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

use beacon_queue::QueueError;
use snafu::Snafu;

/// Errors surfaced by the dispatcher's public API.
///
/// Failures inside the enqueue and flush paths (bad payloads, corrupted
/// storage, upload failures) are handled and logged where they occur and
/// never reach the caller as one of these.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DispatcherError {
    /// The dispatcher has been shut down and accepts no further work.
    #[snafu(display("Dispatcher {tag} is shut down"))]
    Shutdown {
        tag: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Invalid dispatcher configuration: {reason}"))]
    InvalidConfig {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("A dispatcher tagged {tag} already exists"))]
    DuplicateTag {
        tag: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("No dispatcher tagged {tag}"))]
    UnknownTag {
        tag: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to spawn worker thread for dispatcher {tag}"))]
    SpawnWorker {
        tag:    String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to build network runtime"))]
    Runtime {
        source: beacon_common_runtime::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Queue error in {}", directory.display()))]
    Queue {
        directory: PathBuf,
        source:    QueueError,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },
}

pub type Result<T, E = DispatcherError> = std::result::Result<T, E>;

/// Outcome of a failed upload, as reported by an
/// [`Uploader`](crate::Uploader).
///
/// The two classes drive different reactions: a rejected batch is dropped
/// from the queue, a transport failure leaves the queue untouched for the
/// next flush.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UploadError {
    /// The collector answered and refused the batch.
    #[snafu(display("Batch rejected with status {status}: {message}"))]
    Rejected { status: u16, message: String },

    /// No usable answer: connection refused, timeout, I/O error.
    #[snafu(display("Upload transport failure: {message}"))]
    Transport { message: String },
}

impl UploadError {
    /// Whether the batch counts as consumed despite the failure.
    #[must_use]
    pub const fn consumes_batch(&self) -> bool { matches!(self, Self::Rejected { .. }) }
}
