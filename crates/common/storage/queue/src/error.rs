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

use std::{io, path::PathBuf};

use snafu::Snafu;

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// Filesystem I/O failure.
    #[snafu(display("IO error on {}", path.display()))]
    Io {
        path:   PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// The queue tag cannot be used as a file name.
    #[snafu(display("Invalid queue tag {tag:?}"))]
    InvalidTag {
        tag: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// The backing file is unreadable or its header/records are inconsistent.
    #[snafu(display("Queue file {} is corrupted: {reason}", path.display()))]
    Corrupted {
        path:   PathBuf,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// More elements were requested for removal than the queue holds.
    #[snafu(display("Cannot remove {requested} element(s) from a queue of {size}"))]
    RemoveOutOfRange {
        requested: usize,
        size:      usize,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    /// Element does not fit the 4-byte length prefix.
    #[snafu(display("Element of {len} bytes exceeds the maximum of {max}"))]
    ElementTooLarge {
        len: usize,
        max: usize,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// Operation attempted after `close()`.
    #[snafu(display("Queue is closed"))]
    Closed {
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl QueueError {
    /// Whether the error means the stored data can no longer be trusted.
    ///
    /// Callers react to these by resetting the queue to empty.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corrupted { .. } | Self::RemoveOutOfRange { .. }
        )
    }
}

/// Result type for queue operations.
pub type Result<T, E = QueueError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_classification() {
        let err = RemoveOutOfRangeSnafu {
            requested: 3usize,
            size:      1usize,
        }
        .build();
        assert!(err.is_corruption());

        let err = CorruptedSnafu {
            path:   "/tmp/q",
            reason: "bad magic",
        }
        .build();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("bad magic"));

        assert!(!ClosedSnafu.build().is_corruption());
    }
}
