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

//! Startup verification and recovery for queue files.
//!
//! Opening a queue trusts the committed header. With verification on, every
//! record reachable from the header is walked once so that a file whose data
//! region was damaged is reported as corrupted up front, instead of failing
//! halfway through a later batch read.

use std::path::Path;

use snafu::{ResultExt, ensure};
use tracing::{debug, warn};

use crate::{
    Result,
    durable::DurableQueue,
    error::{CorruptedSnafu, IoSnafu},
    header::RECORD_HEADER_LENGTH,
};

/// Walks all records from head and checks that they end exactly at tail.
pub(crate) fn verify_records(queue: &mut DurableQueue) -> Result<()> {
    let header = *queue.header();
    let mut position = header.head;
    let mut walked = 0u64;

    for _ in 0..header.count {
        let length = queue.read_record_length(position)?;
        walked += RECORD_HEADER_LENGTH + length;
        position = queue.wrap(position + RECORD_HEADER_LENGTH + length);
    }

    let used = queue.used_bytes();
    ensure!(
        walked == used && (header.count == 0 || position == header.tail),
        CorruptedSnafu {
            path:   queue.path(),
            reason: format!(
                "records cover {walked} bytes ending at {position}, header says {used} bytes \
                 ending at {}",
                header.tail
            ),
        }
    );

    debug!(path = ?queue.path(), count = header.count, used, "Verified queue records");
    Ok(())
}

/// Deletes an unusable queue file so a fresh one can be created in its place.
pub(crate) fn discard_corrupted(path: &Path) -> Result<()> {
    warn!(path = ?path, "Discarding corrupted queue file");
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(IoSnafu { path }),
    }
}
