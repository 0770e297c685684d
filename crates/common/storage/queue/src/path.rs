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

use std::path::{Component, Path, PathBuf};

use snafu::ensure;

use crate::{Result, error::InvalidTagSnafu};

/// Returns the backing file path for a queue: `directory/tag`.
///
/// The tag must be a single normal path component so that two tags can never
/// resolve to the same file or escape the queue directory.
pub fn queue_file_path<P: AsRef<Path>>(directory: P, tag: &str) -> Result<PathBuf> {
    let mut components = Path::new(tag).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    ensure!(
        !tag.is_empty() && single_normal && !tag.contains(['/', '\\']),
        InvalidTagSnafu { tag }
    );
    Ok(directory.as_ref().join(tag))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_queue_file_path() {
        let path = queue_file_path("/data/queues", "write-key-123").unwrap();
        assert_eq!(path, PathBuf::from("/data/queues/write-key-123"));
    }

    #[test_case("" ; "empty")]
    #[test_case(".." ; "parent")]
    #[test_case("." ; "current")]
    #[test_case("a/b" ; "nested")]
    #[test_case("/abs" ; "absolute")]
    fn test_rejects_invalid_tags(tag: &str) {
        assert!(queue_file_path("/data/queues", tag).is_err());
    }
}
