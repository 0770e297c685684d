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

//! Upload batch construction.
//!
//! Elements are stored pre-serialized, so a batch is assembled by splicing
//! their bytes into the envelope as they are read from the queue:
//!
//! ```text
//! {"batch":[<element>,<element>,...],"sentAt":"2014-12-15T13:32:44-0700"}
//! ```

use bytes::Bytes;

const BATCH_PREFIX: &[u8] = b"{\"batch\":[";
const SENT_AT_FIELD: &[u8] = b"],\"sentAt\":\"";
const ENVELOPE_SUFFIX: &[u8] = b"\"}";

/// A batch under construction, fed one queued element at a time.
#[derive(Debug)]
pub struct BatchBuilder {
    body:     Vec<u8>,
    count:    usize,
    bytes:    usize,
    max_size: usize,
}

impl BatchBuilder {
    /// Starts a batch holding at most `max_size` element bytes.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let mut body = Vec::with_capacity(4096);
        body.extend_from_slice(BATCH_PREFIX);
        Self {
            body,
            count: 0,
            bytes: 0,
            max_size,
        }
    }

    /// Offers the next element; returns whether to keep reading.
    ///
    /// An element is taken if the batch is empty or if it keeps the batch
    /// within `max_size`. An element larger than `max_size` therefore travels
    /// alone in its own batch.
    pub fn offer(&mut self, element: &[u8]) -> bool {
        if self.count > 0 && self.bytes + element.len() > self.max_size {
            return false;
        }
        if self.count > 0 {
            self.body.push(b',');
        }
        self.body.extend_from_slice(element);
        self.count += 1;
        self.bytes += element.len();
        self.bytes < self.max_size
    }

    /// Number of elements taken.
    pub const fn len(&self) -> usize { self.count }

    pub const fn is_empty(&self) -> bool { self.count == 0 }

    /// Element bytes taken, excluding the envelope.
    pub const fn size(&self) -> usize { self.bytes }

    /// Closes the envelope with the given `sentAt` timestamp.
    #[must_use]
    pub fn finish(mut self, sent_at: &str) -> Bytes {
        self.body.extend_from_slice(SENT_AT_FIELD);
        self.body.extend_from_slice(sent_at.as_bytes());
        self.body.extend_from_slice(ENVELOPE_SUFFIX);
        Bytes::from(self.body)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::config::MAX_BATCH_SIZE;

    fn fill(builder: &mut BatchBuilder, elements: &[Vec<u8>]) {
        for element in elements {
            if !builder.offer(element) {
                break;
            }
        }
    }

    #[test]
    fn test_envelope_format() {
        let mut builder = BatchBuilder::new(MAX_BATCH_SIZE);
        fill(
            &mut builder,
            &[br#"{"event":"a"}"#.to_vec(), br#"{"event":"b"}"#.to_vec()],
        );
        let body = builder.finish("2014-12-15T13:32:44-0700");
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"batch":[{"event":"a"},{"event":"b"}],"sentAt":"2014-12-15T13:32:44-0700"}"#
        );
    }

    #[test]
    fn test_empty_batch_is_still_valid_json() {
        let body = BatchBuilder::new(MAX_BATCH_SIZE).finish("2014-12-15T13:32:44-0700");
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["batch"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_caps_batch_at_max_size() {
        let elements = vec![vec![b'1'; 1432]; 500];
        let mut builder = BatchBuilder::new(MAX_BATCH_SIZE);
        fill(&mut builder, &elements);

        assert_eq!(builder.len(), 331);
        assert_eq!(builder.size(), 331 * 1432);
    }

    #[test_case(&[10, 10, 10], 30, 3 ; "exact fit")]
    #[test_case(&[10, 10, 11], 30, 2 ; "one byte over")]
    #[test_case(&[50, 1, 1], 30, 1 ; "oversized head sent alone")]
    #[test_case(&[5, 50, 1], 30, 1 ; "oversized second waits")]
    fn test_batch_boundaries(sizes: &[usize], max: usize, expected: usize) {
        let elements: Vec<Vec<u8>> = sizes.iter().map(|&n| vec![b'7'; n]).collect();
        let mut builder = BatchBuilder::new(max);
        fill(&mut builder, &elements);
        assert_eq!(builder.len(), expected);
    }
}
