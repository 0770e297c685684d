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

//! On-disk header of a queue file.
//!
//! The file starts with two fixed-size header slots followed by the ring
//! buffer data region:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────────────────────┐
//! │  slot 0 (48) │  slot 1 (48) │  data region (ring, wraps to offset 96)  │
//! └──────────────┴──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Each slot holds, big-endian:
//!
//! ```text
//! magic(4) version(4) generation(8) file_length(8) count(4) head(8) tail(8) crc32(4)
//! ```
//!
//! Commits alternate between the slots (`generation % 2`), so a write torn by
//! a crash only ever damages the slot that was not current. On open, the
//! valid slot with the highest generation wins.
//!
//! Element records in the data region are a 4-byte big-endian length followed
//! by the payload; both parts may wrap past the end of the region.

use crate::crc::{calculate_slot_crc, verify_slot_crc};

pub(crate) const MAGIC: [u8; 4] = *b"BQUE";
pub(crate) const VERSION: u32 = 1;

/// Encoded size of one header slot.
pub(crate) const SLOT_LENGTH: usize = 48;
/// Bytes covered by the slot checksum.
const SLOT_FIELDS_LENGTH: usize = SLOT_LENGTH - 4;
/// Total header size; the data region starts here.
pub const HEADER_LENGTH: u64 = 2 * SLOT_LENGTH as u64;
/// Allocated length of a freshly created queue file.
pub const INITIAL_LENGTH: u64 = 4096;
/// Size of the length prefix in front of every element.
pub(crate) const RECORD_HEADER_LENGTH: u64 = 4;

/// Decoded contents of one header slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderSlot {
    /// Monotonic commit counter; selects the slot to write next.
    pub generation:  u64,
    /// Allocated length of the whole file, header included.
    pub file_length: u64,
    /// Number of elements reachable from `head`.
    pub count:       u32,
    /// Offset of the oldest element's length prefix.
    pub head:        u64,
    /// Offset where the next element will be written.
    pub tail:        u64,
}

impl HeaderSlot {
    /// A header describing an empty queue of `file_length` bytes.
    pub const fn empty(generation: u64, file_length: u64) -> Self {
        Self {
            generation,
            file_length,
            count: 0,
            head: HEADER_LENGTH,
            tail: HEADER_LENGTH,
        }
    }

    /// Byte offset of the slot this header is written to.
    pub const fn offset(&self) -> u64 { (self.generation % 2) * SLOT_LENGTH as u64 }

    pub fn encode(&self) -> [u8; SLOT_LENGTH] {
        let mut buf = [0u8; SLOT_LENGTH];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&VERSION.to_be_bytes());
        buf[8..16].copy_from_slice(&self.generation.to_be_bytes());
        buf[16..24].copy_from_slice(&self.file_length.to_be_bytes());
        buf[24..28].copy_from_slice(&self.count.to_be_bytes());
        buf[28..36].copy_from_slice(&self.head.to_be_bytes());
        buf[36..44].copy_from_slice(&self.tail.to_be_bytes());
        let crc = calculate_slot_crc(&buf[..SLOT_FIELDS_LENGTH]);
        buf[SLOT_FIELDS_LENGTH..].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Decodes a slot, returning `None` for a slot that was never written or
    /// was torn mid-write.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let buf: &[u8; SLOT_LENGTH] = buf.get(..SLOT_LENGTH)?.try_into().ok()?;
        if buf[0..4] != MAGIC || u32_at(buf, 4) != VERSION {
            return None;
        }
        let crc = u32_at(buf, SLOT_FIELDS_LENGTH);
        if !verify_slot_crc(&buf[..SLOT_FIELDS_LENGTH], crc) {
            return None;
        }
        Some(Self {
            generation:  u64_at(buf, 8),
            file_length: u64_at(buf, 16),
            count:       u32_at(buf, 24),
            head:        u64_at(buf, 28),
            tail:        u64_at(buf, 36),
        })
    }

    /// Picks the current header out of the raw header region.
    pub fn latest(region: &[u8]) -> Option<Self> {
        let first = Self::decode(region.get(..SLOT_LENGTH)?);
        let second = Self::decode(region.get(SLOT_LENGTH..2 * SLOT_LENGTH)?);
        match (first, second) {
            (Some(a), Some(b)) => Some(if a.generation >= b.generation { a } else { b }),
            (a, b) => a.or(b),
        }
    }
}

fn u32_at(buf: &[u8; SLOT_LENGTH], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_be_bytes(bytes)
}

fn u64_at(buf: &[u8; SLOT_LENGTH], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_be_bytes(bytes)
}
