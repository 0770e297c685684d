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

//! CRC32 checksum for header slots.
//!
//! Uses CRC-32 (IEEE polynomial) via crc32fast. A slot whose stored checksum
//! does not match is treated as never written, which is what makes a torn
//! header write recoverable.

use crc32fast::Hasher;

/// Calculates the checksum of the encoded slot fields.
#[inline]
pub(crate) fn calculate_slot_crc(fields: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(fields);
    hasher.finalize()
}

/// Verifies a slot's stored checksum.
#[inline]
pub(crate) fn verify_slot_crc(fields: &[u8], expected: u32) -> bool {
    calculate_slot_crc(fields) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_slot_crc() {
        let fields = b"slot fields";
        let crc = calculate_slot_crc(fields);

        assert!(verify_slot_crc(fields, crc));
        assert!(!verify_slot_crc(fields, crc.wrapping_add(1)));
        assert!(!verify_slot_crc(b"other fields", crc));
    }
}
