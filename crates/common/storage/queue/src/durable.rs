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

//! Crash-safe ring-buffer queue stored in a single file.
//!
//! See [`header`](crate::header) for the layout. The write path of
//! [`DurableQueue::add`] is:
//!
//! 1. grow the file if the element does not fit in the free space
//! 2. write the length prefix and data at `tail`
//! 3. commit a new header into the inactive slot
//!
//! Until step 3 completes the current header still describes the old queue,
//! so a process killed at any point reopens with either all previously
//! committed elements, or those plus the new one. Never a partial element.

use std::path::{Path, PathBuf};

use snafu::{OptionExt, ensure};
use tracing::{debug, info};

use crate::{
    FlushMode, PayloadQueue, Result,
    error::{ClosedSnafu, CorruptedSnafu, ElementTooLargeSnafu, RemoveOutOfRangeSnafu},
    file::QueueFile,
    header::{HEADER_LENGTH, HeaderSlot, INITIAL_LENGTH, RECORD_HEADER_LENGTH},
};

/// Bytes moved per read/write while relocating data during growth.
const COPY_CHUNK: usize = 64 * 1024;

/// A durable FIFO of byte blobs backed by one file.
///
/// All methods take `&mut self`; callers sharing a queue across threads wrap
/// it in a mutex.
pub struct DurableQueue {
    /// `None` once closed.
    file:    Option<QueueFile>,
    path:    PathBuf,
    /// Last committed header.
    header:  HeaderSlot,
    /// Scratch buffer reused by [`for_each`](PayloadQueue::for_each).
    scratch: Vec<u8>,
}

impl DurableQueue {
    /// Open the queue file at `path`, creating an empty queue when the file
    /// is missing or zero-length.
    ///
    /// Fails with [`QueueError::Corrupted`](crate::QueueError) when the file
    /// exists but holds no usable header, or (with `verify`) when walking the
    /// records does not agree with the header.
    pub fn open<P: AsRef<Path>>(
        path: P,
        initial_length: u64,
        flush_mode: FlushMode,
        verify: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = QueueFile::open_or_create(&path, flush_mode)?;
        let physical = file.physical_length()?;

        let header = if physical == 0 {
            let length = initial_length.max(INITIAL_LENGTH);
            file.set_length(length)?;
            let header = HeaderSlot::empty(1, length);
            file.write_at(header.offset(), &header.encode())?;
            file.flush()?;
            info!(path = ?path, length, "Created queue file");
            header
        } else {
            let header = read_header(&mut file, &path, physical)?;
            debug!(
                path = ?path,
                count = header.count,
                generation = header.generation,
                "Loaded queue header"
            );
            header
        };

        let mut queue = Self {
            file: Some(file),
            path,
            header,
            scratch: Vec::new(),
        };

        if verify {
            crate::recovery::verify_records(&mut queue)?;
        }

        info!(path = ?queue.path, size = queue.header.count, "Queue opened");
        Ok(queue)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path { &self.path }

    /// Allocated length of the file, header included.
    pub const fn file_length(&self) -> u64 { self.header.file_length }

    /// Bytes occupied by element records (length prefixes included).
    pub const fn used_bytes(&self) -> u64 {
        let h = &self.header;
        if h.count == 0 {
            0
        } else if h.tail > h.head {
            h.tail - h.head
        } else {
            (h.file_length - h.head) + (h.tail - HEADER_LENGTH)
        }
    }

    const fn data_capacity(&self) -> u64 { self.header.file_length - HEADER_LENGTH }

    const fn remaining_bytes(&self) -> u64 { self.data_capacity() - self.used_bytes() }

    pub(crate) const fn header(&self) -> &HeaderSlot { &self.header }

    /// Maps an offset that may have run past the end of the file back into
    /// the data region.
    pub(crate) const fn wrap(&self, position: u64) -> u64 {
        if position < self.header.file_length {
            position
        } else {
            HEADER_LENGTH + position - self.header.file_length
        }
    }

    fn file_mut(&mut self) -> Result<&mut QueueFile> { self.file.as_mut().context(ClosedSnafu) }

    /// Writes `data` at `position`, splitting at the end of the region.
    fn ring_write(&mut self, position: u64, data: &[u8]) -> Result<()> {
        let position = self.wrap(position);
        let file_length = self.header.file_length;
        let file = self.file_mut()?;
        let len = data.len() as u64;
        if position + len <= file_length {
            file.write_at(position, data)
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let first = (file_length - position) as usize;
            file.write_at(position, &data[..first])?;
            file.write_at(HEADER_LENGTH, &data[first..])
        }
    }

    /// Reads `buf.len()` bytes at `position`, splitting at the end of the
    /// region.
    pub(crate) fn ring_read(&mut self, position: u64, buf: &mut [u8]) -> Result<()> {
        let position = self.wrap(position);
        let file_length = self.header.file_length;
        let file = self.file_mut()?;
        let len = buf.len() as u64;
        if position + len <= file_length {
            file.read_at(position, buf)
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let first = (file_length - position) as usize;
            file.read_at(position, &mut buf[..first])?;
            file.read_at(HEADER_LENGTH, &mut buf[first..])
        }
    }

    /// Reads the length prefix of the record at `position` and checks that
    /// the record fits in the used region.
    pub(crate) fn read_record_length(&mut self, position: u64) -> Result<u64> {
        let mut prefix = [0u8; RECORD_HEADER_LENGTH as usize];
        self.ring_read(position, &mut prefix)?;
        let length = u64::from(u32::from_be_bytes(prefix));
        ensure!(
            RECORD_HEADER_LENGTH + length <= self.used_bytes(),
            CorruptedSnafu {
                path:   &self.path,
                reason: format!("record at {position} claims {length} bytes"),
            }
        );
        Ok(length)
    }

    /// Makes `header` the committed state: writes it to its slot and flushes.
    fn commit(&mut self, file_length: u64, count: u32, head: u64, tail: u64) -> Result<()> {
        let header = HeaderSlot {
            generation: self.header.generation + 1,
            file_length,
            count,
            head,
            tail,
        };
        let file = self.file_mut()?;
        file.write_at(header.offset(), &header.encode())?;
        file.flush()?;
        self.header = header;
        Ok(())
    }

    /// Grows the file until `needed` more bytes fit.
    ///
    /// Doubles the allocated length. If the live data wraps around the end of
    /// the old region, the wrapped part `[HEADER_LENGTH, tail)` is copied to
    /// the start of the newly allocated space so the data becomes contiguous
    /// again. Only freshly allocated bytes are written before the commit.
    fn expand_if_necessary(&mut self, needed: u64) -> Result<()> {
        if self.remaining_bytes() >= needed {
            return Ok(());
        }

        let old_length = self.header.file_length;
        let used = self.used_bytes();
        let mut new_length = old_length;
        while new_length - HEADER_LENGTH - used < needed {
            new_length = new_length.checked_mul(2).context(ElementTooLargeSnafu {
                len: usize::try_from(needed).unwrap_or(usize::MAX),
                max: u32::MAX as usize,
            })?;
        }

        self.file_mut()?.set_length(new_length)?;

        let h = self.header;
        let mut tail = h.tail;
        if h.count > 0 && h.tail <= h.head {
            let wrapped = h.tail - HEADER_LENGTH;
            self.copy_region(HEADER_LENGTH, old_length, wrapped)?;
            tail = old_length + wrapped;
        }
        let (head, tail) = if h.count == 0 {
            (HEADER_LENGTH, HEADER_LENGTH)
        } else {
            (h.head, tail)
        };

        self.commit(new_length, h.count, head, tail)?;
        info!(
            path = ?self.path,
            old_length,
            new_length,
            "Expanded queue file"
        );
        Ok(())
    }

    fn copy_region(&mut self, from: u64, to: u64, len: u64) -> Result<()> {
        let file = self.file_mut()?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut copied = 0;
        while copied < len {
            #[allow(clippy::cast_possible_truncation)]
            let chunk = (len - copied).min(COPY_CHUNK as u64) as usize;
            file.read_at(from + copied, &mut buf[..chunk])?;
            file.write_at(to + copied, &buf[..chunk])?;
            copied += chunk as u64;
        }
        file.flush()
    }
}

fn read_header(file: &mut QueueFile, path: &Path, physical: u64) -> Result<HeaderSlot> {
    ensure!(
        physical >= HEADER_LENGTH,
        CorruptedSnafu {
            path,
            reason: format!("file of {physical} bytes is shorter than the header"),
        }
    );

    #[allow(clippy::cast_possible_truncation)]
    let mut region = vec![0u8; HEADER_LENGTH as usize];
    file.read_at(0, &mut region)?;
    let header = HeaderSlot::latest(&region).context(CorruptedSnafu {
        path,
        reason: "no valid header slot",
    })?;

    ensure!(
        header.file_length > HEADER_LENGTH && header.file_length <= physical,
        CorruptedSnafu {
            path,
            reason: format!(
                "header length {} does not fit file of {physical} bytes",
                header.file_length
            ),
        }
    );

    if header.count == 0 {
        return Ok(HeaderSlot {
            head: HEADER_LENGTH,
            tail: HEADER_LENGTH,
            ..header
        });
    }

    let in_region = |offset: u64| (HEADER_LENGTH..header.file_length).contains(&offset);
    ensure!(
        in_region(header.head) && in_region(header.tail),
        CorruptedSnafu {
            path,
            reason: format!(
                "head {} or tail {} outside data region",
                header.head, header.tail
            ),
        }
    );
    Ok(header)
}

impl PayloadQueue for DurableQueue {
    fn size(&self) -> usize { self.header.count as usize }

    fn add(&mut self, data: &[u8]) -> Result<()> {
        ensure!(self.file.is_some(), ClosedSnafu);
        let length = u32::try_from(data.len()).ok().context(ElementTooLargeSnafu {
            len: data.len(),
            max: u32::MAX as usize,
        })?;
        let count = self.header.count.checked_add(1).context(ElementTooLargeSnafu {
            len: data.len(),
            max: u32::MAX as usize,
        })?;

        let needed = RECORD_HEADER_LENGTH + u64::from(length);
        self.expand_if_necessary(needed)?;

        let was_empty = self.header.count == 0;
        let position = if was_empty {
            HEADER_LENGTH
        } else {
            self.header.tail
        };

        self.ring_write(position, &length.to_be_bytes())?;
        self.ring_write(position + RECORD_HEADER_LENGTH, data)?;
        self.file_mut()?.flush()?;

        let head = if was_empty { position } else { self.header.head };
        let tail = self.wrap(position + needed);
        self.commit(self.header.file_length, count, head, tail)
    }

    fn remove(&mut self, n: usize) -> Result<()> {
        ensure!(self.file.is_some(), ClosedSnafu);
        let size = self.size();
        ensure!(n <= size, RemoveOutOfRangeSnafu { requested: n, size });
        if n == 0 {
            return Ok(());
        }
        if n == size {
            return self.clear();
        }

        let mut head = self.header.head;
        for _ in 0..n {
            let length = self.read_record_length(head)?;
            head = self.wrap(head + RECORD_HEADER_LENGTH + length);
        }

        #[allow(clippy::cast_possible_truncation)]
        let count = (size - n) as u32;
        self.commit(self.header.file_length, count, head, self.header.tail)
    }

    fn for_each(&mut self, visitor: &mut dyn FnMut(&[u8]) -> bool) -> Result<usize> {
        ensure!(self.file.is_some(), ClosedSnafu);
        let mut scratch = std::mem::take(&mut self.scratch);
        let result = self.walk(&mut scratch, visitor);
        self.scratch = scratch;
        result
    }

    fn clear(&mut self) -> Result<()> {
        ensure!(self.file.is_some(), ClosedSnafu);
        self.commit(self.header.file_length, 0, HEADER_LENGTH, HEADER_LENGTH)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            debug!(path = ?file.path(), "Queue file closed");
        }
        Ok(())
    }
}

impl DurableQueue {
    fn walk(
        &mut self,
        scratch: &mut Vec<u8>,
        visitor: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<usize> {
        let mut position = self.header.head;
        let mut visited = 0;
        for _ in 0..self.header.count {
            let length = self.read_record_length(position)?;
            #[allow(clippy::cast_possible_truncation)]
            scratch.resize(length as usize, 0);
            self.ring_read(position + RECORD_HEADER_LENGTH, scratch)?;
            visited += 1;
            if !visitor(scratch) {
                break;
            }
            position = self.wrap(position + RECORD_HEADER_LENGTH + length);
        }
        Ok(visited)
    }
}

impl std::fmt::Debug for DurableQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableQueue")
            .field("path", &self.path)
            .field("file_length", &self.header.file_length)
            .field("size", &self.header.count)
            .field("head", &self.header.head)
            .field("tail", &self.header.tail)
            .field("closed", &self.file.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::QueueError;

    struct Fixture {
        _temp_dir: TempDir,
        path:      PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("queue");
            Self {
                _temp_dir: temp_dir,
                path,
            }
        }

        fn open(&self) -> DurableQueue {
            DurableQueue::open(&self.path, INITIAL_LENGTH, FlushMode::Async, true).unwrap()
        }
    }

    fn collect(queue: &mut DurableQueue) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        queue
            .for_each(&mut |element| {
                out.push(element.to_vec());
                true
            })
            .unwrap();
        out
    }

    fn element(i: usize, len: usize) -> Vec<u8> {
        #[allow(clippy::cast_possible_truncation)]
        let byte = (i % 251) as u8;
        vec![byte; len]
    }

    #[test]
    fn test_add_then_peek_round_trips() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();

        queue.add(b"{\"event\":\"foo\"}").unwrap();
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.peek().unwrap().unwrap(), b"{\"event\":\"foo\"}");
    }

    #[test]
    fn test_empty_element() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();

        queue.add(b"").unwrap();
        queue.add(b"x").unwrap();
        assert_eq!(collect(&mut queue), vec![Vec::new(), b"x".to_vec()]);
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();
        for i in 0..10 {
            queue.add(&element(i, 10)).unwrap();
        }

        queue.remove(4).unwrap();

        let remaining = collect(&mut queue);
        assert_eq!(remaining.len(), 6);
        for (offset, data) in remaining.iter().enumerate() {
            assert_eq!(data, &element(offset + 4, 10));
        }
    }

    #[test]
    fn test_remove_beyond_size_fails_without_change() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();
        queue.add(b"a").unwrap();

        let err = queue.remove(2).unwrap_err();
        assert!(matches!(err, QueueError::RemoveOutOfRange { .. }));
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_remove_all_resets_positions() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();
        queue.add(b"a").unwrap();
        queue.add(b"b").unwrap();

        queue.remove(2).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.used_bytes(), 0);
        assert_eq!(queue.header().head, HEADER_LENGTH);
    }

    #[test]
    fn test_file_grows_by_doubling() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();
        assert_eq!(queue.file_length(), INITIAL_LENGTH);

        queue.add(&element(0, 5000)).unwrap();
        assert_eq!(queue.file_length(), 2 * INITIAL_LENGTH);
        assert_eq!(queue.peek().unwrap().unwrap(), element(0, 5000));
    }

    #[test]
    fn test_elements_wrap_around_region_end() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();

        // Fill most of the region, free the front, then write across the end.
        for i in 0..30 {
            queue.add(&element(i, 100)).unwrap();
        }
        queue.remove(25).unwrap();
        for i in 30..45 {
            queue.add(&element(i, 100)).unwrap();
        }

        assert_eq!(queue.file_length(), INITIAL_LENGTH);
        assert!(queue.header().tail < queue.header().head);
        let all = collect(&mut queue);
        let expected: Vec<Vec<u8>> = (25..45).map(|i| element(i, 100)).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_growth_unwraps_wrapped_data() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();

        for i in 0..30 {
            queue.add(&element(i, 100)).unwrap();
        }
        queue.remove(25).unwrap();
        for i in 30..45 {
            queue.add(&element(i, 100)).unwrap();
        }
        assert!(queue.header().tail < queue.header().head);

        // Forces growth while the data wraps.
        for i in 45..80 {
            queue.add(&element(i, 100)).unwrap();
        }

        assert!(queue.file_length() > INITIAL_LENGTH);
        let expected: Vec<Vec<u8>> = (25..80).map(|i| element(i, 100)).collect();
        assert_eq!(collect(&mut queue), expected);

        drop(queue);
        let mut reopened = fixture.open();
        assert_eq!(collect(&mut reopened), expected);
    }

    #[test_case(1, 3 ; "tiny elements")]
    #[test_case(150, 97 ; "elements straddling region end")]
    #[test_case(40, 1499 ; "elements larger than initial file")]
    fn test_reopen_replays_committed_elements(count: usize, len: usize) {
        let fixture = Fixture::new();
        {
            let mut queue = fixture.open();
            for i in 0..count {
                queue.add(&element(i, len)).unwrap();
                if i % 7 == 6 {
                    queue.remove(2).unwrap();
                }
            }
            queue.close().unwrap();
        }

        let mut expected: Vec<Vec<u8>> = Vec::new();
        {
            let mut model = std::collections::VecDeque::new();
            for i in 0..count {
                model.push_back(element(i, len));
                if i % 7 == 6 {
                    model.pop_front();
                    model.pop_front();
                }
            }
            expected.extend(model);
        }

        let mut queue = fixture.open();
        assert_eq!(queue.size(), expected.len());
        assert_eq!(collect(&mut queue), expected);
    }

    #[test]
    fn test_uncommitted_write_is_invisible_after_reopen() {
        let fixture = Fixture::new();
        {
            let mut queue = fixture.open();
            queue.add(b"committed").unwrap();

            // Simulate a kill between the data write and the header commit.
            let tail = queue.header().tail;
            queue.ring_write(tail, &5u32.to_be_bytes()).unwrap();
            queue.ring_write(tail + RECORD_HEADER_LENGTH, b"torn!").unwrap();
        }

        let mut queue = fixture.open();
        assert_eq!(collect(&mut queue), vec![b"committed".to_vec()]);
    }

    #[test]
    fn test_torn_header_falls_back_to_previous_commit() {
        let fixture = Fixture::new();
        let generation;
        {
            let mut queue = fixture.open();
            queue.add(b"first").unwrap();
            queue.add(b"second").unwrap();
            generation = queue.header().generation;

            // Corrupt the slot holding the latest commit.
            let offset = queue.header().offset();
            queue.file_mut().unwrap().write_at(offset + 10, &[0xFF; 4]).unwrap();
        }

        let mut queue = fixture.open();
        assert_eq!(queue.header().generation, generation - 1);
        assert_eq!(collect(&mut queue), vec![b"first".to_vec()]);
    }

    #[test]
    fn test_garbage_file_is_corrupted() {
        let fixture = Fixture::new();
        std::fs::write(&fixture.path, vec![0xAB; 512]).unwrap();

        let err = DurableQueue::open(&fixture.path, INITIAL_LENGTH, FlushMode::Async, true)
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_closed_queue_rejects_operations() {
        let fixture = Fixture::new();
        let mut queue = fixture.open();
        queue.add(b"a").unwrap();
        queue.close().unwrap();
        queue.close().unwrap();

        assert!(matches!(queue.add(b"b"), Err(QueueError::Closed { .. })));
        assert!(matches!(queue.remove(1), Err(QueueError::Closed { .. })));
        assert!(matches!(
            queue.for_each(&mut |_| true),
            Err(QueueError::Closed { .. })
        ));
    }
}
