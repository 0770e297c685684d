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

//! The queue contract shared by the durable and in-memory implementations.

use crate::Result;

/// A FIFO of opaque byte blobs.
///
/// Elements are removed and iterated strictly in insertion order. The trait
/// is object safe so an owner can hold either implementation behind
/// `Box<dyn PayloadQueue>`.
pub trait PayloadQueue: Send {
    /// Number of elements currently held.
    fn size(&self) -> usize;

    /// Appends one element at the tail.
    fn add(&mut self, data: &[u8]) -> Result<()>;

    /// Removes the `n` oldest elements.
    ///
    /// Fails with [`QueueError::RemoveOutOfRange`](crate::QueueError) when
    /// `n` exceeds [`size`](Self::size).
    fn remove(&mut self, n: usize) -> Result<()>;

    /// Visits elements oldest first without removing them.
    ///
    /// Iteration stops as soon as `visitor` returns `false`. Returns the number
    /// of elements handed to the visitor.
    fn for_each(&mut self, visitor: &mut dyn FnMut(&[u8]) -> bool) -> Result<usize>;

    /// Drops every element.
    fn clear(&mut self) -> Result<()>;

    /// Releases underlying resources. Safe to call more than once; every other
    /// operation fails with [`QueueError::Closed`](crate::QueueError)
    /// afterwards.
    fn close(&mut self) -> Result<()>;

    fn is_empty(&self) -> bool { self.size() == 0 }

    /// Copy of the oldest element, if any.
    fn peek(&mut self) -> Result<Option<Vec<u8>>> {
        let mut first = None;
        self.for_each(&mut |element| {
            first = Some(element.to_vec());
            false
        })?;
        Ok(first)
    }
}
