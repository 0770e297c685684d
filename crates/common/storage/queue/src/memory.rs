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

use std::collections::VecDeque;

use snafu::ensure;

use crate::{
    PayloadQueue, Result,
    error::{ClosedSnafu, RemoveOutOfRangeSnafu},
};

/// In-process queue used when no backing file can be created.
///
/// Same contract as [`DurableQueue`](crate::DurableQueue), nothing survives
/// the process.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    elements: VecDeque<Vec<u8>>,
    closed:   bool,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self { Self::default() }
}

impl PayloadQueue for MemoryQueue {
    fn size(&self) -> usize { self.elements.len() }

    fn add(&mut self, data: &[u8]) -> Result<()> {
        ensure!(!self.closed, ClosedSnafu);
        self.elements.push_back(data.to_vec());
        Ok(())
    }

    fn remove(&mut self, n: usize) -> Result<()> {
        ensure!(!self.closed, ClosedSnafu);
        ensure!(
            n <= self.elements.len(),
            RemoveOutOfRangeSnafu {
                requested: n,
                size:      self.elements.len(),
            }
        );
        self.elements.drain(..n);
        Ok(())
    }

    fn for_each(&mut self, visitor: &mut dyn FnMut(&[u8]) -> bool) -> Result<usize> {
        ensure!(!self.closed, ClosedSnafu);
        let mut visited = 0;
        for element in &self.elements {
            visited += 1;
            if !visitor(element) {
                break;
            }
        }
        Ok(visited)
    }

    fn clear(&mut self) -> Result<()> {
        ensure!(!self.closed, ClosedSnafu);
        self.elements.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
