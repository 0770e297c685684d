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

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use snafu::{OptionExt, ensure};
use tracing::info;

use crate::{
    Dispatcher, DispatcherConfig, Result,
    error::{DuplicateTagSnafu, UnknownTagSnafu},
};

/// Live dispatchers by tag.
///
/// At most one dispatcher may own a tag, and so a queue file, at a time.
#[derive(Default)]
pub struct DispatcherRegistry {
    dispatchers: Mutex<HashMap<String, Arc<Dispatcher>>>,
}

impl DispatcherRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Builds a dispatcher for `config.tag` with `make`, unless one already
    /// exists.
    ///
    /// `make` runs under the registry lock, so two racing calls for the same
    /// tag never both open the queue file.
    pub fn create<F>(&self, config: DispatcherConfig, make: F) -> Result<Arc<Dispatcher>>
    where
        F: FnOnce(DispatcherConfig) -> Result<Dispatcher>,
    {
        let mut dispatchers = self.dispatchers.lock();
        ensure!(
            !dispatchers.contains_key(&config.tag),
            DuplicateTagSnafu { tag: &config.tag }
        );

        let tag = config.tag.clone();
        let dispatcher = Arc::new(make(config)?);
        dispatchers.insert(tag.clone(), Arc::clone(&dispatcher));
        info!(tag = %tag, "Registered dispatcher");
        Ok(dispatcher)
    }

    pub fn get(&self, tag: &str) -> Option<Arc<Dispatcher>> { self.dispatchers.lock().get(tag).cloned() }

    pub fn tags(&self) -> Vec<String> { self.dispatchers.lock().keys().cloned().collect() }

    /// Shuts down and unregisters the dispatcher for `tag`. The tag can be
    /// reused afterwards.
    pub fn destroy(&self, tag: &str) -> Result<()> {
        let dispatcher = self
            .dispatchers
            .lock()
            .remove(tag)
            .context(UnknownTagSnafu { tag })?;
        info!(tag = %tag, "Unregistered dispatcher");
        dispatcher.shutdown()
    }

    /// Shuts down every dispatcher, returning the first error.
    pub fn shutdown_all(&self) -> Result<()> {
        let dispatchers: Vec<_> = self.dispatchers.lock().drain().map(|(_, d)| d).collect();
        let mut first_error = None;
        for dispatcher in dispatchers {
            if let Err(e) = dispatcher.shutdown() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
