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

//! Fan-out of events to every destination the host application registered.

use std::sync::Arc;

use tracing::warn;

use crate::{Dispatcher, Payload, Result, payload::BEACON_INTEGRATION_KEY};

/// A destination for events.
pub trait Integration: Send + Sync {
    /// Name of the destination, as used in `integrations` settings.
    fn key(&self) -> &str;

    fn identify(&self, payload: &Payload) -> Result<()>;

    fn track(&self, payload: &Payload) -> Result<()>;

    fn screen(&self, payload: &Payload) -> Result<()>;

    /// Pushes out anything buffered.
    fn flush(&self) -> Result<()>;

    /// Forgets per-user state, e.g. on logout.
    fn reset(&self) -> Result<()>;
}

impl Integration for Dispatcher {
    fn key(&self) -> &str { BEACON_INTEGRATION_KEY }

    fn identify(&self, payload: &Payload) -> Result<()> { self.enqueue(payload.clone()) }

    fn track(&self, payload: &Payload) -> Result<()> { self.enqueue(payload.clone()) }

    fn screen(&self, payload: &Payload) -> Result<()> { self.enqueue(payload.clone()) }

    fn flush(&self) -> Result<()> { Dispatcher::flush(self) }

    /// Queued payloads are already anonymous to the dispatcher.
    fn reset(&self) -> Result<()> { Ok(()) }
}

/// Registered integrations, called in registration order.
///
/// A failing integration is logged and skipped; the others still run.
#[derive(Default)]
pub struct Integrations {
    integrations: Vec<Arc<dyn Integration>>,
}

impl Integrations {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        self.integrations.push(integration);
    }

    pub fn len(&self) -> usize { self.integrations.len() }

    pub fn is_empty(&self) -> bool { self.integrations.is_empty() }

    pub fn keys(&self) -> impl Iterator<Item = &str> { self.integrations.iter().map(|i| i.key()) }

    pub fn identify(&self, payload: &Payload) { self.each("identify", |i| i.identify(payload)); }

    pub fn track(&self, payload: &Payload) { self.each("track", |i| i.track(payload)); }

    pub fn screen(&self, payload: &Payload) { self.each("screen", |i| i.screen(payload)); }

    pub fn flush(&self) { self.each("flush", |i| i.flush()); }

    pub fn reset(&self) { self.each("reset", |i| i.reset()); }

    fn each<F>(&self, operation: &str, mut call: F)
    where
        F: FnMut(&dyn Integration) -> Result<()>,
    {
        for integration in &self.integrations {
            if let Err(e) = call(integration.as_ref()) {
                warn!(
                    integration = integration.key(),
                    operation,
                    error = %e,
                    "Integration call failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for Integrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}
