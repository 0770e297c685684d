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

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the network is worth trying.
///
/// Consulted before every flush; a flush while disconnected makes no upload
/// attempt and leaves the queue untouched.
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Assumes the network is always reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&self) -> bool { true }
}

/// Connectivity flag updated by the host application, e.g. from OS network
/// change notifications.
#[derive(Debug)]
pub struct NetworkStatus {
    connected: AtomicBool,
}

impl NetworkStatus {
    #[must_use]
    pub const fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn set_connected(&self, connected: bool) { self.connected.store(connected, Ordering::Release); }
}

impl Default for NetworkStatus {
    fn default() -> Self { Self::new(true) }
}

impl Connectivity for NetworkStatus {
    fn is_connected(&self) -> bool { self.connected.load(Ordering::Acquire) }
}
