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

//! Event dispatcher: persists serialized events to a durable queue on a
//! single writer thread and uploads them in size-capped batches.

mod batch;
mod clock;
mod config;
mod connectivity;
mod dispatcher;
mod error;
mod integration;
pub mod metrics;
mod payload;
mod registry;
mod uploader;

pub use batch::BatchBuilder;
pub use clock::{Clock, SystemClock, format_sent_at};
pub use config::{
    DEFAULT_FLUSH_INTERVAL, DEFAULT_FLUSH_QUEUE_SIZE, DispatcherConfig, MAX_BATCH_SIZE,
    MAX_FLUSH_QUEUE_SIZE, MAX_PAYLOAD_SIZE, MAX_QUEUE_SIZE,
};
pub use connectivity::{AlwaysConnected, Connectivity, NetworkStatus};
pub use dispatcher::{Dispatcher, DispatcherState};
pub use error::{DispatcherError, Result, UploadError};
pub use integration::{Integration, Integrations};
pub use payload::{BEACON_INTEGRATION_KEY, INTEGRATIONS_FIELD, Payload, PayloadKind};
pub use registry::DispatcherRegistry;
pub use uploader::Uploader;
