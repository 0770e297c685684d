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

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::UploadError;

/// Delivers one encoded batch to the collector.
///
/// Implementations own the transport. `Ok` means the collector accepted the
/// batch; see [`UploadError`] for how failures are classified.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, body: Bytes) -> Result<(), UploadError>;
}
