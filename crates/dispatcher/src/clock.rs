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

use chrono::{DateTime, FixedOffset, Local};

/// `sentAt` layout: ISO-8601 with a numeric offset and no colon.
const SENT_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Source of upload timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> { Local::now().fixed_offset() }
}

/// Formats `time` for the `sentAt` field, e.g. `2014-12-15T13:32:44-0700`.
#[must_use]
pub fn format_sent_at(time: &DateTime<FixedOffset>) -> String {
    time.format(SENT_AT_FORMAT).to_string()
}
