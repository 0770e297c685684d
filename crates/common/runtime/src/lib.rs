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

mod error;
mod factory;
mod options;

pub use error::{Error, Result};
pub use options::{DEFAULT_NETWORK_THREADS, RuntimeOptions};
pub use tokio::runtime::{Handle, Runtime};

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_name_of(runtime: &Runtime) -> String {
        runtime
            .block_on(runtime.spawn(async { std::thread::current().name().map(str::to_owned) }))
            .unwrap()
            .unwrap_or_default()
    }

    #[test]
    fn builds_multi_thread_runtime_with_names() {
        let runtime = RuntimeOptions::builder()
            .thread_name("test-rt".to_string())
            .worker_threads(2)
            .build()
            .create()
            .unwrap();
        assert!(thread_name_of(&runtime).starts_with("test-rt-"));
    }

    #[test]
    fn network_runtime_is_named_after_tag() {
        let options = RuntimeOptions::network("analytics");
        assert_eq!(options.worker_threads, Some(DEFAULT_NETWORK_THREADS));

        let runtime = options.create().unwrap();
        assert!(thread_name_of(&runtime).starts_with("beacon-net-analytics-"));
    }
}
