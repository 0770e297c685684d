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

use std::{
    env,
    io::IsTerminal,
    sync::{Arc, Mutex, Once},
};

use bon::Builder;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// # Errors
/// Returns an error if the non-empty string does not parse into `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// The default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for hourly-rotated log files. Empty disables file logging.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Level filter such as `"info"` or `"info,beacon_dispatcher=debug"`.
    ///
    /// Falls back to `RUST_LOG`, then `"info"`.
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per sink. 720 is 30 days of hourly files.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, with span context.
    Json,

    /// Human-readable text.
    #[default]
    Text,
}

/// Initialize logging for unit tests.
///
/// Writes to `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`) at
/// `UNITTEST_LOG_LEVEL` (default `debug`). Safe to call from every test;
/// only the first call has an effect.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            append_stdout: false,
            ..Default::default()
        };
        let guards = init_global_logging("unittest", &opts);
        if let Ok(mut slot) = GLOBAL_UT_LOG_GUARD.lock() {
            *slot = Some(guards);
        }

        tracing::info!("logs dir = {}", dir);
    });
}

/// Keeps the unit test writer threads alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Used when neither [`LoggingOptions::level`] nor `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

fn fmt_layer<S, W>(writer: W, format: LogFormat, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::Layer::new()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
    }
}

fn rolling_writer(
    opts: &LoggingOptions,
    prefix: &str,
    guards: &mut Vec<WorkerGuard>,
) -> Option<tracing_appender::non_blocking::NonBlocking> {
    if opts.dir.is_empty() {
        return None;
    }
    match RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
    {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(writer)
        }
        Err(e) => {
            eprintln!("file logging at {} disabled: {e}", opts.dir);
            None
        }
    }
}

/// Install the global subscriber.
///
/// Layers:
///
/// - stdout, if `append_stdout`
/// - `<app_name>.*` hourly files under `dir`, if set
/// - `<app_name>-err.*` files holding only `ERROR` events, if `dir` is set
///
/// Only the first call in a process installs anything. An unparsable level
/// string falls back to `info` and an unusable `dir` disables file output;
/// neither stops the process.
///
/// The returned guards flush the non-blocking writers when dropped and must
/// be held for the lifetime of the application.
#[allow(clippy::print_stderr)]
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        if let Err(e) = LogTracer::init() {
            eprintln!("log bridge not installed: {e}");
        }

        let stdout_logging_layer = opts.append_stdout.then(|| {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            fmt_layer(writer, opts.log_format, std::io::stdout().is_terminal())
        });

        let file_logging_layer = rolling_writer(opts, app_name, &mut guards)
            .map(|writer| fmt_layer(writer, opts.log_format, false));

        let err_file_logging_layer = rolling_writer(opts, &format!("{app_name}-err"), &mut guards)
            .map(|writer| {
                fmt_layer(writer, opts.log_format, false)
                    .with_filter(filter::LevelFilter::ERROR)
                    .boxed()
            });

        let subscriber = Registry::default()
            .with(parse_targets(opts.level.as_deref()))
            .with(stdout_logging_layer)
            .with(file_logging_layer)
            .with(err_file_logging_layer);

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("global tracing subscriber not installed: {e}");
        }
    });

    guards
}

#[allow(clippy::print_stderr)]
fn parse_targets(level: Option<&str>) -> filter::Targets {
    let env_level = env::var(EnvFilter::DEFAULT_ENV).ok();
    let targets = level
        .or(env_level.as_deref())
        .unwrap_or(DEFAULT_LOG_TARGETS);
    targets.parse().unwrap_or_else(|e| {
        eprintln!("invalid log level {targets:?} ({e}), using {DEFAULT_LOG_TARGETS}");
        filter::Targets::new().with_default(filter::LevelFilter::INFO)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_options_from_json() {
        let opts: LoggingOptions =
            serde_json::from_str(r#"{"dir":"/var/log/beacon","log_format":"json"}"#).unwrap();
        assert_eq!(opts.dir, "/var/log/beacon");
        assert_eq!(opts.log_format, LogFormat::Json);
        assert_eq!(opts.max_log_files, 720);
        assert!(opts.append_stdout);
    }

    #[test]
    fn test_empty_log_format_uses_default() {
        let opts: LoggingOptions = serde_json::from_str(r#"{"log_format":""}"#).unwrap();
        assert_eq!(opts.log_format, LogFormat::Text);
    }

    #[test]
    fn test_invalid_level_falls_back_to_info() {
        let targets = parse_targets(Some("beacon=verbose"));
        assert_eq!(targets.default_level(), Some(filter::LevelFilter::INFO));
    }

    #[test]
    fn test_ut_logging_is_idempotent() {
        init_default_ut_logging();
        init_default_ut_logging();
        tracing::info!("still logging");
    }
}
