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

use std::path::PathBuf;

use beacon_common_telemetry::{LogFormat, LoggingOptions, init_global_logging, set_panic_hook};
use beacon_dispatcher::MAX_PAYLOAD_SIZE;
use beacon_queue::{DurableQueue, PayloadQueue, QueueBuilder};
use clap::{Args, Parser, Subcommand, ValueEnum};
use snafu::{ResultExt, Whatever, ensure_whatever};
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
name = "beacon",
about = "Inspect and maintain beacon queue files",
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log level filter, e.g. `info` or `beacon_queue=debug`.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Inspect(InspectArgs),
    Dump(DumpArgs),
    Push(PushArgs),
    Trim(TrimArgs),
}

/// Location of one queue file: `<dir>/<tag>`.
#[derive(Debug, Clone, Args)]
struct QueueArgs {
    /// Directory holding the queue files.
    #[arg(long, default_value = "./beacon-disk-queue")]
    dir: PathBuf,

    /// Queue tag, i.e. the file name inside `--dir`.
    #[arg(long, default_value = "beacon")]
    tag: String,
}

impl QueueArgs {
    fn open(&self) -> Result<DurableQueue, Whatever> {
        QueueBuilder::new(self.dir.clone())
            .tag(self.tag.as_str())
            .open()
            .with_whatever_context(|_| {
                format!("failed to open queue {} in {}", self.tag, self.dir.display())
            })
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Print the element count and space usage of a queue file.
Examples:

beacon inspect --dir /var/lib/app/beacon --tag mobile

")]
struct InspectArgs {
    #[command(flatten)]
    queue: QueueArgs,
}

impl InspectArgs {
    fn run(&self) -> Result<(), Whatever> {
        let mut queue = self.queue.open()?;
        println!("path:        {}", queue.path().display());
        println!("elements:    {}", queue.size());
        println!("used bytes:  {}", queue.used_bytes());
        println!("file length: {}", queue.file_length());
        queue.close().whatever_context("failed to close queue")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Print queued elements oldest first, one per line.
Examples:

beacon dump --tag mobile --limit 10

")]
struct DumpArgs {
    #[command(flatten)]
    queue: QueueArgs,

    /// Print at most this many elements.
    #[arg(long)]
    limit: Option<usize>,
}

impl DumpArgs {
    fn run(&self) -> Result<(), Whatever> {
        let mut queue = self.queue.open()?;
        let limit = self.limit.unwrap_or(usize::MAX);
        let mut printed = 0;
        if limit > 0 {
            queue
                .for_each(&mut |element| {
                    println!("{}", String::from_utf8_lossy(element));
                    printed += 1;
                    printed < limit
                })
                .whatever_context("failed to read queue")?;
        }
        info!(printed, size = queue.size(), "Dumped queue");
        queue.close().whatever_context("failed to close queue")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r#"

Append JSON payloads to a queue file, as the dispatcher would store them.
Examples:

beacon push --tag mobile '{"type":"track","event":"Test"}'

"#)]
struct PushArgs {
    #[command(flatten)]
    queue: QueueArgs,

    /// Serialized payloads, each a JSON document.
    #[arg(required = true)]
    payloads: Vec<String>,
}

impl PushArgs {
    fn run(&self) -> Result<(), Whatever> {
        for (i, payload) in self.payloads.iter().enumerate() {
            serde_json::from_str::<serde_json::Value>(payload)
                .with_whatever_context(|_| format!("payload {i} is not valid JSON"))?;
            ensure_whatever!(
                payload.len() <= MAX_PAYLOAD_SIZE,
                "payload {i} is {} bytes, above the {MAX_PAYLOAD_SIZE} byte limit",
                payload.len()
            );
        }

        let mut queue = self.queue.open()?;
        for payload in &self.payloads {
            queue
                .add(payload.as_bytes())
                .whatever_context("failed to add payload")?;
        }
        println!("pushed {}, queue now holds {}", self.payloads.len(), queue.size());
        queue.close().whatever_context("failed to close queue")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Remove the oldest elements of a queue file.
Examples:

beacon trim --tag mobile --count 100

")]
struct TrimArgs {
    #[command(flatten)]
    queue: QueueArgs,

    /// Number of elements to remove from the head.
    #[arg(long)]
    count: usize,
}

impl TrimArgs {
    fn run(&self) -> Result<(), Whatever> {
        let mut queue = self.queue.open()?;
        let size = queue.size();
        ensure_whatever!(
            self.count <= size,
            "cannot trim {} elements, queue holds {size}",
            self.count
        );
        queue
            .remove(self.count)
            .whatever_context("failed to remove elements")?;
        println!("removed {}, queue now holds {}", self.count, queue.size());
        queue.close().whatever_context("failed to close queue")
    }
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();

    let logging = LoggingOptions {
        level: Some(cli.log_level.clone()),
        log_format: cli.log_format.into(),
        ..Default::default()
    };
    let _guards = init_global_logging("beacon", &logging);
    set_panic_hook();

    match &cli.commands {
        Commands::Inspect(args) => args.run(),
        Commands::Dump(args) => args.run(),
        Commands::Push(args) => args.run(),
        Commands::Trim(args) => args.run(),
    }
}
