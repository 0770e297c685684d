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

//! Benchmarks for the durable queue.
//!
//! Measures add latency per element size and the cost of a full batch
//! cycle as the flush path performs it.

use std::hint::black_box;

use beacon_queue::{DurableQueue, FlushMode, PayloadQueue, QueueBuilder};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

/// Element sizes to benchmark (bytes)
const ELEMENT_SIZES: &[usize] = &[64, 512, 1432, 8192];

/// Elements read per batch in the flush benchmark
const BATCH_LEN: usize = 250;

fn create_queue(temp_dir: &TempDir, flush_mode: FlushMode) -> DurableQueue {
    QueueBuilder::new(temp_dir.path())
        .tag("bench")
        .flush_mode(flush_mode)
        .verify_on_startup(false)
        .open()
        .expect("Failed to create queue")
}

fn bench_add_async(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_async");

    for &size in ELEMENT_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut queue = create_queue(&temp_dir, FlushMode::Async);
            let element = vec![0xABu8; size];

            b.iter(|| {
                queue.add(black_box(&element)).unwrap();
                if queue.size() >= 1000 {
                    queue.remove(500).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_add_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_sync");
    // fsync per commit is slow
    group.sample_size(20);

    let temp_dir = TempDir::new().unwrap();
    let mut queue = create_queue(&temp_dir, FlushMode::Sync);
    let element = vec![0xABu8; 1432];

    group.throughput(Throughput::Bytes(element.len() as u64));
    group.bench_function("1432", |b| {
        b.iter(|| {
            queue.add(black_box(&element)).unwrap();
            if queue.size() >= 1000 {
                queue.clear().unwrap();
            }
        });
    });

    group.finish();
}

fn bench_read_and_remove_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_and_remove_batch");
    group.throughput(Throughput::Elements(BATCH_LEN as u64));

    let temp_dir = TempDir::new().unwrap();
    let mut queue = create_queue(&temp_dir, FlushMode::Async);
    let element = vec![0x5Au8; 1432];

    group.bench_function(BenchmarkId::from_parameter(BATCH_LEN), |b| {
        b.iter(|| {
            while queue.size() < BATCH_LEN {
                queue.add(&element).unwrap();
            }
            let mut bytes = 0usize;
            queue
                .for_each(&mut |e| {
                    bytes += e.len();
                    true
                })
                .unwrap();
            queue.remove(BATCH_LEN).unwrap();
            black_box(bytes)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_add_async,
    bench_add_sync,
    bench_read_and_remove_batch
);
criterion_main!(benches);
