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

use std::sync::LazyLock;

use prometheus::{
    HistogramVec, IntCounterVec, IntGaugeVec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec,
};

pub const TAG_LABEL: &str = "tag";

pub static PAYLOADS_ENQUEUED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_payloads_enqueued_total",
        "Total number of payloads written to the queue",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static PAYLOADS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_payloads_dropped_total",
        "Total number of payloads dropped before reaching the queue",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static PAYLOADS_EVICTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_payloads_evicted_total",
        "Total number of queued payloads evicted by the size cap",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static PAYLOADS_UPLOADED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_payloads_uploaded_total",
        "Total number of payloads accepted by the collector",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static FLUSHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_flushes_total",
        "Total number of upload attempts",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static BATCHES_REJECTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_batches_rejected_total",
        "Total number of batches refused by the collector",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static TRANSPORT_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_transport_failures_total",
        "Total number of uploads that got no usable answer",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static QUEUE_RESETS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beacon_queue_resets_total",
        "Total number of times a corrupted queue was cleared",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static QUEUE_SIZE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "beacon_queue_size",
        "Number of payloads currently queued",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});

pub static UPLOAD_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "beacon_upload_duration_seconds",
        "Batch upload duration in seconds",
        &[TAG_LABEL]
    )
    .expect("metric registered once")
});
