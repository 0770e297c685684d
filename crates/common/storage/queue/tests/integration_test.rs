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

use beacon_queue::{
    DurableQueue, FlushMode, INITIAL_LENGTH, PayloadQueue, QueueBuilder, QueueError,
    queue_file_path,
};
use tempfile::TempDir;

fn builder(temp_dir: &TempDir) -> QueueBuilder {
    QueueBuilder::new(temp_dir.path())
        .tag("integration")
        .flush_mode(FlushMode::Async)
}

fn drain(queue: &mut dyn PayloadQueue) -> Vec<String> {
    let mut out = Vec::new();
    queue
        .for_each(&mut |element| {
            out.push(String::from_utf8(element.to_vec()).unwrap());
            true
        })
        .unwrap();
    out
}

#[test]
fn test_elements_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let mut queue = builder(&temp_dir).open().unwrap();
        for i in 0..100 {
            queue.add(format!("event-{i:04}").as_bytes()).unwrap();
        }
        queue.remove(10).unwrap();
        queue.close().unwrap();
    }

    let mut queue = builder(&temp_dir).open().unwrap();
    assert_eq!(queue.size(), 90);
    let elements = drain(&mut queue);
    assert_eq!(elements.first().unwrap(), "event-0010");
    assert_eq!(elements.last().unwrap(), "event-0099");
}

#[test]
fn test_drop_without_close_keeps_committed_elements() {
    let temp_dir = TempDir::new().unwrap();

    {
        let mut queue = builder(&temp_dir).flush_mode(FlushMode::Sync).open().unwrap();
        queue.add(b"a").unwrap();
        queue.add(b"b").unwrap();
    }

    let mut queue = builder(&temp_dir).open().unwrap();
    assert_eq!(drain(&mut queue), vec!["a", "b"]);
}

#[test]
fn test_visitor_can_stop_early() {
    let temp_dir = TempDir::new().unwrap();
    let mut queue = builder(&temp_dir).open().unwrap();
    for i in 0..10 {
        queue.add(format!("{i}").as_bytes()).unwrap();
    }

    let mut seen = Vec::new();
    let visited = queue
        .for_each(&mut |element| {
            seen.push(element.to_vec());
            seen.len() < 3
        })
        .unwrap();

    assert_eq!(visited, 3);
    assert_eq!(seen, vec![b"0".to_vec(), b"1".to_vec(), b"2".to_vec()]);
    assert_eq!(queue.size(), 10);
}

#[test]
fn test_sustained_add_remove_cycles() {
    let temp_dir = TempDir::new().unwrap();
    let mut queue = builder(&temp_dir).open().unwrap();

    let mut next_add = 0usize;
    let mut next_expected = 0usize;
    for round in 0..50 {
        for _ in 0..(20 + round % 7) {
            queue.add(format!("payload-{next_add:06}").as_bytes()).unwrap();
            next_add += 1;
        }
        let remove = queue.size().min(18);
        queue.remove(remove).unwrap();
        next_expected += remove;
    }

    let elements = drain(&mut queue);
    assert_eq!(elements.len(), next_add - next_expected);
    for (offset, element) in elements.iter().enumerate() {
        assert_eq!(element, &format!("payload-{:06}", next_expected + offset));
    }
    assert!(queue.file_length() >= INITIAL_LENGTH);
}

#[test]
fn test_corrupted_file_is_recreated_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = queue_file_path(temp_dir.path(), "integration").unwrap();
    std::fs::write(&path, b"definitely not a queue file, just garbage bytes").unwrap();

    let err = builder(&temp_dir).open().unwrap_err();
    assert!(matches!(err, QueueError::Corrupted { .. }));

    let mut queue = builder(&temp_dir).open_or_recreate().unwrap();
    assert!(queue.is_empty());
    queue.add(b"fresh").unwrap();
    assert_eq!(drain(&mut queue), vec!["fresh"]);
}

#[test]
fn test_unusable_directory_falls_back_to_memory() {
    let temp_dir = TempDir::new().unwrap();
    // A regular file where the directory should be.
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let mut queue = QueueBuilder::new(blocker.join("nested"))
        .tag("fallback")
        .open_or_fallback();

    queue.add(b"kept in memory").unwrap();
    assert_eq!(queue.size(), 1);
    assert_eq!(drain(queue.as_mut()), vec!["kept in memory"]);
}

#[test]
fn test_queues_with_different_tags_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let mut first = builder(&temp_dir).tag("first").open().unwrap();
    let mut second = builder(&temp_dir).tag("second").open().unwrap();

    first.add(b"1").unwrap();
    second.add(b"2").unwrap();
    second.add(b"3").unwrap();

    assert_eq!(first.size(), 1);
    assert_eq!(second.size(), 2);
    assert_ne!(first.path(), second.path());
}

#[test]
fn test_open_directly_by_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("direct");
    let mut queue = DurableQueue::open(&path, INITIAL_LENGTH, FlushMode::Async, true).unwrap();
    queue.add(b"x").unwrap();
    assert_eq!(queue.path(), path.as_path());
    assert_eq!(queue.used_bytes(), 5);
}
