// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn at(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, secs).unwrap()
}

fn name(s: &str) -> JobName {
    JobName::new(s)
}

#[test]
fn entry_lifecycle() {
    let mut queue = DueQueue::new();

    queue.set(name("a"), DueTime::regular(at(10)));
    assert!(queue.has_entries());
    assert_eq!(queue.next_deadline(), Some(at(10)));

    // Not yet due
    assert!(queue.fired(at(5)).is_empty());
    assert!(queue.has_entries());

    let fired = queue.fired(at(10));
    assert_eq!(fired, vec![(name("a"), DueTime::regular(at(10)))]);
    assert!(!queue.has_entries());
    assert_eq!(queue.next_deadline(), None);
}

#[test]
fn cancel_removes_entry() {
    let mut queue = DueQueue::new();

    queue.set(name("a"), DueTime::regular(at(10)));
    queue.cancel(&name("a"));

    assert!(queue.fired(at(20)).is_empty());
    assert_eq!(queue.next_deadline(), None);
}

#[test]
fn fired_returns_earliest_first() {
    let mut queue = DueQueue::new();

    queue.set(name("slow"), DueTime::regular(at(20)));
    queue.set(name("fast"), DueTime::regular(at(5)));
    queue.set(name("mid"), DueTime::regular(at(10)));

    let fired: Vec<JobName> = queue.fired(at(15)).into_iter().map(|(j, _)| j).collect();
    assert_eq!(fired, vec![name("fast"), name("mid")]);
    assert_eq!(queue.next_deadline(), Some(at(20)));
    assert_eq!(queue.len(), 1);
}

#[test]
fn set_replaces_previous_entry() {
    let mut queue = DueQueue::new();

    queue.set(name("a"), DueTime::regular(at(5)));
    queue.set(name("a"), DueTime::regular(at(30)));

    assert_eq!(queue.next_deadline(), Some(at(30)));
    assert!(queue.fired(at(10)).is_empty());
    assert_eq!(queue.get(&name("a")), Some(DueTime::regular(at(30))));
    assert_eq!(queue.fired(at(30)).len(), 1);
}

#[test]
fn catch_up_flag_is_preserved() {
    let mut queue = DueQueue::new();
    queue.set(name("a"), DueTime::catch_up(at(0)));

    let fired = queue.fired(at(0));
    assert!(fired[0].1.catch_up);
}
