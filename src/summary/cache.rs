//! # Summary Cache
//! Bounded URL → bullet-list map with first-in-first-out eviction.
//!
//! Insertion order lives in an explicit queue next to the lookup map. Reads
//! never touch the queue, so a popular entry is evicted as soon as it becomes
//! the oldest insert. Re-inserting a URL moves it to the back (newest).
//! Every mutation happens under one mutex, so concurrent writers for the same
//! URL converge on a single entry.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use metrics::counter;

pub type Bullets = Vec<String>;

#[derive(Debug)]
pub struct SummaryCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<String, Bullets>,
    /// Oldest insert at the front.
    order: VecDeque<String>,
}

impl SummaryCache {
    /// `capacity` is clamped to at least 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, url: &str) -> Option<Bullets> {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.map.get(url).cloned()
    }

    /// Insert or overwrite; returns the URL evicted to stay within capacity, if any.
    pub fn put(&self, url: &str, summary: Bullets) -> Option<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        if inner.map.insert(url.to_string(), summary).is_some() {
            inner.order.retain(|k| k != url);
        }
        inner.order.push_back(url.to_string());

        if inner.map.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
                counter!("summary_cache_evictions_total").increment(1);
                return Some(oldest);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from oldest to newest insert.
    pub fn keys_in_insertion_order(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.order.iter().cloned().collect()
    }
}
