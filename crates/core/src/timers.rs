// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer registry for one-shot and repeating timers
//!
//! The registry only tracks fire times. The owner polls it once per tick
//! and dispatches each fired id to whatever armed it.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Identity of a registered timer, stable across reschedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// A timer that came due during [`Timers::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    pub id: TimerId,
    pub name: String,
}

#[derive(Debug, Clone)]
struct Entry {
    id: TimerId,
    generation: u64,
    fire_at: Instant,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.id == other.id
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first, ties broken by creation order
        Reverse((self.fire_at, self.id)).cmp(&Reverse((other.fire_at, other.id)))
    }
}

#[derive(Debug, Clone)]
struct Registration {
    name: String,
    interval: Option<Duration>,
    generation: u64,
}

/// Registry of armed timers
#[derive(Debug, Default)]
pub struct Timers {
    entries: BinaryHeap<Entry>,
    armed: HashMap<TimerId, Registration>,
    next_id: u64,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer firing after `initial_delay`, then every `interval`.
    /// A zero interval makes it one-shot.
    pub fn create_timer(
        &mut self,
        name: impl Into<String>,
        initial_delay: Duration,
        interval: Duration,
        now: Instant,
    ) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let interval = (!interval.is_zero()).then_some(interval);
        self.armed.insert(
            id,
            Registration {
                name: name.into(),
                interval,
                generation: 0,
            },
        );
        self.entries.push(Entry {
            id,
            generation: 0,
            fire_at: now + initial_delay,
        });
        id
    }

    /// Cancel a timer. Unknown ids are ignored.
    pub fn delete_timer(&mut self, id: TimerId) {
        self.armed.remove(&id);
    }

    /// Move the next fire time of a timer, keeping its id.
    /// Returns false if the timer is not armed.
    pub fn reschedule_timer(&mut self, id: TimerId, delay: Duration, now: Instant) -> bool {
        let Some(registration) = self.armed.get_mut(&id) else {
            return false;
        };
        registration.generation += 1;
        self.entries.push(Entry {
            id,
            generation: registration.generation,
            fire_at: now + delay,
        });
        true
    }

    /// Drain every timer due at or before `now`, in fire order.
    /// Repeating timers are re-armed, one-shot timers are dropped.
    pub fn poll(&mut self, now: Instant) -> Vec<FiredTimer> {
        let mut fired = Vec::new();

        while let Some(entry) = self.entries.peek() {
            if entry.fire_at > now {
                break;
            }

            let Some(entry) = self.entries.pop() else {
                break;
            };

            // Skip deleted or superseded entries
            let Some(registration) = self.armed.get(&entry.id) else {
                continue;
            };
            if registration.generation != entry.generation {
                continue;
            }

            fired.push(FiredTimer {
                id: entry.id,
                name: registration.name.clone(),
            });

            match registration.interval {
                Some(interval) => self.entries.push(Entry {
                    fire_at: entry.fire_at + interval,
                    ..entry
                }),
                None => {
                    self.armed.remove(&entry.id);
                }
            }
        }

        fired
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.armed.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    /// Get the next fire time, if any
    pub fn next_fire_time(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| {
                self.armed
                    .get(&e.id)
                    .is_some_and(|r| r.generation == e.generation)
            })
            .map(|e| e.fire_at)
            .min()
    }
}

#[cfg(test)]
#[path = "timers_tests.rs"]
mod tests;
