//! Hashed time wheel (data structure only; driven by the executor's control loop).
//!
//! ```text
//!            cursor
//!              ▼
//!   [b0] [b1] [b2] [b3] ... [bN-1]     one bucket visited per tick
//!               │
//!               └─ entries: rounds > 0 → rounds -= 1
//!                           rounds == 0 → fire
//!                           stale id    → purge
//! ```
//!
//! Deletion is lazy: `live` maps each key to the id of its current entry. An entry whose id
//! no longer matches (deleted, or replaced by a newer put) is purged when its bucket is visited.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

#[derive(Debug)]
struct Entry<K, V> {
    id: u64,
    key: K,
    value: Option<V>,
    delay: Duration,
    cyclic: bool,
    rounds: usize,
}

/// A timer that came due on a tick.
#[derive(Debug)]
pub(crate) struct Fired<K, V> {
    pub(crate) key: K,
    pub(crate) value: Option<V>,
    pub(crate) delay: Duration,
    pub(crate) cyclic: bool,
}

#[derive(Debug)]
pub(crate) struct Wheel<K, V> {
    period: Duration,
    buckets: Vec<Vec<Entry<K, V>>>,
    live: HashMap<K, u64>,
    cursor: usize,
    next_id: u64,
}

impl<K, V> Wheel<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new(period: Duration, buckets: usize) -> Self {
        Self {
            period,
            buckets: (0..buckets).map(|_| Vec::new()).collect(),
            live: HashMap::new(),
            cursor: 0,
            next_id: 0,
        }
    }

    /// Ticks (from the next one, counted as 0) until an entry with `delay` must fire,
    /// given `until_tick` left before the next tick.
    fn steps(&self, delay: Duration, until_tick: Duration) -> usize {
        if delay <= until_tick {
            return 0;
        }
        let rest = (delay - until_tick).as_nanos();
        let period = self.period.as_nanos().max(1);
        rest.div_ceil(period) as usize
    }

    /// Arms (or re-arms) `key`. Any previous timer for the key is cancelled.
    pub(crate) fn insert(
        &mut self,
        key: K,
        value: Option<V>,
        delay: Duration,
        cyclic: bool,
        until_tick: Duration,
    ) {
        let steps = self.steps(delay, until_tick);
        let len = self.buckets.len();
        let bucket = (self.cursor + steps % len) % len;
        let rounds = steps / len;

        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(key.clone(), id);
        self.buckets[bucket].push(Entry {
            id,
            key,
            value,
            delay,
            cyclic,
            rounds,
        });
    }

    /// Cancels `key`. Returns whether it was armed.
    pub(crate) fn remove(&mut self, key: &K) -> bool {
        self.live.remove(key).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    /// Visits the bucket under the cursor and advances it.
    pub(crate) fn tick(&mut self) -> Vec<Fired<K, V>> {
        let bucket = std::mem::take(&mut self.buckets[self.cursor]);
        let mut kept = Vec::with_capacity(bucket.len());
        let mut fired = Vec::new();

        for mut entry in bucket {
            if self.live.get(&entry.key) != Some(&entry.id) {
                continue;
            }
            if entry.rounds > 0 {
                entry.rounds -= 1;
                kept.push(entry);
                continue;
            }
            self.live.remove(&entry.key);
            fired.push(Fired {
                key: entry.key,
                value: entry.value,
                delay: entry.delay,
                cyclic: entry.cyclic,
            });
        }

        self.buckets[self.cursor] = kept;
        self.cursor = (self.cursor + 1) % self.buckets.len();
        fired
    }

    /// Removes and returns every armed timer.
    pub(crate) fn drain(&mut self) -> Vec<(K, Option<V>)> {
        let live = std::mem::take(&mut self.live);
        self.buckets
            .iter_mut()
            .flat_map(std::mem::take)
            .filter(|entry| live.get(&entry.key) == Some(&entry.id))
            .map(|entry| (entry.key, entry.value))
            .collect()
    }
}
