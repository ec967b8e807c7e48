//! Shard-local key aggregation: a linearly probed open-addressing table.
//!
//! Each worker owns one table, so inserts take no locks. Slots store the
//! running statistics inline plus an offset/length view into a shared key
//! arena; keys are copied into the arena on first sight because the scan
//! buffer they arrive from is reused across reads. There is no deletion and
//! no resizing: the capacity is sized so the expected distinct-key
//! cardinality stays well under half of it, and crossing that threshold is a
//! configuration failure, not a recoverable condition.

use crate::error::{Error, Result};

/// Default slot count per shard table. Power of two, double the expected
/// worst-case distinct-key cardinality.
pub const DEFAULT_CAPACITY: usize = 1 << 17;

/// Running statistics for one key, everything scaled by ten so one decimal
/// digit is represented exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationStat {
    pub min: i32,
    pub max: i32,
    pub sum: i64,
    pub count: i64,
}

impl StationStat {
    fn new(value: i32) -> Self {
        StationStat {
            min: value,
            max: value,
            sum: value as i64,
            count: 1,
        }
    }

    #[inline]
    fn record(&mut self, value: i32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value as i64;
        self.count += 1;
    }

    /// Field-wise combination with stats for the same key from another
    /// shard. Commutative and associative.
    pub fn merge(&mut self, other: &StationStat) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    key_pos: u32,
    key_len: u32,
    stat: StationStat,
}

const EMPTY: Slot = Slot {
    key_pos: 0,
    key_len: 0,
    stat: StationStat {
        min: 0,
        max: 0,
        sum: 0,
        count: 0, // count == 0 marks the slot free
    },
};

#[derive(Debug)]
pub struct ShardTable {
    slots: Box<[Slot]>,
    keys: Vec<u8>,
    live: usize,
}

impl ShardTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` must be a power of two; at most half of it may ever hold
    /// live entries.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two());
        ShardTable {
            slots: vec![EMPTY; capacity].into_boxed_slice(),
            keys: Vec::new(),
            live: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn limit(&self) -> usize {
        self.slots.len() / 2
    }

    #[inline]
    fn slot_key(&self, index: usize) -> &[u8] {
        let slot = &self.slots[index];
        &self.keys[slot.key_pos as usize..slot.key_pos as usize + slot.key_len as usize]
    }

    /// Folds one observation into the table, creating the key's entry on
    /// first sight. The probe starts at `hash mod capacity` and advances one
    /// slot at a time, wrapping at the end.
    #[inline]
    pub fn insert(&mut self, key: &[u8], hash: u64, value: i32) -> Result<()> {
        let mask = self.slots.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            if self.slots[index].stat.count == 0 {
                if self.live == self.limit() {
                    return Err(Error::Capacity {
                        live: self.live + 1,
                        limit: self.limit(),
                    });
                }
                let key_pos = self.keys.len();
                self.keys.extend_from_slice(key);
                self.slots[index] = Slot {
                    key_pos: key_pos as u32,
                    key_len: key.len() as u32,
                    stat: StationStat::new(value),
                };
                self.live += 1;
                return Ok(());
            }
            if self.slot_key(index) == key {
                self.slots[index].stat.record(value);
                return Ok(());
            }
            index = (index + 1) & mask;
        }
    }

    /// Live entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &StationStat)> {
        let keys = &self.keys;
        self.slots
            .iter()
            .filter(|slot| slot.stat.count > 0)
            .map(move |slot| {
                let key =
                    &keys[slot.key_pos as usize..slot.key_pos as usize + slot.key_len as usize];
                (key, &slot.stat)
            })
    }
}

impl Default for ShardTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::hash_key;

    #[test]
    fn first_sight_initializes_all_fields_to_the_value() {
        let mut table = ShardTable::with_capacity(16);
        table.insert(b"Berlin", hash_key(b"Berlin"), -40).unwrap();
        let (key, stat) = table.entries().next().unwrap();
        assert_eq!(key, b"Berlin");
        assert_eq!(
            *stat,
            StationStat {
                min: -40,
                max: -40,
                sum: -40,
                count: 1
            }
        );
    }

    #[test]
    fn repeat_observations_update_in_place() {
        let mut table = ShardTable::with_capacity(16);
        let hash = hash_key(b"Hamburg");
        table.insert(b"Hamburg", hash, 123).unwrap();
        table.insert(b"Hamburg", hash, 78).unwrap();
        table.insert(b"Hamburg", hash, 101).unwrap();
        assert_eq!(table.len(), 1);
        let (_, stat) = table.entries().next().unwrap();
        assert_eq!(
            *stat,
            StationStat {
                min: 78,
                max: 123,
                sum: 302,
                count: 3
            }
        );
    }

    #[test]
    fn colliding_keys_probe_to_separate_slots() {
        let mut table = ShardTable::with_capacity(8);
        // identical hashes force linear probing past the occupied slot
        table.insert(b"aaa", 5, 10).unwrap();
        table.insert(b"bbb", 5, 20).unwrap();
        table.insert(b"aaa", 5, 30).unwrap();
        assert_eq!(table.len(), 2);

        let mut seen: Vec<(Vec<u8>, StationStat)> = table
            .entries()
            .map(|(k, s)| (k.to_vec(), *s))
            .collect();
        seen.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(seen[0].0, b"aaa");
        assert_eq!(seen[0].1.count, 2);
        assert_eq!(seen[0].1.sum, 40);
        assert_eq!(seen[1].0, b"bbb");
        assert_eq!(seen[1].1.count, 1);
    }

    #[test]
    fn probe_wraps_around_the_last_slot() {
        let mut table = ShardTable::with_capacity(8);
        table.insert(b"x", 7, 1).unwrap();
        table.insert(b"y", 7, 2).unwrap(); // wraps to slot 0
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn exceeding_half_capacity_is_a_capacity_error() {
        let mut table = ShardTable::with_capacity(8);
        for (i, key) in [b"k0", b"k1", b"k2", b"k3"].iter().enumerate() {
            table.insert(*key, i as u64, 0).unwrap();
        }
        let err = table.insert(b"k4", 4, 0).unwrap_err();
        assert!(matches!(err, Error::Capacity { limit: 4, .. }));
        // existing keys still update fine
        table.insert(b"k0", 0, 5).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn stat_merge_is_field_wise() {
        let mut a = StationStat {
            min: -10,
            max: 50,
            sum: 40,
            count: 3,
        };
        let b = StationStat {
            min: -20,
            max: 30,
            sum: 10,
            count: 2,
        };
        a.merge(&b);
        assert_eq!(
            a,
            StationStat {
                min: -20,
                max: 50,
                sum: 50,
                count: 5
            }
        );
    }
}
