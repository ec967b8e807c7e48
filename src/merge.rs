//! Folds the per-shard tables into one global table.

use std::collections::HashMap;

use crate::table::{ShardTable, StationStat};

/// The merged result: raw key bytes to combined statistics. Read-only once
/// the fold completes.
pub type GlobalTable = HashMap<Box<[u8]>, StationStat, ahash::RandomState>;

/// Combines all shard tables field-wise. The combine operation is
/// commutative and associative, so neither the order tables arrive in nor
/// the order of keys within a table affects the result.
pub fn merge_tables<I>(tables: I) -> GlobalTable
where
    I: IntoIterator<Item = ShardTable>,
{
    let mut totals = GlobalTable::default();
    for table in tables {
        for (key, stat) in table.entries() {
            match totals.get_mut(key) {
                Some(existing) => existing.merge(stat),
                None => {
                    totals.insert(key.into(), *stat);
                }
            }
        }
    }
    totals
}
