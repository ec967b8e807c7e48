//! Sharded aggregation of `key;value` measurement files.
//!
//! The input is split into line-aligned shards, one worker per shard scans
//! its range with a word-at-a-time delimiter search into a private
//! open-addressing table, the tables are folded into a global table, and the
//! result is rendered as one sorted `{key=min/mean/max, ...}` line.

pub mod decimal;
pub mod error;
pub mod merge;
pub mod report;
pub mod scan;
pub mod split;
pub mod table;
pub mod worker;

use std::path::Path;

use tracing::debug;

pub use crate::error::{Error, Result};

/// Runs the whole pipeline over `path` with a fixed pool of `workers`
/// parallel shard tasks and returns the rendered report bytes.
///
/// The run either completes fully or fails with the first worker error;
/// partial results are never produced. The output is byte-identical for any
/// worker count.
pub fn aggregate(path: &Path, workers: usize) -> Result<Vec<u8>> {
    if workers == 0 {
        return Err(Error::WorkerCount(workers));
    }

    let shards = split::split_file(path, workers)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;
    let (sender, receiver) = crossbeam_channel::bounded(shards.len());
    pool.scope(|scope| {
        for shard in &shards {
            let sender = sender.clone();
            let shard = *shard;
            scope.spawn(move |_| {
                // A send only fails if the coordinator is gone, and then
                // the run is already being torn down.
                let _ = sender.send(worker::process_shard(path, shard, table::DEFAULT_CAPACITY));
            });
        }
    });
    drop(sender);

    let mut tables = Vec::with_capacity(shards.len());
    for result in receiver {
        tables.push(result?);
    }
    debug!(shards = tables.len(), "all shard tables collected");

    let totals = merge::merge_tables(tables);
    Ok(report::render(&totals))
}
