use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort an aggregation run.
///
/// All of these are fatal: the input is a static, already-closed file, so
/// nothing is retried and no partial report is ever produced.
#[derive(Error, Debug)]
pub enum Error {
    /// Worker count must be at least one
    #[error("invalid worker count {0}, must be at least 1")]
    WorkerCount(usize),

    /// Input file could not be opened or stat'ed
    #[error("cannot read input file {path}: {source}")]
    OpenInput { path: PathBuf, source: io::Error },

    /// Worker thread pool could not be built
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Splitter found no line terminator inside its lookahead window,
    /// meaning a line is longer than the configured maximum
    #[error("no line terminator in the {window}-byte window ending at byte {offset}")]
    SplitWindow { offset: u64, window: u64 },

    /// Read or seek failure on the input file
    #[error("i/o failure at byte {offset} of the input: {source}")]
    Io { offset: u64, source: io::Error },

    /// A record violates the `key;decimal` line shape
    #[error("malformed record at byte {offset}: {reason}")]
    Format { offset: u64, reason: &'static str },

    /// A shard saw more distinct keys than its table safety threshold
    #[error("shard table over capacity: {live} distinct keys exceed the threshold of {limit}")]
    Capacity { live: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
