//! Drives one shard end-to-end: seeked, block-buffered reads feeding the
//! word-at-a-time scanner and fixed-point parser into the shard's private
//! table.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use memchr::{memchr, memrchr};
use tracing::trace;

use crate::decimal::parse_fixed;
use crate::error::{Error, Result};
use crate::scan::{hash_key, scan_key, ScanOutcome, DELIMITER, TERMINATOR};
use crate::split::Shard;
use crate::table::ShardTable;

/// Read block size. Much larger than any line, so almost all records are
/// consumed by the word-wise fast path.
const BLOCK_SIZE: usize = 1 << 20;

/// Reads the shard's byte range and returns its completed table, or the
/// first fatal error. The worker opens its own handle so shards share no
/// state at all.
pub fn process_shard(path: &Path, shard: Shard, table_capacity: usize) -> Result<ShardTable> {
    process_with_block_size(path, shard, table_capacity, BLOCK_SIZE)
}

fn process_with_block_size(
    path: &Path,
    shard: Shard,
    table_capacity: usize,
    block_size: usize,
) -> Result<ShardTable> {
    let mut table = ShardTable::with_capacity(table_capacity);
    if shard.length == 0 {
        return Ok(table);
    }

    let mut file = File::open(path).map_err(|source| Error::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    file.seek(SeekFrom::Start(shard.offset))
        .map_err(|source| Error::Io {
            offset: shard.offset,
            source,
        })?;
    let mut reader = file.take(shard.length);

    let mut buf = vec![0u8; block_size];
    // unconsumed bytes carried at the front of the buffer
    let mut filled = 0usize;
    // file offset of buf[0]
    let mut base = shard.offset;

    loop {
        let n = reader
            .read(&mut buf[filled..])
            .map_err(|source| Error::Io {
                offset: base + filled as u64,
                source,
            })?;
        if n == 0 {
            if filled > 0 {
                // Shard exhausted: whatever is left must be complete lines
                // too short for whole-word scanning.
                consume_tail(&buf[..filled], base, &mut table)?;
            }
            break;
        }
        filled += n;

        // Trim to the last complete line; the partial rest waits for the
        // next read.
        let Some(last_newline) = memrchr(TERMINATOR, &buf[..filled]) else {
            if filled == buf.len() {
                return Err(Error::Format {
                    offset: base,
                    reason: "record longer than the read buffer",
                });
            }
            continue;
        };
        let mut consumed = scan_block(&buf[..last_newline + 1], base, &mut table)?;
        if filled == buf.len() && consumed <= last_newline {
            // The word scan stalled inside a full buffer (a trailing line
            // whose delimiter sits past the last whole word). Finish the
            // complete-line prefix the scalar way so the next read has room.
            consume_tail(
                &buf[consumed..last_newline + 1],
                base + consumed as u64,
                &mut table,
            )?;
            consumed = last_newline + 1;
        }
        buf.copy_within(consumed..filled, 0);
        base += consumed as u64;
        filled -= consumed;
    }

    trace!(
        offset = shard.offset,
        length = shard.length,
        keys = table.len(),
        "shard complete"
    );
    Ok(table)
}

/// Word-wise scan over a block that ends on a line terminator. Returns how
/// many bytes were consumed; the remainder (lines whose delimiter sits
/// beyond the last whole word) is left for the caller to carry over.
fn scan_block(block: &[u8], base: u64, table: &mut ShardTable) -> Result<usize> {
    let mut pos = 0usize;
    while pos < block.len() {
        let (key_len, hash) = match scan_key(&block[pos..]) {
            ScanOutcome::Delimiter { key_len, hash } => (key_len, hash),
            ScanOutcome::Terminator { at } => {
                return Err(Error::Format {
                    offset: base + (pos + at) as u64,
                    reason: "line terminator before any delimiter",
                })
            }
            ScanOutcome::NeedMore => break,
        };
        let value_at = pos + key_len + 1;
        let Some((value, value_len)) = parse_fixed(&block[value_at..]) else {
            return Err(Error::Format {
                offset: base + value_at as u64,
                reason: "malformed measurement",
            });
        };
        table.insert(&block[pos..pos + key_len], hash, value)?;
        pos = value_at + value_len;
    }
    Ok(pos)
}

/// Scalar fallback for the final bytes of a shard: every record here is
/// complete, just too close to the end for 8-byte loads. Hashing goes
/// through `hash_key`, which matches the word-wise hash bit for bit.
fn consume_tail(tail: &[u8], base: u64, table: &mut ShardTable) -> Result<()> {
    let mut pos = 0usize;
    while pos < tail.len() {
        let rest = &tail[pos..];
        let Some(newline) = memchr(TERMINATOR, rest) else {
            return Err(Error::Format {
                offset: base + pos as u64,
                reason: "unterminated final record",
            });
        };
        let Some(delimiter) = memchr(DELIMITER, &rest[..newline]) else {
            return Err(Error::Format {
                offset: base + (pos + newline) as u64,
                reason: "line terminator before any delimiter",
            });
        };
        let key = &rest[..delimiter];
        let value_at = delimiter + 1;
        let Some((value, value_len)) = parse_fixed(&rest[value_at..]) else {
            return Err(Error::Format {
                offset: base + (pos + value_at) as u64,
                reason: "malformed measurement",
            });
        };
        table.insert(key, hash_key(key), value)?;
        pos += value_at + value_len;
    }
    Ok(())
}
