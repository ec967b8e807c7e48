//! Partitions the input file into line-aligned shards.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use memchr::memrchr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::scan::TERMINATOR;

/// Longest line the splitter can tolerate. Boundary targets are approached
/// through a lookahead window of this many bytes, so any line longer than
/// this makes the split fail rather than risk cutting a record in half.
pub const MAX_LINE_LEN: u64 = 100;

/// A contiguous byte range of the input file, owned by exactly one worker.
/// Shards never split a line: every boundary falls immediately after a line
/// terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub offset: u64,
    pub length: u64,
}

/// Computes up to `parts` ordered, non-overlapping shards whose union is
/// exactly the whole file. Boundaries that would produce an empty shard
/// (tiny files, more workers than lines) are skipped, so the returned list
/// may be shorter than `parts`. An empty file yields no shards.
pub fn split_file(path: &Path, parts: usize) -> Result<Vec<Shard>> {
    let mut file = File::open(path).map_err(|source| Error::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    let size = file
        .metadata()
        .map_err(|source| Error::OpenInput {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if size == 0 {
        return Ok(Vec::new());
    }

    let parts = parts.max(1);
    let split_size = size / parts as u64;
    let mut window = [0u8; MAX_LINE_LEN as usize];
    let mut shards = Vec::with_capacity(parts);
    let mut offset = 0u64;

    for _ in 1..parts {
        let target = offset + split_size;
        if target >= size {
            break;
        }
        // Read the window that ends at the target and cut after the last
        // terminator inside it.
        let seek = target.saturating_sub(MAX_LINE_LEN);
        file.seek(SeekFrom::Start(seek))
            .map_err(|source| Error::Io {
                offset: seek,
                source,
            })?;
        let n = read_full(&mut file, &mut window).map_err(|source| Error::Io {
            offset: seek,
            source,
        })?;
        let Some(newline) = memrchr(TERMINATOR, &window[..n]) else {
            return Err(Error::SplitWindow {
                offset: target,
                window: MAX_LINE_LEN,
            });
        };
        let end = seek + newline as u64 + 1;
        if end > offset {
            shards.push(Shard {
                offset,
                length: end - offset,
            });
            offset = end;
        }
    }
    if offset < size {
        shards.push(Shard {
            offset,
            length: size - offset,
        });
    }

    debug!(
        parts = shards.len(),
        file_size = size,
        "input split into line-aligned shards"
    );
    Ok(shards)
}

/// Reads until `buf` is full or the file ends, whichever comes first.
fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    fn assert_covering(shards: &[Shard], contents: &[u8]) {
        let mut expected = 0u64;
        for shard in shards {
            assert_eq!(shard.offset, expected, "shards must be contiguous");
            assert!(shard.length > 0, "no shard may be empty");
            expected += shard.length;
            // every boundary falls right after a terminator
            assert_eq!(contents[(shard.offset + shard.length - 1) as usize], b'\n');
        }
        assert_eq!(expected, contents.len() as u64, "union must be the whole file");
    }

    #[test]
    fn covers_the_file_exactly_with_line_aligned_boundaries() {
        let mut contents = Vec::new();
        for i in 0..500 {
            contents.extend_from_slice(format!("station-{i};{}.{}\n", i % 90, i % 10).as_bytes());
        }
        let file = fixture(&contents);
        for parts in [1, 2, 3, 4, 7, 8] {
            let shards = split_file(file.path(), parts).unwrap();
            assert!(shards.len() <= parts);
            assert_covering(&shards, &contents);
        }
    }

    #[test]
    fn single_part_is_the_whole_file() {
        let contents = b"Hamburg;12.3\nBerlin;-4.0\n";
        let file = fixture(contents);
        let shards = split_file(file.path(), 1).unwrap();
        assert_eq!(
            shards,
            vec![Shard {
                offset: 0,
                length: contents.len() as u64
            }]
        );
    }

    #[test]
    fn empty_file_has_no_shards() {
        let file = fixture(b"");
        assert!(split_file(file.path(), 4).unwrap().is_empty());
    }

    #[test]
    fn more_parts_than_lines_skips_degenerate_boundaries() {
        let contents = b"a;1.0\nb;2.0\n";
        let file = fixture(contents);
        let shards = split_file(file.path(), 8).unwrap();
        assert_covering(&shards, contents);
    }

    #[test]
    fn line_longer_than_the_window_is_a_split_error() {
        // one 400-byte line: the window before the midpoint target holds no
        // terminator
        let mut contents = vec![b'k'; 394];
        contents.extend_from_slice(b";1.0\n");
        let file = fixture(&contents);
        let err = split_file(file.path(), 2).unwrap_err();
        assert!(matches!(err, Error::SplitWindow { .. }));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = split_file(Path::new("/no/such/measurements.txt"), 2).unwrap_err();
        assert!(matches!(err, Error::OpenInput { .. }));
    }
}
