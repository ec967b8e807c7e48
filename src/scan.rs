//! Word-at-a-time delimiter search with a rolling key hash.
//!
//! The scanner walks a byte window in 8-byte little-endian words. Each word
//! is XORed against a broadcast copy of the delimiter; the classic zero-byte
//! trick `(diff - 0x0101..) & (!diff & 0x8080..)` then lights up the high bit
//! of every lane that held the delimiter, and the trailing-zero count of that
//! mask gives the first match without a per-byte loop. Words are folded into
//! a multiply-and-rotate hash as they are examined, so the key is hashed in
//! the same pass that finds its end.
//!
//! This module is purely functional over buffers and does no I/O.

/// Byte separating the key from the value on each line.
pub const DELIMITER: u8 = b';';

/// Byte ending each record.
pub const TERMINATOR: u8 = b'\n';

const LOW_BITS: u64 = 0x0101_0101_0101_0101;
const HIGH_BITS: u64 = 0x8080_8080_8080_8080;
const HASH_MULTIPLIER: u64 = 0x517c_c1b7_2722_0a95;

/// What the scanner found at the start of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Delimiter located: the key occupies `key_len` bytes and hashed to
    /// `hash` along the way.
    Delimiter { key_len: usize, hash: u64 },
    /// A line terminator appeared before any delimiter; the record at the
    /// window start is malformed.
    Terminator { at: usize },
    /// No delimiter within the whole words of this window. The caller should
    /// read more data and retry with the unconsumed tail prefixed.
    NeedMore,
}

const fn broadcast(byte: u8) -> u64 {
    LOW_BITS * byte as u64
}

/// Per-lane match mask: bit 7 of each byte lane equal to `pattern` is set.
/// Lanes above the first match may carry stray bits from borrow propagation,
/// so only the lowest set bit is meaningful.
#[inline]
fn match_bits(word: u64, pattern: u64) -> u64 {
    let diff = word ^ pattern;
    diff.wrapping_sub(LOW_BITS) & !diff & HIGH_BITS
}

/// Byte offset of the first matching lane.
#[inline]
fn match_offset(bits: u64) -> usize {
    (bits.trailing_zeros() >> 3) as usize
}

/// Zeroes every byte above the matching lane, keeping the delimiter byte
/// itself, so the final hashed word depends only on the key.
#[inline]
fn mask_through_match(word: u64, bits: u64) -> u64 {
    word & (bits ^ bits.wrapping_sub(1))
}

#[inline]
fn mix(hash: u64, word: u64) -> u64 {
    (hash ^ word).wrapping_mul(HASH_MULTIPLIER).rotate_left(17)
}

/// Scans for the delimiter at the start of `window`, hashing the key bytes
/// in the same pass. A terminator seen first is reported so the caller can
/// reject the record instead of silently mis-parsing it.
#[inline]
pub fn scan_key(window: &[u8]) -> ScanOutcome {
    let delimiter = broadcast(DELIMITER);
    let terminator = broadcast(TERMINATOR);

    let mut hash = 0u64;
    let mut offset = 0usize;
    while offset + 8 <= window.len() {
        let word = u64::from_le_bytes(window[offset..offset + 8].try_into().unwrap());
        let delim_bits = match_bits(word, delimiter);
        let term_bits = match_bits(word, terminator);
        if term_bits != 0 && (delim_bits == 0 || term_bits.trailing_zeros() < delim_bits.trailing_zeros()) {
            return ScanOutcome::Terminator {
                at: offset + match_offset(term_bits),
            };
        }
        if delim_bits != 0 {
            let masked = mask_through_match(word, delim_bits);
            return ScanOutcome::Delimiter {
                key_len: offset + match_offset(delim_bits),
                hash: mix(hash, masked),
            };
        }
        hash = mix(hash, word);
        offset += 8;
    }
    ScanOutcome::NeedMore
}

/// Scalar equivalent of the hash `scan_key` computes: the key bytes followed
/// by the delimiter, zero-padded to word width, folded word by word. The
/// worker's tail fallback relies on this being bit-identical so a key hashed
/// either way probes the same table slots.
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hash = 0u64;
    let mut chunks = key.chunks_exact(8);
    for chunk in &mut chunks {
        hash = mix(hash, u64::from_le_bytes(chunk.try_into().unwrap()));
    }
    let rest = chunks.remainder();
    let mut last = [0u8; 8];
    last[..rest.len()].copy_from_slice(rest);
    last[rest.len()] = DELIMITER;
    mix(hash, u64::from_le_bytes(last))
}
