//! Renders the merged table as the final report line.

use crate::merge::GlobalTable;
use crate::table::StationStat;

/// Sorts keys by raw byte order and renders
/// `{key=min/mean/max, ...}` plus a trailing newline. Keys are written as
/// the bytes they arrived as, never decoded, so the ordering and the output
/// are deterministic regardless of shard count or scheduling.
pub fn render(totals: &GlobalTable) -> Vec<u8> {
    let mut stations: Vec<(&[u8], &StationStat)> =
        totals.iter().map(|(key, stat)| (key.as_ref(), stat)).collect();
    stations.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut out = Vec::with_capacity(stations.len() * 32 + 3);
    out.push(b'{');
    for (i, (key, stat)) in stations.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(b", ");
        }
        out.extend_from_slice(key);
        out.push(b'=');
        push_tenths(&mut out, stat.min as i64);
        out.push(b'/');
        push_tenths(&mut out, mean_tenths(stat));
        out.push(b'/');
        push_tenths(&mut out, stat.max as i64);
    }
    out.extend_from_slice(b"}\n");
    out
}

/// Mean in tenths, rounded half away from zero, computed entirely in the
/// integer domain.
fn mean_tenths(stat: &StationStat) -> i64 {
    let magnitude = (2 * stat.sum.abs() + stat.count) / (2 * stat.count);
    if stat.sum < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Writes a tenths-scaled value with exactly one fractional digit. Values
/// stay within two integer digits by construction, so digits are emitted
/// directly.
fn push_tenths(out: &mut Vec<u8>, tenths: i64) {
    let magnitude = if tenths < 0 {
        out.push(b'-');
        -tenths
    } else {
        tenths
    };
    if magnitude >= 100 {
        out.push((magnitude / 100) as u8 + b'0');
    }
    out.push(((magnitude / 10) % 10) as u8 + b'0');
    out.push(b'.');
    out.push((magnitude % 10) as u8 + b'0');
}
