//! Raw chunk encodings for inline coordinate arrays.

use chrono::{DateTime, Utc};

/// Little-endian `<i8` payload.
pub fn encode_i64(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Epoch seconds for each timestamp, as `<i8`.
pub fn encode_epoch_seconds(times: &[DateTime<Utc>]) -> Vec<u8> {
    let secs: Vec<i64> = times.iter().map(DateTime::timestamp).collect();
    encode_i64(&secs)
}

/// Fixed-width numpy unicode (`<U{n}`): UTF-32LE code points, each string
/// NUL-padded to the widest one.
///
/// Returns the width in characters and the payload.
pub fn encode_fixed_unicode<S: AsRef<str>>(values: &[S]) -> (usize, Vec<u8>) {
    let width = values
        .iter()
        .map(|v| v.as_ref().chars().count())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut out = Vec::with_capacity(values.len() * width * 4);
    for value in values {
        let mut n = 0;
        for c in value.as_ref().chars() {
            out.extend_from_slice(&(c as u32).to_le_bytes());
            n += 1;
        }
        out.resize(out.len() + (width - n) * 4, 0);
    }
    (width, out)
}
