//! Turning a stream into bounded choices.

use super::stream::DeterministicStream;

/// Integer in `[0, n)` from exactly one draw.
///
/// `floor(next * n) % n`; the modulo only clamps the upper edge. Callers
/// must pass `n >= 1`.
pub fn bounded_int(stream: &mut DeterministicStream, n: u32) -> u32 {
    debug_assert!(n >= 1, "bounded_int requires n >= 1");
    if n == 0 {
        return 0;
    }
    let value = stream.next_f64() * n as f64;
    (value.floor() as u32) % n
}

/// Element of a non-empty list, indexed the same way as `bounded_int`.
pub fn pick_one<'a, T>(stream: &mut DeterministicStream, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let index = bounded_int(stream, items.len() as u32) as usize;
    items.get(index)
}
