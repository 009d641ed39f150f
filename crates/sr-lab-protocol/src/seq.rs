//! Wrapping arithmetic over the sequence space `[0, S)`.

/// `true` when `x` lies in the inclusive range `[start, end]`, where the
/// range may wrap past `S - 1` back to zero.
pub fn in_range(x: u32, start: u32, end_inclusive: u32) -> bool {
    if start <= end_inclusive {
        start <= x && x <= end_inclusive
    } else {
        x >= start || x <= end_inclusive
    }
}

pub fn next(seq: u32, seq_space: u32) -> u32 {
    add(seq, 1, seq_space)
}

/// `(seq + n) mod S`, computed wide so large sequence spaces cannot overflow.
pub fn add(seq: u32, n: u32, seq_space: u32) -> u32 {
    ((seq as u64 + n as u64) % seq_space as u64) as u32
}

/// `(seq - n) mod S` for `n <= S`.
pub fn sub(seq: u32, n: u32, seq_space: u32) -> u32 {
    ((seq as u64 + seq_space as u64 - n as u64) % seq_space as u64) as u32
}

/// Steps from `from` forward to `to`, wrapping at `S`.
pub fn distance(from: u32, to: u32, seq_space: u32) -> u32 {
    sub(to, from, seq_space)
}

/// Last sequence number of the window of `window` slots starting at `base`.
pub fn window_last(base: u32, window: u32, seq_space: u32) -> u32 {
    add(base, window - 1, seq_space)
}

/// `true` when `x` is one of the `window` numbers starting at `base`.
pub fn in_window(x: u32, base: u32, window: u32, seq_space: u32) -> bool {
    in_range(x, base, window_last(base, window, seq_space))
}

/// `true` when `x` is one of the `window` numbers immediately preceding `base`.
pub fn in_previous_window(x: u32, base: u32, window: u32, seq_space: u32) -> bool {
    let start = sub(base, window, seq_space);
    let end = sub(base, 1, seq_space);
    in_range(x, start, end)
}
