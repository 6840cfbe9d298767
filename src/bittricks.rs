/*!
alignment arithmetic.
*/

/// Rounds `value` up to the next multiple of `multiple`.
///
/// A `multiple` of 0 returns `value` unchanged.
pub const fn round_up(value: usize, multiple: usize) -> usize {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

/// `ceil(numerator / denominator)`, with a zero denominator treated as 1.
pub const fn ceil_div(numerator: usize, denominator: usize) -> usize {
    if denominator == 0 {
        return numerator;
    }
    numerator.div_ceil(denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_up(0, 256), 0);
        assert_eq!(round_up(1, 256), 256);
        assert_eq!(round_up(256, 256), 256);
        assert_eq!(round_up(12, 8), 16);
        assert_eq!(round_up(7, 0), 7);
        assert_eq!(ceil_div(7, 3), 3);
        assert_eq!(ceil_div(6, 3), 2);
    }
}
