//! Numeric range to digit-pattern rendering.
//!
//! Turns an inclusive `min-max` range into a regex alternation over digit
//! patterns, e.g. `1-100` becomes `[1-9]|[1-9][0-9]|100`. The range is split
//! at all-nines and all-zeros boundaries so every alternative covers numbers
//! of one shape, and alternatives are ordered shortest first.

use crate::error::CompileError;

/// Render a `min-max` string as a regex alternation body.
///
/// The caller wraps the result in its own group and word boundaries.
pub fn range_pattern(input: &str) -> Result<String, CompileError> {
    let (min, max) = parse_bounds(input)?;
    let mut patterns = Vec::new();
    let mut start = min;
    for stop in split_to_ranges(min, max) {
        patterns.push(subrange_pattern(start, stop));
        start = stop + 1;
    }
    Ok(patterns.join("|"))
}

/// Parse and validate the two bounds of a range string.
fn parse_bounds(input: &str) -> Result<(u64, u64), CompileError> {
    let Some((lo, hi)) = input.split_once('-') else {
        return Err(CompileError::range(input, "expected the form 'min-max'"));
    };
    let min: u64 = lo
        .trim()
        .parse()
        .map_err(|_| CompileError::range(input, "min is not a number"))?;
    let max: u64 = hi
        .trim()
        .parse()
        .map_err(|_| CompileError::range(input, "max is not a number"))?;
    if min > max {
        return Err(CompileError::range(input, "min exceeds max"));
    }
    Ok((min, max))
}

/// Boundary stops between `min` and `max`, ascending, always ending at `max`.
///
/// Stops sit where the number of digits or the fixed digit prefix changes:
/// `min` with its last n digits as nines, and `max + 1` with its last n
/// digits as zeros, minus one.
fn split_to_ranges(min: u64, max: u64) -> Vec<u64> {
    let mut stops = vec![max];

    let mut nines = 1;
    while let Some(stop) = to_nines(min, nines) {
        if min > stop || stop >= max {
            break;
        }
        stops.push(stop);
        nines += 1;
    }

    if let Some(above) = max.checked_add(1) {
        let mut zeros = 1;
        while let Some(stop) = to_zeros(above, zeros) {
            if min >= stop || stop >= max {
                break;
            }
            stops.push(stop);
            zeros += 1;
        }
    }

    stops.sort_unstable();
    stops.dedup();
    stops
}

/// Replace the last `count` digits of `value` with nines.
fn to_nines(value: u64, count: u32) -> Option<u64> {
    let base = 10u64.checked_pow(count)?;
    (value / base).checked_mul(base)?.checked_add(base - 1)
}

/// `value` with its last `count` digits as zeros, minus one.
fn to_zeros(value: u64, count: u32) -> Option<u64> {
    let base = 10u64.checked_pow(count)?;
    Some((value - value % base).saturating_sub(1))
}

/// Pattern for one same-shape subrange.
fn subrange_pattern(start: u64, stop: u64) -> String {
    if start == stop {
        return start.to_string();
    }

    let start_digits: Vec<char> = start.to_string().chars().collect();
    let stop_digits: Vec<char> = stop.to_string().chars().collect();
    let mut pattern = String::new();
    let mut trailing_full = 0;

    for (a, b) in start_digits.iter().zip(stop_digits.iter()) {
        if a == b {
            pattern.push(*a);
        } else if *a == '0' && *b == '9' {
            trailing_full += 1;
        } else {
            pattern.push_str(&format!("[{a}-{b}]"));
        }
    }

    if trailing_full > 0 {
        pattern.push_str("[0-9]");
        if trailing_full > 1 {
            pattern.push_str(&format!("{{{trailing_full}}}"));
        }
    }

    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_digit_range() {
        assert_eq!(range_pattern("1-3").unwrap(), "[1-3]");
    }

    #[test]
    fn single_value_range() {
        assert_eq!(range_pattern("5-5").unwrap(), "5");
    }

    #[test]
    fn range_crossing_digit_counts() {
        assert_eq!(range_pattern("1-100").unwrap(), "[1-9]|[1-9][0-9]|100");
    }

    #[test]
    fn range_with_shared_prefix() {
        assert_eq!(range_pattern("10-29").unwrap(), "1[0-9]|2[0-9]");
    }

    #[test]
    fn range_with_repeated_full_digits() {
        assert_eq!(range_pattern("1-999").unwrap(), "[1-9]|[1-9][0-9]|[1-9][0-9]{2}");
    }

    #[test]
    fn whitespace_tolerated_around_bounds() {
        assert_eq!(range_pattern("1 - 3").unwrap(), "[1-3]");
    }

    #[test]
    fn malformed_ranges_fail() {
        assert!(range_pattern("13").is_err());
        assert!(range_pattern("a-3").is_err());
        assert!(range_pattern("1-b").is_err());
        assert!(range_pattern("9-1").is_err());
    }
}
