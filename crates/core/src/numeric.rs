//! Shared numeric parsing helpers.
//!
//! Several engines need the same "does this byte string look like an
//! integer / float" check: `ValueObject::try_compact_string`, `IntArraySet`
//! membership tests, `HashEngine::incr_by(_float)`. Centralising it avoids
//! five slightly-different parsers disagreeing on edge cases like leading
//! zeros or `+` signs.

/// Parse a byte string as a strict base-10 `i64`.
///
/// Unlike `str::parse`, this rejects leading `+`, leading zeros on
/// multi-digit numbers (`"01"`), and whitespace, matching the strict
/// "is this exactly how we'd render the integer" check a compact-string
/// encoding decision needs.
pub fn parse_strict_i64(bytes: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(bytes).ok()?;
    if s.is_empty() {
        return None;
    }
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if neg && digits == "0" {
        // "-0" does not round-trip back to "-0", so it is not compactable.
        return None;
    }
    let value: i64 = s.parse().ok()?;
    if value.to_string() != s {
        return None;
    }
    Some(value)
}

/// Parse a byte string as an `f64`, rejecting `NaN` and both infinities the
/// way the engines' numeric commands do (scores and increments must be
/// finite).
pub fn parse_finite_f64(bytes: &[u8]) -> Option<f64> {
    let s = std::str::from_utf8(bytes).ok()?;
    let value: f64 = s.trim().parse().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_i64_accepts_canonical_forms() {
        assert_eq!(parse_strict_i64(b"0"), Some(0));
        assert_eq!(parse_strict_i64(b"42"), Some(42));
        assert_eq!(parse_strict_i64(b"-42"), Some(-42));
        assert_eq!(
            parse_strict_i64(i64::MIN.to_string().as_bytes()),
            Some(i64::MIN)
        );
    }

    #[test]
    fn strict_i64_rejects_non_canonical_forms() {
        assert_eq!(parse_strict_i64(b"+42"), None);
        assert_eq!(parse_strict_i64(b"042"), None);
        assert_eq!(parse_strict_i64(b"-0"), None);
        assert_eq!(parse_strict_i64(b" 42"), None);
        assert_eq!(parse_strict_i64(b"4.2"), None);
        assert_eq!(parse_strict_i64(b""), None);
    }

    #[test]
    fn finite_f64_rejects_nan_and_infinities() {
        assert_eq!(parse_finite_f64(b"nan"), None);
        assert_eq!(parse_finite_f64(b"NaN"), None);
        assert_eq!(parse_finite_f64(b"1.5"), Some(1.5));
        assert_eq!(parse_finite_f64(b"inf"), None);
        assert_eq!(parse_finite_f64(b"-inf"), None);
        assert_eq!(parse_finite_f64(b"infinity"), None);
    }
}
