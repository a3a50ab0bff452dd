//! Fractional sibling ordering
//!
//! An order key is a decimal fraction in (0, 1) stored as the digits after
//! `0.` with no trailing zeros. For such strings lexicographic order equals
//! numeric order, and a key strictly between any two distinct keys always
//! exists, so inserting never renumbers neighbours.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a node among its siblings
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderKey(String);

impl OrderKey {
    /// Parse a digit string such as `"5"` or `"55"` (meaning 0.5 and 0.55).
    pub fn parse(digits: &str) -> Option<OrderKey> {
        let valid = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && !digits.ends_with('0');
        valid.then(|| OrderKey(digits.to_string()))
    }

    /// Key for the first child of an empty parent
    pub fn first() -> OrderKey {
        OrderKey(midpoint(b"", None))
    }

    /// A key strictly greater than `self`
    pub fn after(&self) -> OrderKey {
        OrderKey(midpoint(self.0.as_bytes(), None))
    }

    /// A key strictly less than `self`
    pub fn before(&self) -> OrderKey {
        OrderKey(midpoint(b"", Some(self.0.as_bytes())))
    }

    /// A key strictly between `low` and `high`; either bound may be open.
    ///
    /// Returns `None` when `low >= high`.
    pub fn between(low: Option<&OrderKey>, high: Option<&OrderKey>) -> Option<OrderKey> {
        match (low, high) {
            (Some(l), Some(h)) if l >= h => None,
            _ => Some(OrderKey(midpoint(
                low.map_or(&b""[..], |l| l.0.as_bytes()),
                high.map(|h| h.0.as_bytes()),
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Digits strictly between `a` and `b` (`b = None` meaning 1).
///
/// `a` must sort before `b`; neither carries trailing zeros.
fn midpoint(a: &[u8], b: Option<&[u8]>) -> String {
    let digit_at = |s: &[u8], i: usize| s.get(i).map_or(0, |d| d - b'0');

    if let Some(b) = b {
        let mut n = 0;
        while n < b.len() && digit_at(a, n) == b[n] - b'0' {
            n += 1;
        }
        if n > 0 {
            let prefix = String::from_utf8_lossy(&b[..n]).into_owned();
            let rest_a = if n < a.len() { &a[n..] } else { &b""[..] };
            return prefix + &midpoint(rest_a, Some(&b[n..]));
        }
    }

    let low = digit_at(a, 0);
    let high = b.map_or(10, |b| digit_at(b, 0));
    if high - low > 1 {
        return ((b'0' + (low + high) / 2) as char).to_string();
    }
    match b {
        // b has more digits, so its first digit alone already sorts below it
        Some(b) if b.len() > 1 => (b[0] as char).to_string(),
        _ => {
            let rest_a = if a.len() > 1 { &a[1..] } else { &b""[..] };
            ((b'0' + low) as char).to_string() + &midpoint(rest_a, None)
        }
    }
}

impl TryFrom<String> for OrderKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OrderKey::parse(&value).ok_or_else(|| format!("invalid order key '{}'", value))
    }
}

impl From<OrderKey> for String {
    fn from(key: OrderKey) -> Self {
        key.0
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0.{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> OrderKey {
        OrderKey::parse(s).unwrap()
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(OrderKey::parse("").is_none());
        assert!(OrderKey::parse("50").is_none());
        assert!(OrderKey::parse("5a").is_none());
        assert!(OrderKey::parse("05").is_some());
    }

    #[test]
    fn test_first_and_after() {
        let first = OrderKey::first();
        assert_eq!(first.as_str(), "5");
        let second = first.after();
        assert!(second > first);
        assert_eq!(key("9").after(), key("95"));
    }

    #[test]
    fn test_between_adjacent_digits() {
        let mid = OrderKey::between(Some(&key("5")), Some(&key("6"))).unwrap();
        assert_eq!(mid, key("55"));
        let mid = OrderKey::between(Some(&key("5")), Some(&key("501"))).unwrap();
        assert!(key("5") < mid && mid < key("501"));
    }

    #[test]
    fn test_between_rejects_inverted_bounds() {
        assert!(OrderKey::between(Some(&key("6")), Some(&key("5"))).is_none());
        assert!(OrderKey::between(Some(&key("5")), Some(&key("5"))).is_none());
    }

    #[test]
    fn test_repeated_insertion_never_exhausts() {
        let low = key("1");
        let mut high = key("2");
        for _ in 0..200 {
            let mid = OrderKey::between(Some(&low), Some(&high)).unwrap();
            assert!(low < mid && mid < high, "{} < {} < {}", low, mid, high);
            assert!(!mid.as_str().ends_with('0'));
            high = mid;
        }
        let mut low = key("1");
        let high = key("2");
        for _ in 0..200 {
            let mid = OrderKey::between(Some(&low), Some(&high)).unwrap();
            assert!(low < mid && mid < high);
            low = mid;
        }
    }

    #[test]
    fn test_before() {
        let k = key("05");
        let before = k.before();
        assert!(before < k);
        assert!(!before.as_str().ends_with('0'));
    }
}
