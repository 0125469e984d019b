//! Ordering keys for stories using fractional indexing.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Digits in ascending byte order, so digit order and string order agree.
const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: u8 = DIGITS.len() as u8;

/// Position of a story in the board's global order.
///
/// Ordinals are strings that sort lexicographically to determine display
/// order. A new ordinal can always be generated strictly between two
/// existing ones, so moving a story never rewrites its neighbours.
///
/// Valid ordinals are non-empty, use only the base-62 digit alphabet and
/// never end in `0`; that last rule guarantees a midpoint always exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ordinal(String);

impl Ordinal {
    /// Ordinal for the first story of an empty board
    pub fn first() -> Self {
        Self::from_digits(midpoint(&[], None))
    }

    /// Ordinal after `last`, with nothing bounding it above
    pub fn after(last: &Ordinal) -> Self {
        Self::from_digits(midpoint(&last.digits(), None))
    }

    /// Ordinal before `first`, with nothing bounding it below
    pub fn before(first: &Ordinal) -> Self {
        Self::from_digits(midpoint(&[], Some(&first.digits())))
    }

    /// Ordinal strictly between `before` and `after`.
    ///
    /// If the bounds are not in ascending order there is no gap to fill, and
    /// the result is simply placed after `before`.
    pub fn between(before: &Ordinal, after: &Ordinal) -> Self {
        if before >= after {
            return Self::after(before);
        }
        Self::from_digits(midpoint(&before.digits(), Some(&after.digits())))
    }

    /// Parse an ordinal, rejecting strings outside the digit alphabet
    pub fn parse(s: &str) -> Option<Self> {
        let valid = !s.is_empty()
            && !s.ends_with('0')
            && s.bytes().all(|b| DIGITS.contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digits(&self) -> Vec<u8> {
        self.0
            .bytes()
            .map(|b| DIGITS.iter().position(|d| *d == b).unwrap_or(0) as u8)
            .collect()
    }

    fn from_digits(digits: Vec<u8>) -> Self {
        Self(digits.into_iter().map(|d| DIGITS[d as usize] as char).collect())
    }
}

/// Digits strictly between `a` and `b` (`None` means one past the end).
///
/// `a` is read as if padded with zeros; `b` must be greater than `a`.
fn midpoint(a: &[u8], b: Option<&[u8]>) -> Vec<u8> {
    if let Some(b) = b {
        let mut n = 0;
        while n < b.len() && a.get(n).copied().unwrap_or(0) == b[n] {
            n += 1;
        }
        if n > 0 {
            let mut out = b[..n].to_vec();
            out.extend(midpoint(&a[n.min(a.len())..], Some(&b[n..])));
            return out;
        }
    }

    let da = a.first().copied().unwrap_or(0);
    let db = b.and_then(|b| b.first().copied()).unwrap_or(BASE);

    if db - da > 1 {
        return vec![(da + db) / 2];
    }

    // Consecutive first digits
    if let Some(b) = b {
        if b.len() > 1 {
            return vec![b[0]];
        }
    }
    let mut out = vec![da];
    out.extend(midpoint(a.get(1..).unwrap_or(&[]), None));
    out
}

impl PartialOrd for Ordinal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ordinal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Default for Ordinal {
    fn default() -> Self {
        Self::first()
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Ordinal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ordinal::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid ordinal '{}'", s)))
    }
}

/// Accept any position value from the store, keeping only valid ordinals.
///
/// Stores that still send numeric positions get fresh ordinals assigned by
/// the board on load.
pub(crate) fn lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Ordinal>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(Ordinal::parse))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ord(s: &str) -> Ordinal {
        Ordinal::parse(s).unwrap()
    }

    #[test]
    fn test_ordinal_first() {
        assert_eq!(Ordinal::first().as_str(), "V");
    }

    #[test]
    fn test_ordinal_after() {
        let first = Ordinal::first();
        let second = Ordinal::after(&first);
        assert!(second > first);

        // Chain multiple, including past the last digit
        let mut last = second;
        for _ in 0..200 {
            let next = Ordinal::after(&last);
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_ordinal_before() {
        let mut first = Ordinal::first();
        for _ in 0..200 {
            let prev = Ordinal::before(&first);
            assert!(prev < first, "{} !< {}", prev, first);
            assert!(!prev.as_str().ends_with('0'));
            first = prev;
        }
    }

    #[test]
    fn test_ordinal_between() {
        let a = ord("V");
        let b = ord("W");
        let mid = Ordinal::between(&a, &b);
        assert_eq!(mid.as_str(), "VV");
        assert!(a < mid && mid < b);

        let deeper = Ordinal::between(&mid, &b);
        assert!(mid < deeper && deeper < b);
    }

    #[test]
    fn test_ordinal_between_repeatedly_narrows() {
        let lo = ord("a");
        let mut hi = ord("b");
        for _ in 0..100 {
            let mid = Ordinal::between(&lo, &hi);
            assert!(lo < mid && mid < hi);
            hi = mid;
        }
    }

    #[test]
    fn test_ordinal_between_out_of_order_falls_after() {
        let a = ord("k");
        let b = ord("c");
        assert!(Ordinal::between(&a, &b) > a);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(Ordinal::parse("").is_none());
        assert!(Ordinal::parse("a0").is_none());
        assert!(Ordinal::parse("a-b").is_none());
        assert!(Ordinal::parse("a01").is_some());
    }

    #[test]
    fn test_lenient_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default, deserialize_with = "lenient")]
            position: Option<Ordinal>,
        }

        let w: Wrapper = serde_json::from_str(r#"{"position": 3.5}"#).unwrap();
        assert!(w.position.is_none());
        let w: Wrapper = serde_json::from_str(r#"{"position": "Vk"}"#).unwrap();
        assert_eq!(w.position, Some(ord("Vk")));
        let w: Wrapper = serde_json::from_str("{}").unwrap();
        assert!(w.position.is_none());
    }
}
