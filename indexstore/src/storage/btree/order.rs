//! Key comparators.
//!
//! Every tree is ordered by a `KeyOrder` supplied at construction. Most
//! indexes use the key's own `Ord`, but text indexes compare case-insensitively
//! and callers may pass any closure.

use std::cmp::Ordering;

/// A total order over keys of type `K`.
///
/// Implementations must be consistent: the same pair always compares the
/// same way for the lifetime of a tree, or lookups will miss entries.
pub trait KeyOrder<K: ?Sized> {
    /// Compare two keys.
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their `Ord` implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> KeyOrder<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Orders strings ignoring ASCII case, so `"Alice"` and `"alice"` compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaseInsensitive;

impl KeyOrder<str> for CaseInsensitive {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
    }
}

impl KeyOrder<String> for CaseInsensitive {
    fn compare(&self, a: &String, b: &String) -> Ordering {
        <Self as KeyOrder<str>>::compare(self, a, b)
    }
}

/// Inverts another order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reverse<C>(pub C);

impl<K: ?Sized, C: KeyOrder<K>> KeyOrder<K> for Reverse<C> {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self.0.compare(b, a)
    }
}

impl<K: ?Sized, F> KeyOrder<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        assert_eq!(NaturalOrder.compare(&1, &2), Ordering::Less);
        assert_eq!(NaturalOrder.compare("b", "a"), Ordering::Greater);
    }

    #[test]
    fn test_case_insensitive() {
        let order = CaseInsensitive;
        assert_eq!(
            order.compare(&"Alice".to_string(), &"alice".to_string()),
            Ordering::Equal
        );
        assert_eq!(order.compare("apple", "Banana"), Ordering::Less);
        assert_eq!(order.compare("abc", "ab"), Ordering::Greater);
    }

    #[test]
    fn test_reverse_and_closure() {
        assert_eq!(Reverse(NaturalOrder).compare(&1, &2), Ordering::Greater);

        let by_len = |a: &String, b: &String| a.len().cmp(&b.len());
        assert_eq!(
            by_len.compare(&"zz".to_string(), &"aaa".to_string()),
            Ordering::Less
        );
    }
}
