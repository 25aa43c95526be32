//! Unordered collection of unique values

use std::collections::hash_set::{IntoIter, Iter};
use std::collections::HashSet;
use std::hash::Hash;

/// A set of unique elements with no ordering guarantee.
///
/// ```rust
/// use docglue::helpers::Set;
///
/// let mut a = Set::from_list([1, 2]);
/// a.union(&Set::from_list([2, 3]));
/// assert_eq!(a.size(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set<E: Eq + Hash> {
    items: HashSet<E>,
}

impl<E: Eq + Hash> Default for Set<E> {
    fn default() -> Self {
        Self {
            items: HashSet::new(),
        }
    }
}

impl<E: Eq + Hash> Set<E> {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding every distinct element of `items`
    pub fn from_list(items: impl IntoIterator<Item = E>) -> Self {
        items.into_iter().collect()
    }

    /// Add one element; returns whether it was new
    pub fn add(&mut self, elem: E) -> bool {
        self.items.insert(elem)
    }

    /// Add every element of `elems`
    pub fn add_many(&mut self, elems: impl IntoIterator<Item = E>) {
        self.items.extend(elems);
    }

    /// Membership test
    pub fn contains(&self, elem: &E) -> bool {
        self.items.contains(elem)
    }

    /// Add every element of `other` to this set
    pub fn union(&mut self, other: &Set<E>)
    where
        E: Clone,
    {
        self.items.extend(other.items.iter().cloned());
    }

    /// Number of distinct elements
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Whether the set holds no elements
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Elements in unspecified order
    pub fn to_list(&self) -> Vec<E>
    where
        E: Clone,
    {
        self.items.iter().cloned().collect()
    }

    /// Borrowing iterator in unspecified order
    pub fn iter(&self) -> Iter<'_, E> {
        self.items.iter()
    }
}

impl<E: Eq + Hash> FromIterator<E> for Set<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<E: Eq + Hash> Extend<E> for Set<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<E: Eq + Hash> IntoIterator for Set<E> {
    type Item = E;
    type IntoIter = IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, E: Eq + Hash> IntoIterator for &'a Set<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union() {
        let mut a = Set::from_list([1, 2]);
        let b = Set::from_list([2, 3]);
        a.union(&b);

        assert_eq!(a.size(), 3);
        let mut items = a.to_list();
        items.sort_unstable();
        assert_eq!(items, vec![1, 2, 3]);
        // Insertion order does not matter
        let mut c = Set::from_list([3, 2]);
        c.union(&Set::from_list([1]));
        assert_eq!(a, c);
    }

    #[test]
    fn test_add_reports_new_elements() {
        let mut set = Set::new();
        assert!(set.add("a"));
        assert!(!set.add("a"));
        set.add_many(["b", "c", "b"]);

        assert_eq!(set.size(), 3);
        assert!(set.contains(&"c"));
        assert!(!set.contains(&"z"));
    }

    #[test]
    fn test_empty() {
        let set: Set<String> = Set::new();
        assert!(set.is_empty());
        assert!(set.to_list().is_empty());
        assert_eq!(set.iter().count(), 0);
    }
}
