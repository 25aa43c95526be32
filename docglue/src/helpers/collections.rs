//! Sequence and mapping utilities

use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Elements for which `predicate` holds, in input order
pub fn filter<T, P>(items: impl IntoIterator<Item = T>, mut predicate: P) -> Vec<T>
where
    P: FnMut(&T) -> bool,
{
    items.into_iter().filter(|item| predicate(item)).collect()
}

/// Apply `mapper` to every element, preserving order
pub fn map<T, S>(items: impl IntoIterator<Item = T>, mapper: impl FnMut(T) -> S) -> Vec<S> {
    items.into_iter().map(mapper).collect()
}

/// First element for which `predicate` holds
pub fn first_in_list<T, P>(items: impl IntoIterator<Item = T>, mut predicate: P) -> Option<T>
where
    P: FnMut(&T) -> bool,
{
    items.into_iter().find(|item| predicate(item))
}

/// Index elements by the key `key_builder` derives; later elements win on
/// key collisions.
pub fn list_to_map<T, K>(
    items: impl IntoIterator<Item = T>,
    mut key_builder: impl FnMut(&T) -> K,
) -> HashMap<K, T>
where
    K: Eq + Hash,
{
    items
        .into_iter()
        .map(|item| (key_builder(&item), item))
        .collect()
}

/// Whether `items` holds an element equal to `needle`
pub fn contains<T: PartialEq>(items: &[T], needle: &T) -> bool {
    items.contains(needle)
}

/// `Some(true)` for `true`, `None` for `false`.
///
/// Useful for optional flags that should be omitted from serialized output
/// unless set.
pub fn true_or_none(value: bool) -> Option<bool> {
    value.then_some(true)
}

/// Decode JSON bytes into `T`
pub fn from_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read a whole UTF-8 file
pub fn read_file_to_string(path: impl AsRef<Path>) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde::Deserialize;
    use std::io::Write;

    #[test]
    fn test_filter_and_map() {
        let evens = filter(vec![1, 2, 3, 4], |n| n % 2 == 0);
        assert_eq!(evens, vec![2, 4]);
        assert!(filter(Vec::<i32>::new(), |_| true).is_empty());

        let labels = map(&evens, |n| format!("#{n}"));
        assert_eq!(labels, vec!["#2", "#4"]);
    }

    #[test]
    fn test_first_in_list() {
        let words = ["apple", "banana", "avocado"];
        assert_eq!(first_in_list(words, |w| w.starts_with('a')), Some("apple"));
        assert_eq!(first_in_list(words, |w| w.starts_with('z')), None);
    }

    #[test]
    fn test_list_to_map_last_wins() {
        let pairs = vec![("a", 1), ("b", 2), ("a", 3)];
        let by_key = list_to_map(pairs, |(k, _)| *k);
        assert_eq!(by_key.len(), 2);
        assert_eq!(by_key["a"], ("a", 3));
    }

    #[test]
    fn test_contains() {
        assert!(contains(&[1, 2, 3], &2));
        assert!(!contains(&[1, 2, 3], &7));
        assert!(!contains::<i32>(&[], &1));
    }

    #[test]
    fn test_true_or_none() {
        assert_eq!(true_or_none(true), Some(true));
        assert_eq!(true_or_none(false), None);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Token {
        sub: String,
    }

    #[test]
    fn test_from_json_bytes() {
        let token: Token = from_json_bytes(br#"{"sub":"user-1"}"#).unwrap();
        assert_eq!(token.sub, "user-1");

        let err = from_json_bytes::<Token>(b"not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_read_file_to_string() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "hello").unwrap();
        assert_eq!(read_file_to_string(file.path()).unwrap(), "hello");

        let err = read_file_to_string("/definitely/not/here").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
