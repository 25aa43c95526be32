//! Sort specifications for list queries

use std::fmt;

use bson::Document;

/// Direction for a sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Ascending order
    #[default]
    Ascending,
    /// Descending order
    Descending,
}

impl SortDirection {
    /// Store-native value (`1` / `-1`)
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Ordered list of `(field, direction)` pairs; earlier keys take precedence.
///
/// ```rust
/// use docglue::store::Sort;
///
/// let sort = Sort::new().desc("created_at").asc("name");
/// assert_eq!(sort.to_document(), bson::doc! { "created_at": -1, "name": 1 });
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    keys: Vec<(String, SortDirection)>,
}

impl Sort {
    /// No ordering; the store's natural order applies
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key
    #[must_use]
    pub fn by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    /// Append an ascending key
    #[must_use]
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.by(field, SortDirection::Ascending)
    }

    /// Append a descending key
    #[must_use]
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.by(field, SortDirection::Descending)
    }

    /// Whether no key was given
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in precedence order
    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    /// Store-native sort document, preserving key order
    pub fn to_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, direction)| (field.clone(), direction.as_i32().into()))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, SortDirection)> for Sort {
    fn from_iter<I: IntoIterator<Item = (S, SortDirection)>>(iter: I) -> Self {
        Self {
            keys: iter
                .into_iter()
                .map(|(field, direction)| (field.into(), direction))
                .collect(),
        }
    }
}
