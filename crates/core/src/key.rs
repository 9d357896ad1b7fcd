//! Hierarchical keys and scan selectors
//!
//! A [`Key`] is an ordered list of UTF-8 path components, written `a/c/d`.
//! Keys order component by component, so a parent sorts immediately before its
//! whole subtree and every subtree occupies one contiguous key range:
//!
//! ```text
//! a  <  a/b  <  a/c  <  a/c/d  <  ab
//! ```
//!
//! ## Contract
//!
//! These validation rules are enforced on every key that reaches storage:
//! - Components must not be empty
//! - Components must not contain NUL bytes (\0)
//! - Components must not contain the path separator `/`
//! - The encoded key must not exceed `max_key_bytes` (default: 1024)
//!
//! The first component names the key's namespace. Namespaces that start with
//! `_` form the system keyspace, which is guarded by separate privileges.

use crate::limits::Limits;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator used by the textual form of a key
pub const PATH_SEPARATOR: char = '/';

/// Namespaces starting with this character belong to the system keyspace
pub const SYSTEM_NAMESPACE_PREFIX: char = '_';

/// Hierarchical key
///
/// The empty key is the root of the keyspace. It is never stored, but it is a
/// valid iteration parent (a scan over the whole store).
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    components: Vec<String>,
}

impl Key {
    /// The root key (no components)
    pub fn root() -> Self {
        Key::default()
    }

    /// Build a key from components, validating each one
    pub fn new<I, S>(components: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();
        for component in &components {
            validate_component(component)?;
        }
        Ok(Key { components })
    }

    /// Parse the textual form `a/b/c`. The empty string is the root.
    ///
    /// ```
    /// use partis_core::Key;
    ///
    /// let key = Key::parse("users/42/profile").unwrap();
    /// assert_eq!(key.len(), 3);
    /// assert_eq!(key.namespace(), Some("users"));
    /// assert!(Key::parse("a//b").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self, KeyError> {
        if path.is_empty() {
            return Ok(Key::root());
        }
        Key::new(path.split(PATH_SEPARATOR))
    }

    /// Path components
    #[inline]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components
    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True for the root key
    #[inline]
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Append one component
    pub fn child(&self, component: &str) -> Result<Key, KeyError> {
        validate_component(component)?;
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Key { components })
    }

    /// The key with the last component removed (`None` for the root)
    pub fn parent(&self) -> Option<Key> {
        if self.is_root() {
            return None;
        }
        Some(self.truncated(self.len() - 1))
    }

    /// The first `len` components of this key
    pub fn truncated(&self, len: usize) -> Key {
        Key {
            components: self.components[..len.min(self.len())].to_vec(),
        }
    }

    /// True when `self` is `other` or one of its ancestors
    pub fn is_prefix_of(&self, other: &Key) -> bool {
        other.components.starts_with(&self.components)
    }

    /// Namespace (first component), if any
    pub fn namespace(&self) -> Option<&str> {
        self.components.first().map(String::as_str)
    }

    /// True when the key lives in the system keyspace
    pub fn is_system(&self) -> bool {
        self.namespace()
            .map_or(false, |ns| ns.starts_with(SYSTEM_NAMESPACE_PREFIX))
    }

    /// Size of the textual form in bytes (components plus separators)
    pub fn byte_len(&self) -> usize {
        let payload: usize = self.components.iter().map(String::len).sum();
        payload + self.components.len().saturating_sub(1)
    }

    /// Check the key against size limits
    pub fn validate(&self, limits: &Limits) -> Result<(), KeyError> {
        let actual = self.byte_len();
        if actual > limits.max_key_bytes {
            return Err(KeyError::TooLong {
                actual,
                max: limits.max_key_bytes,
            });
        }
        Ok(())
    }

    /// Exclusive upper bound of this key's subtree
    ///
    /// Every descendant of `self` sorts below the returned key and every key
    /// outside the subtree that sorts after `self` sorts at or above it. The
    /// bound appends a NUL to the last component, so it can never collide with
    /// a stored key. Returns `None` for the root, whose subtree is unbounded.
    pub fn subtree_end(&self) -> Option<Key> {
        let mut components = self.components.clone();
        let last = components.last_mut()?;
        last.push('\0');
        Some(Key { components })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PATH_SEPARATOR)?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", self.to_string())
    }
}

fn validate_component(component: &str) -> Result<(), KeyError> {
    if component.is_empty() {
        return Err(KeyError::EmptyComponent);
    }
    if component.contains('\0') {
        return Err(KeyError::ContainsNul);
    }
    if component.contains(PATH_SEPARATOR) {
        return Err(KeyError::ContainsSeparator);
    }
    Ok(())
}

/// Key validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyError {
    /// A path component is empty
    #[error("Key component cannot be empty")]
    EmptyComponent,

    /// A path component contains a NUL byte
    #[error("Key cannot contain NUL bytes")]
    ContainsNul,

    /// A path component contains the separator
    #[error("Key component cannot contain '{}'", PATH_SEPARATOR)]
    ContainsSeparator,

    /// Key exceeds maximum length
    #[error("Key too long: {actual} bytes exceeds maximum {max}")]
    TooLong {
        /// Actual key length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Key range bounds are inverted or empty
    #[error("Invalid key range: {reason}")]
    InvalidRange {
        /// Why the range was rejected
        reason: String,
    },
}

impl KeyError {
    /// Short reason code for logs and wire errors
    pub fn reason_code(&self) -> &'static str {
        match self {
            KeyError::EmptyComponent => "empty_component",
            KeyError::ContainsNul => "contains_nul",
            KeyError::ContainsSeparator => "contains_separator",
            KeyError::TooLong { .. } => "key_too_long",
            KeyError::InvalidRange { .. } => "invalid_range",
        }
    }
}

// =============================================================================
// Scan selectors
// =============================================================================

/// Constraint on the component directly below an iteration parent
///
/// `a/c/d` under parent `a` is judged by its component `c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    start: Option<String>,
    start_inclusive: bool,
    end: Option<String>,
    end_inclusive: bool,
}

impl KeyRange {
    /// Create a range. Missing bounds are open; inclusivity of a missing bound
    /// is ignored.
    pub fn new(
        start: Option<&str>,
        start_inclusive: bool,
        end: Option<&str>,
        end_inclusive: bool,
    ) -> Result<Self, KeyError> {
        for component in start.iter().chain(end.iter()) {
            validate_component(component)?;
        }
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(KeyError::InvalidRange {
                    reason: format!("start '{}' is after end '{}'", s, e),
                });
            }
            if s == e && !(start_inclusive && end_inclusive) {
                return Err(KeyError::InvalidRange {
                    reason: format!("range '{}' is empty", s),
                });
            }
        }
        Ok(KeyRange {
            start: start.map(str::to_string),
            start_inclusive: start.is_some() && start_inclusive,
            end: end.map(str::to_string),
            end_inclusive: end.is_some() && end_inclusive,
        })
    }

    /// Inclusive on both ends
    pub fn between(start: &str, end: &str) -> Result<Self, KeyError> {
        KeyRange::new(Some(start), true, Some(end), true)
    }

    /// Lower bound (inclusive)
    pub fn from(start: &str) -> Result<Self, KeyError> {
        KeyRange::new(Some(start), true, None, false)
    }

    /// Upper bound (exclusive)
    pub fn until(end: &str) -> Result<Self, KeyError> {
        KeyRange::new(None, false, Some(end), false)
    }

    /// Start component, if bounded
    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    /// Whether the start bound is inclusive
    pub fn start_inclusive(&self) -> bool {
        self.start_inclusive
    }

    /// End component, if bounded
    pub fn end(&self) -> Option<&str> {
        self.end.as_deref()
    }

    /// Whether the end bound is inclusive
    pub fn end_inclusive(&self) -> bool {
        self.end_inclusive
    }

    /// Does `component` fall inside the range?
    pub fn contains(&self, component: &str) -> bool {
        let above = match &self.start {
            None => true,
            Some(s) if self.start_inclusive => component >= s.as_str(),
            Some(s) => component > s.as_str(),
        };
        let below = match &self.end {
            None => true,
            Some(e) if self.end_inclusive => component <= e.as_str(),
            Some(e) => component < e.as_str(),
        };
        above && below
    }
}

/// How deep below the parent an iteration reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Depth {
    /// Direct children only
    Children,
    /// The parent itself plus direct children
    ParentAndChildren,
    /// The entire subtree, excluding the parent
    Descendants,
    /// The parent plus the entire subtree
    #[default]
    ParentAndDescendants,
}

impl Depth {
    /// Does the selection include the parent key itself?
    pub fn includes_parent(&self) -> bool {
        matches!(self, Depth::ParentAndChildren | Depth::ParentAndDescendants)
    }

    /// Does the selection reach below direct children?
    pub fn includes_descendants(&self) -> bool {
        matches!(self, Depth::Descendants | Depth::ParentAndDescendants)
    }
}

/// Requested order of iteration results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending key order
    #[default]
    Forward,
    /// Descending key order
    Reverse,
    /// No order promised to the caller. Executed in ascending order within a
    /// partition; callers must not rely on order across partitions.
    Unordered,
}

impl Direction {
    /// The storage scan order used to satisfy this direction
    pub fn scan_order(&self) -> ScanOrder {
        match self {
            Direction::Forward | Direction::Unordered => ScanOrder::Ascending,
            Direction::Reverse => ScanOrder::Descending,
        }
    }
}

/// Order of a storage-level range scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanOrder {
    /// Smallest key first
    Ascending,
    /// Largest key first
    Descending,
}
