//! Privilege vocabulary
//!
//! Privileges are derived from the scope of the key an operation touches:
//!
//! | Scope | read | insert / delete |
//! |-------|------|-----------------|
//! | root (whole store) | `READ_ANY` | `WRITE_ANY` |
//! | system namespace (`_...`) | `READ_SYSTEM` | `WRITE_SYSTEM` |
//! | table namespace | `READ_TABLE(ns)` | `INSERT_TABLE(ns)` / `DELETE_TABLE(ns)` |
//!
//! `READ_ANY` implies every `READ_TABLE`; `WRITE_ANY` implies every
//! `INSERT_TABLE` and `DELETE_TABLE`. Neither reaches the system namespace.

use partis_core::Key;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// A single privilege
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Privilege {
    /// Read anything outside the system namespace
    ReadAny,
    /// Write anything outside the system namespace
    WriteAny,
    /// Read the system namespace
    ReadSystem,
    /// Write the system namespace
    WriteSystem,
    /// Read one table
    ReadTable(String),
    /// Insert into one table
    InsertTable(String),
    /// Delete from one table
    DeleteTable(String),
    /// Node-internal bookkeeping operations
    InternalOperation,
}

/// What part of the keyspace a key falls in, for privilege purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// The root key: the operation spans every namespace
    Root,
    /// A namespace starting with `_`
    System,
    /// A user table namespace
    Table(String),
}

impl KeyScope {
    /// Scope of `key`
    pub fn of(key: &Key) -> Self {
        match key.namespace() {
            None => KeyScope::Root,
            Some(_) if key.is_system() => KeyScope::System,
            Some(ns) => KeyScope::Table(ns.to_string()),
        }
    }
}

impl Privilege {
    /// Privilege to read within `scope`
    pub fn read(scope: &KeyScope) -> Self {
        match scope {
            KeyScope::Root => Privilege::ReadAny,
            KeyScope::System => Privilege::ReadSystem,
            KeyScope::Table(ns) => Privilege::ReadTable(ns.clone()),
        }
    }

    /// Privilege to insert within `scope`
    pub fn insert(scope: &KeyScope) -> Self {
        match scope {
            KeyScope::Root => Privilege::WriteAny,
            KeyScope::System => Privilege::WriteSystem,
            KeyScope::Table(ns) => Privilege::InsertTable(ns.clone()),
        }
    }

    /// Privilege to delete within `scope`
    pub fn delete(scope: &KeyScope) -> Self {
        match scope {
            KeyScope::Root => Privilege::WriteAny,
            KeyScope::System => Privilege::WriteSystem,
            KeyScope::Table(ns) => Privilege::DeleteTable(ns.clone()),
        }
    }

    /// Does exercising this privilege modify data?
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Privilege::WriteAny
                | Privilege::WriteSystem
                | Privilege::InsertTable(_)
                | Privilege::DeleteTable(_)
        )
    }

    /// Does holding `self` grant `other`?
    pub fn implies(&self, other: &Privilege) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Privilege::ReadAny, Privilege::ReadTable(_)) => true,
            (Privilege::WriteAny, Privilege::InsertTable(_) | Privilege::DeleteTable(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::ReadAny => write!(f, "READ_ANY"),
            Privilege::WriteAny => write!(f, "WRITE_ANY"),
            Privilege::ReadSystem => write!(f, "READ_SYSTEM"),
            Privilege::WriteSystem => write!(f, "WRITE_SYSTEM"),
            Privilege::ReadTable(ns) => write!(f, "READ_TABLE({})", ns),
            Privilege::InsertTable(ns) => write!(f, "INSERT_TABLE({})", ns),
            Privilege::DeleteTable(ns) => write!(f, "DELETE_TABLE({})", ns),
            Privilege::InternalOperation => write!(f, "INTERNAL_OPERATION"),
        }
    }
}

/// Sorted, duplicate-free set of privileges
///
/// Most operations need one or two privileges, so the set stays inline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PrivilegeSet {
    privileges: SmallVec<[Privilege; 4]>,
}

impl PrivilegeSet {
    /// The empty set
    pub fn new() -> Self {
        PrivilegeSet::default()
    }

    /// Add a privilege (no-op if already present)
    pub fn insert(&mut self, privilege: Privilege) {
        if let Err(pos) = self.privileges.binary_search(&privilege) {
            self.privileges.insert(pos, privilege);
        }
    }

    /// Builder form of [`PrivilegeSet::insert`]
    pub fn with(mut self, privilege: Privilege) -> Self {
        self.insert(privilege);
        self
    }

    /// Exact membership
    pub fn contains(&self, privilege: &Privilege) -> bool {
        self.privileges.binary_search(privilege).is_ok()
    }

    /// Is `required` granted by this set, directly or by implication?
    pub fn satisfies(&self, required: &Privilege) -> bool {
        self.privileges.iter().any(|held| held.implies(required))
    }

    /// Privileges in `required` that this set does not satisfy
    pub fn missing(&self, required: &PrivilegeSet) -> Vec<Privilege> {
        required
            .iter()
            .filter(|p| !self.satisfies(p))
            .cloned()
            .collect()
    }

    /// Iterate in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &Privilege> {
        self.privileges.iter()
    }

    /// Number of privileges
    pub fn len(&self) -> usize {
        self.privileges.len()
    }

    /// True when no privilege is required
    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty()
    }
}

impl FromIterator<Privilege> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = Privilege>>(iter: I) -> Self {
        let mut set = PrivilegeSet::new();
        for privilege in iter {
            set.insert(privilege);
        }
        set
    }
}

impl fmt::Display for PrivilegeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, privilege) in self.privileges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", privilege)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_of_key() {
        assert_eq!(KeyScope::of(&Key::root()), KeyScope::Root);
        assert_eq!(KeyScope::of(&Key::parse("_sys/x").unwrap()), KeyScope::System);
        assert_eq!(
            KeyScope::of(&Key::parse("users/1").unwrap()),
            KeyScope::Table("users".to_string())
        );
    }

    #[test]
    fn test_derivation_table() {
        let t = KeyScope::Table("t".into());
        assert_eq!(Privilege::read(&KeyScope::Root), Privilege::ReadAny);
        assert_eq!(Privilege::insert(&KeyScope::Root), Privilege::WriteAny);
        assert_eq!(Privilege::delete(&KeyScope::System), Privilege::WriteSystem);
        assert_eq!(Privilege::delete(&t), Privilege::DeleteTable("t".into()));
    }

    #[test]
    fn test_implication() {
        assert!(Privilege::ReadAny.implies(&Privilege::ReadTable("x".into())));
        assert!(Privilege::WriteAny.implies(&Privilege::DeleteTable("x".into())));
        assert!(!Privilege::WriteAny.implies(&Privilege::ReadTable("x".into())));
        assert!(!Privilege::ReadAny.implies(&Privilege::ReadSystem));
        assert!(!Privilege::ReadTable("x".into()).implies(&Privilege::ReadTable("y".into())));
    }

    #[test]
    fn test_is_write() {
        assert!(Privilege::InsertTable("t".into()).is_write());
        assert!(Privilege::WriteSystem.is_write());
        assert!(!Privilege::ReadAny.is_write());
        assert!(!Privilege::InternalOperation.is_write());
    }

    #[test]
    fn test_set_sorted_and_deduplicated() {
        let set: PrivilegeSet = vec![
            Privilege::InternalOperation,
            Privilege::ReadAny,
            Privilege::ReadAny,
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "{READ_ANY, INTERNAL_OPERATION}");
        assert!(set.contains(&Privilege::ReadAny));
    }

    #[test]
    fn test_missing() {
        let held = PrivilegeSet::new().with(Privilege::ReadAny);
        let required = PrivilegeSet::new()
            .with(Privilege::ReadTable("t".into()))
            .with(Privilege::InsertTable("t".into()));
        assert_eq!(held.missing(&required), vec![Privilege::InsertTable("t".into())]);
    }
}
