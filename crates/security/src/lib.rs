//! Access control for Partis.
//!
//! This crate provides the [`Privilege`] vocabulary, the [`Subject`] a request
//! runs as, and the [`Authorizer`] boundary the executor consults before any
//! operation touches storage. [`GrantAuthorizer`] is a reference authorizer
//! that checks a subject's granted privileges and an [`AccessMode`].

#![warn(missing_docs)]

mod privilege;

pub use privilege::{KeyScope, Privilege, PrivilegeSet};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Controls whether an authorizer allows writes or is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessMode {
    /// Allow both reads and writes (default).
    #[default]
    ReadWrite,
    /// Read-only mode: every write privilege is denied.
    ReadOnly,
}

impl AccessMode {
    /// Does this mode allow exercising `privilege` at all?
    pub fn permits(&self, privilege: &Privilege) -> bool {
        match self {
            AccessMode::ReadWrite => true,
            AccessMode::ReadOnly => !privilege.is_write(),
        }
    }
}

/// The identity a request executes as, with what it has been granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    principal: String,
    granted: PrivilegeSet,
}

impl Subject {
    /// Create a subject with an explicit grant set.
    pub fn new(principal: impl Into<String>, granted: PrivilegeSet) -> Self {
        Subject {
            principal: principal.into(),
            granted,
        }
    }

    /// A subject holding no privileges.
    pub fn anonymous() -> Self {
        Subject::new("anonymous", PrivilegeSet::new())
    }

    /// A subject holding every global privilege.
    pub fn superuser(principal: impl Into<String>) -> Self {
        Subject::new(
            principal,
            [
                Privilege::ReadAny,
                Privilege::WriteAny,
                Privilege::ReadSystem,
                Privilege::WriteSystem,
                Privilege::InternalOperation,
            ]
            .into_iter()
            .collect(),
        )
    }

    /// Name of the principal.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Privileges granted to the subject.
    pub fn granted(&self) -> &PrivilegeSet {
        &self.granted
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// The subject lacks one or more required privileges.
    MissingPrivileges,
    /// Writes are disabled by the access mode.
    ReadOnly,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::MissingPrivileges => write!(f, "missing privileges"),
            DenialReason::ReadOnly => write!(f, "read-only access mode"),
        }
    }
}

/// Authorization failure.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Access denied for '{principal}' ({reason}): {}", render(.missing))]
pub struct AccessDenied {
    /// Principal that was refused.
    pub principal: String,
    /// Required privileges that were not satisfied.
    pub missing: Vec<Privilege>,
    /// Why they were not satisfied.
    pub reason: DenialReason,
}

fn render(privileges: &[Privilege]) -> String {
    privileges
        .iter()
        .map(Privilege::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The authorization boundary.
///
/// Implementations decide whether `subject` may exercise every privilege in
/// `required`. An empty `required` set must always be allowed.
pub trait Authorizer: Send + Sync {
    /// Allow or refuse a request.
    fn authorize(&self, subject: &Subject, required: &PrivilegeSet) -> Result<(), AccessDenied>;
}

/// Reference authorizer: checks the subject's grants and an [`AccessMode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantAuthorizer {
    mode: AccessMode,
}

impl GrantAuthorizer {
    /// Create an authorizer with the given access mode.
    pub fn new(mode: AccessMode) -> Self {
        GrantAuthorizer { mode }
    }

    /// The configured access mode.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Authorizer for GrantAuthorizer {
    fn authorize(&self, subject: &Subject, required: &PrivilegeSet) -> Result<(), AccessDenied> {
        let blocked: Vec<Privilege> = required
            .iter()
            .filter(|p| !self.mode.permits(p))
            .cloned()
            .collect();
        if !blocked.is_empty() {
            return Err(AccessDenied {
                principal: subject.principal.clone(),
                missing: blocked,
                reason: DenialReason::ReadOnly,
            });
        }

        let missing = subject.granted.missing(required);
        if !missing.is_empty() {
            return Err(AccessDenied {
                principal: subject.principal.clone(),
                missing,
                reason: DenialReason::MissingPrivileges,
            });
        }
        Ok(())
    }
}
