//! Resource URNs.
//!
//! A URN has the shape `urn:pulumi:<stack>::<project>::<qualified type>::<name>`,
//! where the qualified type is a `$`-separated chain of parent types ending in the
//! resource's own type token.

use std::fmt;

use serde::{Deserialize, Serialize};

const URN_PREFIX: &str = "urn:pulumi:";
const URN_DELIMITER: &str = "::";
const TYPE_DELIMITER: char = '$';

/// A resource URN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Wrap a URN string without validating it.
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Build a URN from its parts.
    pub fn from_parts(
        stack: &str,
        project: &str,
        parent_type: Option<&str>,
        typ: &str,
        name: &str,
    ) -> Self {
        let qualified = match parent_type {
            Some(parent) if !parent.is_empty() => format!("{parent}{TYPE_DELIMITER}{typ}"),
            _ => typ.to_string(),
        };
        Self(format!(
            "{URN_PREFIX}{stack}{URN_DELIMITER}{project}{URN_DELIMITER}{qualified}{URN_DELIMITER}{name}"
        ))
    }

    /// The raw URN string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the URN is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the URN is well formed.
    pub fn is_valid(&self) -> bool {
        self.segments().is_some()
    }

    /// The resource's own type token, e.g. `pulumi:providers:kubernetes`.
    ///
    /// Returns an empty string for malformed URNs.
    pub fn resource_type(&self) -> &str {
        self.segments()
            .map(|(_, _, qualified, _)| {
                qualified
                    .rsplit(TYPE_DELIMITER)
                    .next()
                    .unwrap_or(qualified)
            })
            .unwrap_or("")
    }

    /// The resource's name.
    pub fn name(&self) -> &str {
        self.segments().map(|(_, _, _, name)| name).unwrap_or("")
    }

    fn segments(&self) -> Option<(&str, &str, &str, &str)> {
        let rest = self.0.strip_prefix(URN_PREFIX)?;
        let mut parts = rest.splitn(4, URN_DELIMITER);
        let stack = parts.next()?;
        let project = parts.next()?;
        let qualified = parts.next()?;
        let name = parts.next()?;
        if qualified.is_empty() {
            return None;
        }
        Some((stack, project, qualified, name))
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Urn {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Urn {
    fn from(value: String) -> Self {
        Self(value)
    }
}
