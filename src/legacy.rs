//! Compatibility rules for providers that misreport unimplemented methods.
//!
//! Some providers answer an unimplemented `CheckConfig` or `DiffConfig` with a
//! nonstandard status. A [`LegacyProviderTable`] maps those signals, keyed by
//! provider type token, back to the standard outcome so callers handle them
//! in one place.

use tonic::{Code, Status};

/// Type token of the Node.js dynamic provider.
pub const NODEJS_DYNAMIC_PROVIDER: &str = "pulumi:providers:pulumi-nodejs";
/// Type token of the Kubernetes provider.
pub const KUBERNETES_PROVIDER: &str = "pulumi:providers:kubernetes";

/// What a provider error means once legacy signals are accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedOutcome {
    /// The provider does not implement the method.
    Unimplemented,
    /// A real failure.
    Error,
}

/// How a legacy rule recognizes a miscoded signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPattern {
    /// The status code the provider uses.
    pub code: Code,
    /// A substring the message must contain, if any.
    pub message_contains: Option<String>,
}

impl ErrorPattern {
    /// Match any status with the given code.
    pub fn code(code: Code) -> Self {
        Self {
            code,
            message_contains: None,
        }
    }

    /// Also require the message to contain `needle`.
    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.message_contains = Some(needle.into());
        self
    }

    fn matches(&self, status: &Status) -> bool {
        status.code() == self.code
            && self
                .message_contains
                .as_deref()
                .map_or(true, |needle| status.message().contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LegacyRule {
    provider_type: String,
    pattern: ErrorPattern,
    outcome: NormalizedOutcome,
}

/// A table of `(provider type, error pattern) → outcome` rules.
///
/// The default table knows the Node.js dynamic provider, which answers with
/// `Internal`, and the Kubernetes provider, which wraps its unimplemented
/// signal in an `Unknown` status whose message mentions `Unimplemented`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyProviderTable {
    rules: Vec<LegacyRule>,
}

impl Default for LegacyProviderTable {
    fn default() -> Self {
        Self::empty()
            .with_rule(
                NODEJS_DYNAMIC_PROVIDER,
                ErrorPattern::code(Code::Internal),
                NormalizedOutcome::Unimplemented,
            )
            .with_rule(
                KUBERNETES_PROVIDER,
                ErrorPattern::code(Code::Unknown).containing("Unimplemented"),
                NormalizedOutcome::Unimplemented,
            )
    }
}

impl LegacyProviderTable {
    /// A table with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule.
    pub fn with_rule(
        mut self,
        provider_type: impl Into<String>,
        pattern: ErrorPattern,
        outcome: NormalizedOutcome,
    ) -> Self {
        self.rules.push(LegacyRule {
            provider_type: provider_type.into(),
            pattern,
            outcome,
        });
        self
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Normalize a status returned by a provider of the given type.
    pub fn normalize(&self, provider_type: &str, status: &Status) -> NormalizedOutcome {
        if status.code() == Code::Unimplemented {
            return NormalizedOutcome::Unimplemented;
        }
        self.rules
            .iter()
            .find(|rule| rule.provider_type == provider_type && rule.pattern.matches(status))
            .map_or(NormalizedOutcome::Error, |rule| rule.outcome)
    }

    /// Returns true if the status means the method is not implemented.
    pub fn is_unimplemented(&self, provider_type: &str, status: &Status) -> bool {
        self.normalize(provider_type, status) == NormalizedOutcome::Unimplemented
    }
}
