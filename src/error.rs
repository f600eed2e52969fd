//! Error types for the provider client.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::property::PropertyMap;
use crate::status::ResourceStatus;
use crate::types::CheckFailure;

/// Errors returned by a provider handle.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider sent a malformed or unexpected response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The provider does not implement the requested operation.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The provider rejected the inputs.
    #[error("Validation failed: {}", format_failures(.0))]
    Validation(Vec<CheckFailure>),

    /// The resource exists but failed to reach a healthy state.
    #[error(transparent)]
    Init(Box<InitError>),

    /// The provider failed in a way that leaves the resource state indeterminate.
    #[error("Unknown resource state: {}: {}", .0.code(), .0.message())]
    UnknownState(tonic::Status),

    /// The provider failed in a well-understood, recoverable way.
    #[error("Provider error: {}: {}", .0.code(), .0.message())]
    Rpc(tonic::Status),

    /// The provider is missing required configuration.
    #[error("{}", format_missing_keys(.0))]
    Configuration(Vec<MissingConfigKey>),

    /// The provider's asynchronous configuration failed.
    #[error("Configuration failed: {0}")]
    ConfigureFailed(#[source] Arc<ProviderError>),

    /// A property bag could not be converted to or from the wire format.
    #[error("Marshal error in {label}: {message}")]
    Marshal {
        /// Where the failure happened, e.g. `Provider[aws].Create(urn).outputs`.
        label: String,
        /// What went wrong.
        message: String,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// A plugin process could not be started or reached.
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// An I/O error occurred while managing the plugin process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The provider reported a version that is not a valid semantic version.
    #[error("Invalid plugin version: {0}")]
    Version(#[from] semver::Error),

    /// The caller's request context was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// The provider handle was closed.
    #[error("Provider for package '{0}' is closed")]
    Closed(String),

    /// A precondition of the call was violated by the caller.
    #[error("Invalid request: {0}")]
    Assertion(String),
}

impl ProviderError {
    /// The status of the resource an operation failed on.
    ///
    /// Partial failures report [`ResourceStatus::PartialFailure`], indeterminate
    /// provider failures [`ResourceStatus::Unknown`], everything else
    /// [`ResourceStatus::Ok`].
    pub fn resource_status(&self) -> ResourceStatus {
        match self {
            Self::Init(_) => ResourceStatus::PartialFailure,
            Self::UnknownState(_) => ResourceStatus::Unknown,
            _ => ResourceStatus::Ok,
        }
    }

    /// Returns the partial failure payload, if this is one.
    pub fn init_error(&self) -> Option<&InitError> {
        match self {
            Self::Init(init) => Some(init),
            _ => None,
        }
    }

    /// Returns true if this is an unimplemented signal.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented(_))
    }

    pub(crate) fn marshal(label: &str, message: impl Into<String>) -> Self {
        Self::Marshal {
            label: label.to_string(),
            message: message.into(),
        }
    }
}

/// A resource was created (or updated) but failed to initialize.
///
/// Carries the live state the provider reported so the caller can still
/// record the resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitError {
    /// Human-readable reasons the resource failed to initialize.
    pub reasons: Vec<String>,
    /// The ID of the partially created resource, if the provider reported one.
    pub id: String,
    /// The live outputs of the resource.
    pub outputs: PropertyMap,
    /// The live inputs of the resource, if reported.
    pub inputs: Option<PropertyMap>,
}

impl InitError {
    /// Create an init error from reasons alone.
    pub fn new(reasons: Vec<String>) -> Self {
        Self {
            reasons,
            ..Default::default()
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reasons.len() {
            0 => write!(f, "resource failed to initialize"),
            1 => write!(f, "1 error occurred:\n\t* {}", self.reasons[0]),
            n => {
                write!(f, "{n} errors occurred:")?;
                for reason in &self.reasons {
                    write!(f, "\n\t* {reason}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for InitError {}

impl From<InitError> for ProviderError {
    fn from(err: InitError) -> Self {
        Self::Init(Box::new(err))
    }
}

/// A required configuration key the provider did not receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingConfigKey {
    /// The fully qualified configuration key.
    pub name: String,
    /// What the key is for.
    pub description: String,
}

impl fmt::Display for MissingConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing required configuration key \"{}\": {}\nSet a value using the command `pulumi config set {} <value>`.",
            self.name, self.description, self.name
        )
    }
}

fn format_missing_keys(keys: &[MissingConfigKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_failures(failures: &[CheckFailure]) -> String {
    failures
        .iter()
        .map(|f| {
            if f.property.is_empty() {
                f.reason.clone()
            } else {
                format!("{}: {}", f.property, f.reason)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
