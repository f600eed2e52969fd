//! Result and option types for provider lifecycle operations.
//!
//! These types provide an ergonomic API over the raw protocol messages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::property::{PropertyKey, PropertyMap};
use crate::status::ResourceStatus;
use crate::urn::Urn;

/// A property that failed verification, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    /// The property that failed. Empty for failures not tied to one property.
    pub property: PropertyKey,
    /// Why the property failed.
    pub reason: String,
}

impl CheckFailure {
    /// Create a new check failure.
    pub fn new(property: impl Into<PropertyKey>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

impl From<crate::rpc::CheckFailure> for CheckFailure {
    fn from(proto: crate::rpc::CheckFailure) -> Self {
        Self {
            property: proto.property,
            reason: proto.reason,
        }
    }
}

/// The result of `Check`, `CheckConfig` or `Invoke`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckResult {
    /// The validated (and possibly defaulted) properties.
    pub properties: PropertyMap,
    /// Properties that failed verification.
    pub failures: Vec<CheckFailure>,
}

impl CheckResult {
    /// Create a result with no failures.
    pub fn valid(properties: PropertyMap) -> Self {
        Self {
            properties,
            failures: Vec::new(),
        }
    }

    /// Convert failures into a [`ProviderError::Validation`](crate::ProviderError::Validation).
    pub fn into_result(self) -> Result<PropertyMap, crate::ProviderError> {
        if self.failures.is_empty() {
            Ok(self.properties)
        } else {
            Err(crate::ProviderError::Validation(self.failures))
        }
    }
}

/// The overall magnitude of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiffChanges {
    /// The provider could not say whether anything changed.
    #[default]
    Unknown,
    /// Nothing changed.
    None,
    /// Something changed.
    Some,
}

impl From<crate::rpc::diff_response::DiffChanges> for DiffChanges {
    fn from(proto: crate::rpc::diff_response::DiffChanges) -> Self {
        use crate::rpc::diff_response::DiffChanges as Proto;
        match proto {
            Proto::DiffUnknown => Self::Unknown,
            Proto::DiffNone => Self::None,
            Proto::DiffSome => Self::Some,
        }
    }
}

/// The kind of change to a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// The property was added.
    Add,
    /// The property was added and requires replacement.
    AddReplace,
    /// The property was removed.
    Delete,
    /// The property was removed and requires replacement.
    DeleteReplace,
    /// The property was updated.
    Update,
    /// The property was updated and requires replacement.
    UpdateReplace,
}

impl DiffKind {
    /// Decode a wire value. Unrecognized kinds degrade to [`DiffKind::Update`].
    pub fn from_wire(kind: i32) -> Self {
        use crate::rpc::property_diff::Kind;
        match Kind::try_from(kind) {
            Ok(Kind::Add) => Self::Add,
            Ok(Kind::AddReplace) => Self::AddReplace,
            Ok(Kind::Delete) => Self::Delete,
            Ok(Kind::DeleteReplace) => Self::DeleteReplace,
            Ok(Kind::Update) => Self::Update,
            Ok(Kind::UpdateReplace) => Self::UpdateReplace,
            Err(_) => Self::Update,
        }
    }

    /// Returns true if this kind of change requires replacement.
    pub fn is_replace(self) -> bool {
        matches!(
            self,
            Self::AddReplace | Self::DeleteReplace | Self::UpdateReplace
        )
    }
}

/// The change to a single property in a detailed diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDiff {
    /// The kind of change.
    pub kind: DiffKind,
    /// True if the change is between old and new inputs rather than old state and new inputs.
    pub input_diff: bool,
}

/// The result of `Diff` or `DiffConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiffResult {
    /// The overall magnitude of the change.
    pub changes: DiffChanges,
    /// Properties whose change requires replacement.
    pub replace_keys: Vec<PropertyKey>,
    /// Properties guaranteed not to change.
    pub stable_keys: Vec<PropertyKey>,
    /// Properties that changed.
    pub changed_keys: Vec<PropertyKey>,
    /// Per-property detail, if the provider supplied it.
    pub detailed_diff: Option<BTreeMap<String, PropertyDiff>>,
    /// Whether a replacement should delete the old resource first.
    pub delete_before_replace: bool,
    /// Set when no diff could be computed, with a message explaining why.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

impl DiffResult {
    /// A result indicating that the diff could not be computed.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            unavailable: Some(message.into()),
            ..Default::default()
        }
    }

    /// Returns true if the diff could not be computed.
    pub fn is_unavailable(&self) -> bool {
        self.unavailable.is_some()
    }

    /// Returns true if any change requires replacement.
    pub fn replace(&self) -> bool {
        if !self.replace_keys.is_empty() {
            return true;
        }
        self.detailed_diff
            .as_ref()
            .map(|diff| diff.values().any(|d| d.kind.is_replace()))
            .unwrap_or(false)
    }
}

/// The result of `Create`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateResult {
    /// The ID the provider assigned. Empty during previews.
    pub id: String,
    /// The resource's outputs.
    pub properties: PropertyMap,
}

/// The result of `Read`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResult {
    /// The resource's ID. Empty means the resource no longer exists.
    pub id: String,
    /// The resource's live outputs.
    pub outputs: PropertyMap,
    /// The resource's live inputs, if the provider reported them.
    pub inputs: PropertyMap,
    /// The status of the resource after the read.
    pub status: ResourceStatus,
}

impl ReadResult {
    /// Returns true if the provider reported the resource as gone.
    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }
}

/// Per-operation timeouts for a component, as duration strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CustomTimeouts {
    /// Timeout for creates.
    pub create: String,
    /// Timeout for updates.
    pub update: String,
    /// Timeout for deletes.
    pub delete: String,
}

/// Engine-side run information shared by `Construct` and `Call`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunInfo {
    /// The project name.
    pub project: String,
    /// The stack name.
    pub stack: String,
    /// Configuration for the program, keyed by fully qualified key.
    pub config: BTreeMap<String, String>,
    /// Configuration keys whose values are secret.
    pub config_secret_keys: Vec<String>,
    /// Whether this is a preview.
    pub dry_run: bool,
    /// Degree of parallelism for resource operations.
    pub parallel: i32,
    /// Address of the resource monitor the provider should register with.
    pub monitor_address: String,
}

/// Run information for `Construct`.
pub type ConstructInfo = RunInfo;

/// Run information for `Call`.
pub type CallInfo = RunInfo;

/// Resource options for `Construct`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstructOptions {
    /// Aliases for the component.
    pub aliases: Vec<Urn>,
    /// Resources the component depends on.
    pub dependencies: Vec<Urn>,
    /// Whether the component is protected from deletion.
    pub protect: bool,
    /// Provider references keyed by package.
    pub providers: BTreeMap<String, String>,
    /// Per-input dependencies.
    pub property_dependencies: BTreeMap<PropertyKey, Vec<Urn>>,
    /// Outputs to mark secret.
    pub additional_secret_outputs: Vec<String>,
    /// Custom operation timeouts.
    pub custom_timeouts: Option<CustomTimeouts>,
    /// Delete this component when the given resource is deleted.
    pub deleted_with: Option<Urn>,
    /// Whether replacements delete before creating.
    pub delete_before_replace: Option<bool>,
    /// Properties whose changes are ignored.
    pub ignore_changes: Vec<String>,
    /// Properties whose changes force replacement.
    pub replace_on_changes: Vec<String>,
    /// Whether to leave the component behind on delete.
    pub retain_on_delete: bool,
}

/// The result of `Construct`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstructResult {
    /// The URN of the constructed component.
    pub urn: Urn,
    /// The component's outputs.
    pub outputs: PropertyMap,
    /// For each output, the resources its value depends on.
    pub output_dependencies: BTreeMap<PropertyKey, Vec<Urn>>,
}

/// Options for `Call`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallOptions {
    /// Per-argument dependencies.
    pub arg_dependencies: BTreeMap<PropertyKey, Vec<Urn>>,
}

/// The result of `Call`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResult {
    /// The method's return values.
    pub returns: PropertyMap,
    /// For each return value, the resources it depends on.
    pub return_dependencies: BTreeMap<PropertyKey, Vec<Urn>>,
    /// Arguments that failed verification.
    pub failures: Vec<CheckFailure>,
}

/// A conversion mapping returned by `GetMapping`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mapping {
    /// The mapping data. Empty if the provider has none.
    pub data: Vec<u8>,
    /// The provider the mapping is for.
    pub provider: String,
}

/// Information about a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// The package name.
    pub name: String,
    /// The binary the plugin was started from, if this handle spawned it.
    pub path: Option<PathBuf>,
    /// The version the plugin reports.
    pub version: Option<semver::Version>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_kind_fallback() {
        assert_eq!(DiffKind::from_wire(0), DiffKind::Add);
        assert_eq!(DiffKind::from_wire(5), DiffKind::UpdateReplace);
        assert_eq!(DiffKind::from_wire(42), DiffKind::Update);
        assert_eq!(DiffKind::from_wire(-1), DiffKind::Update);
    }

    #[test]
    fn test_diff_result_replace() {
        let mut result = DiffResult::default();
        assert!(!result.replace());

        let mut detailed = BTreeMap::new();
        detailed.insert(
            "name".to_string(),
            PropertyDiff {
                kind: DiffKind::UpdateReplace,
                input_diff: true,
            },
        );
        result.detailed_diff = Some(detailed);
        assert!(result.replace());
    }

    #[test]
    fn test_diff_unavailable() {
        let result = DiffResult::unavailable("config unknown");
        assert!(result.is_unavailable());
        assert_eq!(result.changes, DiffChanges::Unknown);
    }

    #[test]
    fn test_check_result_into_result() {
        let ok = CheckResult::valid(PropertyMap::new());
        assert!(ok.into_result().is_ok());

        let failed = CheckResult {
            properties: PropertyMap::new(),
            failures: vec![CheckFailure::new("size", "too big")],
        };
        assert!(matches!(
            failed.into_result(),
            Err(crate::ProviderError::Validation(f)) if f.len() == 1
        ));
    }
}
