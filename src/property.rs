//! Resource property values.
//!
//! A [`PropertyValue`] is the engine-side representation of a single resource
//! property. Secrecy and unknown-ness are carried on the value itself: a
//! [`PropertyValue::Secret`] wraps exactly one element, and a
//! [`PropertyValue::Computed`] stands in for a value that will only be known
//! after an update. Neither propagates implicitly into nested objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The name of a property within a [`PropertyMap`].
pub type PropertyKey = String;

/// A bag of named properties: inputs, prior state ("olds") or outputs.
pub type PropertyMap = BTreeMap<PropertyKey, PropertyValue>;

/// A single resource property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. All numbers travel as doubles on the wire.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    Array(Vec<PropertyValue>),
    /// A nested property map.
    Object(PropertyMap),
    /// A reference to a file-like blob.
    Asset(Asset),
    /// A reference to a collection of assets.
    Archive(Archive),
    /// A reference to another resource.
    ResourceReference(ResourceReference),
    /// A value that is not known until the resource is updated.
    Computed(Computed),
    /// A value annotated with its upstream dependencies.
    Output(OutputValue),
    /// A value whose contents must not be displayed or persisted in plain form.
    Secret(Box<PropertyValue>),
}

/// Placeholder for an unknown value. The element records the expected shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    /// A value of the expected type, typically an empty string.
    pub element: Box<PropertyValue>,
}

/// A value plus the set of resources it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputValue {
    /// The underlying value. Meaningless when `known` is false.
    pub element: Box<PropertyValue>,
    /// Whether `element` holds a real value.
    pub known: bool,
    /// Whether the value is secret.
    pub secret: bool,
    /// URNs of the resources this value depends on.
    pub dependencies: Vec<String>,
}

/// A reference to a resource by URN and, for custom resources, ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    /// The URN of the referenced resource.
    pub urn: String,
    /// The ID of the referenced resource. `None` for component resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The version of the package that defines the referenced resource.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package_version: String,
}

/// A file-like blob, given inline, by path or by URI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Asset {
    /// The SHA256 hash of the contents, if computed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    /// Inline text contents.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// A path on the local filesystem.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// A remote URI.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
}

/// A collection of assets, given inline, by path or by URI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Archive {
    /// The SHA256 hash of the contents, if computed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    /// Inline members, keyed by their name inside the archive.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<String, ArchiveMember>,
    /// A path on the local filesystem.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// A remote URI.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
}

/// A member of an inline [`Archive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchiveMember {
    /// A single asset.
    Asset(Asset),
    /// A nested archive.
    Archive(Archive),
}

impl PropertyValue {
    /// Create a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Wrap a value as secret.
    pub fn secret(element: PropertyValue) -> Self {
        Self::Secret(Box::new(element))
    }

    /// Create an unknown value whose expected shape is a string.
    pub fn computed() -> Self {
        Self::Computed(Computed {
            element: Box::new(Self::String(String::new())),
        })
    }

    /// Create an object value from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<PropertyKey>,
        I: IntoIterator<Item = (K, PropertyValue)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns true if this is an object.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Returns true if this is a secret.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    /// Returns true if this is a computed (unknown) value.
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    /// Returns true if this is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the nested map if this is an object.
    pub fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the nested map mutably if this is an object.
    pub fn as_object_mut(&mut self) -> Option<&mut PropertyMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the string contents if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this value is, or contains, a secret.
    ///
    /// Unknown output values that are flagged secret count as secrets.
    pub fn contains_secrets(&self) -> bool {
        match self {
            Self::Secret(_) => true,
            Self::Output(output) => output.secret || output.element.contains_secrets(),
            Self::Computed(computed) => computed.element.contains_secrets(),
            Self::Array(items) => items.iter().any(Self::contains_secrets),
            Self::Object(map) => map.values().any(Self::contains_secrets),
            _ => false,
        }
    }

    /// Returns true if this value is, or contains, an unknown.
    pub fn contains_unknowns(&self) -> bool {
        match self {
            Self::Computed(_) => true,
            Self::Output(output) => !output.known || output.element.contains_unknowns(),
            Self::Secret(element) => element.contains_unknowns(),
            Self::Array(items) => items.iter().any(Self::contains_unknowns),
            Self::Object(map) => map.values().any(Self::contains_unknowns),
            _ => false,
        }
    }

    /// A short name for the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Asset(_) => "asset",
            Self::Archive(_) => "archive",
            Self::ResourceReference(_) => "resource",
            Self::Computed(_) => "computed",
            Self::Output(_) => "output",
            Self::Secret(_) => "secret",
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(value: Vec<PropertyValue>) -> Self {
        Self::Array(value)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(value: PropertyMap) -> Self {
        Self::Object(value)
    }
}

/// Build a [`PropertyMap`] from key/value pairs.
pub fn property_map<K, I>(entries: I) -> PropertyMap
where
    K: Into<PropertyKey>,
    I: IntoIterator<Item = (K, PropertyValue)>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Returns true if any value in the map contains an unknown.
pub fn map_contains_unknowns(map: &PropertyMap) -> bool {
    map.values().any(PropertyValue::contains_unknowns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_not_inferred_for_siblings() {
        let value = PropertyValue::object([
            ("a", PropertyValue::secret("x".into())),
            ("b", PropertyValue::from("y")),
        ]);
        assert!(value.contains_secrets());
        assert!(!value.is_secret());

        let map = value.as_object().unwrap();
        assert!(!map["b"].contains_secrets());
    }

    #[test]
    fn test_contains_unknowns() {
        assert!(PropertyValue::computed().contains_unknowns());
        assert!(PropertyValue::secret(PropertyValue::computed()).contains_unknowns());
        let array = PropertyValue::Array(vec!["a".into(), PropertyValue::computed()]);
        assert!(array.contains_unknowns());

        let unknown_output = PropertyValue::Output(OutputValue {
            element: Box::new(PropertyValue::Null),
            known: false,
            secret: false,
            dependencies: vec![],
        });
        assert!(unknown_output.contains_unknowns());
        assert!(!PropertyValue::from("plain").contains_unknowns());
    }

    #[test]
    fn test_secret_output_counts_as_secret() {
        let output = PropertyValue::Output(OutputValue {
            element: Box::new("v".into()),
            known: true,
            secret: true,
            dependencies: vec!["urn:pulumi:s::p::t::n".to_string()],
        });
        assert!(output.contains_secrets());
    }

    #[test]
    fn test_property_map_builder() {
        let map = property_map([("n", PropertyValue::from(1.0)), ("b", true.into())]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["n"], PropertyValue::Number(1.0));
        assert!(!map_contains_unknowns(&map));
    }
}
