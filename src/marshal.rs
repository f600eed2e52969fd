//! Conversion between [`PropertyMap`] and the `google.protobuf.Struct` wire format.
//!
//! Values that plain JSON cannot express travel as objects tagged with a
//! signature key ([`SIG_KEY`]) whose value identifies the kind of object:
//! secrets, assets, archives, resource references and output values. Unknown
//! values travel as the sentinel string [`UNKNOWN_STRING_VALUE`].
//!
//! [`MarshalOptions`] decides, per call, which of these the peer may see. A
//! kind that is not kept is reduced to its plain projection: a secret to its
//! element, a resource reference to its ID (or URN), an output value to its
//! element.

use std::collections::BTreeMap;

use prost_types::value::Kind;
use prost_types::{ListValue, Struct, Value};

use crate::error::ProviderError;
use crate::property::{
    Archive, ArchiveMember, Asset, Computed, OutputValue, PropertyMap, PropertyValue,
    ResourceReference,
};

/// Key marking an object as a special, signature-tagged value.
pub const SIG_KEY: &str = "4dabf18193072939515e22adb298388d";
/// Signature of an asset.
pub const ASSET_SIG: &str = "c44067f5952c0a294b673a41bacd8c17";
/// Signature of an archive.
pub const ARCHIVE_SIG: &str = "0def7320c3a5731c473e5ecbe6d01bc7";
/// Signature of a secret.
pub const SECRET_SIG: &str = "1b47061264138c4ac30d75fd1eb44270";
/// Signature of a resource reference.
pub const RESOURCE_REFERENCE_SIG: &str = "5cf8f73096256a8f31e491e813e4eb8e";
/// Signature of an output value.
pub const OUTPUT_VALUE_SIG: &str = "d0e6a833031e9bbcd3f4e8bde6ca49a4";
/// Sentinel string standing in for an unknown value.
pub const UNKNOWN_STRING_VALUE: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

/// Controls which property metadata survives a marshal or unmarshal.
#[derive(Debug, Clone, Default)]
pub struct MarshalOptions {
    /// Names the property bag in error messages.
    pub label: String,
    /// Drop null values instead of sending them.
    pub skip_nulls: bool,
    /// Keep unknown values. Otherwise they are dropped.
    pub keep_unknowns: bool,
    /// Fail if an unknown value is encountered.
    pub reject_unknowns: bool,
    /// Keep secrets tagged. Otherwise only their element is kept.
    pub keep_secrets: bool,
    /// Keep resource references. Otherwise they become their ID or URN.
    pub keep_resources: bool,
    /// Keep output values. Otherwise they become their element.
    pub keep_output_values: bool,
    /// Send only the hash of assets and archives.
    pub elide_asset_contents: bool,
}

impl MarshalOptions {
    /// Create options with the given label and nothing kept.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Set whether unknowns are kept.
    pub fn keep_unknowns(mut self, keep: bool) -> Self {
        self.keep_unknowns = keep;
        self
    }

    /// Set whether unknowns are rejected.
    pub fn reject_unknowns(mut self, reject: bool) -> Self {
        self.reject_unknowns = reject;
        self
    }

    /// Set whether secrets are kept.
    pub fn keep_secrets(mut self, keep: bool) -> Self {
        self.keep_secrets = keep;
        self
    }

    /// Set whether resource references are kept.
    pub fn keep_resources(mut self, keep: bool) -> Self {
        self.keep_resources = keep;
        self
    }

    /// Set whether output values are kept.
    pub fn keep_output_values(mut self, keep: bool) -> Self {
        self.keep_output_values = keep;
        self
    }

    /// Set whether asset contents are elided.
    pub fn elide_asset_contents(mut self, elide: bool) -> Self {
        self.elide_asset_contents = elide;
        self
    }

    /// Set whether nulls are skipped.
    pub fn skip_nulls(mut self, skip: bool) -> Self {
        self.skip_nulls = skip;
        self
    }
}

/// Marshal a property map into a wire struct.
pub fn marshal_properties(
    props: &PropertyMap,
    opts: &MarshalOptions,
) -> Result<Struct, ProviderError> {
    let mut fields = BTreeMap::new();
    for (key, value) in props {
        if let Some(v) = marshal_value(key, value, opts)? {
            fields.insert(key.clone(), v);
        }
    }
    Ok(Struct { fields })
}

/// Marshal a single value. `None` means the value is dropped.
pub fn marshal_value(
    key: &str,
    value: &PropertyValue,
    opts: &MarshalOptions,
) -> Result<Option<Value>, ProviderError> {
    let marshaled = match value {
        PropertyValue::Null => {
            if opts.skip_nulls {
                return Ok(None);
            }
            kind(Kind::NullValue(0))
        }
        PropertyValue::Bool(b) => kind(Kind::BoolValue(*b)),
        PropertyValue::Number(n) => kind(Kind::NumberValue(*n)),
        PropertyValue::String(s) => kind(Kind::StringValue(s.clone())),
        PropertyValue::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = marshal_value(key, item, opts)? {
                    values.push(v);
                }
            }
            kind(Kind::ListValue(ListValue { values }))
        }
        PropertyValue::Object(map) => kind(Kind::StructValue(marshal_properties(map, opts)?)),
        PropertyValue::Asset(asset) => kind(Kind::StructValue(marshal_asset(asset, opts))),
        PropertyValue::Archive(archive) => {
            kind(Kind::StructValue(marshal_archive(archive, opts)))
        }
        PropertyValue::Computed(_) => {
            if opts.reject_unknowns {
                return Err(ProviderError::marshal(
                    &opts.label,
                    format!("unexpected unknown property value for '{key}'"),
                ));
            }
            if !opts.keep_unknowns {
                return Ok(None);
            }
            kind(Kind::StringValue(UNKNOWN_STRING_VALUE.to_string()))
        }
        PropertyValue::Secret(element) => {
            if !opts.keep_secrets {
                return marshal_value(key, element, opts);
            }
            let Some(inner) = marshal_value(key, element, opts)? else {
                return Ok(None);
            };
            let mut fields = sig_fields(SECRET_SIG);
            fields.insert("value".to_string(), inner);
            kind(Kind::StructValue(Struct { fields }))
        }
        PropertyValue::ResourceReference(reference) => {
            if !opts.keep_resources {
                let projected = match &reference.id {
                    Some(id) if !id.is_empty() => id.clone(),
                    _ => reference.urn.clone(),
                };
                return Ok(Some(kind(Kind::StringValue(projected))));
            }
            let mut fields = sig_fields(RESOURCE_REFERENCE_SIG);
            fields.insert("urn".to_string(), string_value(&reference.urn));
            if let Some(id) = &reference.id {
                fields.insert("id".to_string(), string_value(id));
            }
            if !reference.package_version.is_empty() {
                fields.insert(
                    "packageVersion".to_string(),
                    string_value(&reference.package_version),
                );
            }
            kind(Kind::StructValue(Struct { fields }))
        }
        PropertyValue::Output(output) => {
            if !opts.keep_output_values {
                let mut projected = if output.known {
                    (*output.element).clone()
                } else {
                    PropertyValue::computed()
                };
                if output.secret {
                    projected = PropertyValue::secret(projected);
                }
                return marshal_value(key, &projected, opts);
            }
            let mut fields = sig_fields(OUTPUT_VALUE_SIG);
            if output.known {
                if let Some(inner) = marshal_value(key, &output.element, opts)? {
                    fields.insert("value".to_string(), inner);
                }
            }
            if output.secret {
                fields.insert("secret".to_string(), kind(Kind::BoolValue(true)));
            }
            if !output.dependencies.is_empty() {
                let values = output.dependencies.iter().map(|d| string_value(d)).collect();
                fields.insert(
                    "dependencies".to_string(),
                    kind(Kind::ListValue(ListValue { values })),
                );
            }
            kind(Kind::StructValue(Struct { fields }))
        }
    };
    Ok(Some(marshaled))
}

/// Unmarshal a wire struct into a property map.
pub fn unmarshal_properties(
    props: &Struct,
    opts: &MarshalOptions,
) -> Result<PropertyMap, ProviderError> {
    let mut result = PropertyMap::new();
    for (key, value) in &props.fields {
        if let Some(v) = unmarshal_value(key, value, opts)? {
            if opts.skip_nulls && v.is_null() {
                continue;
            }
            result.insert(key.clone(), v);
        }
    }
    Ok(result)
}

/// Unmarshal an optional wire struct; a missing struct is an empty map.
pub fn unmarshal_optional(
    props: Option<&Struct>,
    opts: &MarshalOptions,
) -> Result<PropertyMap, ProviderError> {
    match props {
        Some(s) => unmarshal_properties(s, opts),
        None => Ok(PropertyMap::new()),
    }
}

/// Unmarshal a single value. `None` means the value is dropped.
pub fn unmarshal_value(
    key: &str,
    value: &Value,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, ProviderError> {
    let Some(kind) = &value.kind else {
        return Ok(Some(PropertyValue::Null));
    };
    match kind {
        Kind::NullValue(_) => Ok(Some(PropertyValue::Null)),
        Kind::BoolValue(b) => Ok(Some(PropertyValue::Bool(*b))),
        Kind::NumberValue(n) => Ok(Some(PropertyValue::Number(*n))),
        Kind::StringValue(s) if s == UNKNOWN_STRING_VALUE => unknown(key, opts),
        Kind::StringValue(s) => Ok(Some(PropertyValue::String(s.clone()))),
        Kind::ListValue(list) => {
            let mut items = Vec::with_capacity(list.values.len());
            for item in &list.values {
                if let Some(v) = unmarshal_value(key, item, opts)? {
                    items.push(v);
                }
            }
            Ok(Some(PropertyValue::Array(items)))
        }
        Kind::StructValue(s) => unmarshal_struct(key, s, opts),
    }
}

fn unmarshal_struct(
    key: &str,
    s: &Struct,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, ProviderError> {
    let Some(sig) = s.fields.get(SIG_KEY) else {
        return Ok(Some(PropertyValue::Object(unmarshal_properties(s, opts)?)));
    };
    let sig = match &sig.kind {
        Some(Kind::StringValue(sig)) => sig.as_str(),
        _ => {
            return Err(ProviderError::marshal(
                &opts.label,
                format!("signature of '{key}' is not a string"),
            ))
        }
    };

    match sig {
        ASSET_SIG => Ok(Some(PropertyValue::Asset(unmarshal_asset(s)))),
        ARCHIVE_SIG => Ok(Some(PropertyValue::Archive(unmarshal_archive(
            key, s, opts,
        )?))),
        SECRET_SIG => {
            let Some(inner) = s.fields.get("value") else {
                return Err(ProviderError::marshal(
                    &opts.label,
                    format!("malformed secret value for '{key}': missing 'value'"),
                ));
            };
            let Some(element) = unmarshal_value(key, inner, opts)? else {
                return Ok(None);
            };
            if opts.keep_secrets {
                Ok(Some(PropertyValue::secret(element)))
            } else {
                Ok(Some(element))
            }
        }
        RESOURCE_REFERENCE_SIG => {
            let urn = get_string(s, "urn").ok_or_else(|| {
                ProviderError::marshal(
                    &opts.label,
                    format!("malformed resource reference for '{key}': missing 'urn'"),
                )
            })?;
            let id = get_string(s, "id");
            if !opts.keep_resources {
                let projected = match &id {
                    Some(id) if !id.is_empty() => id.clone(),
                    _ => urn,
                };
                return Ok(Some(PropertyValue::String(projected)));
            }
            Ok(Some(PropertyValue::ResourceReference(ResourceReference {
                urn,
                id,
                package_version: get_string(s, "packageVersion").unwrap_or_default(),
            })))
        }
        OUTPUT_VALUE_SIG => unmarshal_output(key, s, opts),
        other => Err(ProviderError::marshal(
            &opts.label,
            format!("unrecognized signature '{other}' in property map for '{key}'"),
        )),
    }
}

fn unmarshal_output(
    key: &str,
    s: &Struct,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, ProviderError> {
    let element = match s.fields.get("value") {
        Some(v) => unmarshal_value(key, v, opts)?,
        None => None,
    };
    let known = element.is_some();
    let secret = matches!(
        s.fields.get("secret").and_then(|v| v.kind.as_ref()),
        Some(Kind::BoolValue(true))
    );

    if !opts.keep_output_values {
        let projected = match element {
            Some(v) => Some(v),
            None => unknown(key, opts)?,
        };
        return Ok(projected.map(|v| {
            if secret && opts.keep_secrets {
                PropertyValue::secret(v)
            } else {
                v
            }
        }));
    }

    let mut dependencies = Vec::new();
    let deps = s.fields.get("dependencies").and_then(|v| v.kind.as_ref());
    if let Some(Kind::ListValue(list)) = deps {
        for dep in &list.values {
            match &dep.kind {
                Some(Kind::StringValue(urn)) => dependencies.push(urn.clone()),
                _ => {
                    return Err(ProviderError::marshal(
                        &opts.label,
                        format!(
                            "malformed output value for '{key}': dependency is not a string"
                        ),
                    ))
                }
            }
        }
    }

    Ok(Some(PropertyValue::Output(OutputValue {
        element: Box::new(element.unwrap_or(PropertyValue::Null)),
        known,
        secret,
        dependencies,
    })))
}

fn unknown(key: &str, opts: &MarshalOptions) -> Result<Option<PropertyValue>, ProviderError> {
    if opts.reject_unknowns {
        return Err(ProviderError::marshal(
            &opts.label,
            format!("unexpected unknown property value for '{key}'"),
        ));
    }
    if opts.keep_unknowns {
        return Ok(Some(PropertyValue::Computed(Computed {
            element: Box::new(PropertyValue::String(String::new())),
        })));
    }
    Ok(None)
}

fn marshal_asset(asset: &Asset, opts: &MarshalOptions) -> Struct {
    let mut fields = sig_fields(ASSET_SIG);
    insert_non_empty(&mut fields, "hash", &asset.hash);
    if !opts.elide_asset_contents {
        insert_non_empty(&mut fields, "text", &asset.text);
        insert_non_empty(&mut fields, "path", &asset.path);
        insert_non_empty(&mut fields, "uri", &asset.uri);
    }
    Struct { fields }
}

fn marshal_archive(archive: &Archive, opts: &MarshalOptions) -> Struct {
    let mut fields = sig_fields(ARCHIVE_SIG);
    insert_non_empty(&mut fields, "hash", &archive.hash);
    if !opts.elide_asset_contents {
        if !archive.assets.is_empty() {
            let members = archive
                .assets
                .iter()
                .map(|(name, member)| {
                    let s = match member {
                        ArchiveMember::Asset(a) => marshal_asset(a, opts),
                        ArchiveMember::Archive(a) => marshal_archive(a, opts),
                    };
                    (name.clone(), kind(Kind::StructValue(s)))
                })
                .collect();
            fields.insert(
                "assets".to_string(),
                kind(Kind::StructValue(Struct { fields: members })),
            );
        }
        insert_non_empty(&mut fields, "path", &archive.path);
        insert_non_empty(&mut fields, "uri", &archive.uri);
    }
    Struct { fields }
}

fn unmarshal_asset(s: &Struct) -> Asset {
    Asset {
        hash: get_string(s, "hash").unwrap_or_default(),
        text: get_string(s, "text").unwrap_or_default(),
        path: get_string(s, "path").unwrap_or_default(),
        uri: get_string(s, "uri").unwrap_or_default(),
    }
}

fn unmarshal_archive(
    key: &str,
    s: &Struct,
    opts: &MarshalOptions,
) -> Result<Archive, ProviderError> {
    let mut assets = BTreeMap::new();
    let members = s.fields.get("assets").and_then(|v| v.kind.as_ref());
    if let Some(Kind::StructValue(members)) = members {
        for (name, member) in &members.fields {
            let Some(Kind::StructValue(member)) = &member.kind else {
                return Err(ProviderError::marshal(
                    &opts.label,
                    format!("archive member '{name}' of '{key}' is not an object"),
                ));
            };
            let member = match member.fields.get(SIG_KEY).and_then(|v| v.kind.as_ref()) {
                Some(Kind::StringValue(sig)) if sig == ASSET_SIG => {
                    ArchiveMember::Asset(unmarshal_asset(member))
                }
                Some(Kind::StringValue(sig)) if sig == ARCHIVE_SIG => {
                    ArchiveMember::Archive(unmarshal_archive(key, member, opts)?)
                }
                _ => {
                    return Err(ProviderError::marshal(
                        &opts.label,
                        format!(
                            "archive member '{name}' of '{key}' is not an asset or archive"
                        ),
                    ))
                }
            };
            assets.insert(name.clone(), member);
        }
    }
    Ok(Archive {
        hash: get_string(s, "hash").unwrap_or_default(),
        assets,
        path: get_string(s, "path").unwrap_or_default(),
        uri: get_string(s, "uri").unwrap_or_default(),
    })
}

fn kind(kind: Kind) -> Value {
    Value { kind: Some(kind) }
}

fn string_value(s: &str) -> Value {
    kind(Kind::StringValue(s.to_string()))
}

fn sig_fields(sig: &str) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    fields.insert(SIG_KEY.to_string(), string_value(sig));
    fields
}

fn insert_non_empty(fields: &mut BTreeMap<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        fields.insert(key.to_string(), string_value(value));
    }
}

fn get_string(s: &Struct, key: &str) -> Option<String> {
    match s.fields.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(v)) => Some(v.clone()),
        _ => None,
    }
}
