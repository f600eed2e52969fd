//! Secret propagation for providers that cannot carry secrets themselves.

use serde_json::{json, Map, Value};

use crate::marshal::UNKNOWN_STRING_VALUE;
use crate::property::{PropertyMap, PropertyValue};

/// Re-mark outputs as secret where the corresponding inputs held secrets.
///
/// For each key present in both maps: matching objects are walked
/// recursively, so one secret field does not hide its siblings. Any other
/// value is wrapped as secret if the input contained a secret anywhere. Arrays
/// are not walked element by element since providers may reorder them; a
/// secret anywhere in an input array marks the whole output array.
pub fn annotate_secrets(outs: &mut PropertyMap, ins: &PropertyMap) {
    for (key, input) in ins {
        let Some(output) = outs.get_mut(key) else {
            continue;
        };
        if let (Some(out_obj), Some(in_obj)) = (output.as_object_mut(), input.as_object()) {
            annotate_secrets(out_obj, in_obj);
            continue;
        }
        if !output.is_secret() && input.contains_secrets() {
            let plain = std::mem::replace(output, PropertyValue::Null);
            *output = PropertyValue::secret(plain);
        }
    }
}

/// Project a value to plain JSON, dropping secret markers.
///
/// Used to flatten configuration into the string variables older providers
/// read.
pub fn remove_secrets(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Number(n) => number_value(*n),
        PropertyValue::String(s) => Value::String(s.clone()),
        PropertyValue::Array(items) => Value::Array(items.iter().map(remove_secrets).collect()),
        PropertyValue::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), remove_secrets(v)))
                .collect::<Map<_, _>>(),
        ),
        PropertyValue::Asset(asset) => serde_json::to_value(asset).unwrap_or(Value::Null),
        PropertyValue::Archive(archive) => serde_json::to_value(archive).unwrap_or(Value::Null),
        PropertyValue::ResourceReference(reference) => {
            serde_json::to_value(reference).unwrap_or(Value::Null)
        }
        PropertyValue::Computed(_) => Value::String(UNKNOWN_STRING_VALUE.to_string()),
        PropertyValue::Output(output) if output.known => remove_secrets(&output.element),
        PropertyValue::Output(_) => Value::String(UNKNOWN_STRING_VALUE.to_string()),
        PropertyValue::Secret(element) => remove_secrets(element),
    }
}

/// Integral numbers render without a fraction, so `3.0` becomes `3`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        json!(n)
    }
}
