//! Classification of provider RPC failures.
//!
//! A failed call tells the engine two things: what went wrong, and whether the
//! resource it touched is still in a known state. Failures the server could not
//! explain (`Internal`, `DataLoss`, `Unknown`) leave the state indeterminate.
//! A failure carrying an `ErrorResourceInitFailed` detail means the resource
//! exists but is unhealthy, and its live state travels with the error.

use prost::Message;
use prost_types::{Any, Struct};
use serde::{Deserialize, Serialize};
use tonic::{Code, Status};
use tracing::{debug, trace};

use crate::error::{InitError, MissingConfigKey, ProviderError};
use crate::rpc::{ConfigureErrorMissingKeys, ErrorResourceInitFailed, RpcStatus};

const TYPE_URL_PREFIX: &str = "type.googleapis.com/";
const INIT_FAILED_TYPE: &str = "pulumirpc.ErrorResourceInitFailed";
const MISSING_KEYS_TYPE: &str = "pulumirpc.ConfigureErrorMissingKeys";

/// The state a resource is left in by a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// The last known state of the resource is accurate.
    #[default]
    Ok,
    /// The resource exists but did not finish initializing.
    PartialFailure,
    /// The state of the resource cannot be determined.
    Unknown,
}

/// A classified provider failure, with any live state it carried.
#[derive(Debug)]
pub struct ParsedError {
    /// The state the resource is left in.
    pub status: ResourceStatus,
    /// The ID of a partially initialized resource. Empty otherwise.
    pub id: String,
    /// The live outputs of a partially initialized resource.
    pub live_object: Option<Struct>,
    /// The live inputs of a partially initialized resource.
    pub live_inputs: Option<Struct>,
    /// The error to surface.
    pub error: ProviderError,
}

/// Classify an RPC failure by how much it tells us about the resource's state.
pub fn resource_state_and_error(status: Status) -> (ResourceStatus, ProviderError) {
    trace!(code = ?status.code(), message = %status.message(), "provider returned rpc error");
    match status.code() {
        Code::Internal | Code::DataLoss | Code::Unknown => {
            trace!(code = ?status.code(), "rpc error may not be recoverable");
            (ResourceStatus::Unknown, ProviderError::UnknownState(status))
        }
        Code::Unimplemented => {
            let message = status.message().to_string();
            (ResourceStatus::Ok, ProviderError::Unimplemented(message))
        }
        _ => {
            trace!(code = ?status.code(), "rpc error is well understood and recoverable");
            (ResourceStatus::Ok, ProviderError::Rpc(status))
        }
    }
}

/// Classify an RPC failure, extracting any partial-failure payload.
///
/// When the failure carries an `ErrorResourceInitFailed` detail the status is
/// [`ResourceStatus::PartialFailure`] and the error is an [`InitError`] holding
/// the provider's reasons. The live object is returned undecoded; callers
/// unmarshal it with the options of the operation that failed.
pub fn parse_error(status: Status) -> ParsedError {
    if let Some(init) = decode_detail::<ErrorResourceInitFailed>(&status, INIT_FAILED_TYPE) {
        debug!(id = %init.id, reasons = init.reasons.len(), "resource failed to initialize");
        return ParsedError {
            status: ResourceStatus::PartialFailure,
            id: init.id.clone(),
            live_object: init.properties,
            live_inputs: init.inputs,
            error: InitError {
                reasons: init.reasons,
                id: init.id,
                ..Default::default()
            }
            .into(),
        };
    }

    let (status, error) = resource_state_and_error(status);
    ParsedError {
        status,
        id: String::new(),
        live_object: None,
        live_inputs: None,
        error,
    }
}

/// Convert a failed `Configure` into an error.
///
/// A `ConfigureErrorMissingKeys` detail becomes a
/// [`ProviderError::Configuration`] listing every missing key.
pub fn create_configure_error(status: Status) -> ProviderError {
    if let Some(missing) = decode_detail::<ConfigureErrorMissingKeys>(&status, MISSING_KEYS_TYPE) {
        let keys = missing
            .missing_keys
            .into_iter()
            .map(|key| MissingConfigKey {
                name: key.name,
                description: key.description,
            })
            .collect::<Vec<_>>();
        if !keys.is_empty() {
            return ProviderError::Configuration(keys);
        }
    }
    resource_state_and_error(status).1
}

/// Pack a message as a `google.protobuf.Any` under the given type name.
pub fn pack_detail<M: Message>(type_name: &str, message: &M) -> Any {
    Any {
        type_url: format!("{TYPE_URL_PREFIX}{type_name}"),
        value: message.encode_to_vec(),
    }
}

/// Build a status carrying the given details.
pub fn status_with_details(code: Code, message: impl Into<String>, details: Vec<Any>) -> Status {
    let message = message.into();
    let payload = RpcStatus {
        code: code as i32,
        message: message.clone(),
        details,
    };
    Status::with_details(code, message, payload.encode_to_vec().into())
}

/// Build a partial-failure status as a provider would.
pub fn init_failed_status(
    message: impl Into<String>,
    detail: &ErrorResourceInitFailed,
) -> Status {
    status_with_details(
        Code::Unknown,
        message,
        vec![pack_detail(INIT_FAILED_TYPE, detail)],
    )
}

/// Build a missing-configuration status as a provider would.
pub fn missing_keys_status(
    message: impl Into<String>,
    detail: &ConfigureErrorMissingKeys,
) -> Status {
    status_with_details(
        Code::InvalidArgument,
        message,
        vec![pack_detail(MISSING_KEYS_TYPE, detail)],
    )
}

fn decode_detail<M: Message + Default>(status: &Status, type_name: &str) -> Option<M> {
    if status.details().is_empty() {
        return None;
    }
    let payload = match RpcStatus::decode(status.details()) {
        Ok(payload) => payload,
        Err(err) => {
            debug!(error = %err, "ignoring undecodable status details");
            return None;
        }
    };
    payload
        .details
        .iter()
        .filter(|any| any.type_url.rsplit('/').next() == Some(type_name))
        .find_map(|any| M::decode(any.value.as_slice()).ok())
}
