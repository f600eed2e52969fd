//! Resource Provider Client
//!
//! This crate is the engine side of the resource provider plugin protocol.
//! A provider plugin is a separate process serving a gRPC interface; the
//! engine loads it, configures it, and drives resources through their
//! lifecycle by calling it.
//!
//! # Overview
//!
//! - **[`Provider`]**: a handle to one plugin, exposing every lifecycle call
//! - **Property values**: the engine's value model, including secrets,
//!   unknowns, outputs and resource references ([`property`])
//! - **Marshaling**: conversion to and from the wire representation, governed
//!   by what the provider said it accepts ([`marshal`])
//! - **Failure classification**: whether a failed call left the resource in a
//!   known state ([`status`])
//! - **Plugin processes**: spawning and attaching to plugins ([`plugin`])
//! - **Testing**: an in-memory provider for exercising the handle ([`testing`])
//!
//! # Quick Start
//!
//! ```ignore
//! use resource_provider_client::{
//!     property_map, PluginContext, PluginHost, PropertyValue, Provider, ProviderError,
//!     ProviderOptions, Urn,
//! };
//!
//! async fn deploy(host: &dyn PluginHost) -> Result<(), ProviderError> {
//!     let provider =
//!         Provider::new(host, PluginContext::default(), "aws", None, ProviderOptions::from_env())
//!             .await?;
//!
//!     provider.configure(&property_map([("region", PropertyValue::from("us-west-2"))]))?;
//!
//!     let urn = Urn::new("urn:pulumi:dev::proj::aws:s3/bucket:Bucket::logs");
//!     let inputs = property_map([("acl", PropertyValue::from("private"))]);
//!     let checked = provider.check(&urn, &Default::default(), &inputs, false, &[]).await?;
//!     let created = provider.create(&urn, &checked.into_result()?, 0.0, false).await?;
//!     tracing::info!(id = %created.id, "bucket created");
//!
//!     provider.close().await
//! }
//! ```
//!
//! # Configuration
//!
//! [`Provider::configure`] returns as soon as the `Configure` call has been
//! started. Every later call that depends on the provider's capabilities waits
//! for it to finish, so configuration never blocks unrelated work. If the
//! configuration contains values that are not yet known, the plugin is never
//! configured and calls answer conservatively without contacting it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod legacy;
pub mod logging;
pub mod marshal;
pub mod options;
pub mod plugin;
pub mod property;
pub mod provider;
pub mod rpc;
pub mod secrets;
pub mod status;
pub mod testing;
pub mod types;
pub mod urn;

// Re-export main types at crate root
pub use config::PluginConfig;
pub use error::{InitError, MissingConfigKey, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use options::ProviderOptions;
pub use plugin::{PluginContext, PluginHost};
pub use property::{property_map, PropertyKey, PropertyMap, PropertyValue};
pub use provider::Provider;
pub use status::ResourceStatus;
pub use types::{
    CallInfo, CallOptions, CallResult, CheckFailure, CheckResult, ConstructInfo,
    ConstructOptions, ConstructResult, CreateResult, DiffChanges, DiffKind, DiffResult, Mapping,
    PluginInfo, PropertyDiff, ReadResult,
};
pub use urn::Urn;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use semver;
pub use serde_json;
pub use tonic;
pub use tracing;
