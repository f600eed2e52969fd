//! Wire types and client for the `pulumirpc.ResourceProvider` service.
//!
//! The message definitions mirror the provider protocol's `.proto` files and
//! are maintained by hand, since the client only needs the messages below.
//! [`ResourceProviderRpc`] is the request/response channel a
//! [`Provider`](crate::Provider) talks to; [`ResourceProviderClient`] implements it
//! over a tonic [`Channel`], and [`MockProvider`](crate::testing::MockProvider)
//! implements it in memory.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::pin::Pin;

use tokio_stream::Stream;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::Status;

/// Fully qualified name of the provider service.
pub const SERVICE_NAME: &str = "pulumirpc.ResourceProvider";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetSchemaRequest {
    #[prost(int32, tag = "1")]
    pub version: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetSchemaResponse {
    #[prost(string, tag = "1")]
    pub schema: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureRequest {
    #[prost(map = "string, string", tag = "1")]
    pub variables: HashMap<String, String>,
    #[prost(message, optional, tag = "2")]
    pub args: Option<prost_types::Struct>,
    #[prost(bool, tag = "3")]
    pub accept_secrets: bool,
    #[prost(bool, tag = "4")]
    pub accept_resources: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureResponse {
    #[prost(bool, tag = "1")]
    pub accept_secrets: bool,
    #[prost(bool, tag = "2")]
    pub supports_preview: bool,
    #[prost(bool, tag = "3")]
    pub accept_resources: bool,
    #[prost(bool, tag = "4")]
    pub accept_outputs: bool,
}

/// Error detail attached to a failed `Configure` listing missing keys.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureErrorMissingKeys {
    #[prost(message, repeated, tag = "1")]
    pub missing_keys: Vec<configure_error_missing_keys::MissingKey>,
}

pub mod configure_error_missing_keys {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct MissingKey {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub description: String,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckRequest {
    #[prost(string, tag = "1")]
    pub urn: String,
    #[prost(message, optional, tag = "2")]
    pub olds: Option<prost_types::Struct>,
    #[prost(message, optional, tag = "3")]
    pub news: Option<prost_types::Struct>,
    #[prost(bytes = "vec", tag = "5")]
    pub random_seed: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckResponse {
    #[prost(message, optional, tag = "1")]
    pub inputs: Option<prost_types::Struct>,
    #[prost(message, repeated, tag = "2")]
    pub failures: Vec<CheckFailure>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckFailure {
    #[prost(string, tag = "1")]
    pub property: String,
    #[prost(string, tag = "2")]
    pub reason: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiffRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub urn: String,
    #[prost(message, optional, tag = "3")]
    pub olds: Option<prost_types::Struct>,
    #[prost(message, optional, tag = "4")]
    pub news: Option<prost_types::Struct>,
    #[prost(string, repeated, tag = "5")]
    pub ignore_changes: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PropertyDiff {
    #[prost(enumeration = "property_diff::Kind", tag = "1")]
    pub kind: i32,
    #[prost(bool, tag = "2")]
    pub input_diff: bool,
}

pub mod property_diff {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Kind {
        Add = 0,
        AddReplace = 1,
        Delete = 2,
        DeleteReplace = 3,
        Update = 4,
        UpdateReplace = 5,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiffResponse {
    #[prost(string, repeated, tag = "1")]
    pub replaces: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub stables: Vec<String>,
    #[prost(bool, tag = "3")]
    pub delete_before_replace: bool,
    #[prost(enumeration = "diff_response::DiffChanges", tag = "4")]
    pub changes: i32,
    #[prost(string, repeated, tag = "5")]
    pub diffs: Vec<String>,
    #[prost(map = "string, message", tag = "6")]
    pub detailed_diff: HashMap<String, PropertyDiff>,
    #[prost(bool, tag = "7")]
    pub has_detailed_diff: bool,
}

pub mod diff_response {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum DiffChanges {
        DiffUnknown = 0,
        DiffNone = 1,
        DiffSome = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateRequest {
    #[prost(string, tag = "1")]
    pub urn: String,
    #[prost(message, optional, tag = "2")]
    pub properties: Option<prost_types::Struct>,
    #[prost(double, tag = "3")]
    pub timeout: f64,
    #[prost(bool, tag = "4")]
    pub preview: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateResponse {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub properties: Option<prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub urn: String,
    #[prost(message, optional, tag = "3")]
    pub properties: Option<prost_types::Struct>,
    #[prost(message, optional, tag = "4")]
    pub inputs: Option<prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResponse {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub properties: Option<prost_types::Struct>,
    #[prost(message, optional, tag = "3")]
    pub inputs: Option<prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub urn: String,
    #[prost(message, optional, tag = "3")]
    pub olds: Option<prost_types::Struct>,
    #[prost(message, optional, tag = "4")]
    pub news: Option<prost_types::Struct>,
    #[prost(double, tag = "5")]
    pub timeout: f64,
    #[prost(string, repeated, tag = "6")]
    pub ignore_changes: Vec<String>,
    #[prost(bool, tag = "7")]
    pub preview: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateResponse {
    #[prost(message, optional, tag = "1")]
    pub properties: Option<prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub urn: String,
    #[prost(message, optional, tag = "3")]
    pub properties: Option<prost_types::Struct>,
    #[prost(double, tag = "4")]
    pub timeout: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConstructRequest {
    #[prost(string, tag = "1")]
    pub project: String,
    #[prost(string, tag = "2")]
    pub stack: String,
    #[prost(map = "string, string", tag = "3")]
    pub config: HashMap<String, String>,
    #[prost(bool, tag = "4")]
    pub dry_run: bool,
    #[prost(int32, tag = "5")]
    pub parallel: i32,
    #[prost(string, tag = "6")]
    pub monitor_endpoint: String,
    #[prost(string, tag = "7")]
    pub r#type: String,
    #[prost(string, tag = "8")]
    pub name: String,
    #[prost(string, tag = "9")]
    pub parent: String,
    #[prost(message, optional, tag = "10")]
    pub inputs: Option<prost_types::Struct>,
    #[prost(map = "string, message", tag = "11")]
    pub input_dependencies: HashMap<String, construct_request::PropertyDependencies>,
    #[prost(bool, tag = "12")]
    pub protect: bool,
    #[prost(map = "string, string", tag = "13")]
    pub providers: HashMap<String, String>,
    #[prost(string, repeated, tag = "14")]
    pub aliases: Vec<String>,
    #[prost(string, repeated, tag = "15")]
    pub dependencies: Vec<String>,
    #[prost(string, repeated, tag = "16")]
    pub config_secret_keys: Vec<String>,
    #[prost(string, repeated, tag = "17")]
    pub additional_secret_outputs: Vec<String>,
    #[prost(message, optional, tag = "18")]
    pub custom_timeouts: Option<construct_request::CustomTimeouts>,
    #[prost(string, tag = "19")]
    pub deleted_with: String,
    #[prost(bool, optional, tag = "20")]
    pub delete_before_replace: Option<bool>,
    #[prost(string, repeated, tag = "21")]
    pub ignore_changes: Vec<String>,
    #[prost(string, repeated, tag = "22")]
    pub replace_on_changes: Vec<String>,
    #[prost(bool, tag = "23")]
    pub retain_on_delete: bool,
}

pub mod construct_request {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PropertyDependencies {
        #[prost(string, repeated, tag = "1")]
        pub urns: Vec<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CustomTimeouts {
        #[prost(string, tag = "1")]
        pub create: String,
        #[prost(string, tag = "2")]
        pub update: String,
        #[prost(string, tag = "3")]
        pub delete: String,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConstructResponse {
    #[prost(string, tag = "1")]
    pub urn: String,
    #[prost(message, optional, tag = "2")]
    pub state: Option<prost_types::Struct>,
    #[prost(map = "string, message", tag = "3")]
    pub state_dependencies: HashMap<String, construct_response::PropertyDependencies>,
}

pub mod construct_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PropertyDependencies {
        #[prost(string, repeated, tag = "1")]
        pub urns: Vec<String>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeRequest {
    #[prost(string, tag = "1")]
    pub tok: String,
    #[prost(message, optional, tag = "2")]
    pub args: Option<prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeResponse {
    #[prost(message, optional, tag = "1")]
    pub r#return: Option<prost_types::Struct>,
    #[prost(message, repeated, tag = "2")]
    pub failures: Vec<CheckFailure>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallRequest {
    #[prost(string, tag = "1")]
    pub tok: String,
    #[prost(message, optional, tag = "2")]
    pub args: Option<prost_types::Struct>,
    #[prost(map = "string, message", tag = "3")]
    pub arg_dependencies: HashMap<String, call_request::ArgumentDependencies>,
    #[prost(string, tag = "6")]
    pub project: String,
    #[prost(string, tag = "7")]
    pub stack: String,
    #[prost(map = "string, string", tag = "8")]
    pub config: HashMap<String, String>,
    #[prost(string, repeated, tag = "9")]
    pub config_secret_keys: Vec<String>,
    #[prost(bool, tag = "10")]
    pub dry_run: bool,
    #[prost(int32, tag = "11")]
    pub parallel: i32,
    #[prost(string, tag = "12")]
    pub monitor_endpoint: String,
}

pub mod call_request {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ArgumentDependencies {
        #[prost(string, repeated, tag = "1")]
        pub urns: Vec<String>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallResponse {
    #[prost(message, optional, tag = "1")]
    pub r#return: Option<prost_types::Struct>,
    #[prost(map = "string, message", tag = "2")]
    pub return_dependencies: HashMap<String, call_response::ReturnDependencies>,
    #[prost(message, repeated, tag = "3")]
    pub failures: Vec<CheckFailure>,
}

pub mod call_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ReturnDependencies {
        #[prost(string, repeated, tag = "1")]
        pub urns: Vec<String>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PluginInfo {
    #[prost(string, tag = "1")]
    pub version: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PluginAttach {
    #[prost(string, tag = "1")]
    pub address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMappingRequest {
    #[prost(string, tag = "1")]
    pub key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMappingResponse {
    #[prost(string, tag = "1")]
    pub provider: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// Error detail attached to a failed `Create`, `Read` or `Update` when the
/// resource exists but did not become healthy.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorResourceInitFailed {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub properties: Option<prost_types::Struct>,
    #[prost(string, repeated, tag = "3")]
    pub reasons: Vec<String>,
    #[prost(message, optional, tag = "4")]
    pub inputs: Option<prost_types::Struct>,
}

/// `google.rpc.Status`, the payload of the `grpc-status-details-bin` trailer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<prost_types::Any>,
}

/// A server-streamed sequence of invoke responses.
pub type InvokeStream = Pin<Box<dyn Stream<Item = Result<InvokeResponse, Status>> + Send>>;

/// The request/response surface of a resource provider.
///
/// One method per RPC. Implementations must be safe to call concurrently.
#[async_trait::async_trait]
pub trait ResourceProviderRpc: Send + Sync + 'static {
    async fn get_schema(&self, request: GetSchemaRequest) -> Result<GetSchemaResponse, Status>;
    async fn check_config(&self, request: CheckRequest) -> Result<CheckResponse, Status>;
    async fn diff_config(&self, request: DiffRequest) -> Result<DiffResponse, Status>;
    async fn configure(&self, request: ConfigureRequest) -> Result<ConfigureResponse, Status>;
    async fn check(&self, request: CheckRequest) -> Result<CheckResponse, Status>;
    async fn diff(&self, request: DiffRequest) -> Result<DiffResponse, Status>;
    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, Status>;
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, Status>;
    async fn update(&self, request: UpdateRequest) -> Result<UpdateResponse, Status>;
    async fn delete(&self, request: DeleteRequest) -> Result<(), Status>;
    async fn construct(&self, request: ConstructRequest) -> Result<ConstructResponse, Status>;
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, Status>;
    async fn stream_invoke(&self, request: InvokeRequest) -> Result<InvokeStream, Status>;
    async fn call(&self, request: CallRequest) -> Result<CallResponse, Status>;
    async fn get_plugin_info(&self) -> Result<PluginInfo, Status>;
    async fn attach(&self, request: PluginAttach) -> Result<(), Status>;
    async fn cancel(&self) -> Result<(), Status>;
    async fn get_mapping(&self, request: GetMappingRequest) -> Result<GetMappingResponse, Status>;
}

/// A gRPC client for the provider service.
#[derive(Debug, Clone)]
pub struct ResourceProviderClient {
    inner: tonic::client::Grpc<Channel>,
}

impl ResourceProviderClient {
    /// Create a client over an established channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {e}")))?;
        let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait::async_trait]
impl ResourceProviderRpc for ResourceProviderClient {
    async fn get_schema(&self, request: GetSchemaRequest) -> Result<GetSchemaResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/GetSchema", request)
            .await
    }

    async fn check_config(&self, request: CheckRequest) -> Result<CheckResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/CheckConfig", request)
            .await
    }

    async fn diff_config(&self, request: DiffRequest) -> Result<DiffResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/DiffConfig", request)
            .await
    }

    async fn configure(&self, request: ConfigureRequest) -> Result<ConfigureResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Configure", request)
            .await
    }

    async fn check(&self, request: CheckRequest) -> Result<CheckResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Check", request).await
    }

    async fn diff(&self, request: DiffRequest) -> Result<DiffResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Diff", request).await
    }

    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Create", request).await
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Read", request).await
    }

    async fn update(&self, request: UpdateRequest) -> Result<UpdateResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Update", request).await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), Status> {
        self.unary("/pulumirpc.ResourceProvider/Delete", request).await
    }

    async fn construct(&self, request: ConstructRequest) -> Result<ConstructResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Construct", request)
            .await
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Invoke", request).await
    }

    async fn stream_invoke(&self, request: InvokeRequest) -> Result<InvokeStream, Status> {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {e}")))?;
        let codec = tonic_prost::ProstCodec::<InvokeRequest, InvokeResponse>::default();
        let response = grpc
            .server_streaming(
                tonic::Request::new(request),
                PathAndQuery::from_static("/pulumirpc.ResourceProvider/StreamInvoke"),
                codec,
            )
            .await?;
        Ok(Box::pin(response.into_inner()))
    }

    async fn call(&self, request: CallRequest) -> Result<CallResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/Call", request).await
    }

    async fn get_plugin_info(&self) -> Result<PluginInfo, Status> {
        self.unary("/pulumirpc.ResourceProvider/GetPluginInfo", ())
            .await
    }

    async fn attach(&self, request: PluginAttach) -> Result<(), Status> {
        self.unary("/pulumirpc.ResourceProvider/Attach", request).await
    }

    async fn cancel(&self) -> Result<(), Status> {
        self.unary("/pulumirpc.ResourceProvider/Cancel", ()).await
    }

    async fn get_mapping(&self, request: GetMappingRequest) -> Result<GetMappingResponse, Status> {
        self.unary("/pulumirpc.ResourceProvider/GetMapping", request)
            .await
    }
}
