//! Testing utilities for code that drives providers.
//!
//! [`MockProvider`] implements [`ResourceProviderRpc`] in memory, so a
//! [`Provider`](crate::Provider) can be exercised without a plugin process or
//! a socket. Each RPC answers with a scripted closure; methods without one
//! answer `Unimplemented`, except `Configure`, which accepts everything.
//!
//! # Example
//!
//! ```ignore
//! use resource_provider_client::testing::MockProvider;
//! use resource_provider_client::rpc::CreateResponse;
//!
//! #[tokio::test]
//! async fn test_create() {
//!     let mock = MockProvider::new().on_create(|req| {
//!         Ok(CreateResponse { id: "i-1".into(), properties: req.properties })
//!     });
//!     let ctx = PluginContext::default();
//!     let provider = Provider::with_client(ctx, "aws", mock, Default::default());
//!     provider.configure(&PropertyMap::new()).unwrap();
//!     // ...
//! }
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tonic::Status;

use crate::rpc::*;

type Handler<Req, Resp> = Arc<dyn Fn(Req) -> Result<Resp, Status> + Send + Sync>;

/// An in-memory provider with scripted responses.
#[derive(Clone, Default)]
pub struct MockProvider {
    calls: Arc<Mutex<Vec<&'static str>>>,
    configure_gate: Option<Arc<Notify>>,
    get_schema: Option<Handler<GetSchemaRequest, GetSchemaResponse>>,
    check_config: Option<Handler<CheckRequest, CheckResponse>>,
    diff_config: Option<Handler<DiffRequest, DiffResponse>>,
    configure: Option<Handler<ConfigureRequest, ConfigureResponse>>,
    check: Option<Handler<CheckRequest, CheckResponse>>,
    diff: Option<Handler<DiffRequest, DiffResponse>>,
    create: Option<Handler<CreateRequest, CreateResponse>>,
    read: Option<Handler<ReadRequest, ReadResponse>>,
    update: Option<Handler<UpdateRequest, UpdateResponse>>,
    delete: Option<Handler<DeleteRequest, ()>>,
    construct: Option<Handler<ConstructRequest, ConstructResponse>>,
    invoke: Option<Handler<InvokeRequest, InvokeResponse>>,
    stream_invoke: Option<Handler<InvokeRequest, Vec<InvokeResponse>>>,
    call: Option<Handler<CallRequest, CallResponse>>,
    get_plugin_info: Option<Handler<(), PluginInfo>>,
    attach: Option<Handler<PluginAttach, ()>>,
    cancel: Option<Handler<(), ()>>,
    get_mapping: Option<Handler<GetMappingRequest, GetMappingResponse>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl MockProvider {
    /// Create a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// The RPC methods called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// How many times `method` was called.
    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| **m == method).count()
    }

    /// Hold every `Configure` until `gate` is notified.
    pub fn with_configure_gate(mut self, gate: Arc<Notify>) -> Self {
        self.configure_gate = Some(gate);
        self
    }

    fn record(&self, method: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(method);
        }
    }

    fn dispatch<Req, Resp>(
        &self,
        method: &'static str,
        handler: &Option<Handler<Req, Resp>>,
        request: Req,
    ) -> Result<Resp, Status> {
        self.record(method);
        match handler {
            Some(handler) => handler(request),
            None => Err(Status::unimplemented(format!("{method} is not implemented"))),
        }
    }
}

macro_rules! on_handlers {
    ($($(#[$doc:meta])* $setter:ident => $field:ident: $req:ty => $resp:ty;)*) => {
        impl MockProvider {
            $(
                $(#[$doc])*
                pub fn $setter<F>(mut self, handler: F) -> Self
                where
                    F: Fn($req) -> Result<$resp, Status> + Send + Sync + 'static,
                {
                    self.$field = Some(Arc::new(handler));
                    self
                }
            )*
        }
    };
}

on_handlers! {
    /// Script `GetSchema`.
    on_get_schema => get_schema: GetSchemaRequest => GetSchemaResponse;
    /// Script `CheckConfig`.
    on_check_config => check_config: CheckRequest => CheckResponse;
    /// Script `DiffConfig`.
    on_diff_config => diff_config: DiffRequest => DiffResponse;
    /// Script `Configure`.
    on_configure => configure: ConfigureRequest => ConfigureResponse;
    /// Script `Check`.
    on_check => check: CheckRequest => CheckResponse;
    /// Script `Diff`.
    on_diff => diff: DiffRequest => DiffResponse;
    /// Script `Create`.
    on_create => create: CreateRequest => CreateResponse;
    /// Script `Read`.
    on_read => read: ReadRequest => ReadResponse;
    /// Script `Update`.
    on_update => update: UpdateRequest => UpdateResponse;
    /// Script `Delete`.
    on_delete => delete: DeleteRequest => ();
    /// Script `Construct`.
    on_construct => construct: ConstructRequest => ConstructResponse;
    /// Script `Invoke`.
    on_invoke => invoke: InvokeRequest => InvokeResponse;
    /// Script `StreamInvoke`. The returned messages are streamed in order.
    on_stream_invoke => stream_invoke: InvokeRequest => Vec<InvokeResponse>;
    /// Script `Call`.
    on_call => call: CallRequest => CallResponse;
    /// Script `GetPluginInfo`.
    on_get_plugin_info => get_plugin_info: () => PluginInfo;
    /// Script `Attach`.
    on_attach => attach: PluginAttach => ();
    /// Script `Cancel`.
    on_cancel => cancel: () => ();
    /// Script `GetMapping`.
    on_get_mapping => get_mapping: GetMappingRequest => GetMappingResponse;
}

/// The response of a provider that accepts everything and supports previews.
pub fn accepting_configure_response() -> ConfigureResponse {
    ConfigureResponse {
        accept_secrets: true,
        supports_preview: true,
        accept_resources: true,
        accept_outputs: true,
    }
}

#[async_trait::async_trait]
impl ResourceProviderRpc for MockProvider {
    async fn get_schema(&self, request: GetSchemaRequest) -> Result<GetSchemaResponse, Status> {
        self.dispatch("GetSchema", &self.get_schema, request)
    }

    async fn check_config(&self, request: CheckRequest) -> Result<CheckResponse, Status> {
        self.dispatch("CheckConfig", &self.check_config, request)
    }

    async fn diff_config(&self, request: DiffRequest) -> Result<DiffResponse, Status> {
        self.dispatch("DiffConfig", &self.diff_config, request)
    }

    async fn configure(&self, request: ConfigureRequest) -> Result<ConfigureResponse, Status> {
        if let Some(gate) = &self.configure_gate {
            gate.notified().await;
        }
        self.record("Configure");
        match &self.configure {
            Some(handler) => handler(request),
            None => Ok(accepting_configure_response()),
        }
    }

    async fn check(&self, request: CheckRequest) -> Result<CheckResponse, Status> {
        self.dispatch("Check", &self.check, request)
    }

    async fn diff(&self, request: DiffRequest) -> Result<DiffResponse, Status> {
        self.dispatch("Diff", &self.diff, request)
    }

    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, Status> {
        self.dispatch("Create", &self.create, request)
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, Status> {
        self.dispatch("Read", &self.read, request)
    }

    async fn update(&self, request: UpdateRequest) -> Result<UpdateResponse, Status> {
        self.dispatch("Update", &self.update, request)
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), Status> {
        self.dispatch("Delete", &self.delete, request)
    }

    async fn construct(&self, request: ConstructRequest) -> Result<ConstructResponse, Status> {
        self.dispatch("Construct", &self.construct, request)
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, Status> {
        self.dispatch("Invoke", &self.invoke, request)
    }

    async fn stream_invoke(&self, request: InvokeRequest) -> Result<InvokeStream, Status> {
        let responses = self.dispatch("StreamInvoke", &self.stream_invoke, request)?;
        Ok(Box::pin(tokio_stream::iter(responses.into_iter().map(Ok))))
    }

    async fn call(&self, request: CallRequest) -> Result<CallResponse, Status> {
        self.dispatch("Call", &self.call, request)
    }

    async fn get_plugin_info(&self) -> Result<PluginInfo, Status> {
        self.dispatch("GetPluginInfo", &self.get_plugin_info, ())
    }

    async fn attach(&self, request: PluginAttach) -> Result<(), Status> {
        self.dispatch("Attach", &self.attach, request)
    }

    async fn cancel(&self) -> Result<(), Status> {
        self.dispatch("Cancel", &self.cancel, ())
    }

    async fn get_mapping(&self, request: GetMappingRequest) -> Result<GetMappingResponse, Status> {
        self.dispatch("GetMapping", &self.get_mapping, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_unscripted_methods_are_unimplemented() {
        let mock = MockProvider::new();
        let err = mock.create(CreateRequest::default()).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unimplemented);
        assert_eq!(mock.calls(), vec!["Create"]);
    }

    #[tokio::test]
    async fn test_configure_accepts_by_default() {
        let mock = MockProvider::new();
        let resp = mock.configure(ConfigureRequest::default()).await.unwrap();
        assert_eq!(resp, accepting_configure_response());
    }

    #[tokio::test]
    async fn test_scripted_stream() {
        let mock = MockProvider::new().on_stream_invoke(|_| {
            Ok(vec![InvokeResponse::default(), InvokeResponse::default()])
        });
        let stream = mock.stream_invoke(InvokeRequest::default()).await.unwrap();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(mock.call_count("StreamInvoke"), 1);
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let mock = MockProvider::new().on_cancel(|_| Ok(()));
        let clone = mock.clone();
        clone.cancel().await.unwrap();
        assert_eq!(mock.calls(), vec!["Cancel"]);
    }
}
