//! The provider handle.
//!
//! A [`Provider`] is one logical connection to a resource provider plugin.
//! [`Provider::configure`] starts configuration in the background; every
//! other lifecycle call waits for it, then marshals its properties according
//! to what the provider said it can accept.
//!
//! When the provider's own configuration contained unknown values the plugin
//! is never configured, and each call falls back to a conservative answer
//! without contacting it.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigPromise, PluginConfig};
use crate::error::ProviderError;
use crate::marshal::{
    marshal_properties, unmarshal_optional, unmarshal_properties, MarshalOptions,
};
use crate::options::ProviderOptions;
use crate::plugin::{debug_provider_port_from_env, Plugin, PluginContext, PluginHost};
use crate::property::PropertyMap;
use crate::rpc::{self, ResourceProviderClient, ResourceProviderRpc};
use crate::secrets::{annotate_secrets, remove_secrets};
use crate::status::{
    create_configure_error, parse_error, resource_state_and_error, ResourceStatus,
};
use crate::types::{
    CallInfo, CallOptions, CallResult, CheckFailure, CheckResult, ConstructInfo, ConstructOptions,
    ConstructResult, CreateResult, DiffChanges, DiffKind, DiffResult, Mapping, PluginInfo,
    PropertyDiff, ReadResult,
};
use crate::urn::Urn;

const DIFF_UNAVAILABLE_MESSAGE: &str =
    "The provider for this resource has inputs that are not known during preview.\n\
     This preview may not correctly represent the changes that will be applied during an update.";

/// A handle to a resource provider plugin.
///
/// The handle may be shared across tasks; calls do not serialize each other.
pub struct Provider {
    ctx: PluginContext,
    pkg: String,
    plugin: Option<Plugin>,
    client: RwLock<Option<Arc<dyn ResourceProviderRpc>>>,
    options: ProviderOptions,
    config: Arc<ConfigPromise>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("pkg", &self.pkg)
            .field("plugin", &self.plugin)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Load the provider plugin for `pkg`.
    ///
    /// If `PULUMI_DEBUG_PROVIDERS` names the package, attach to the plugin at
    /// the given port and call `Attach` with the host's address. Otherwise
    /// resolve the binary through `host` and spawn it.
    pub async fn new(
        host: &dyn PluginHost,
        ctx: PluginContext,
        pkg: &str,
        version: Option<&semver::Version>,
        options: ProviderOptions,
    ) -> Result<Self, ProviderError> {
        let prefix = format!("{pkg} (resource)");

        if let Some(port) = debug_provider_port_from_env(pkg)? {
            let plugin = Plugin::attach(port, &prefix, options.dial_timeout).await?;
            let client = ResourceProviderClient::new(plugin.channel());
            let provider = Self::assemble(ctx, pkg, Some(plugin), Arc::new(client), options);
            provider.attach(&host.server_addr()).await?;
            return Ok(provider);
        }

        let path = host.plugin_path(&pkg.replace('/', "_"), version)?;
        if path.as_os_str().is_empty() {
            return Err(ProviderError::Assertion(format!(
                "unexpected empty path for plugin {pkg}"
            )));
        }
        let env = spawn_env(&options);
        let plugin = Plugin::spawn(
            &ctx,
            &path,
            &prefix,
            &[host.server_addr()],
            &env,
            options.dial_timeout,
        )
        .await?;
        let client = ResourceProviderClient::new(plugin.channel());
        Ok(Self::assemble(ctx, pkg, Some(plugin), Arc::new(client), options))
    }

    /// Spawn a provider plugin from an explicit binary path.
    ///
    /// The handle has no package name.
    pub async fn from_path(
        host: &dyn PluginHost,
        ctx: PluginContext,
        path: &Path,
        options: ProviderOptions,
    ) -> Result<Self, ProviderError> {
        let prefix = path.display().to_string();
        let plugin = Plugin::spawn(
            &ctx,
            path,
            &prefix,
            &[host.server_addr()],
            &[],
            options.dial_timeout,
        )
        .await?;
        let client = ResourceProviderClient::new(plugin.channel());
        Ok(Self::assemble(ctx, "", Some(plugin), Arc::new(client), options))
    }

    /// Wrap an established client. The handle owns no process.
    pub fn with_client(
        ctx: PluginContext,
        pkg: impl Into<String>,
        client: impl ResourceProviderRpc,
        options: ProviderOptions,
    ) -> Self {
        Self::assemble(ctx, &pkg.into(), None, Arc::new(client), options)
    }

    fn assemble(
        ctx: PluginContext,
        pkg: &str,
        plugin: Option<Plugin>,
        client: Arc<dyn ResourceProviderRpc>,
        options: ProviderOptions,
    ) -> Self {
        Self {
            ctx,
            pkg: pkg.to_string(),
            plugin,
            client: RwLock::new(Some(client)),
            options,
            config: Arc::new(ConfigPromise::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// The package this provider serves.
    pub fn pkg(&self) -> &str {
        &self.pkg
    }

    fn label(&self) -> String {
        format!("Provider[{}]", self.pkg)
    }

    fn is_unimplemented(&self, urn: &Urn, status: &Status) -> bool {
        self.options
            .legacy_providers
            .is_unimplemented(urn.resource_type(), status)
    }

    async fn await_config(&self) -> Result<PluginConfig, ProviderError> {
        self.config.wait(&self.ctx.cancel).await
    }

    fn client(&self) -> Result<Arc<dyn ResourceProviderRpc>, ProviderError> {
        self.client
            .read()
            .ok()
            .and_then(|client| client.clone())
            .ok_or_else(|| ProviderError::Closed(self.pkg.clone()))
    }

    async fn rpc<T>(&self, call: impl Future<Output = Result<T, Status>>) -> Result<T, Status> {
        tokio::select! {
            result = call => result,
            _ = self.ctx.cancel.cancelled() => Err(Status::cancelled("request cancelled")),
            _ = self.shutdown.cancelled() => Err(Status::cancelled("provider closed")),
        }
    }

    /// Fetch the provider's schema.
    #[instrument(skip(self), name = "provider.get_schema")]
    pub async fn get_schema(&self, version: i32) -> Result<Vec<u8>, ProviderError> {
        let resp = self
            .rpc(self.client()?.get_schema(rpc::GetSchemaRequest { version }))
            .await
            .map_err(rpc_error)?;
        Ok(resp.schema.into_bytes())
    }

    /// Validate the provider's own configuration.
    ///
    /// A provider that does not implement this gets its inputs back unchanged.
    #[instrument(skip_all, name = "provider.check_config", fields(urn = %urn))]
    pub async fn check_config(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
        allow_unknowns: bool,
    ) -> Result<CheckResult, ProviderError> {
        let label = format!("{}.CheckConfig({urn})", self.label());
        debug!(olds = olds.len(), news = news.len(), "{label} executing");

        let molds = marshal_properties(
            olds,
            &MarshalOptions::new(format!("{label}.olds")).keep_unknowns(allow_unknowns),
        )?;
        let mnews = marshal_properties(
            news,
            &MarshalOptions::new(format!("{label}.news")).keep_unknowns(allow_unknowns),
        )?;

        let request = rpc::CheckRequest {
            urn: urn.to_string(),
            olds: Some(molds),
            news: Some(mnews),
            random_seed: Vec::new(),
        };
        let resp = match self.rpc(self.client()?.check_config(request)).await {
            Ok(resp) => resp,
            Err(status) if self.is_unimplemented(urn, &status) => {
                debug!("{label} unimplemented rpc: returning news as is");
                return Ok(CheckResult::valid(news.clone()));
            }
            Err(status) => {
                debug!(code = ?status.code(), message = %status.message(), "{label} failed");
                return Err(rpc_error(status));
            }
        };

        let mut inputs = unmarshal_optional(
            resp.inputs.as_ref(),
            &MarshalOptions::new(format!("{label}.inputs"))
                .keep_unknowns(allow_unknowns)
                .reject_unknowns(!allow_unknowns)
                .keep_secrets(true)
                .keep_resources(true),
        )?;
        let failures = check_failures(resp.failures);
        annotate_secrets(&mut inputs, news);

        debug!(inputs = inputs.len(), failures = failures.len(), "{label} success");
        Ok(CheckResult {
            properties: inputs,
            failures,
        })
    }

    /// Compare two versions of the provider's own configuration.
    ///
    /// A provider that does not implement this reports an unknown change that
    /// does not require replacement.
    #[instrument(skip_all, name = "provider.diff_config", fields(urn = %urn))]
    pub async fn diff_config(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
        ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderError> {
        let label = format!("{}.DiffConfig({urn})", self.label());
        debug!(olds = olds.len(), news = news.len(), "{label} executing");

        let molds = marshal_properties(
            olds,
            &MarshalOptions::new(format!("{label}.olds")).keep_unknowns(true),
        )?;
        let mnews = marshal_properties(
            news,
            &MarshalOptions::new(format!("{label}.news")).keep_unknowns(true),
        )?;

        let request = rpc::DiffRequest {
            id: String::new(),
            urn: urn.to_string(),
            olds: Some(molds),
            news: Some(mnews),
            ignore_changes: ignore_changes.to_vec(),
        };
        match self.rpc(self.client()?.diff_config(request)).await {
            Ok(resp) => {
                let result = diff_result(resp);
                debug!(
                    changes = ?result.changes,
                    replaces = result.replace_keys.len(),
                    "{label} success"
                );
                Ok(result)
            }
            Err(status) if self.is_unimplemented(urn, &status) => {
                debug!("{label} unimplemented rpc: returning DiffUnknown with no replaces");
                Ok(DiffResult::default())
            }
            Err(status) => {
                warn!(code = ?status.code(), message = %status.message(), "{label} failed");
                Err(rpc_error(status))
            }
        }
    }

    /// Configure the provider.
    ///
    /// Returns once the call has been started; later calls wait for it to
    /// finish. If any input contains unknowns the plugin is not called and
    /// the provider is treated as unconfigured. Must be called from within a
    /// Tokio runtime. A caller's cancellation does not abort configuration;
    /// closing the handle does. Calling this again sends another `Configure`,
    /// but only the first outcome is kept.
    pub fn configure(&self, inputs: &PropertyMap) -> Result<(), ProviderError> {
        let label = format!("{}.Configure()", self.label());
        debug!(vars = inputs.len(), "{label} executing");

        let mut variables = HashMap::new();
        for (key, value) in inputs {
            if key == "version" {
                continue;
            }
            if value.contains_unknowns() {
                debug!(key = %key, "{label} configuration contains unknowns; skipping configure");
                self.config.fulfill(Ok(PluginConfig::unknown()));
                return Ok(());
            }

            let mapped = match remove_secrets(value) {
                serde_json::Value::String(s) => s,
                other => match serde_json::to_string(&other) {
                    Ok(s) => s,
                    Err(e) => {
                        return Err(self.fail_configure(ProviderError::marshal(
                            &label,
                            format!("marshaling configuration property '{key}': {e}"),
                        )))
                    }
                },
            };
            variables.insert(format!("{}:config:{key}", self.pkg), mapped);
        }

        let args = match marshal_properties(
            inputs,
            &MarshalOptions::new(format!("{label}.inputs"))
                .keep_unknowns(true)
                .keep_secrets(true)
                .keep_resources(true),
        ) {
            Ok(args) => args,
            Err(e) => return Err(self.fail_configure(e)),
        };

        let request = rpc::ConfigureRequest {
            variables,
            args: Some(args),
            accept_secrets: true,
            accept_resources: true,
        };
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return Err(self.fail_configure(e)),
        };
        let promise = Arc::clone(&self.config);
        let shutdown = self.shutdown.clone();
        let pkg = self.pkg.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                result = client.configure(request) => result,
                _ = shutdown.cancelled() => {
                    promise.fulfill(Err(ProviderError::Closed(pkg)));
                    return;
                }
            };
            let outcome = match result {
                Ok(resp) => {
                    debug!(
                        accept_secrets = resp.accept_secrets,
                        accept_resources = resp.accept_resources,
                        accept_outputs = resp.accept_outputs,
                        supports_preview = resp.supports_preview,
                        "{label} success"
                    );
                    Ok(PluginConfig {
                        known: true,
                        accept_secrets: resp.accept_secrets,
                        accept_resources: resp.accept_resources,
                        accept_outputs: resp.accept_outputs,
                        supports_preview: resp.supports_preview,
                    })
                }
                Err(status) => {
                    warn!(code = ?status.code(), message = %status.message(), "{label} failed");
                    Err(create_configure_error(status))
                }
            };
            promise.fulfill(outcome);
        });

        Ok(())
    }

    fn fail_configure(&self, err: ProviderError) -> ProviderError {
        let err = Arc::new(err);
        self.config.fulfill_shared(Err(Arc::clone(&err)));
        ProviderError::ConfigureFailed(err)
    }

    /// Validate a resource's inputs.
    #[instrument(skip_all, name = "provider.check", fields(urn = %urn))]
    pub async fn check(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
        allow_unknowns: bool,
        random_seed: &[u8],
    ) -> Result<CheckResult, ProviderError> {
        let label = format!("{}.Check({urn})", self.label());
        debug!(olds = olds.len(), news = news.len(), "{label} executing");

        let config = self.await_config().await?;
        if !config.known {
            return Ok(CheckResult::valid(news.clone()));
        }

        let opts = |suffix: &str| {
            MarshalOptions::new(format!("{label}.{suffix}"))
                .keep_unknowns(allow_unknowns)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources)
        };
        let request = rpc::CheckRequest {
            urn: urn.to_string(),
            olds: Some(marshal_properties(olds, &opts("olds"))?),
            news: Some(marshal_properties(news, &opts("news"))?),
            random_seed: random_seed.to_vec(),
        };
        let resp = self.rpc(self.client()?.check(request)).await.map_err(|status| {
            debug!(message = %status.message(), "{label} failed");
            rpc_error(status)
        })?;

        let mut inputs = unmarshal_optional(
            resp.inputs.as_ref(),
            &MarshalOptions::new(format!("{label}.inputs"))
                .keep_unknowns(allow_unknowns)
                .reject_unknowns(!allow_unknowns)
                .keep_secrets(true)
                .keep_resources(true),
        )?;
        if !config.accept_secrets {
            annotate_secrets(&mut inputs, news);
        }
        let failures = check_failures(resp.failures);

        debug!(inputs = inputs.len(), failures = failures.len(), "{label} success");
        Ok(CheckResult {
            properties: inputs,
            failures,
        })
    }

    /// Compare a resource's prior state with its new inputs.
    ///
    /// If the provider's configuration is unknown the result is
    /// [unavailable](DiffResult::is_unavailable) rather than an error.
    #[instrument(skip_all, name = "provider.diff", fields(urn = %urn, id = %id))]
    pub async fn diff(
        &self,
        urn: &Urn,
        id: &str,
        olds: &PropertyMap,
        news: &PropertyMap,
        allow_unknowns: bool,
        ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderError> {
        require(!urn.is_empty(), "Diff requires a URN")?;
        require(!id.is_empty(), "Diff requires an ID")?;

        let label = format!("{}.Diff({urn},{id})", self.label());
        debug!(olds = olds.len(), news = news.len(), "{label} executing");

        let config = self.await_config().await?;
        if !config.known {
            debug!("{label} cannot diff due to unknown config");
            return Ok(DiffResult::unavailable(DIFF_UNAVAILABLE_MESSAGE));
        }

        let molds = marshal_properties(
            olds,
            &MarshalOptions::new(format!("{label}.olds"))
                .elide_asset_contents(true)
                .keep_unknowns(allow_unknowns)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources),
        )?;
        let mnews = marshal_properties(
            news,
            &MarshalOptions::new(format!("{label}.news"))
                .keep_unknowns(allow_unknowns)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources),
        )?;

        let request = rpc::DiffRequest {
            id: id.to_string(),
            urn: urn.to_string(),
            olds: Some(molds),
            news: Some(mnews),
            ignore_changes: ignore_changes.to_vec(),
        };
        let resp = self.rpc(self.client()?.diff(request)).await.map_err(|status| {
            debug!(message = %status.message(), "{label} failed");
            rpc_error(status)
        })?;

        let result = diff_result(resp);
        debug!(
            changes = ?result.changes,
            replaces = result.replace_keys.len(),
            stables = result.stable_keys.len(),
            delete_before_replace = result.delete_before_replace,
            "{label} success"
        );
        Ok(result)
    }

    /// Create a resource.
    ///
    /// During a preview the provider may not be called at all: with unknown
    /// configuration the outputs are empty (or the inputs, under the legacy
    /// preview flag), and a provider without preview support gets its inputs
    /// echoed back. A partially created resource is reported as
    /// [`ProviderError::Init`] carrying its ID and live outputs.
    #[instrument(skip_all, name = "provider.create", fields(urn = %urn, preview = preview))]
    pub async fn create(
        &self,
        urn: &Urn,
        props: &PropertyMap,
        timeout: f64,
        preview: bool,
    ) -> Result<CreateResult, ProviderError> {
        require(!urn.is_empty(), "Create requires a URN")?;

        let label = format!("{}.Create({urn})", self.label());
        debug!(props = props.len(), "{label} executing");

        let config = self.await_config().await?;
        if let Some(outputs) = self.preview_fallback(&config, preview, props) {
            return Ok(CreateResult {
                id: String::new(),
                properties: outputs,
            });
        }
        require(
            config.known,
            "Create cannot be called if the configuration is unknown",
        )?;

        let mprops = marshal_properties(
            props,
            &MarshalOptions::new(format!("{label}.inputs"))
                .keep_unknowns(preview)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources),
        )?;

        let request = rpc::CreateRequest {
            urn: urn.to_string(),
            properties: Some(mprops),
            timeout,
            preview,
        };
        let (id, live_object, failure) = match self.rpc(self.client()?.create(request)).await {
            Ok(resp) => (resp.id, resp.properties, None),
            Err(status) => {
                let parsed = parse_error(status);
                debug!(error = %parsed.error, "{label} failed");
                if parsed.status != ResourceStatus::PartialFailure {
                    return Err(parsed.error);
                }
                (parsed.id, parsed.live_object, Some(parsed.error))
            }
        };

        if id.is_empty() && !preview {
            return Err(ProviderError::UnknownState(Status::unknown(format!(
                "plugin for package '{}' returned empty resource.ID from create '{urn}'",
                self.pkg
            ))));
        }

        let mut outs = unmarshal_optional(
            live_object.as_ref(),
            &output_options(format!("{label}.outputs"), preview),
        )?;
        if !config.accept_secrets {
            annotate_secrets(&mut outs, props);
        }

        if let Some(err) = failure {
            return Err(with_live_state(err, id, outs, None));
        }
        debug!(id = %id, outs = outs.len(), "{label} success");
        Ok(CreateResult {
            id,
            properties: outs,
        })
    }

    /// Read the live state of a resource.
    ///
    /// An empty ID in the result means the resource no longer exists.
    #[instrument(skip_all, name = "provider.read", fields(urn = %urn, id = %id))]
    pub async fn read(
        &self,
        urn: &Urn,
        id: &str,
        inputs: Option<&PropertyMap>,
        state: &PropertyMap,
    ) -> Result<ReadResult, ProviderError> {
        require(!urn.is_empty(), "Read URN was empty")?;
        require(!id.is_empty(), "Read ID was empty")?;

        let label = format!("{}.Read({id},{urn})", self.label());
        debug!(
            inputs = inputs.map_or(0, |i| i.len()),
            state = state.len(),
            "{label} executing"
        );

        let config = self.await_config().await?;
        if !config.known {
            return Ok(ReadResult {
                id: id.to_string(),
                status: ResourceStatus::Unknown,
                ..Default::default()
            });
        }

        let opts = MarshalOptions::new(label.clone())
            .elide_asset_contents(true)
            .keep_secrets(config.accept_secrets)
            .keep_resources(config.accept_resources);
        let minputs = inputs
            .map(|inputs| marshal_properties(inputs, &opts))
            .transpose()?;
        let mstate = marshal_properties(state, &opts)?;

        let request = rpc::ReadRequest {
            id: id.to_string(),
            urn: urn.to_string(),
            properties: Some(mstate),
            inputs: minputs,
        };
        let (read_id, live_object, live_inputs, failure) =
            match self.rpc(self.client()?.read(request)).await {
                Ok(resp) => (resp.id, resp.properties, resp.inputs, None),
                Err(status) => {
                    let parsed = parse_error(status);
                    debug!(error = %parsed.error, "{label} failed");
                    if parsed.status != ResourceStatus::PartialFailure {
                        return Err(parsed.error);
                    }
                    (
                        parsed.id,
                        parsed.live_object,
                        parsed.live_inputs,
                        Some(parsed.error),
                    )
                }
            };

        if read_id.is_empty() {
            if let Some(err) = failure {
                return Err(err);
            }
            debug!("{label} resource is gone");
            return Ok(ReadResult::default());
        }

        let outputs_options = output_options(format!("{label}.outputs"), false);
        let mut new_state = unmarshal_optional(live_object.as_ref(), &outputs_options)?;
        let mut new_inputs = match &live_inputs {
            Some(live) => Some(unmarshal_properties(
                live,
                &output_options(format!("{label}.inputs"), false),
            )?),
            None => None,
        };

        if !config.accept_secrets {
            if let (Some(new_inputs), Some(inputs)) = (new_inputs.as_mut(), inputs) {
                annotate_secrets(new_inputs, inputs);
            }
            annotate_secrets(&mut new_state, state);
        }

        if let Some(err) = failure {
            return Err(with_live_state(err, read_id, new_state, new_inputs));
        }
        debug!(
            outs = new_state.len(),
            inputs = new_inputs.as_ref().map_or(0, |i| i.len()),
            "{label} success"
        );
        Ok(ReadResult {
            id: read_id,
            outputs: new_state,
            inputs: new_inputs.unwrap_or_default(),
            status: ResourceStatus::Ok,
        })
    }

    /// Update a resource.
    ///
    /// Preview fallbacks mirror [`create`](Self::create).
    #[instrument(
        skip_all,
        name = "provider.update",
        fields(urn = %urn, id = %id, preview = preview)
    )]
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        urn: &Urn,
        id: &str,
        olds: &PropertyMap,
        news: &PropertyMap,
        timeout: f64,
        ignore_changes: &[String],
        preview: bool,
    ) -> Result<PropertyMap, ProviderError> {
        require(!urn.is_empty(), "Update requires a URN")?;
        require(!id.is_empty(), "Update requires an ID")?;

        let label = format!("{}.Update({id},{urn})", self.label());
        debug!(olds = olds.len(), news = news.len(), "{label} executing");

        let config = self.await_config().await?;
        if let Some(outputs) = self.preview_fallback(&config, preview, news) {
            return Ok(outputs);
        }
        require(
            config.known,
            "Update cannot be called if the configuration is unknown",
        )?;

        let molds = marshal_properties(
            olds,
            &MarshalOptions::new(format!("{label}.olds"))
                .elide_asset_contents(true)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources),
        )?;
        let mnews = marshal_properties(
            news,
            &MarshalOptions::new(format!("{label}.news"))
                .keep_unknowns(preview)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources),
        )?;

        let request = rpc::UpdateRequest {
            id: id.to_string(),
            urn: urn.to_string(),
            olds: Some(molds),
            news: Some(mnews),
            timeout,
            ignore_changes: ignore_changes.to_vec(),
            preview,
        };
        let (live_object, failure) = match self.rpc(self.client()?.update(request)).await {
            Ok(resp) => (resp.properties, None),
            Err(status) => {
                let parsed = parse_error(status);
                debug!(error = %parsed.error, "{label} failed");
                if parsed.status != ResourceStatus::PartialFailure {
                    return Err(parsed.error);
                }
                (parsed.live_object, Some(parsed.error))
            }
        };

        let mut outs = unmarshal_optional(
            live_object.as_ref(),
            &output_options(format!("{label}.outputs"), preview),
        )?;
        if !config.accept_secrets {
            annotate_secrets(&mut outs, news);
        }

        if let Some(err) = failure {
            return Err(with_live_state(err, id.to_string(), outs, None));
        }
        debug!(outs = outs.len(), "{label} success");
        Ok(outs)
    }

    /// Delete a resource.
    ///
    /// The error's [`resource_status`](ProviderError::resource_status) says
    /// whether the resource may still exist.
    #[instrument(skip_all, name = "provider.delete", fields(urn = %urn, id = %id))]
    pub async fn delete(
        &self,
        urn: &Urn,
        id: &str,
        props: &PropertyMap,
        timeout: f64,
    ) -> Result<(), ProviderError> {
        require(!urn.is_empty(), "Delete requires a URN")?;
        require(!id.is_empty(), "Delete requires an ID")?;

        let label = format!("{}.Delete({urn},{id})", self.label());
        debug!(props = props.len(), "{label} executing");

        let config = self.await_config().await?;
        require(
            config.known,
            "Delete cannot be called if the configuration is unknown",
        )?;

        let mprops = marshal_properties(
            props,
            &MarshalOptions::new(label.clone())
                .elide_asset_contents(true)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources),
        )?;

        let request = rpc::DeleteRequest {
            id: id.to_string(),
            urn: urn.to_string(),
            properties: Some(mprops),
            timeout,
        };
        if let Err(status) = self.rpc(self.client()?.delete(request)).await {
            let (resource_status, err) = resource_state_and_error(status);
            debug!(status = ?resource_status, error = %err, "{label} failed");
            return Err(err);
        }

        debug!("{label} success");
        Ok(())
    }

    /// Construct a component resource.
    #[instrument(skip_all, name = "provider.construct", fields(typ = %typ, name = %name))]
    pub async fn construct(
        &self,
        info: &ConstructInfo,
        typ: &str,
        name: &str,
        parent: Option<&Urn>,
        inputs: &PropertyMap,
        options: &ConstructOptions,
    ) -> Result<ConstructResult, ProviderError> {
        require(!typ.is_empty(), "Construct requires a type")?;
        require(!name.is_empty(), "Construct requires a name")?;

        let parent = parent.map(Urn::to_string).unwrap_or_default();
        let label = format!("{}.Construct({typ}, {name}, {parent})", self.label());
        debug!(inputs = inputs.len(), "{label} executing");

        let config = self.await_config().await?;
        if !config.known {
            debug!("{label} skipped due to unknown config");
            return Ok(ConstructResult::default());
        }
        if !config.accept_secrets {
            return Err(ProviderError::Protocol(
                "plugins that can construct components must support secrets".to_string(),
            ));
        }

        let minputs = marshal_properties(
            inputs,
            &MarshalOptions::new(format!("{label}.inputs"))
                .keep_unknowns(true)
                .keep_secrets(config.accept_secrets)
                .keep_resources(config.accept_resources)
                .keep_output_values(config.accept_outputs),
        )?;

        let request = rpc::ConstructRequest {
            project: info.project.clone(),
            stack: info.stack.clone(),
            config: info.config.clone().into_iter().collect(),
            dry_run: info.dry_run,
            parallel: info.parallel,
            monitor_endpoint: info.monitor_address.clone(),
            r#type: typ.to_string(),
            name: name.to_string(),
            parent,
            inputs: Some(minputs),
            input_dependencies: options
                .property_dependencies
                .iter()
                .map(|(k, deps)| {
                    let urns = deps.iter().map(Urn::to_string).collect();
                    (k.clone(), rpc::construct_request::PropertyDependencies { urns })
                })
                .collect(),
            protect: options.protect,
            providers: options.providers.clone().into_iter().collect(),
            aliases: options.aliases.iter().map(Urn::to_string).collect(),
            dependencies: options.dependencies.iter().map(Urn::to_string).collect(),
            config_secret_keys: info.config_secret_keys.clone(),
            additional_secret_outputs: options.additional_secret_outputs.clone(),
            custom_timeouts: options.custom_timeouts.as_ref().map(|ct| {
                rpc::construct_request::CustomTimeouts {
                    create: ct.create.clone(),
                    update: ct.update.clone(),
                    delete: ct.delete.clone(),
                }
            }),
            deleted_with: options
                .deleted_with
                .as_ref()
                .map(Urn::to_string)
                .unwrap_or_default(),
            delete_before_replace: options.delete_before_replace,
            ignore_changes: options.ignore_changes.clone(),
            replace_on_changes: options.replace_on_changes.clone(),
            retain_on_delete: options.retain_on_delete,
        };

        let resp = self
            .rpc(self.client()?.construct(request))
            .await
            .map_err(rpc_error)?;

        let outputs = unmarshal_optional(
            resp.state.as_ref(),
            &MarshalOptions::new(format!("{label}.outputs"))
                .keep_unknowns(info.dry_run)
                .keep_secrets(true)
                .keep_resources(true),
        )?;
        let output_dependencies = dependency_map(
            resp.state_dependencies
                .into_iter()
                .map(|(k, deps)| (k, deps.urns)),
        );

        debug!(outputs = outputs.len(), "{label} success");
        Ok(ConstructResult {
            urn: Urn::new(resp.urn),
            outputs,
            output_dependencies,
        })
    }

    /// Invoke a provider function.
    #[instrument(skip_all, name = "provider.invoke", fields(tok = %tok))]
    pub async fn invoke(
        &self,
        tok: &str,
        args: &PropertyMap,
    ) -> Result<CheckResult, ProviderError> {
        require(!tok.is_empty(), "Invoke requires a token")?;

        let label = format!("{}.Invoke({tok})", self.label());
        debug!(args = args.len(), "{label} executing");

        let config = self.await_config().await?;
        if !config.known {
            return Ok(CheckResult::default());
        }

        let margs = marshal_properties(args, &invoke_args_options(&label, &config))?;
        let request = rpc::InvokeRequest {
            tok: tok.to_string(),
            args: Some(margs),
        };
        let resp = self.rpc(self.client()?.invoke(request)).await.map_err(|status| {
            debug!(message = %status.message(), "{label} failed");
            rpc_error(status)
        })?;

        let ret = unmarshal_optional(
            resp.r#return.as_ref(),
            &output_options(format!("{label}.returns"), false),
        )?;
        let failures = check_failures(resp.failures);

        debug!(ret = ret.len(), failures = failures.len(), "{label} success");
        Ok(CheckResult {
            properties: ret,
            failures,
        })
    }

    /// Invoke a streaming provider function, handing each result to `on_next`.
    ///
    /// Stops at the first message that carries failures and returns them.
    #[instrument(skip_all, name = "provider.stream_invoke", fields(tok = %tok))]
    pub async fn stream_invoke<F>(
        &self,
        tok: &str,
        args: &PropertyMap,
        mut on_next: F,
    ) -> Result<Vec<CheckFailure>, ProviderError>
    where
        F: FnMut(PropertyMap) -> Result<(), ProviderError> + Send,
    {
        require(!tok.is_empty(), "StreamInvoke requires a token")?;

        let label = format!("{}.StreamInvoke({tok})", self.label());
        debug!(args = args.len(), "{label} executing");

        let config = self.await_config().await?;
        if !config.known {
            on_next(PropertyMap::new())?;
            return Ok(Vec::new());
        }

        let margs = marshal_properties(args, &invoke_args_options(&label, &config))?;
        let request = rpc::InvokeRequest {
            tok: tok.to_string(),
            args: Some(margs),
        };
        let mut stream = self
            .rpc(self.client()?.stream_invoke(request))
            .await
            .map_err(|status| {
                debug!(message = %status.message(), "{label} failed");
                rpc_error(status)
            })?;

        let returns = output_options(format!("{label}.returns"), false);
        loop {
            let next = self.rpc(async { Ok(stream.next().await) }).await;
            let item = match next.map_err(rpc_error)? {
                Some(item) => item.map_err(rpc_error)?,
                None => return Ok(Vec::new()),
            };

            let ret = unmarshal_optional(item.r#return.as_ref(), &returns)?;
            let failures = check_failures(item.failures);
            if !failures.is_empty() {
                debug!(failures = failures.len(), "{label} returned failures");
                return Ok(failures);
            }
            on_next(ret)?;
        }
    }

    /// Call a method on a component resource.
    #[instrument(skip_all, name = "provider.call", fields(tok = %tok))]
    pub async fn call(
        &self,
        tok: &str,
        args: &PropertyMap,
        info: &CallInfo,
        options: &CallOptions,
    ) -> Result<CallResult, ProviderError> {
        require(!tok.is_empty(), "Call requires a token")?;

        let label = format!("{}.Call({tok})", self.label());
        debug!(args = args.len(), "{label} executing");

        let config = self.await_config().await?;
        if !config.known {
            return Ok(CallResult::default());
        }

        let margs = marshal_properties(
            args,
            &MarshalOptions::new(format!("{label}.args"))
                .keep_unknowns(true)
                .keep_secrets(true)
                .keep_resources(true)
                .keep_output_values(config.accept_outputs),
        )?;

        let request = rpc::CallRequest {
            tok: tok.to_string(),
            args: Some(margs),
            arg_dependencies: options
                .arg_dependencies
                .iter()
                .map(|(k, deps)| {
                    let urns = deps.iter().map(Urn::to_string).collect();
                    (k.clone(), rpc::call_request::ArgumentDependencies { urns })
                })
                .collect(),
            project: info.project.clone(),
            stack: info.stack.clone(),
            config: info.config.clone().into_iter().collect(),
            config_secret_keys: info.config_secret_keys.clone(),
            dry_run: info.dry_run,
            parallel: info.parallel,
            monitor_endpoint: info.monitor_address.clone(),
        };
        let resp = self.rpc(self.client()?.call(request)).await.map_err(|status| {
            debug!(message = %status.message(), "{label} failed");
            rpc_error(status)
        })?;

        let returns = unmarshal_optional(
            resp.r#return.as_ref(),
            &MarshalOptions::new(format!("{label}.returns"))
                .keep_unknowns(info.dry_run)
                .keep_secrets(true)
                .keep_resources(true),
        )?;
        let return_dependencies = dependency_map(
            resp.return_dependencies
                .into_iter()
                .map(|(k, deps)| (k, deps.urns)),
        );
        let failures = check_failures(resp.failures);

        debug!(returns = returns.len(), failures = failures.len(), "{label} success");
        Ok(CallResult {
            returns,
            return_dependencies,
            failures,
        })
    }

    /// Ask the plugin for its name and version.
    #[instrument(skip_all, name = "provider.get_plugin_info", fields(pkg = %self.pkg))]
    pub async fn get_plugin_info(&self) -> Result<PluginInfo, ProviderError> {
        let label = format!("{}.GetPluginInfo()", self.label());
        debug!("{label} executing");

        let resp = self
            .rpc(self.client()?.get_plugin_info())
            .await
            .map_err(|status| {
                debug!(message = %status.message(), "{label} failed");
                rpc_error(status)
            })?;

        let version = if resp.version.is_empty() {
            None
        } else {
            Some(parse_version_tolerant(&resp.version)?)
        };

        debug!(version = ?version, "{label} success");
        Ok(PluginInfo {
            name: self.pkg.clone(),
            path: self.plugin.as_ref().and_then(|p| p.bin()).map(Path::to_path_buf),
            version,
        })
    }

    /// Tell an attached plugin where the engine's host server listens.
    #[instrument(skip_all, name = "provider.attach", fields(pkg = %self.pkg, address = %address))]
    pub async fn attach(&self, address: &str) -> Result<(), ProviderError> {
        let label = format!("{}.Attach()", self.label());
        debug!("{label} executing");
        let request = rpc::PluginAttach {
            address: address.to_string(),
        };
        self.rpc(self.client()?.attach(request)).await.map_err(|status| {
            debug!(message = %status.message(), "{label} failed");
            rpc_error(status)
        })
    }

    /// Ask the plugin to abandon in-flight work.
    ///
    /// A plugin that does not implement cancellation is not an error.
    #[instrument(skip_all, name = "provider.signal_cancellation", fields(pkg = %self.pkg))]
    pub async fn signal_cancellation(&self) -> Result<(), ProviderError> {
        match self.client()?.cancel().await {
            Ok(()) => Ok(()),
            Err(status) if status.code() == tonic::Code::Unimplemented => Ok(()),
            Err(status) => {
                debug!(code = ?status.code(), message = %status.message(), "cancel failed");
                Err(rpc_error(status))
            }
        }
    }

    /// Fetch a conversion mapping. A plugin without mappings returns an empty one.
    #[instrument(skip_all, name = "provider.get_mapping", fields(pkg = %self.pkg, key = %key))]
    pub async fn get_mapping(&self, key: &str) -> Result<Mapping, ProviderError> {
        let label = format!("{}.GetMapping", self.label());
        debug!(key = %key, "{label} executing");

        let request = rpc::GetMappingRequest {
            key: key.to_string(),
        };
        match self.rpc(self.client()?.get_mapping(request)).await {
            Ok(resp) => {
                debug!(data = resp.data.len(), provider = %resp.provider, "{label} success");
                Ok(Mapping {
                    data: resp.data,
                    provider: resp.provider,
                })
            }
            Err(status) if status.code() == tonic::Code::Unimplemented => {
                debug!("{label} unimplemented");
                Ok(Mapping::default())
            }
            Err(status) => {
                debug!(message = %status.message(), "{label} failed");
                Err(rpc_error(status))
            }
        }
    }

    /// Shut the plugin down.
    ///
    /// The connection is dropped and in-flight calls are abandoned. Later calls
    /// on this handle fail with [`ProviderError::Closed`]. A spawned plugin
    /// process is killed; an attached one is left running.
    #[instrument(skip_all, name = "provider.close", fields(pkg = %self.pkg))]
    pub async fn close(&self) -> Result<(), ProviderError> {
        self.shutdown.cancel();
        if let Ok(mut client) = self.client.write() {
            client.take();
        }
        match &self.plugin {
            Some(plugin) => {
                info!(pkg = %self.pkg, "closing provider plugin");
                plugin.kill().await
            }
            None => Ok(()),
        }
    }

    fn preview_fallback(
        &self,
        config: &PluginConfig,
        preview: bool,
        inputs: &PropertyMap,
    ) -> Option<PropertyMap> {
        if !preview {
            return None;
        }
        if !config.known {
            return Some(if self.options.legacy_preview {
                inputs.clone()
            } else {
                PropertyMap::new()
            });
        }
        if !config.supports_preview || self.options.disable_provider_preview {
            return Some(inputs.clone());
        }
        None
    }
}

fn require(condition: bool, message: &str) -> Result<(), ProviderError> {
    if condition {
        Ok(())
    } else {
        Err(ProviderError::Assertion(message.to_string()))
    }
}

fn rpc_error(status: Status) -> ProviderError {
    if status.code() == tonic::Code::Unimplemented {
        return ProviderError::Unimplemented(status.message().to_string());
    }
    ProviderError::Rpc(status)
}

fn output_options(label: String, preview: bool) -> MarshalOptions {
    MarshalOptions::new(label)
        .reject_unknowns(!preview)
        .keep_unknowns(preview)
        .keep_secrets(true)
        .keep_resources(true)
}

fn invoke_args_options(label: &str, config: &PluginConfig) -> MarshalOptions {
    MarshalOptions::new(format!("{label}.args"))
        .keep_secrets(config.accept_secrets)
        .keep_resources(config.accept_resources)
}

fn check_failures(failures: Vec<rpc::CheckFailure>) -> Vec<CheckFailure> {
    failures.into_iter().map(CheckFailure::from).collect()
}

fn dependency_map(
    deps: impl Iterator<Item = (String, Vec<String>)>,
) -> BTreeMap<String, Vec<Urn>> {
    deps.map(|(k, urns)| (k, urns.into_iter().map(Urn::new).collect()))
        .collect()
}

fn diff_result(resp: rpc::DiffResponse) -> DiffResult {
    let changes = rpc::diff_response::DiffChanges::try_from(resp.changes)
        .map(DiffChanges::from)
        .unwrap_or_default();
    let detailed_diff = resp.has_detailed_diff.then(|| {
        resp.detailed_diff
            .into_iter()
            .map(|(k, v)| {
                (
                    k,
                    PropertyDiff {
                        kind: DiffKind::from_wire(v.kind),
                        input_diff: v.input_diff,
                    },
                )
            })
            .collect()
    });
    DiffResult {
        changes,
        replace_keys: resp.replaces,
        stable_keys: resp.stables,
        changed_keys: resp.diffs,
        detailed_diff,
        delete_before_replace: resp.delete_before_replace,
        unavailable: None,
    }
}

fn with_live_state(
    err: ProviderError,
    id: String,
    outputs: PropertyMap,
    inputs: Option<PropertyMap>,
) -> ProviderError {
    match err {
        ProviderError::Init(mut init) => {
            init.id = id;
            init.outputs = outputs;
            init.inputs = inputs;
            ProviderError::Init(init)
        }
        other => other,
    }
}

fn spawn_env(options: &ProviderOptions) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = options
        .runtime_options
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (format!("PULUMI_RUNTIME_{}", k.to_uppercase()), value)
        })
        .collect();
    if let Some(config) = options.json_config.as_ref().filter(|c| !c.is_empty()) {
        env.push(("PULUMI_CONFIG".to_string(), config.clone()));
    }
    env
}

/// Parse a version, allowing a `v` prefix and missing minor or patch numbers.
fn parse_version_tolerant(version: &str) -> Result<semver::Version, ProviderError> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => trimmed.to_string(),
    };
    Ok(semver::Version::parse(&padded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::Notify;

    use crate::error::InitError;
    use crate::property::{property_map, PropertyValue};
    use crate::rpc::configure_error_missing_keys::MissingKey;
    use crate::status::{init_failed_status, missing_keys_status};
    use crate::testing::{accepting_configure_response, MockProvider};

    fn bucket_urn() -> Urn {
        Urn::new("urn:pulumi:dev::proj::aws:s3/bucket:Bucket::b")
    }

    fn provider_with(mock: MockProvider, options: ProviderOptions) -> Provider {
        Provider::with_client(PluginContext::default(), "aws", mock, options)
    }

    fn configured(mock: MockProvider) -> Provider {
        let provider = provider_with(mock, ProviderOptions::default());
        provider.configure(&PropertyMap::new()).unwrap();
        provider
    }

    fn unknown_config(mock: MockProvider, options: ProviderOptions) -> Provider {
        let provider = provider_with(mock, options);
        let inputs = property_map([("region", PropertyValue::computed())]);
        provider.configure(&inputs).unwrap();
        provider
    }

    fn no_secrets() -> MockProvider {
        MockProvider::new().on_configure(|_| {
            Ok(rpc::ConfigureResponse {
                accept_secrets: false,
                ..accepting_configure_response()
            })
        })
    }

    fn wire(props: &PropertyMap) -> prost_types::Struct {
        let opts = MarshalOptions::new("test").keep_secrets(true).keep_resources(true);
        marshal_properties(props, &opts).unwrap()
    }

    #[tokio::test]
    async fn test_configure_variables() {
        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let mock = MockProvider::new().on_configure(move |req| {
            *captured.lock().unwrap() = Some(req);
            Ok(accepting_configure_response())
        });
        let provider = provider_with(mock, ProviderOptions::default());

        let inputs = property_map([
            ("region", PropertyValue::from("us-west-2")),
            ("version", PropertyValue::from("5.0.0")),
            ("token", PropertyValue::secret("s3cr3t".into())),
            ("retries", PropertyValue::Number(3.0)),
        ]);
        provider.configure(&inputs).unwrap();
        provider.await_config().await.unwrap();

        let req = seen.lock().unwrap().take().unwrap();
        assert_eq!(req.variables["aws:config:region"], "us-west-2");
        assert_eq!(req.variables["aws:config:token"], "s3cr3t");
        assert_eq!(req.variables["aws:config:retries"], "3");
        assert!(!req.variables.contains_key("aws:config:version"));
        assert!(req.accept_secrets && req.accept_resources);

        let args = req.args.unwrap();
        let opts = MarshalOptions::new("args").keep_secrets(true);
        let args = unmarshal_properties(&args, &opts).unwrap();
        assert!(args["token"].is_secret());
    }

    #[tokio::test]
    async fn test_configure_keeps_first_outcome() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mock = MockProvider::new().on_configure(move |_| {
            let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
            Ok(rpc::ConfigureResponse {
                supports_preview: first,
                ..accepting_configure_response()
            })
        });
        let provider = provider_with(mock.clone(), ProviderOptions::default());
        provider.configure(&PropertyMap::new()).unwrap();
        provider.configure(&PropertyMap::new()).unwrap();
        provider.await_config().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(mock.call_count("Configure"), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        let config = provider.await_config().await.unwrap();
        assert!(config.known);
        assert!(config.supports_preview);
    }

    #[tokio::test]
    async fn test_configure_missing_keys() {
        let mock = MockProvider::new().on_configure(|_| {
            Err(missing_keys_status(
                "missing",
                &rpc::ConfigureErrorMissingKeys {
                    missing_keys: vec![MissingKey {
                        name: "aws:region".to_string(),
                        description: "The region".to_string(),
                    }],
                },
            ))
        });
        let provider = configured(mock);

        let err = provider
            .check(&bucket_urn(), &PropertyMap::new(), &PropertyMap::new(), false, &[])
            .await
            .unwrap_err();
        match err {
            ProviderError::ConfigureFailed(inner) => {
                assert!(inner.to_string().contains("pulumi config set aws:region"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_calls_wait_for_configure() {
        let gate = Arc::new(Notify::new());
        let mock = MockProvider::new()
            .with_configure_gate(Arc::clone(&gate))
            .on_check(|req| {
                Ok(rpc::CheckResponse {
                    inputs: req.news,
                    failures: vec![],
                })
            });
        let provider = Arc::new(configured(mock.clone()));

        let news = property_map([("name", PropertyValue::from("b"))]);
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let provider = Arc::clone(&provider);
                let news = news.clone();
                tokio::spawn(async move {
                    provider
                        .check(&bucket_urn(), &PropertyMap::new(), &news, false, &[])
                        .await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(mock.call_count("Check"), 0);
        gate.notify_one();

        for task in tasks {
            let result = task.await.unwrap().unwrap();
            assert_eq!(result.properties, news);
        }
        assert_eq!(mock.call_count("Configure"), 1);
        assert_eq!(mock.call_count("Check"), 4);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_configure() {
        let gate = Arc::new(Notify::new());
        let mock = MockProvider::new().with_configure_gate(Arc::clone(&gate));
        let ctx = PluginContext::default();
        let cancel = ctx.cancel.clone();
        let provider = Provider::with_client(ctx, "aws", mock, ProviderOptions::default());
        provider.configure(&PropertyMap::new()).unwrap();

        cancel.cancel();
        let err = provider
            .check(&bucket_urn(), &PropertyMap::new(), &PropertyMap::new(), false, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));

        // Configuration still completes for later waiters.
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let config = provider.config.wait(&CancellationToken::new()).await.unwrap();
        assert!(config.known);
    }

    #[tokio::test]
    async fn test_check_with_unknown_config_echoes_news() {
        let mock = MockProvider::new();
        let provider = unknown_config(mock.clone(), ProviderOptions::default());
        let news = property_map([("name", PropertyValue::from("b"))]);

        let result = provider
            .check(&bucket_urn(), &PropertyMap::new(), &news, true, &[])
            .await
            .unwrap();
        assert_eq!(result.properties, news);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_check_annotates_secrets() {
        let mock = no_secrets().on_check(|req| {
            Ok(rpc::CheckResponse {
                inputs: req.news,
                failures: vec![rpc::CheckFailure {
                    property: "size".to_string(),
                    reason: "too big".to_string(),
                }],
            })
        });
        let provider = configured(mock);
        let news = property_map([("password", PropertyValue::secret("hunter2".into()))]);

        let result = provider
            .check(&bucket_urn(), &PropertyMap::new(), &news, false, &[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(result.properties, news);
        assert_eq!(result.failures, vec![CheckFailure::new("size", "too big")]);
    }

    #[tokio::test]
    async fn test_check_config_unimplemented_echoes_news() {
        let provider = configured(MockProvider::new());
        let news = property_map([("region", PropertyValue::from("us-east-1"))]);
        let result = provider
            .check_config(&bucket_urn(), &PropertyMap::new(), &news, false)
            .await
            .unwrap();
        assert_eq!(result.properties, news);
        assert!(result.failures.is_empty());
    }

    #[tokio::test]
    async fn test_check_config_legacy_kubernetes() {
        let mock = MockProvider::new().on_check_config(|_| {
            Err(Status::unknown("rpc error: code = Unimplemented desc = CheckConfig"))
        });
        let provider = configured(mock);
        let urn = Urn::new("urn:pulumi:dev::proj::pulumi:providers:kubernetes::default");
        let news = property_map([("kubeconfig", PropertyValue::from("~/.kube/config"))]);

        let result = provider
            .check_config(&urn, &PropertyMap::new(), &news, false)
            .await
            .unwrap();
        assert_eq!(result.properties, news);

        let other = Urn::new("urn:pulumi:dev::proj::pulumi:providers:aws::default");
        let err = provider
            .check_config(&other, &PropertyMap::new(), &news, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rpc(_)));
    }

    #[tokio::test]
    async fn test_check_config_annotates_secrets() {
        let mock = MockProvider::new().on_check_config(|req| {
            let opts = MarshalOptions::new("plain");
            let news = unmarshal_optional(req.news.as_ref(), &opts).unwrap();
            Ok(rpc::CheckResponse {
                inputs: Some(marshal_properties(&news, &opts).unwrap()),
                failures: vec![],
            })
        });
        let provider = configured(mock);
        let news = property_map([("token", PropertyValue::secret("t".into()))]);
        let result = provider
            .check_config(&bucket_urn(), &PropertyMap::new(), &news, false)
            .await
            .unwrap();
        assert!(result.properties["token"].is_secret());
    }

    #[tokio::test]
    async fn test_diff_config_unimplemented() {
        let provider = configured(MockProvider::new());
        let result = provider
            .diff_config(&bucket_urn(), &PropertyMap::new(), &PropertyMap::new(), &[])
            .await
            .unwrap();
        assert_eq!(result.changes, DiffChanges::Unknown);
        assert!(result.replace_keys.is_empty());
        assert!(!result.replace());
    }

    #[tokio::test]
    async fn test_diff_config_propagates_errors() {
        let mock = MockProvider::new()
            .on_diff_config(|_| Err(Status::permission_denied("denied")));
        let provider = configured(mock);
        let err = provider
            .diff_config(&bucket_urn(), &PropertyMap::new(), &PropertyMap::new(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rpc(s) if s.code() == tonic::Code::PermissionDenied));
    }

    #[tokio::test]
    async fn test_diff_with_unknown_config_is_unavailable() {
        let mock = MockProvider::new();
        let provider = unknown_config(mock.clone(), ProviderOptions::default());
        let result = provider
            .diff(&bucket_urn(), "b-1", &PropertyMap::new(), &PropertyMap::new(), true, &[])
            .await
            .unwrap();
        assert!(result.is_unavailable());
        assert!(result
            .unavailable
            .unwrap()
            .contains("not known during preview"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_diff_decodes_detailed_diff() {
        let mock = MockProvider::new().on_diff(|req| {
            assert_eq!(req.ignore_changes, vec!["tags".to_string()]);
            let mut detailed = HashMap::new();
            detailed.insert(
                "name".to_string(),
                rpc::PropertyDiff {
                    kind: 5,
                    input_diff: true,
                },
            );
            detailed.insert(
                "size".to_string(),
                rpc::PropertyDiff {
                    kind: 99,
                    input_diff: false,
                },
            );
            Ok(rpc::DiffResponse {
                replaces: vec!["name".to_string()],
                stables: vec![],
                delete_before_replace: true,
                changes: 2,
                diffs: vec!["name".to_string(), "size".to_string()],
                detailed_diff: detailed,
                has_detailed_diff: true,
            })
        });
        let provider = configured(mock);

        let result = provider
            .diff(
                &bucket_urn(),
                "b-1",
                &PropertyMap::new(),
                &PropertyMap::new(),
                false,
                &["tags".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(result.changes, DiffChanges::Some);
        assert!(result.delete_before_replace);
        let detailed = result.detailed_diff.unwrap();
        assert_eq!(detailed["name"].kind, DiffKind::UpdateReplace);
        assert_eq!(detailed["size"].kind, DiffKind::Update);
    }

    #[tokio::test]
    async fn test_diff_requires_id() {
        let provider = configured(MockProvider::new());
        let err = provider
            .diff(&bucket_urn(), "", &PropertyMap::new(), &PropertyMap::new(), false, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Assertion(_)));
    }

    #[tokio::test]
    async fn test_create_preview_with_unknown_config() {
        let mock = MockProvider::new();
        let props = property_map([("name", PropertyValue::from("b"))]);

        let provider = unknown_config(mock.clone(), ProviderOptions::default());
        let result = provider.create(&bucket_urn(), &props, 0.0, true).await.unwrap();
        assert!(result.id.is_empty());
        assert!(result.properties.is_empty());

        let legacy = unknown_config(
            mock.clone(),
            ProviderOptions::default().with_legacy_preview(true),
        );
        let result = legacy.create(&bucket_urn(), &props, 0.0, true).await.unwrap();
        assert_eq!(result.properties, props);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_preview_without_provider_support() {
        let mock = MockProvider::new().on_configure(|_| {
            Ok(rpc::ConfigureResponse {
                supports_preview: false,
                ..accepting_configure_response()
            })
        });
        let provider = configured(mock.clone());
        let props = property_map([("name", PropertyValue::from("b"))]);

        let result = provider.create(&bucket_urn(), &props, 0.0, true).await.unwrap();
        assert_eq!(result.properties, props);
        assert_eq!(mock.call_count("Create"), 0);

        let disabled = provider_with(
            MockProvider::new(),
            ProviderOptions::default().with_disable_provider_preview(true),
        );
        disabled.configure(&PropertyMap::new()).unwrap();
        let result = disabled.create(&bucket_urn(), &props, 0.0, true).await.unwrap();
        assert_eq!(result.properties, props);
    }

    #[tokio::test]
    async fn test_create_preview_keeps_unknowns() {
        let mock = MockProvider::new().on_create(|req| {
            assert!(req.preview);
            Ok(rpc::CreateResponse {
                id: String::new(),
                properties: req.properties,
            })
        });
        let provider = configured(mock);
        let props = property_map([("arn", PropertyValue::computed())]);

        let result = provider.create(&bucket_urn(), &props, 0.0, true).await.unwrap();
        assert!(result.properties["arn"].is_computed());
    }

    #[tokio::test]
    async fn test_create_success_keeps_secrets() {
        let mock = MockProvider::new().on_create(|req| {
            assert_eq!(req.timeout, 60.0);
            Ok(rpc::CreateResponse {
                id: "b-123".to_string(),
                properties: req.properties,
            })
        });
        let provider = configured(mock);
        let props = property_map([
            ("name", PropertyValue::from("b")),
            ("password", PropertyValue::secret("hunter2".into())),
        ]);

        let result = provider.create(&bucket_urn(), &props, 60.0, false).await.unwrap();
        assert_eq!(result.id, "b-123");
        assert_eq!(result.properties, props);
    }

    #[tokio::test]
    async fn test_create_annotates_secrets_for_plain_providers() {
        let mock = no_secrets().on_create(|req| {
            Ok(rpc::CreateResponse {
                id: "b-123".to_string(),
                properties: req.properties,
            })
        });
        let provider = configured(mock);
        let props = property_map([("password", PropertyValue::secret("hunter2".into()))]);

        let result = provider.create(&bucket_urn(), &props, 0.0, false).await.unwrap();
        assert_eq!(result.properties, props);
    }

    #[tokio::test]
    async fn test_create_partial_failure() {
        let mock = MockProvider::new().on_create(|_| {
            let live = property_map([("state", PropertyValue::from("partial"))]);
            Err(init_failed_status(
                "create failed",
                &rpc::ErrorResourceInitFailed {
                    id: "i-1".to_string(),
                    properties: Some(wire(&live)),
                    reasons: vec!["boom".to_string()],
                    inputs: None,
                },
            ))
        });
        let provider = configured(mock);

        let err = provider
            .create(&bucket_urn(), &PropertyMap::new(), 0.0, false)
            .await
            .unwrap_err();
        assert_eq!(err.resource_status(), ResourceStatus::PartialFailure);
        let init = err.init_error().unwrap();
        assert_eq!(init.reasons, vec!["boom"]);
        assert_eq!(init.id, "i-1");
        assert_eq!(init.outputs["state"], PropertyValue::from("partial"));
    }

    #[tokio::test]
    async fn test_create_failure_classification() {
        let mock = MockProvider::new().on_create(|_| Err(Status::internal("crashed")));
        let provider = configured(mock);
        let err = provider
            .create(&bucket_urn(), &PropertyMap::new(), 0.0, false)
            .await
            .unwrap_err();
        assert_eq!(err.resource_status(), ResourceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_create_empty_id() {
        let mock = MockProvider::new().on_create(|_| Ok(rpc::CreateResponse::default()));
        let provider = configured(mock);
        let err = provider
            .create(&bucket_urn(), &PropertyMap::new(), 0.0, false)
            .await
            .unwrap_err();
        assert_eq!(err.resource_status(), ResourceStatus::Unknown);
        assert!(err.to_string().contains("returned empty resource.ID"));
    }

    #[tokio::test]
    async fn test_create_with_unknown_config_outside_preview() {
        let provider = unknown_config(MockProvider::new(), ProviderOptions::default());
        let err = provider
            .create(&bucket_urn(), &PropertyMap::new(), 0.0, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Assertion(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_outputs() {
        let mock = MockProvider::new().on_create(|_| {
            let opts = MarshalOptions::new("outs").keep_unknowns(true);
            let outs = property_map([("arn", PropertyValue::computed())]);
            Ok(rpc::CreateResponse {
                id: "b-1".to_string(),
                properties: Some(marshal_properties(&outs, &opts).unwrap()),
            })
        });
        let provider = configured(mock);
        let err = provider
            .create(&bucket_urn(), &PropertyMap::new(), 0.0, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Marshal { .. }));
    }

    #[tokio::test]
    async fn test_read_gone() {
        let mock = MockProvider::new().on_read(|_| Ok(rpc::ReadResponse::default()));
        let provider = configured(mock);
        let result = provider
            .read(&bucket_urn(), "b-1", None, &PropertyMap::new())
            .await
            .unwrap();
        assert!(result.is_gone());
        assert_eq!(result.status, ResourceStatus::Ok);
    }

    #[tokio::test]
    async fn test_read_with_unknown_config() {
        let mock = MockProvider::new();
        let provider = unknown_config(mock.clone(), ProviderOptions::default());
        let result = provider
            .read(&bucket_urn(), "b-1", None, &PropertyMap::new())
            .await
            .unwrap();
        assert_eq!(result.status, ResourceStatus::Unknown);
        assert!(result.outputs.is_empty());
        assert!(result.inputs.is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_annotates_inputs_and_state() {
        let mock = no_secrets().on_read(|req| {
            assert!(req.inputs.is_some());
            Ok(rpc::ReadResponse {
                id: req.id,
                properties: req.properties,
                inputs: req.inputs,
            })
        });
        let provider = configured(mock);
        let inputs = property_map([("password", PropertyValue::secret("in".into()))]);
        let state = property_map([
            ("password", PropertyValue::secret("out".into())),
            ("arn", PropertyValue::from("arn:aws:s3:::b")),
        ]);

        let result = provider
            .read(&bucket_urn(), "b-1", Some(&inputs), &state)
            .await
            .unwrap();
        assert_eq!(result.id, "b-1");
        assert_eq!(result.outputs, state);
        assert_eq!(result.inputs, inputs);
    }

    #[tokio::test]
    async fn test_update_preview_fallback_and_partial_failure() {
        let provider = unknown_config(MockProvider::new(), ProviderOptions::default());
        let news = property_map([("name", PropertyValue::from("b2"))]);
        let outs = provider
            .update(&bucket_urn(), "b-1", &PropertyMap::new(), &news, 0.0, &[], true)
            .await
            .unwrap();
        assert!(outs.is_empty());

        let mock = MockProvider::new().on_update(|_| {
            Err(init_failed_status(
                "update failed",
                &rpc::ErrorResourceInitFailed {
                    id: "b-1".to_string(),
                    properties: Some(wire(&property_map([("ready", PropertyValue::Bool(false))]))),
                    reasons: vec!["not ready".to_string(), "timeout".to_string()],
                    inputs: None,
                },
            ))
        });
        let provider = configured(mock);
        let err = provider
            .update(&bucket_urn(), "b-1", &PropertyMap::new(), &news, 0.0, &[], false)
            .await
            .unwrap_err();
        let init = err.init_error().unwrap();
        assert_eq!(init.reasons.len(), 2);
        assert_eq!(init.outputs["ready"], PropertyValue::Bool(false));
        assert!(err.to_string().starts_with("2 errors occurred"));
    }

    #[tokio::test]
    async fn test_delete() {
        let mock = MockProvider::new().on_delete(|req| {
            assert_eq!(req.id, "b-1");
            Ok(())
        });
        let provider = configured(mock);
        provider
            .delete(&bucket_urn(), "b-1", &PropertyMap::new(), 0.0)
            .await
            .unwrap();

        let mock = MockProvider::new().on_delete(|_| Err(Status::data_loss("lost")));
        let provider = configured(mock);
        let err = provider
            .delete(&bucket_urn(), "b-1", &PropertyMap::new(), 0.0)
            .await
            .unwrap_err();
        assert_eq!(err.resource_status(), ResourceStatus::Unknown);

        let provider = unknown_config(MockProvider::new(), ProviderOptions::default());
        let err = provider
            .delete(&bucket_urn(), "b-1", &PropertyMap::new(), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Assertion(_)));
    }

    #[tokio::test]
    async fn test_construct() {
        let mock = MockProvider::new().on_construct(|req| {
            assert_eq!(req.r#type, "my:component:Thing");
            assert_eq!(req.input_dependencies["size"].urns.len(), 1);
            assert_eq!(req.delete_before_replace, Some(true));
            let mut deps = HashMap::new();
            deps.insert(
                "url".to_string(),
                rpc::construct_response::PropertyDependencies {
                    urns: vec!["urn:pulumi:dev::proj::aws:s3/bucket:Bucket::b".to_string()],
                },
            );
            Ok(rpc::ConstructResponse {
                urn: "urn:pulumi:dev::proj::my:component:Thing::t".to_string(),
                state: req.inputs,
                state_dependencies: deps,
            })
        });
        let provider = configured(mock);

        let mut options = ConstructOptions {
            delete_before_replace: Some(true),
            ..Default::default()
        };
        options
            .property_dependencies
            .insert("size".to_string(), vec![bucket_urn()]);
        let inputs = property_map([("size", PropertyValue::Number(3.0))]);

        let result = provider
            .construct(
                &ConstructInfo::default(),
                "my:component:Thing",
                "t",
                None,
                &inputs,
                &options,
            )
            .await
            .unwrap();
        assert_eq!(result.urn.name(), "t");
        assert_eq!(result.outputs, inputs);
        assert_eq!(result.output_dependencies["url"], vec![bucket_urn()]);
    }

    #[tokio::test]
    async fn test_construct_requires_secrets() {
        let provider = configured(no_secrets());
        let err = provider
            .construct(
                &ConstructInfo::default(),
                "my:component:Thing",
                "t",
                None,
                &PropertyMap::new(),
                &ConstructOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must support secrets"));

        let provider = unknown_config(MockProvider::new(), ProviderOptions::default());
        let result = provider
            .construct(
                &ConstructInfo::default(),
                "my:component:Thing",
                "t",
                None,
                &PropertyMap::new(),
                &ConstructOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result, ConstructResult::default());
    }

    #[tokio::test]
    async fn test_invoke() {
        let mock = MockProvider::new().on_invoke(|req| {
            assert_eq!(req.tok, "aws:index/getRegion:getRegion");
            Ok(rpc::InvokeResponse {
                r#return: Some(wire(&property_map([("name", PropertyValue::from("us-west-2"))]))),
                failures: vec![],
            })
        });
        let provider = configured(mock);
        let result = provider
            .invoke("aws:index/getRegion:getRegion", &PropertyMap::new())
            .await
            .unwrap();
        assert_eq!(result.properties["name"], PropertyValue::from("us-west-2"));

        let provider = unknown_config(MockProvider::new(), ProviderOptions::default());
        let result = provider
            .invoke("aws:index/getRegion:getRegion", &PropertyMap::new())
            .await
            .unwrap();
        assert!(result.properties.is_empty());
    }

    #[tokio::test]
    async fn test_stream_invoke() {
        let mock = MockProvider::new().on_stream_invoke(|_| {
            Ok(vec![
                rpc::InvokeResponse {
                    r#return: Some(wire(&property_map([("n", PropertyValue::Number(1.0))]))),
                    failures: vec![],
                },
                rpc::InvokeResponse {
                    r#return: None,
                    failures: vec![rpc::CheckFailure {
                        property: "n".to_string(),
                        reason: "overflow".to_string(),
                    }],
                },
                rpc::InvokeResponse::default(),
            ])
        });
        let provider = configured(mock);

        let mut seen = Vec::new();
        let failures = provider
            .stream_invoke("pkg:index:watch", &PropertyMap::new(), |item| {
                seen.push(item);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(failures, vec![CheckFailure::new("n", "overflow")]);
    }

    #[tokio::test]
    async fn test_stream_invoke_with_unknown_config() {
        let provider = unknown_config(MockProvider::new(), ProviderOptions::default());
        let mut seen = Vec::new();
        let failures = provider
            .stream_invoke("pkg:index:watch", &PropertyMap::new(), |item| {
                seen.push(item);
                Ok(())
            })
            .await
            .unwrap();
        assert!(failures.is_empty());
        assert_eq!(seen, vec![PropertyMap::new()]);
    }

    #[tokio::test]
    async fn test_call() {
        let mock = MockProvider::new().on_call(|req| {
            assert_eq!(req.arg_dependencies["self"].urns.len(), 1);
            let mut deps = HashMap::new();
            deps.insert(
                "result".to_string(),
                rpc::call_response::ReturnDependencies { urns: vec![] },
            );
            Ok(rpc::CallResponse {
                r#return: Some(wire(&property_map([("result", PropertyValue::from("ok"))]))),
                return_dependencies: deps,
                failures: vec![],
            })
        });
        let provider = configured(mock);
        let mut options = CallOptions::default();
        options
            .arg_dependencies
            .insert("self".to_string(), vec![bucket_urn()]);

        let result = provider
            .call("my:component:Thing/method", &PropertyMap::new(), &CallInfo::default(), &options)
            .await
            .unwrap();
        assert_eq!(result.returns["result"], PropertyValue::from("ok"));
        assert!(result.return_dependencies["result"].is_empty());
    }

    #[tokio::test]
    async fn test_get_plugin_info() {
        let mock = MockProvider::new().on_get_plugin_info(|_| {
            Ok(rpc::PluginInfo {
                version: "v1.2".to_string(),
            })
        });
        let provider = provider_with(mock, ProviderOptions::default());
        let info = provider.get_plugin_info().await.unwrap();
        assert_eq!(info.name, "aws");
        assert_eq!(info.version, Some(semver::Version::new(1, 2, 0)));
        assert!(info.path.is_none());
    }

    #[tokio::test]
    async fn test_get_mapping_and_cancellation() {
        let provider = provider_with(MockProvider::new(), ProviderOptions::default());
        assert_eq!(provider.get_mapping("tf").await.unwrap(), Mapping::default());
        provider.signal_cancellation().await.unwrap();

        let mock = MockProvider::new()
            .on_get_mapping(|req| {
                Ok(rpc::GetMappingResponse {
                    provider: "aws".to_string(),
                    data: req.key.into_bytes(),
                })
            })
            .on_cancel(|_| Err(Status::unavailable("gone")));
        let provider = provider_with(mock, ProviderOptions::default());
        let mapping = provider.get_mapping("tf").await.unwrap();
        assert_eq!(mapping.data, b"tf".to_vec());
        assert!(provider.signal_cancellation().await.is_err());
        provider.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_calls_after_close_fail() {
        let mock = MockProvider::new().on_get_schema(|_| {
            Ok(rpc::GetSchemaResponse {
                schema: "{}".to_string(),
            })
        });
        let provider = provider_with(mock.clone(), ProviderOptions::default());
        provider.close().await.unwrap();
        provider.close().await.unwrap();

        assert!(matches!(
            provider.get_schema(0).await,
            Err(ProviderError::Closed(pkg)) if pkg == "aws"
        ));
        assert!(matches!(
            provider.get_mapping("tf").await,
            Err(ProviderError::Closed(_))
        ));
        match provider.configure(&PropertyMap::new()) {
            Err(ProviderError::ConfigureFailed(inner)) => {
                assert!(matches!(&*inner, ProviderError::Closed(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_close_abandons_pending_configure() {
        let gate = Arc::new(Notify::new());
        let mock = MockProvider::new().with_configure_gate(gate);
        let provider = Arc::new(configured(mock));

        let waiter = {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move {
                provider
                    .check(&bucket_urn(), &PropertyMap::new(), &PropertyMap::new(), false, &[])
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        provider.close().await.unwrap();

        match waiter.await.unwrap() {
            Err(ProviderError::ConfigureFailed(inner)) => {
                assert!(matches!(&*inner, ProviderError::Closed(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_schema_and_attach() {
        let mock = MockProvider::new()
            .on_get_schema(|req| {
                assert_eq!(req.version, 1);
                Ok(rpc::GetSchemaResponse {
                    schema: r#"{"name":"aws"}"#.to_string(),
                })
            })
            .on_attach(|req| {
                assert_eq!(req.address, "127.0.0.1:5000");
                Ok(())
            });
        let provider = provider_with(mock.clone(), ProviderOptions::default());

        let schema = provider.get_schema(1).await.unwrap();
        assert_eq!(schema, br#"{"name":"aws"}"#.to_vec());
        provider.attach("127.0.0.1:5000").await.unwrap();
        assert_eq!(mock.calls(), vec!["GetSchema", "Attach"]);
    }

    #[test]
    fn test_parse_version_tolerant() {
        let v = |s: &str| parse_version_tolerant(s).unwrap();
        assert_eq!(v("1.2.3"), semver::Version::new(1, 2, 3));
        assert_eq!(v("v4"), semver::Version::new(4, 0, 0));
        assert_eq!(v("v0.9-alpha.1").pre.as_str(), "alpha.1");
        assert!(parse_version_tolerant("not-a-version").is_err());
    }

    #[test]
    fn test_spawn_env() {
        let options = ProviderOptions::default()
            .with_runtime_option("virtualenv", "venv")
            .with_runtime_option("typescript", true)
            .with_json_config("{}");
        let env = spawn_env(&options);
        assert!(env.contains(&("PULUMI_RUNTIME_VIRTUALENV".to_string(), "venv".to_string())));
        assert!(env.contains(&("PULUMI_RUNTIME_TYPESCRIPT".to_string(), "true".to_string())));
        assert!(env.contains(&("PULUMI_CONFIG".to_string(), "{}".to_string())));
    }

    #[test]
    fn test_with_live_state() {
        let err = with_live_state(
            InitError::new(vec!["boom".to_string()]).into(),
            "i-1".to_string(),
            PropertyMap::new(),
            Some(PropertyMap::new()),
        );
        assert_eq!(err.init_error().unwrap().id, "i-1");
        assert!(err.init_error().unwrap().inputs.is_some());
    }
}
