//! Provider plugin processes.
//!
//! A plugin is either spawned from a binary, in which case it prints the port
//! it listens on as the first line of its stdout, or attached to at a port
//! named in `PULUMI_DEBUG_PROVIDERS`. Either way the result is a gRPC
//! [`Channel`] to the plugin.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use crate::error::ProviderError;

/// Environment variable naming providers to attach to instead of spawning.
pub const DEBUG_PROVIDERS_ENV: &str = "PULUMI_DEBUG_PROVIDERS";

/// The engine-side environment a plugin runs in.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Working directory for spawned plugins.
    pub pwd: PathBuf,
    /// Cancelled when outstanding provider calls should be abandoned.
    pub cancel: CancellationToken,
}

impl PluginContext {
    /// Create a context rooted at `pwd`.
    pub fn new(pwd: impl Into<PathBuf>) -> Self {
        Self {
            pwd: pwd.into(),
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for PluginContext {
    fn default() -> Self {
        Self::new(".")
    }
}

/// The engine services a provider handle needs.
pub trait PluginHost: Send + Sync {
    /// Address of the engine's host server, passed to every plugin.
    fn server_addr(&self) -> String;

    /// Resolve the binary for a resource plugin.
    fn plugin_path(
        &self,
        name: &str,
        version: Option<&semver::Version>,
    ) -> Result<PathBuf, ProviderError>;
}

/// A running, or attached, provider plugin.
#[derive(Debug)]
pub struct Plugin {
    bin: Option<PathBuf>,
    channel: Channel,
    child: Mutex<Option<Child>>,
}

impl Plugin {
    /// Spawn a plugin and connect to the port it reports.
    pub async fn spawn(
        ctx: &PluginContext,
        bin: &Path,
        prefix: &str,
        args: &[String],
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        info!(plugin = %prefix, path = %bin.display(), "launching plugin");

        let mut child = Command::new(bin)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&ctx.pwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::Plugin(format!("failed to load plugin {}: {e}", bin.display()))
            })?;

        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, prefix.to_string(), "stderr");
        }
        let stdout = child.stdout.take().ok_or_else(|| {
            ProviderError::Plugin(format!("plugin {} has no stdout", bin.display()))
        })?;
        let mut lines = BufReader::new(stdout).lines();

        let first = match tokio::time::timeout(timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                return Err(ProviderError::Plugin(format!(
                    "plugin {} exited before reporting its port",
                    bin.display()
                )))
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ProviderError::Plugin(format!(
                    "timed out waiting for plugin {} to report its port",
                    bin.display()
                )))
            }
        };
        let port = parse_port(&first).ok_or_else(|| {
            ProviderError::Plugin(format!(
                "could not read plugin {} port: {first:?}",
                bin.display()
            ))
        })?;

        let prefix_owned = prefix.to_string();
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(plugin = %prefix_owned, stream = "stdout", "{line}");
            }
        });

        let channel = dial(port, timeout).await?;
        debug!(plugin = %prefix, port, "plugin connected");
        Ok(Self {
            bin: Some(bin.to_path_buf()),
            channel,
            child: Mutex::new(Some(child)),
        })
    }

    /// Connect to a plugin that is already listening on `port`.
    pub async fn attach(port: u16, prefix: &str, timeout: Duration) -> Result<Self, ProviderError> {
        info!(plugin = %prefix, port, "attaching to plugin");
        let channel = dial(port, timeout).await?;
        Ok(Self {
            bin: None,
            channel,
            child: Mutex::new(None),
        })
    }

    /// The binary this plugin was spawned from. `None` if attached.
    pub fn bin(&self) -> Option<&Path> {
        self.bin.as_deref()
    }

    /// The channel to the plugin.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Terminate the plugin process, if this handle spawned it.
    pub async fn kill(&self) -> Result<(), ProviderError> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if let Some(status) = child.try_wait()? {
            debug!(?status, "plugin already exited");
            return Ok(());
        }
        child.kill().await?;
        Ok(())
    }
}

/// Look up the debug port for `pkg` in a `PULUMI_DEBUG_PROVIDERS` value.
///
/// The value is a comma-separated list of `<pkg>:<port>` pairs.
pub fn debug_provider_port(value: &str, pkg: &str) -> Result<Option<u16>, ProviderError> {
    for entry in value.split(',') {
        let mut parts = entry.splitn(2, ':');
        if parts.next() != Some(pkg) {
            continue;
        }
        let port = parts.next().unwrap_or("");
        if port.is_empty() {
            return Ok(None);
        }
        return port.trim().parse::<u16>().map(Some).map_err(|e| {
            ProviderError::Plugin(format!(
                "Expected a numeric port, got {port} in {DEBUG_PROVIDERS_ENV}: {e}"
            ))
        });
    }
    Ok(None)
}

/// Look up the debug port for `pkg` in the environment.
pub fn debug_provider_port_from_env(pkg: &str) -> Result<Option<u16>, ProviderError> {
    match std::env::var(DEBUG_PROVIDERS_ENV) {
        Ok(value) => debug_provider_port(&value, pkg),
        Err(_) => Ok(None),
    }
}

fn parse_port(line: &str) -> Option<u16> {
    line.trim().parse().ok()
}

async fn dial(port: u16, timeout: Duration) -> Result<Channel, ProviderError> {
    let endpoint = Endpoint::from_shared(format!("http://127.0.0.1:{port}"))?
        .connect_timeout(timeout);
    endpoint.connect().await.map_err(|e| {
        warn!(port, error = %e, "could not connect to plugin");
        ProviderError::from(e)
    })
}

fn forward_output<R>(reader: R, prefix: String, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(plugin = %prefix, stream, "{line}");
        }
    });
}
