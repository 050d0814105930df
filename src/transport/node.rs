//! Ephemeral IPFS node.
//!
//! Each content download runs its own `ipfs` daemon rooted at a private,
//! temporary repository. The node is driven through its HTTP control API
//! ([`NodeApi`]) and torn down with [`ContentNode::stop`], which stops the
//! process and deletes the repository.
//!
//! Resources are held by RAII guards as soon as they exist: the repository is
//! a [`TempDir`] and the daemon is spawned with `kill_on_drop`, so an
//! interrupted start never leaks a process or a directory.

use super::ByteStream;
use crate::error::{Error, Result};

use futures::stream::{StreamExt, TryStreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace, warn};
use url::Url;

/// Peer the node connects to right after starting.
pub const DEFAULT_BOOTSTRAP_PEER: &str =
    "/dns4/mariana.dreamnet.tech/tcp/4001/p2p/QmcWoy1FzBicbYuopNT2rT6EDQSBDfco1TxibEyYgWbiMq";

/// Interval between two readiness checks.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default grace period given to the daemon after a shutdown request.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Provider record type in `routing/findprovs` replies.
const PROVIDER_RECORD: u32 = 4;

/// Settings of the content transport's node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Path of the `ipfs` binary.
    pub binary: PathBuf,
    /// Directory holding the per-download repositories. Defaults to the
    /// system temporary directory.
    pub temp_root: Option<PathBuf>,
    /// Peer to connect to once the node runs. Failure to connect is not fatal.
    pub bootstrap_peer: Option<String>,
    /// How long the control API may take to come up.
    pub ready_timeout: Duration,
    /// Budget of the content size query.
    pub stat_timeout: Duration,
    /// Budget of the provider query.
    pub peers_timeout: Duration,
    /// How long the daemon may take to exit once asked to.
    pub shutdown_grace: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ipfs"),
            temp_root: None,
            bootstrap_peer: Some(DEFAULT_BOOTSTRAP_PEER.to_string()),
            ready_timeout: Duration::from_secs(60),
            stat_timeout: Duration::from_secs(3 * 60),
            peers_timeout: Duration::from_secs(60),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// A running (or starting) IPFS daemon and its repository.
pub struct ContentNode {
    repo: Option<TempDir>,
    child: Option<Child>,
    api: Option<NodeApi>,
    shutdown_grace: Duration,
}

impl ContentNode {
    /// Creates a private repository and initializes it.
    ///
    /// The API and swarm listen on ephemeral ports and the gateway is
    /// disabled, so several nodes can run side by side.
    pub async fn provision(config: &NodeConfig) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tributary-ipfs-");
        let repo = match &config.temp_root {
            Some(root) => {
                tokio::fs::create_dir_all(root).await.map_err(|e| {
                    Error::NodeInitFailed(format!("Unable to create {}: {e}", root.display()))
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::NodeInitFailed(format!("Unable to create the node repository: {e}")))?;

        debug!("Creating IPFS node...");
        debug!("Bin: {}", config.binary.display());
        debug!("Repo: {}", repo.path().display());

        let node = Self {
            repo: Some(repo),
            child: None,
            api: None,
            shutdown_grace: config.shutdown_grace,
        };

        node.run(config, &["init", "--empty-repo"]).await?;
        node.run(config, &["config", "Addresses.API", "/ip4/127.0.0.1/tcp/0"]).await?;
        node.run(config, &["config", "--json", "Addresses.Gateway", "[]"]).await?;
        node.run(
            config,
            &["config", "--json", "Addresses.Swarm", r#"["/ip4/0.0.0.0/tcp/0"]"#],
        )
        .await?;

        Ok(node)
    }

    /// Starts the daemon and waits for its control API.
    pub async fn start(&mut self, config: &NodeConfig) -> Result<()> {
        let repo = self.repo_path()?.to_path_buf();

        let mut child = Command::new(&config.binary)
            .arg("daemon")
            .env("IPFS_PATH", &repo)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::NodeInitFailed(format!("Unable to run {}: {e}", config.binary.display()))
            })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(target: "tributary::ipfs", "{}", line);
                }
            });
        }

        let child = self.child.insert(child);
        let api = timeout(config.ready_timeout, wait_for_api(child, &repo))
            .await
            .map_err(|_| {
                Error::NodeInitFailed(format!(
                    "The control API was not available after {:?}",
                    config.ready_timeout
                ))
            })??;

        debug!("Created!");
        self.api = Some(api);
        Ok(())
    }

    /// The node's control API, once started.
    pub fn api(&self) -> Result<&NodeApi> {
        self.api
            .as_ref()
            .ok_or_else(|| Error::NodeInitFailed("The IPFS node was not started".into()))
    }

    /// Location of the private repository, until the node is stopped.
    pub fn repo_path(&self) -> Result<&Path> {
        self.repo
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| Error::Internal("The IPFS node repository was removed".into()))
    }

    /// Stops the daemon and deletes the repository.
    ///
    /// Every step is best-effort and calling it again does nothing.
    pub async fn stop(&mut self) {
        let grace = self.shutdown_grace;

        let mut requested = false;
        if let Some(api) = self.api.take() {
            match timeout(grace, api.shutdown()).await {
                Ok(Ok(())) => {
                    trace!("IPFS node accepted the shutdown request");
                    requested = true;
                }
                Ok(Err(e)) => debug!("IPFS shutdown request failed: {}", e),
                Err(_) => debug!("IPFS shutdown request timed out"),
            }
        }

        if let Some(mut child) = self.child.take() {
            // Without an accepted shutdown request the daemon is not exiting.
            let exited = requested
                && match timeout(grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        debug!(%status, "IPFS node exited");
                        true
                    }
                    _ => false,
                };

            if !exited {
                match child.try_wait() {
                    Ok(Some(status)) => debug!(%status, "IPFS node already exited"),
                    _ => {
                        if let Err(e) = child.kill().await {
                            warn!("Unable to kill the IPFS node: {}", e);
                        }
                    }
                }
            }
        }

        if let Some(repo) = self.repo.take() {
            let path = repo.path().to_path_buf();
            match tokio::task::spawn_blocking(move || repo.close()).await {
                Ok(Ok(())) => debug!("Removed node repository {}", path.display()),
                Ok(Err(e)) => warn!("Unable to remove node repository {}: {}", path.display(), e),
                Err(e) => warn!("Unable to remove node repository {}: {}", path.display(), e),
            }
        }
    }

    /// Runs a one-shot `ipfs` command against the repository.
    async fn run(&self, config: &NodeConfig, args: &[&str]) -> Result<()> {
        let output = Command::new(&config.binary)
            .args(args)
            .env("IPFS_PATH", self.repo_path()?)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::NodeInitFailed(format!("Unable to run {}: {e}", config.binary.display()))
            })?;

        if !output.status.success() {
            return Err(Error::NodeInitFailed(format!(
                "`ipfs {}` exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

/// Polls until the daemon publishes its API address and answers on it.
async fn wait_for_api(child: &mut Child, repo: &Path) -> Result<NodeApi> {
    let api_file = repo.join("api");
    let started = Instant::now();

    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| Error::NodeInitFailed(e.to_string()))?
        {
            return Err(Error::NodeInitFailed(format!(
                "The IPFS daemon exited with {status}"
            )));
        }

        if let Ok(address) = tokio::fs::read_to_string(&api_file).await {
            if let Some(base) = multiaddr_to_url(address.trim()) {
                let api = NodeApi::new(base);
                if api.id().await.is_ok() {
                    debug!(elapsed = ?started.elapsed(), "IPFS API is ready");
                    return Ok(api);
                }
            }
        }

        sleep(READY_POLL_INTERVAL).await;
    }
}

/// Converts an API multiaddr such as `/ip4/127.0.0.1/tcp/5001` to an HTTP URL.
///
/// ```rust
/// use tributary::transport::node::multiaddr_to_url;
///
/// let url = multiaddr_to_url("/ip4/127.0.0.1/tcp/5001").unwrap();
/// assert_eq!(url.as_str(), "http://127.0.0.1:5001/");
/// ```
pub fn multiaddr_to_url(address: &str) -> Option<Url> {
    let mut parts = address.trim_start_matches('/').split('/');
    let host = match (parts.next()?, parts.next()?) {
        ("ip4" | "dns" | "dns4" | "dns6", host) => host.to_string(),
        ("ip6", host) => format!("[{host}]"),
        _ => return None,
    };
    let port = match (parts.next()?, parts.next()?) {
        ("tcp", port) => port.parse::<u16>().ok()?,
        _ => return None,
    };

    Url::parse(&format!("http://{host}:{port}/")).ok()
}

#[derive(Debug, Deserialize)]
struct ObjectStat {
    #[serde(rename = "CumulativeSize")]
    cumulative_size: u64,
}

#[derive(Debug, Deserialize)]
struct RoutingEvent {
    #[serde(rename = "Type")]
    kind: u32,
    #[serde(rename = "Responses", default)]
    responses: Option<Vec<RoutingPeer>>,
}

#[derive(Debug, Deserialize)]
struct RoutingPeer {
    #[serde(rename = "ID")]
    id: String,
}

/// Counts the distinct providers in a `routing/findprovs` reply.
///
/// The reply is newline-delimited JSON; unparsable lines are skipped.
pub fn count_providers(body: &str) -> u32 {
    let providers: HashSet<String> = body
        .lines()
        .filter_map(|line| serde_json::from_str::<RoutingEvent>(line).ok())
        .filter(|event| event.kind == PROVIDER_RECORD)
        .flat_map(|event| event.responses.unwrap_or_default())
        .map(|peer| peer.id)
        .collect();

    providers.len() as u32
}

/// Client of a node's HTTP control API.
#[derive(Debug, Clone)]
pub struct NodeApi {
    client: reqwest::Client,
    base: Url,
}

impl NodeApi {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    /// Base URL of the API.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Checks that the API answers.
    pub async fn id(&self) -> Result<()> {
        self.call("id", &[], None).await.map(drop)
    }

    /// Connects to a peer.
    pub async fn connect(&self, peer: &str) -> Result<()> {
        self.call("swarm/connect", &[("arg", peer)], None).await.map(drop)
    }

    /// Cumulative size of a content id, in bytes.
    pub async fn cumulative_size(&self, cid: &str, budget: Duration) -> Result<u64> {
        let res = self.call("object/stat", &[("arg", cid)], Some(budget)).await?;
        let body = res.bytes().await.map_err(|e| Error::Transport(e.to_string()))?;
        let stat: ObjectStat = serde_json::from_slice(&body)
            .map_err(|e| Error::Transport(format!("Unexpected object/stat reply: {e}")))?;
        Ok(stat.cumulative_size)
    }

    /// Streams the bytes of a content id.
    pub async fn cat(&self, cid: &str) -> Result<ByteStream> {
        let res = self.call("cat", &[("arg", cid)], None).await?;
        Ok(res
            .bytes_stream()
            .map_err(|e| Error::Transport(e.to_string()))
            .boxed())
    }

    /// Number of peers providing a content id.
    pub async fn providers(&self, cid: &str, budget: Duration) -> Result<u32> {
        let res = self
            .call("routing/findprovs", &[("arg", cid)], Some(budget))
            .await?;
        let body = res.text().await.map_err(|e| Error::Transport(e.to_string()))?;
        Ok(count_providers(&body))
    }

    /// Asks the daemon to exit.
    pub async fn shutdown(&self) -> Result<()> {
        self.call("shutdown", &[], None).await.map(drop)
    }

    async fn call(
        &self,
        command: &str,
        args: &[(&str, &str)],
        budget: Option<Duration>,
    ) -> Result<reqwest::Response> {
        let url = self
            .base
            .join(&format!("api/v0/{command}"))
            .map_err(|e| Error::Internal(e.to_string()))?;

        let mut req = self.client.post(url).query(args);
        if let Some(budget) = budget {
            req = req
                .query(&[("timeout", format!("{}s", budget.as_secs()))])
                .timeout(budget);
        }

        let res = req
            .send()
            .await
            .map_err(|e| Error::TransportConnectFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let message = res.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "`{command}` failed with {status}: {}",
                message.trim()
            )));
        }

        Ok(res)
    }
}
