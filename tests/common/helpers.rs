use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tributary::download::DownloadEvent;
use tributary::error::{Error, Result};
use tributary::transport::{
    ByteStream, ProgressSource, Protocol, SwarmBackend, SwarmClient, SwarmEvent, SwarmTorrent,
    TorrentMetadata, Transport, TransportContext, TransportFactory, TransportStream,
};
use tributary::{DownloaderBuilder, EventStream, HttpClientConfig};

// Common test constants
pub const TEST_USER_AGENT: &str = "tributary-test-agent";
pub const TEST_MAGNET: &str = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&dn=Sintel";
pub const TEST_CID: &str = "QmQPeNsJPyVWPFDVHb9pDWa2qXDvZdFzxcF8eLUc9rQ1bJ";

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Creates test file content of specified size
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Splits content into `count` chunks of equal size
pub fn split_chunks(content: &[u8], count: usize) -> Vec<Bytes> {
    let size = content.len() / count;
    content
        .chunks(size)
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Asserts that a file exists at the given path
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "File should exist at path: {:?}", path);
}

/// Asserts that no file exists at the given path
pub fn assert_file_missing(path: &Path) {
    assert!(!path.exists(), "File should not exist at path: {:?}", path);
}

/// Number of entries in a directory
pub fn dir_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

// === Event Helpers ===

/// Reads every event until the stream ends
pub async fn collect_events(mut events: EventStream) -> Vec<DownloadEvent> {
    let mut collected = Vec::new();
    while let Some(event) = events.next_event().await {
        collected.push(event);
    }
    collected
}

/// Names of the events, in order
pub fn event_names(events: &[DownloadEvent]) -> Vec<&'static str> {
    events.iter().map(DownloadEvent::name).collect()
}

/// Percentages of the progress events, in order
pub fn percents(events: &[DownloadEvent]) -> Vec<Option<f64>> {
    events
        .iter()
        .filter_map(|event| match event {
            DownloadEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .collect()
}

/// Number of events with the given name
pub fn count_events(events: &[DownloadEvent], name: &str) -> usize {
    events.iter().filter(|event| event.name() == name).count()
}

// === HTTP Configuration Helpers ===

/// Creates test headers with common user agent
pub fn create_test_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(TEST_USER_AGENT));
    headers
}

/// Creates a test HTTP client configuration with custom retries
pub fn create_test_http_config_with_retries(retries: u32) -> HttpClientConfig {
    HttpClientConfig {
        retries,
        headers: Some(create_test_headers()),
        ..HttpClientConfig::default()
    }
}

// === Scripted Transport ===

/// What a scripted transport does once opened.
#[derive(Clone, Default)]
pub struct Script {
    /// Chunks of the body.
    pub chunks: Vec<Bytes>,
    /// Declared total size.
    pub total: Option<u64>,
    /// Pause before each chunk.
    pub chunk_delay: Option<Duration>,
    /// Fail `open` with this message.
    pub open_error: Option<String>,
    /// Yield an error once the chunks are sent.
    pub fail_at_end: bool,
    /// Never end the body once the chunks are sent.
    pub hang: bool,
    /// Peer count reported when opened.
    pub peers: Option<u32>,
}

impl Script {
    pub fn body(chunks: Vec<Bytes>) -> Self {
        let total = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            chunks,
            total: Some(total),
            ..Self::default()
        }
    }
}

/// Factory handing out scripted transports and counting what happens to them.
#[derive(Clone, Default)]
pub struct ScriptedTransports {
    pub script: Script,
    pub created: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl ScriptedTransports {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// A downloader writing into `dir` through this factory
    pub fn downloader(&self, dir: &Path) -> tributary::Downloader {
        DownloaderBuilder::new()
            .directory(dir.to_path_buf())
            .transports(Arc::new(self.clone()))
            .build()
    }
}

impl TransportFactory for ScriptedTransports {
    fn create(&self, protocol: Protocol) -> Result<Box<dyn Transport>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedTransport {
            protocol,
            script: self.script.clone(),
            opened: Arc::clone(&self.opened),
            closed: Arc::clone(&self.closed),
            is_closed: false,
        }))
    }
}

pub struct ScriptedTransport {
    protocol: Protocol,
    script: Script,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    is_closed: bool,
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn open(&mut self, _identifier: &str, ctx: &TransportContext) -> Result<TransportStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.script.open_error {
            return Err(Error::TransportConnectFailed(message.clone()));
        }
        if let Some(peers) = self.script.peers {
            ctx.peers(peers);
        }

        let delay = self.script.chunk_delay;
        let mut body: ByteStream = stream::iter(self.script.chunks.clone())
            .then(move |chunk| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(chunk)
            })
            .boxed();

        if self.script.fail_at_end {
            body = body
                .chain(stream::once(async { Err(Error::Transport("connection reset".into())) }))
                .boxed();
        }
        if self.script.hang {
            body = body.chain(stream::pending()).boxed();
        }

        Ok(TransportStream {
            body,
            total: self.script.total,
            progress: ProgressSource::Written,
        })
    }

    async fn close(&mut self) {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// === Scripted Swarm ===

/// What a scripted swarm does.
#[derive(Clone, Default)]
pub struct SwarmScript {
    pub file_count: usize,
    pub content: Vec<u8>,
    pub metadata_delay: Duration,
    pub peers: u32,
    /// Activity sent once the file is streamed.
    pub events: Vec<SwarmEvent>,
}

/// Swarm backend counting destroyed clients and torrents.
#[derive(Clone, Default)]
pub struct ScriptedSwarm {
    pub script: SwarmScript,
    pub clients_destroyed: Arc<AtomicUsize>,
    pub torrents_destroyed: Arc<AtomicUsize>,
    pub added: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSwarm {
    pub fn new(script: SwarmScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn clients_destroyed(&self) -> usize {
        self.clients_destroyed.load(Ordering::SeqCst)
    }

    pub fn torrents_destroyed(&self) -> usize {
        self.torrents_destroyed.load(Ordering::SeqCst)
    }

    /// A downloader writing into `dir` through this swarm
    pub fn downloader(&self, dir: &Path) -> tributary::Downloader {
        DownloaderBuilder::new()
            .directory(dir.to_path_buf())
            .swarm_backend(Arc::new(self.clone()))
            .build()
    }
}

#[async_trait::async_trait]
impl SwarmBackend for ScriptedSwarm {
    async fn connect(&self) -> Result<Box<dyn SwarmClient>> {
        Ok(Box::new(ScriptedClient {
            swarm: self.clone(),
        }))
    }
}

struct ScriptedClient {
    swarm: ScriptedSwarm,
}

#[async_trait::async_trait]
impl SwarmClient for ScriptedClient {
    async fn add(&mut self, magnet: &str) -> Result<Box<dyn SwarmTorrent>> {
        self.swarm
            .added
            .lock()
            .unwrap()
            .push(magnet.to_string());
        Ok(Box::new(ScriptedTorrent {
            swarm: self.swarm.clone(),
            events: None,
        }))
    }

    async fn destroy(&mut self) {
        self.swarm.clients_destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedTorrent {
    swarm: ScriptedSwarm,
    events: Option<mpsc::UnboundedSender<SwarmEvent>>,
}

#[async_trait::async_trait]
impl SwarmTorrent for ScriptedTorrent {
    async fn metadata(&mut self) -> Result<TorrentMetadata> {
        tokio::time::sleep(self.swarm.script.metadata_delay).await;
        Ok(TorrentMetadata {
            name: Some("Sintel".into()),
            file_count: self.swarm.script.file_count,
            length: self.swarm.script.content.len() as u64,
        })
    }

    fn num_peers(&self) -> u32 {
        self.swarm.script.peers
    }

    fn events(&mut self) -> Option<UnboundedReceiver<SwarmEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in &self.swarm.script.events {
            let _ = tx.send(event.clone());
        }
        // Keep the feed open for the lifetime of the torrent.
        self.events = Some(tx);
        Some(rx)
    }

    fn stream(&mut self, file_index: usize) -> Result<ByteStream> {
        assert_eq!(file_index, 0);
        let content = Bytes::from(self.swarm.script.content.clone());
        // Gives the activity feed a chance to be forwarded first.
        Ok(stream::once(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(content)
        })
        .boxed())
    }

    async fn destroy(&mut self) {
        self.events = None;
        self.swarm.torrents_destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Path of `name` inside `dir`
pub fn in_dir(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

// === Scripted IPFS Node ===

/// How a fake `ipfs daemon` behaves.
#[cfg(unix)]
pub enum FakeDaemon {
    /// Publishes the given `host:port` as its API address, then idles.
    Ready(String),
    /// Idles without ever publishing an API address.
    Silent,
    /// Exits with an error right away.
    Exits,
}

/// A shell script standing in for the `ipfs` binary.
///
/// Every subcommand but `daemon` succeeds without doing anything.
#[cfg(unix)]
pub struct FakeNode {
    dir: TempDir,
    pub binary: PathBuf,
}

#[cfg(unix)]
impl FakeNode {
    pub fn new(daemon: FakeDaemon) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = create_temp_dir();
        let binary = dir.path().join("ipfs");
        let pid_file = dir.path().join("daemon.pid");

        let run = match daemon {
            FakeDaemon::Ready(address) => {
                let (host, port) = address.split_once(':').expect("host:port address");
                format!(
                    "printf '%s' '/ip4/{host}/tcp/{port}' > \"$IPFS_PATH/api\"\n    exec sleep 30"
                )
            }
            FakeDaemon::Silent => "exec sleep 30".to_string(),
            FakeDaemon::Exits => "exit 3".to_string(),
        };
        let script = format!(
            "#!/bin/sh\ncase \"$1\" in\n  daemon)\n    echo $$ > '{}'\n    {}\n    ;;\n  *)\n    exit 0\n    ;;\nesac\n",
            pid_file.display(),
            run
        );

        fs::write(&binary, script).expect("Failed to write the fake ipfs binary");
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))
            .expect("Failed to make the fake ipfs binary executable");

        Self { dir, binary }
    }

    /// Whether the daemon process started by the node is still running
    pub fn daemon_alive(&self) -> bool {
        let Ok(pid) = fs::read_to_string(self.dir.path().join("daemon.pid")) else {
            return false;
        };
        std::process::Command::new("kill")
            .args(["-0", pid.trim()])
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Whether the daemon was started at all
    pub fn daemon_started(&self) -> bool {
        self.dir.path().join("daemon.pid").exists()
    }
}
