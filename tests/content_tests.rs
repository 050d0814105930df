//! Tests for the content (IPFS) transport.
//!
//! The node's control API is served by `mockito` and the `ipfs` binary is a
//! shell script, so the whole node lifecycle runs without a real daemon.
#![cfg(unix)]

use futures::StreamExt;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tributary::download::DownloadOptions;
use tributary::transport::node::{ContentNode, NodeApi, NodeConfig, DEFAULT_SHUTDOWN_GRACE};
use tributary::{DownloaderBuilder, Error};
use url::Url;

mod common;
use common::helpers::*;

// Writing a script while another test forks can leave it busy; run one node at a time.
static NODE_LOCK: Mutex<()> = Mutex::const_new(());

const PROVIDERS: &str = concat!(
    r#"{"Extra":"","ID":"","Responses":[{"Addrs":[],"ID":"QmPeerA"}],"Type":4}"#,
    "\n",
    r#"{"Extra":"","ID":"","Responses":[{"Addrs":[],"ID":"QmPeerB"}],"Type":4}"#,
    "\n",
);

fn api(server: &mut ServerGuard, command: &str) -> Mock {
    server
        .mock("POST", format!("/api/v0/{command}").as_str())
        .match_query(Matcher::Any)
}

fn api_for(server: &mut ServerGuard, command: &str, cid: &str) -> Mock {
    server
        .mock("POST", format!("/api/v0/{command}").as_str())
        .match_query(Matcher::UrlEncoded("arg".into(), cid.into()))
}

fn node_api(server: &ServerGuard) -> NodeApi {
    NodeApi::new(Url::parse(&format!("{}/", server.url())).unwrap())
}

fn node_config(node: &FakeNode, repos: &Path) -> NodeConfig {
    NodeConfig {
        binary: node.binary.clone(),
        temp_root: Some(repos.to_path_buf()),
        bootstrap_peer: None,
        ..NodeConfig::default()
    }
}

#[tokio::test]
async fn test_content_download_through_a_node() {
    let _guard = NODE_LOCK.lock().await;
    let mut server = Server::new_async().await;

    let id = api(&mut server, "id")
        .with_body(r#"{"ID":"QmFakeNode"}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    let connect = api(&mut server, "swarm/connect")
        .with_status(500)
        .with_body("dial backoff")
        .expect(1)
        .create_async()
        .await;
    let stat = api_for(&mut server, "object/stat", TEST_CID)
        .with_body(format!(r#"{{"Hash":"{TEST_CID}","CumulativeSize":11}}"#))
        .create_async()
        .await;
    let cat = api_for(&mut server, "cat", TEST_CID)
        .with_body("hello world")
        .create_async()
        .await;
    let _providers = api_for(&mut server, "routing/findprovs", TEST_CID)
        .with_body(PROVIDERS)
        .create_async()
        .await;
    let shutdown = api(&mut server, "shutdown").expect(1).create_async().await;

    let node = FakeNode::new(FakeDaemon::Ready(server.host_with_port()));
    let temp_dir = create_temp_dir();
    let repos = create_temp_dir();
    let downloader = DownloaderBuilder::new()
        .directory(temp_dir.path().to_path_buf())
        .ipfs_binary(node.binary.clone())
        .bootstrap_peer(Some("/ip4/127.0.0.1/tcp/4001/p2p/QmBootstrap".into()))
        .node_temp_root(repos.path().to_path_buf())
        .node_ready_timeout(Duration::from_secs(10))
        .node_shutdown_grace(Duration::from_millis(200))
        .build();

    let events = collect_events(downloader.download(TEST_CID, DownloadOptions::new())).await;

    // A failed bootstrap connection does not stop the download.
    assert_eq!(count_events(&events, "error"), 0);
    assert_eq!(count_events(&events, "finish"), 1);
    assert_eq!(event_names(&events).last(), Some(&"close"));
    assert_eq!(percents(&events).last(), Some(&Some(100.0)));
    assert_eq!(
        std::fs::read(in_dir(&temp_dir, TEST_CID)).unwrap(),
        b"hello world"
    );

    id.assert_async().await;
    connect.assert_async().await;
    stat.assert_async().await;
    cat.assert_async().await;
    shutdown.assert_async().await;

    assert!(node.daemon_started());
    assert!(!node.daemon_alive());
    assert_eq!(dir_entries(repos.path()), 0);
}

#[tokio::test]
async fn test_node_api_calls() {
    let mut server = Server::new_async().await;
    let _stat = api_for(&mut server, "object/stat", TEST_CID)
        .with_body(r#"{"Hash":"x","NumLinks":0,"CumulativeSize":4096}"#)
        .create_async()
        .await;
    let _bad_stat = api_for(&mut server, "object/stat", "QmBroken")
        .with_body("not json")
        .create_async()
        .await;
    let _cat = api_for(&mut server, "cat", TEST_CID)
        .with_body("hello world")
        .create_async()
        .await;
    let _providers = api_for(&mut server, "routing/findprovs", TEST_CID)
        .with_body(PROVIDERS)
        .create_async()
        .await;
    let _missing = api_for(&mut server, "cat", "QmMissing")
        .with_status(500)
        .with_body(r#"{"Message":"block was not found locally"}"#)
        .create_async()
        .await;
    let shutdown = api(&mut server, "shutdown").expect(1).create_async().await;

    let api = node_api(&server);
    let budget = Duration::from_secs(5);

    assert_eq!(api.cumulative_size(TEST_CID, budget).await.unwrap(), 4096);
    assert!(matches!(
        api.cumulative_size("QmBroken", budget).await,
        Err(Error::Transport(_))
    ));
    assert_eq!(api.providers(TEST_CID, budget).await.unwrap(), 2);

    let mut body = api.cat(TEST_CID).await.unwrap();
    let mut content = Vec::new();
    while let Some(chunk) = body.next().await {
        content.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(content, b"hello world");

    match api.cat("QmMissing").await {
        Err(Error::Transport(message)) => assert!(message.contains("not found")),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("the missing block was served"),
    }

    api.shutdown().await.unwrap();
    shutdown.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_api_is_a_connect_failure() {
    let api = NodeApi::new(Url::parse("http://127.0.0.1:1/").unwrap());
    assert!(matches!(api.id().await, Err(Error::TransportConnectFailed(_))));
}

#[tokio::test]
async fn test_silent_daemon_is_killed_without_grace() {
    let _guard = NODE_LOCK.lock().await;
    let node = FakeNode::new(FakeDaemon::Silent);
    let repos = create_temp_dir();
    let config = NodeConfig {
        ready_timeout: Duration::from_millis(500),
        ..node_config(&node, repos.path())
    };

    let mut content_node = ContentNode::provision(&config).await.unwrap();
    assert!(matches!(
        content_node.start(&config).await,
        Err(Error::NodeInitFailed(_))
    ));
    assert!(content_node.api().is_err());

    let started = Instant::now();
    content_node.stop().await;
    assert!(started.elapsed() < DEFAULT_SHUTDOWN_GRACE);

    assert!(node.daemon_started());
    assert!(!node.daemon_alive());
    assert_eq!(dir_entries(repos.path()), 0);

    // Stopping again does nothing.
    content_node.stop().await;
}

#[tokio::test]
async fn test_daemon_exiting_early_fails_fast() {
    let _guard = NODE_LOCK.lock().await;
    let node = FakeNode::new(FakeDaemon::Exits);
    let repos = create_temp_dir();
    let config = node_config(&node, repos.path());

    let mut content_node = ContentNode::provision(&config).await.unwrap();
    assert!(content_node.repo_path().unwrap().starts_with(repos.path()));

    let started = Instant::now();
    match content_node.start(&config).await {
        Err(Error::NodeInitFailed(message)) => assert!(message.contains("exited")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(started.elapsed() < config.ready_timeout);

    content_node.stop().await;
    assert!(content_node.repo_path().is_err());
    assert_eq!(dir_entries(repos.path()), 0);
}

#[tokio::test]
async fn test_content_download_fails_when_node_never_starts() {
    let _guard = NODE_LOCK.lock().await;
    let node = FakeNode::new(FakeDaemon::Exits);
    let temp_dir = create_temp_dir();
    let repos = create_temp_dir();
    let downloader = DownloaderBuilder::new()
        .directory(temp_dir.path().to_path_buf())
        .ipfs_binary(node.binary.clone())
        .bootstrap_peer(None)
        .node_temp_root(repos.path().to_path_buf())
        .build();

    let events = collect_events(downloader.download(TEST_CID, DownloadOptions::new())).await;

    assert_eq!(event_names(&events), vec!["error", "close"]);
    assert!(matches!(&events[0], tributary::DownloadEvent::Error(Error::NodeInitFailed(_))));
    assert_file_missing(&in_dir(&temp_dir, TEST_CID));
    assert_eq!(dir_entries(repos.path()), 0);
}
