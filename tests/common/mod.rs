//! Common test utilities and fixtures.

#![allow(dead_code)]

use pulse_lib::agent::{RuntimeSampler, RuntimeStats};
use pulse_lib::core::{AgentConfig, AgentConfigBuilder, Result, ServerConfig};
use pulse_lib::metrics::{MemStorage, MetricsBackend};
use pulse_lib::server::MetricsServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A metrics server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub storage: Arc<MemStorage>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Base URL such as `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `host:port` form accepted by the agent.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

/// Start a server over a fresh in-memory store.
pub async fn spawn_server() -> TestServer {
    let storage = Arc::new(MemStorage::new());
    let server = MetricsServer::new(
        ServerConfig::default(),
        Arc::clone(&storage) as Arc<dyn MetricsBackend>,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { server.serve(listener, cancel).await })
    };

    TestServer {
        addr,
        storage,
        cancel,
        handle,
    }
}

/// Sampler returning fixed, recognizable statistics.
pub struct FakeSampler;

impl RuntimeSampler for FakeSampler {
    fn sample(&mut self) -> Result<RuntimeStats> {
        Ok(RuntimeStats {
            alloc: 4096,
            heap_sys: 65536,
            mallocs: 10,
            frees: 2,
            total_alloc: 8192,
            ..RuntimeStats::default()
        })
    }
}

/// Agent configuration pointing at `server` with millisecond intervals.
pub fn agent_config(server: &str, poll: Duration, report: Duration) -> AgentConfig {
    AgentConfigBuilder::new()
        .server_url(server)
        .poll_interval(poll)
        .report_interval(report)
        .http_timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

/// HTTP client for talking to a [`TestServer`].
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
