//! Report-tick transmission of the snapshot to the server.
//!
//! Every entry goes out as `POST {server}/update/{type}/{name}/{value}` with
//! an empty body. Gauges carry their latest reading. Counters carry the
//! increase since the value the server last acknowledged, since the server
//! adds what it receives; a failed send is folded into the next report.
//! Only a 200 advances the acknowledged total, so a request is never dropped
//! half way: cancellation is checked between entries.

use crate::core::{
    format_counter, format_gauge, AgentConfig, MetricKind, MetricValue, PulseError, Result,
};
use crate::metrics::Snapshot;
use parking_lot::{Mutex, RwLock};
use reqwest::{header, StatusCode, Url};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Outcome of one report tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// Entries the server answered with 200
    pub sent: usize,
    /// Entries that failed in transport or got another status
    pub failed: usize,
}

/// HTTP reporter shared by every report tick.
pub struct Reporter {
    client: reqwest::Client,
    base_url: Url,
    acked: Mutex<HashMap<String, i64>>,
    // held for a whole report so two reports never compute the same delta
    in_flight: tokio::sync::Mutex<()>,
}

impl Reporter {
    /// Build the client from the agent configuration.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.server_base_url()?,
            acked: Mutex::new(HashMap::new()),
            in_flight: tokio::sync::Mutex::new(()),
        })
    }

    /// Server base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Last counter total the server acknowledged
    pub fn acknowledged(&self, name: &str) -> Option<i64> {
        self.acked.lock().get(name).copied()
    }

    /// URL for one update, each segment percent-encoded.
    pub fn update_url(&self, kind: MetricKind, name: &str, value: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PulseError::config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["update", kind.as_str(), name, value]);
        Ok(url)
    }

    /// Send every entry of the snapshot once.
    ///
    /// Reports are serialized: a report started while another runs waits for
    /// it. The snapshot is copied under its read lock, so a concurrent poll
    /// waits only for the copy. Once `cancel` fires the request in flight
    /// completes (bounded by the HTTP timeout) and the remaining entries are
    /// skipped.
    pub async fn report(
        &self,
        snapshot: &RwLock<Snapshot>,
        cancel: &CancellationToken,
    ) -> ReportSummary {
        let _tick = self.in_flight.lock().await;
        let entries = snapshot.read().entries();
        let mut summary = ReportSummary::default();

        for (name, value) in entries {
            if cancel.is_cancelled() {
                tracing::debug!(skipped_from = %name, "report cut short by shutdown");
                break;
            }

            let result = match value {
                MetricValue::Gauge(v) => {
                    self.send(MetricKind::Gauge, &name, &format_gauge(v)).await
                },
                MetricValue::Counter(total) => self.send_counter(&name, total).await,
            };

            match result {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        metric = %name,
                        kind = %value.kind(),
                        error = %e,
                        category = e.category(),
                        retry_next_tick = e.is_recoverable(),
                        "failed to report metric"
                    );
                },
            }
        }

        summary
    }

    async fn send_counter(&self, name: &str, total: i64) -> Result<()> {
        let last = self.acknowledged(name).unwrap_or(0);
        let delta = total.wrapping_sub(last);

        self.send(MetricKind::Counter, name, &format_counter(delta)).await?;
        self.acked.lock().insert(name.to_string(), total);
        Ok(())
    }

    async fn send(&self, kind: MetricKind, name: &str, value: &str) -> Result<()> {
        let url = self.update_url(kind, name, value)?;
        let response = self
            .client
            .post(url.as_str())
            .header(header::CONTENT_TYPE, "text/plain")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PulseError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(())
    }
}
