//! Metrics agent: polls its own process on one ticker and reports the
//! snapshot to the server on another.
//!
//! The two loops share nothing but the snapshot lock and the cancellation
//! token. Two polls never overlap and two reports never overlap, while a
//! poll and a report may run at the same time.

pub mod collector;
pub mod reporter;
pub mod runtime;

pub use collector::{Collector, POLL_COUNT, RANDOM_VALUE};
pub use reporter::{ReportSummary, Reporter};
pub use runtime::{
    allocator_counters, CountingAllocator, ProcessSampler, RuntimeSampler, RuntimeStats,
    RUNTIME_GAUGES,
};

use crate::core::{AgentConfig, PulseError, Result};
use crate::metrics::{SharedSnapshot, Snapshot};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle of an [`Agent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Created, loops not started
    Idle,
    /// Both loops ticking
    Running,
    /// Cancelled, waiting for the loops to return
    Draining,
    /// Both loops returned
    Stopped,
}

/// The agent process core.
pub struct Agent {
    config: AgentConfig,
    snapshot: SharedSnapshot,
    collector: Arc<Collector>,
    reporter: Arc<Reporter>,
    state: RwLock<AgentState>,
}

impl Agent {
    /// Agent sampling the current process.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let collector = Collector::new()?;
        Self::with_collector(config, collector)
    }

    /// Agent over a custom runtime sampler.
    pub fn with_sampler(config: AgentConfig, sampler: Box<dyn RuntimeSampler>) -> Result<Self> {
        Self::with_collector(config, Collector::with_sampler(sampler))
    }

    fn with_collector(config: AgentConfig, collector: Collector) -> Result<Self> {
        config.validate()?;
        let reporter = Reporter::new(&config)?;

        Ok(Self {
            config,
            snapshot: Snapshot::shared(),
            collector: Arc::new(collector),
            reporter: Arc::new(reporter),
            state: RwLock::new(AgentState::Idle),
        })
    }

    /// Configuration the agent was built with
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// Handle on the live snapshot
    pub fn shared_snapshot(&self) -> SharedSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Current lifecycle state
    pub fn state(&self) -> AgentState {
        *self.state.read()
    }

    /// Run one poll outside the tickers.
    pub fn poll_once(&self) -> Result<()> {
        self.collector.collect(&self.snapshot)
    }

    /// Run one report outside the tickers.
    pub async fn report_once(&self, cancel: &CancellationToken) -> ReportSummary {
        self.reporter.report(&self.snapshot, cancel).await
    }

    /// Run both loops until `cancel` fires, then wait for them to return.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != AgentState::Idle {
                return Err(PulseError::config(format!(
                    "agent cannot start from state {:?}",
                    *state
                )));
            }
            *state = AgentState::Running;
        }

        tracing::info!(
            server = %self.reporter.base_url(),
            poll_interval = ?self.config.poll_interval,
            report_interval = ?self.config.report_interval,
            "pulse agent started"
        );

        let poll = tokio::spawn(poll_loop(
            Arc::clone(&self.collector),
            Arc::clone(&self.snapshot),
            self.config.poll_interval,
            cancel.clone(),
        ));
        let report = tokio::spawn(report_loop(
            Arc::clone(&self.reporter),
            Arc::clone(&self.snapshot),
            self.config.report_interval,
            cancel.clone(),
        ));

        cancel.cancelled().await;
        *self.state.write() = AgentState::Draining;
        tracing::info!("shutdown requested, stopping agent loops");

        let (poll, report) = tokio::join!(poll, report);
        *self.state.write() = AgentState::Stopped;
        poll?;
        report?;

        tracing::info!("pulse agent stopped");
        Ok(())
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    // First tick one full period after start.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn poll_loop(
    collector: Arc<Collector>,
    snapshot: SharedSnapshot,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match collector.collect(&snapshot) {
                    Ok(()) => {
                        let polls = snapshot.read().counter(POLL_COUNT).unwrap_or_default();
                        tracing::debug!(poll_count = polls, "poll completed");
                    },
                    Err(e) => tracing::warn!(error = %e, "poll failed"),
                }
            }
        }
    }

    tracing::debug!("poll loop stopped");
}

async fn report_loop(
    reporter: Arc<Reporter>,
    snapshot: SharedSnapshot,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let summary = reporter.report(&snapshot, &cancel).await;
                tracing::debug!(sent = summary.sent, failed = summary.failed, "report completed");
            }
        }
    }

    tracing::debug!("report loop stopped");
}
