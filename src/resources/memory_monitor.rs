//! Advisory memory monitor
//!
//! Periodically samples process RSS and host memory, raising alerts through a
//! configured callback when static thresholds are exceeded or when the
//! sliding-window growth heuristic suggests a leak. Entirely advisory: the
//! monitor never feeds back into queue behavior.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{get_current_pid, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const BYTES_PER_MIB: f64 = (1024 * 1024) as f64;

#[derive(Debug, Clone)]
pub struct MemoryMonitorConfig {
    /// Sampling interval.
    pub interval: Duration,
    /// Host memory ratio above which a high-usage alert fires.
    pub high_usage_ratio: f64,
    /// Minimum spacing between high-usage alerts.
    pub high_usage_throttle: Duration,
    /// Trailing samples considered by the leak heuristic.
    pub leak_window: usize,
    /// RSS growth below this is never flagged as a leak.
    pub min_growth_mb: f64,
}

impl Default for MemoryMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            high_usage_ratio: 0.8,
            high_usage_throttle: Duration::from_secs(30),
            leak_window: 6,
            min_growth_mb: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAlertKind {
    HighUsage,
    LeakSuspected,
}

#[derive(Debug, Clone)]
pub struct MemoryAlert {
    pub kind: MemoryAlertKind,
    pub message: String,
    /// Host memory utilization at alert time.
    pub used_ratio: f64,
    /// Process resident set size at alert time.
    pub rss_mb: f64,
    /// RSS growth over the window; zero for threshold alerts.
    pub growth_mb: f64,
}

pub type AlertCallback = Arc<dyn Fn(MemoryAlert) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    pub at: Instant,
    pub rss_bytes: u64,
    pub used_ratio: f64,
}

#[derive(Debug)]
struct MonitorState {
    samples: VecDeque<MemorySample>,
    last_high_usage_alert: Option<Instant>,
}

pub struct MemoryMonitor {
    config: MemoryMonitorConfig,
    callback: AlertCallback,
    state: Arc<Mutex<MonitorState>>,
    task: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    pub fn new(config: MemoryMonitorConfig, callback: AlertCallback) -> Self {
        Self {
            config,
            callback,
            state: Arc::new(Mutex::new(MonitorState {
                samples: VecDeque::new(),
                last_high_usage_alert: None,
            })),
            task: None,
        }
    }

    /// Start the background sampling task. Idempotent while running.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let config = self.config.clone();
        let callback = Arc::clone(&self.callback);
        let state = Arc::clone(&self.state);

        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval);
            let mut system = System::new();
            loop {
                interval.tick().await;
                let Some(sample) = take_sample(&mut system) else {
                    continue;
                };
                let alerts = {
                    let mut state = state.lock();
                    record_sample(&mut state, sample, &config, Instant::now())
                };
                for alert in alerts {
                    warn!(kind = ?alert.kind, rss_mb = alert.rss_mb, "memory alert: {}", alert.message);
                    callback(alert);
                }
            }
        }));
        info!(interval = ?self.config.interval, "memory monitor started");
    }

    /// Stop sampling; already-raised alerts are unaffected.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("memory monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Most recent samples, oldest first.
    pub fn samples(&self) -> Vec<MemorySample> {
        self.state.lock().samples.iter().copied().collect()
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn take_sample(system: &mut System) -> Option<MemorySample> {
    system.refresh_memory();
    let pid = get_current_pid().ok()?;
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    let rss_bytes = system.process(pid)?.memory();
    let total = system.total_memory();
    let used_ratio = if total == 0 {
        0.0
    } else {
        system.used_memory() as f64 / total as f64
    };
    Some(MemorySample {
        at: Instant::now(),
        rss_bytes,
        used_ratio,
    })
}

/// Record a sample into the window and evaluate alert conditions.
///
/// Split out from the sampling task so the heuristics are testable with
/// synthetic samples.
fn record_sample(
    state: &mut MonitorState,
    sample: MemorySample,
    config: &MemoryMonitorConfig,
    now: Instant,
) -> Vec<MemoryAlert> {
    state.samples.push_back(sample);
    while state.samples.len() > config.leak_window {
        state.samples.pop_front();
    }

    let mut alerts = Vec::new();
    let rss_mb = sample.rss_bytes as f64 / BYTES_PER_MIB;

    if sample.used_ratio > config.high_usage_ratio {
        let throttled = state
            .last_high_usage_alert
            .map(|at| now.duration_since(at) < config.high_usage_throttle)
            .unwrap_or(false);
        if throttled {
            debug!(used_ratio = sample.used_ratio, "high-usage alert throttled");
        } else {
            state.last_high_usage_alert = Some(now);
            alerts.push(MemoryAlert {
                kind: MemoryAlertKind::HighUsage,
                message: format!(
                    "host memory usage {:.1}% exceeds {:.1}%",
                    sample.used_ratio * 100.0,
                    config.high_usage_ratio * 100.0
                ),
                used_ratio: sample.used_ratio,
                rss_mb,
                growth_mb: 0.0,
            });
        }
    }

    if state.samples.len() >= config.leak_window {
        if let Some((growth_mb, growth_percent)) = window_growth(&state.samples) {
            if growth_mb > config.min_growth_mb && growth_percent > 10.0 {
                alerts.push(MemoryAlert {
                    kind: MemoryAlertKind::LeakSuspected,
                    message: format!(
                        "rss grew {growth_mb:.1} MiB ({growth_percent:.1}%) over the last {} samples",
                        state.samples.len()
                    ),
                    used_ratio: sample.used_ratio,
                    rss_mb,
                    growth_mb,
                });
            }
        }
    }

    alerts
}

fn window_growth(samples: &VecDeque<MemorySample>) -> Option<(f64, f64)> {
    let first = samples.front()?;
    let last = samples.back()?;
    if first.rss_bytes == 0 || last.rss_bytes <= first.rss_bytes {
        return None;
    }
    let growth_bytes = last.rss_bytes - first.rss_bytes;
    let growth_mb = growth_bytes as f64 / BYTES_PER_MIB;
    let growth_percent = growth_bytes as f64 / first.rss_bytes as f64 * 100.0;
    Some((growth_mb, growth_percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rss_mb: u64, used_ratio: f64) -> MemorySample {
        MemorySample {
            at: Instant::now(),
            rss_bytes: rss_mb * 1024 * 1024,
            used_ratio,
        }
    }

    fn state() -> MonitorState {
        MonitorState {
            samples: VecDeque::new(),
            last_high_usage_alert: None,
        }
    }

    #[test]
    fn high_usage_alert_fires_and_throttles() {
        let config = MemoryMonitorConfig::default();
        let mut state = state();
        let now = Instant::now();

        let alerts = record_sample(&mut state, sample(100, 0.9), &config, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, MemoryAlertKind::HighUsage);

        // Second breach inside the throttle window stays silent.
        let alerts = record_sample(&mut state, sample(100, 0.95), &config, now);
        assert!(alerts.is_empty());

        // After the throttle window it fires again.
        let later = now + config.high_usage_throttle + Duration::from_secs(1);
        let alerts = record_sample(&mut state, sample(100, 0.95), &config, later);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn leak_detected_when_growth_exceeds_both_bounds() {
        let config = MemoryMonitorConfig {
            leak_window: 3,
            min_growth_mb: 50.0,
            ..Default::default()
        };
        let mut state = state();
        let now = Instant::now();

        for rss in [400, 450, 500] {
            let _ = record_sample(&mut state, sample(rss, 0.5), &config, now);
        }
        let alerts = record_sample(&mut state, sample(520, 0.5), &config, now);
        // Window is [450, 500, 520]: +70 MiB and +15.5% over the window.
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, MemoryAlertKind::LeakSuspected);
        assert!(alerts[0].growth_mb > 50.0);
    }

    #[test]
    fn small_or_relative_growth_is_not_a_leak() {
        let config = MemoryMonitorConfig {
            leak_window: 3,
            min_growth_mb: 50.0,
            ..Default::default()
        };

        // Absolute growth above the floor but under 10% relative.
        let mut s = state();
        let now = Instant::now();
        for rss in [1000, 1030, 1060] {
            let alerts = record_sample(&mut s, sample(rss, 0.5), &config, now);
            assert!(alerts.is_empty());
        }

        // Relative growth high but under the absolute floor.
        let mut s = state();
        for rss in [100, 110, 120] {
            let alerts = record_sample(&mut s, sample(rss, 0.5), &config, now);
            assert!(alerts.is_empty());
        }
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let callback: AlertCallback = Arc::new(|_| {});
        let mut monitor = MemoryMonitor::new(MemoryMonitorConfig::default(), callback);
        assert!(!monitor.is_running());
        monitor.start();
        assert!(monitor.is_running());
        monitor.start(); // idempotent
        monitor.stop();
        assert!(!monitor.is_running());
    }
}
