//! OS resource sampling for backpressure decisions
//!
//! Wraps `sysinfo` with refresh caching so the hot enqueue/processing paths
//! never hit the OS more than once per refresh interval. CPU utilization is
//! delta-based: the first reading after startup reports 0 until a second
//! refresh has happened.

use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::debug;

#[derive(Debug)]
pub struct ResourceSampler {
    system: System,
    refresh_interval: Duration,
    last_refresh: Instant,
    memory: f64,
    cpu: f64,
}

impl ResourceSampler {
    pub fn new(refresh_interval: Duration) -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_usage();

        let memory = Self::memory_ratio(&system);
        debug!(
            total_mb = system.total_memory() / (1024 * 1024),
            "resource sampler initialized"
        );

        Self {
            system,
            refresh_interval,
            last_refresh: Instant::now(),
            memory,
            cpu: 0.0,
        }
    }

    /// Host memory utilization in `[0, 1]`.
    pub fn memory_usage(&mut self) -> f64 {
        self.refresh_if_stale();
        self.memory
    }

    /// Host CPU utilization in `[0, 1]`.
    pub fn cpu_usage(&mut self) -> f64 {
        self.refresh_if_stale();
        self.cpu
    }

    fn refresh_if_stale(&mut self) {
        if self.last_refresh.elapsed() < self.refresh_interval {
            return;
        }
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();
        self.memory = Self::memory_ratio(&self.system);
        self.cpu = (self.system.global_cpu_usage() as f64 / 100.0).clamp(0.0, 1.0);
        self.last_refresh = Instant::now();
    }

    fn memory_ratio(system: &System) -> f64 {
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        (system.used_memory() as f64 / total as f64).clamp(0.0, 1.0)
    }
}
