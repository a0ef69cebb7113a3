//! The periodic metrics collector and health scoring.

use crate::queue::{TaskPriority, TaskQueue};
use crate::sampler::{SystemReading, SystemSampler};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Inputs to the health score.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthInputs {
    /// CPU utilisation percent.
    pub cpu_percent: f64,
    /// Memory utilisation percent.
    pub memory_percent: f64,
    /// Mean task response time, milliseconds.
    pub avg_response_ms: f64,
    /// Failed tasks over total tasks, 0..1.
    pub failure_rate: f64,
}

/// Compute a 0–100 health score. High CPU or memory, slow responses,
/// and failures each subtract from a perfect 100.
pub fn health_score(inputs: HealthInputs) -> f64 {
    let mut score = 100.0;
    if inputs.cpu_percent > 80.0 {
        score -= (inputs.cpu_percent - 80.0) * 1.5;
    }
    if inputs.memory_percent > 80.0 {
        score -= (inputs.memory_percent - 80.0) * 1.5;
    }
    if inputs.avg_response_ms > 1000.0 {
        score -= ((inputs.avg_response_ms - 1000.0) / 100.0).min(20.0);
    }
    score -= inputs.failure_rate.clamp(0.0, 1.0) * 50.0;
    score.clamp(0.0, 100.0)
}

/// One collected sample.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// System reading at collection time.
    pub system: SystemReading,
    /// Queue depth per priority.
    pub queue_depths: HashMap<TaskPriority, usize>,
    /// Active tasks per agent.
    pub active_tasks: HashMap<String, usize>,
    /// Custom collector values by name.
    pub custom: HashMap<String, f64>,
    /// Health score for this sample.
    pub health: f64,
}

type CustomCollector = Box<dyn Fn() -> f64 + Send + Sync>;

/// Collects a [`MetricsSnapshot`] every interval (30 s in production).
pub struct MetricsCollector {
    sampler: Arc<dyn SystemSampler>,
    queue: Arc<TaskQueue>,
    interval: Duration,
    custom: Mutex<HashMap<String, CustomCollector>>,
    latest: Mutex<Option<MetricsSnapshot>>,
    health_inputs: Mutex<HealthInputs>,
    running: AtomicBool,
    stop_signal: Notify,
}

impl MetricsCollector {
    /// A collector with the standard 30-second interval.
    pub fn new(sampler: Arc<dyn SystemSampler>, queue: Arc<TaskQueue>) -> Self {
        Self::with_interval(sampler, queue, Duration::from_secs(30))
    }

    /// A collector with a custom interval.
    pub fn with_interval(
        sampler: Arc<dyn SystemSampler>,
        queue: Arc<TaskQueue>,
        interval: Duration,
    ) -> Self {
        Self {
            sampler,
            queue,
            interval,
            custom: Mutex::new(HashMap::new()),
            latest: Mutex::new(None),
            health_inputs: Mutex::new(HealthInputs::default()),
            running: AtomicBool::new(false),
            stop_signal: Notify::new(),
        }
    }

    /// Register a custom collector. The closure signature is the
    /// validity check: it must be callable with no arguments.
    pub fn register_collector<F>(&self, name: impl Into<String>, collector: F)
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.custom
            .lock()
            .expect("collectors poisoned")
            .insert(name.into(), Box::new(collector));
    }

    /// Feed response-time/failure numbers into the next health score.
    pub fn report_workload(&self, avg_response_ms: f64, failure_rate: f64) {
        let mut inputs = self.health_inputs.lock().expect("inputs poisoned");
        inputs.avg_response_ms = avg_response_ms;
        inputs.failure_rate = failure_rate;
    }

    /// Take one sample immediately.
    pub fn collect_now(&self) -> MetricsSnapshot {
        let system = self.sampler.sample();

        let custom: HashMap<String, f64> = self
            .custom
            .lock()
            .expect("collectors poisoned")
            .iter()
            .map(|(name, collector)| (name.clone(), collector()))
            .collect();

        let health = {
            let mut inputs = self.health_inputs.lock().expect("inputs poisoned");
            inputs.cpu_percent = system.cpu_percent;
            inputs.memory_percent = system.memory_percent;
            health_score(*inputs)
        };
        if health < 70.0 {
            tracing::warn!(health, "system health degraded");
        }

        let snapshot = MetricsSnapshot {
            system,
            queue_depths: self.queue.depths(),
            active_tasks: self.queue.utilisation(),
            custom,
            health,
        };
        *self.latest.lock().expect("latest poisoned") = Some(snapshot.clone());
        snapshot
    }

    /// The most recent sample, if any was taken.
    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.latest.lock().expect("latest poisoned").clone()
    }

    /// Start the periodic collection loop. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let collector = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(collector.interval) => {
                        collector.collect_now();
                    }
                    _ = collector.stop_signal.notified() => break,
                }
            }
            tracing::debug!("metrics loop stopped");
        });
    }

    /// Stop the collection loop.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stop_signal.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{QueueStrategy, ScheduledTask};
    use crate::sampler::FixedSampler;
    use serde_json::json;

    #[test]
    fn perfect_system_scores_100() {
        assert_eq!(health_score(HealthInputs::default()), 100.0);
    }

    #[test]
    fn pressure_and_failures_reduce_the_score() {
        let score = health_score(HealthInputs {
            cpu_percent: 95.0,
            memory_percent: 50.0,
            avg_response_ms: 2500.0,
            failure_rate: 0.2,
        });
        // 100 - 22.5 (cpu) - 15 (latency) - 10 (failures) = 52.5
        assert!((score - 52.5).abs() < 1e-9);
    }

    #[test]
    fn score_is_clamped_to_the_unit_range() {
        let score = health_score(HealthInputs {
            cpu_percent: 100.0,
            memory_percent: 100.0,
            avg_response_ms: 60_000.0,
            failure_rate: 1.0,
        });
        assert_eq!(score, 0.0);
    }

    #[test]
    fn collect_now_merges_system_queue_and_custom_sources() {
        let sampler = Arc::new(FixedSampler(SystemReading {
            cpu_percent: 10.0,
            memory_percent: 40.0,
            disk_percent: 55.0,
            network_received: 1024,
        }));
        let queue = Arc::new(TaskQueue::new(QueueStrategy::Priority, 0));
        queue.enqueue(ScheduledTask::new(TaskPriority::High, json!("t")));

        let collector = MetricsCollector::new(sampler, Arc::clone(&queue));
        collector.register_collector("npc_pool_size", || 7.0);

        let snapshot = collector.collect_now();
        assert_eq!(snapshot.system.cpu_percent, 10.0);
        assert_eq!(snapshot.queue_depths[&TaskPriority::High], 1);
        assert_eq!(snapshot.custom["npc_pool_size"], 7.0);
        assert_eq!(snapshot.health, 100.0);
        assert!(collector.latest().is_some());
    }

    #[tokio::test]
    async fn loop_collects_and_stops() {
        let sampler = Arc::new(FixedSampler(SystemReading::default()));
        let queue = Arc::new(TaskQueue::new(QueueStrategy::Fifo, 0));
        let collector = Arc::new(MetricsCollector::with_interval(
            sampler,
            queue,
            Duration::from_millis(10),
        ));
        collector.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        collector.stop();
        assert!(collector.latest().is_some());
    }
}
