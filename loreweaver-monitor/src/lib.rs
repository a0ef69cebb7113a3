#![deny(missing_docs)]
//! # loreweaver-monitor — task queues and system metrics
//!
//! The [`TaskQueue`] schedules work under four strategies: plain FIFO,
//! strict priority, load-balanced (tasks stamped with the least-busy
//! agent at enqueue), and adaptive (priority under CPU pressure, load-
//! balanced otherwise, read from a 5-second-cached CPU gauge). Failed
//! tasks re-enqueue until their retry budget runs out.
//!
//! The [`MetricsCollector`] samples the system every 30 seconds
//! through a [`SystemSampler`] — `sysinfo` in production, fixed
//! readings in tests — and computes a health score; scores under 70
//! emit a warning.

mod metrics;
mod queue;
mod sampler;

pub use metrics::{health_score, HealthInputs, MetricsCollector, MetricsSnapshot};
pub use queue::{QueueStrategy, ScheduledTask, TaskPriority, TaskQueue};
pub use sampler::{CpuGauge, FixedSampler, SysinfoSampler, SystemReading, SystemSampler};
