//! Priority task queues with four scheduling strategies.

use loreweaver_types::{AgentId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Task urgency, lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Normal work.
    #[default]
    Normal,
    /// Urgent work.
    High,
    /// Drop-everything work.
    Critical,
}

impl TaskPriority {
    /// All priorities, highest first.
    pub const DESCENDING: [TaskPriority; 4] = [
        TaskPriority::Critical,
        TaskPriority::High,
        TaskPriority::Normal,
        TaskPriority::Low,
    ];

    fn index(self) -> usize {
        match self {
            TaskPriority::Low => 0,
            TaskPriority::Normal => 1,
            TaskPriority::High => 2,
            TaskPriority::Critical => 3,
        }
    }
}

/// One schedulable unit of work.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    /// Unique task id.
    pub task_id: TaskId,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Opaque payload.
    pub payload: serde_json::Value,
    /// Retries consumed so far.
    pub retries: u32,
    /// Agent stamped by the load balancer, if any.
    pub assigned_agent: Option<AgentId>,
}

impl ScheduledTask {
    /// A task with a fresh id and zero retries.
    pub fn new(priority: TaskPriority, payload: serde_json::Value) -> Self {
        Self {
            task_id: TaskId::fresh(),
            priority,
            payload,
            retries: 0,
            assigned_agent: None,
        }
    }
}

/// How the queue orders and assigns work.
pub enum QueueStrategy {
    /// Arrival order, priorities ignored.
    Fifo,
    /// Strict priority, highest first, FIFO within a level.
    Priority,
    /// Priority order plus least-utilised-agent stamping at enqueue.
    LoadBalance,
    /// Priority when the CPU gauge reads above 80%, LoadBalance
    /// otherwise.
    Adaptive {
        /// Returns the current cached CPU percentage.
        cpu_gauge: Box<dyn Fn() -> f64 + Send + Sync>,
    },
}

struct Inner {
    /// One FIFO lane per priority level (index = priority).
    lanes: [VecDeque<ScheduledTask>; 4],
    /// Single lane for the Fifo strategy.
    arrival: VecDeque<ScheduledTask>,
    /// Active task count per agent, fed by task_started/task_finished.
    utilisation: HashMap<String, usize>,
}

/// A task queue with a pluggable strategy and a retry contract.
pub struct TaskQueue {
    strategy: QueueStrategy,
    max_retries: u32,
    inner: Mutex<Inner>,
}

impl TaskQueue {
    /// A queue with the given strategy and retry budget.
    pub fn new(strategy: QueueStrategy, max_retries: u32) -> Self {
        Self {
            strategy,
            max_retries,
            inner: Mutex::new(Inner {
                lanes: Default::default(),
                arrival: VecDeque::new(),
                utilisation: HashMap::new(),
            }),
        }
    }

    /// Register an agent with the load balancer.
    pub fn register_agent(&self, agent_id: &AgentId) {
        let mut inner = self.inner.lock().expect("queue poisoned");
        inner
            .utilisation
            .entry(agent_id.as_str().to_string())
            .or_insert(0);
    }

    /// Record that an agent picked up a task.
    pub fn task_started(&self, agent_id: &AgentId) {
        let mut inner = self.inner.lock().expect("queue poisoned");
        *inner
            .utilisation
            .entry(agent_id.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Record that an agent finished a task.
    pub fn task_finished(&self, agent_id: &AgentId) {
        let mut inner = self.inner.lock().expect("queue poisoned");
        if let Some(count) = inner.utilisation.get_mut(agent_id.as_str()) {
            *count = count.saturating_sub(1);
        }
    }

    /// Add a task. Under load balancing (and adaptive when calm) the
    /// task is stamped with the least-utilised registered agent.
    pub fn enqueue(&self, mut task: ScheduledTask) {
        let balance = match &self.strategy {
            QueueStrategy::LoadBalance => true,
            QueueStrategy::Adaptive { cpu_gauge } => cpu_gauge() <= 80.0,
            _ => false,
        };
        let mut inner = self.inner.lock().expect("queue poisoned");
        if balance {
            task.assigned_agent = inner
                .utilisation
                .iter()
                .min_by_key(|(agent, count)| (**count, agent.as_str().to_string()))
                .map(|(agent, _)| AgentId::new(agent.clone()));
        }
        match self.strategy {
            QueueStrategy::Fifo => inner.arrival.push_back(task),
            _ => {
                let lane = task.priority.index();
                inner.lanes[lane].push_back(task);
            }
        }
    }

    /// Take the next task per the strategy, or None when empty.
    pub fn dequeue(&self) -> Option<ScheduledTask> {
        let mut inner = self.inner.lock().expect("queue poisoned");
        match self.strategy {
            QueueStrategy::Fifo => inner.arrival.pop_front(),
            _ => TaskPriority::DESCENDING
                .iter()
                .find_map(|p| inner.lanes[p.index()].pop_front()),
        }
    }

    /// Record a task failure. The task re-enqueues with its retry
    /// count bumped until `max_retries`, after which it is dropped.
    pub fn fail(&self, mut task: ScheduledTask, error: &str) {
        task.retries += 1;
        if task.retries > self.max_retries {
            tracing::warn!(
                task = %task.task_id,
                retries = task.retries,
                error,
                "task dropped after exhausting retries"
            );
            return;
        }
        tracing::debug!(task = %task.task_id, retries = task.retries, error, "task re-enqueued");
        self.enqueue(task);
    }

    /// Queue depth per priority level (Fifo reports everything under
    /// Normal).
    pub fn depths(&self) -> HashMap<TaskPriority, usize> {
        let inner = self.inner.lock().expect("queue poisoned");
        match self.strategy {
            QueueStrategy::Fifo => {
                [(TaskPriority::Normal, inner.arrival.len())].into_iter().collect()
            }
            _ => TaskPriority::DESCENDING
                .iter()
                .map(|p| (*p, inner.lanes[p.index()].len()))
                .collect(),
        }
    }

    /// Current per-agent active-task counts.
    pub fn utilisation(&self) -> HashMap<String, usize> {
        self.inner.lock().expect("queue poisoned").utilisation.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(priority: TaskPriority, label: &str) -> ScheduledTask {
        ScheduledTask::new(priority, json!(label))
    }

    #[test]
    fn fifo_ignores_priority() {
        let queue = TaskQueue::new(QueueStrategy::Fifo, 0);
        queue.enqueue(task(TaskPriority::Low, "first"));
        queue.enqueue(task(TaskPriority::Critical, "second"));
        assert_eq!(queue.dequeue().unwrap().payload, json!("first"));
        assert_eq!(queue.dequeue().unwrap().payload, json!("second"));
    }

    #[test]
    fn priority_takes_highest_first_fifo_within_level() {
        let queue = TaskQueue::new(QueueStrategy::Priority, 0);
        queue.enqueue(task(TaskPriority::Normal, "n1"));
        queue.enqueue(task(TaskPriority::Critical, "c1"));
        queue.enqueue(task(TaskPriority::Normal, "n2"));
        queue.enqueue(task(TaskPriority::High, "h1"));

        let order: Vec<_> = std::iter::from_fn(|| queue.dequeue())
            .map(|t| t.payload)
            .collect();
        assert_eq!(order, vec![json!("c1"), json!("h1"), json!("n1"), json!("n2")]);
    }

    #[test]
    fn load_balance_stamps_the_least_busy_agent() {
        let queue = TaskQueue::new(QueueStrategy::LoadBalance, 0);
        queue.register_agent(&AgentId::new("busy"));
        queue.register_agent(&AgentId::new("idle"));
        queue.task_started(&AgentId::new("busy"));
        queue.task_started(&AgentId::new("busy"));

        queue.enqueue(task(TaskPriority::Normal, "work"));
        let dequeued = queue.dequeue().unwrap();
        assert_eq!(dequeued.assigned_agent, Some(AgentId::new("idle")));
    }

    #[test]
    fn adaptive_switches_on_the_cpu_gauge() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let cpu = Arc::new(AtomicU64::new(20));
        let gauge_cpu = Arc::clone(&cpu);
        let queue = TaskQueue::new(
            QueueStrategy::Adaptive {
                cpu_gauge: Box::new(move || gauge_cpu.load(Ordering::SeqCst) as f64),
            },
            0,
        );
        queue.register_agent(&AgentId::new("a"));

        // Calm: behaves like LoadBalance, so the task gets stamped.
        queue.enqueue(task(TaskPriority::Normal, "calm"));
        assert!(queue.dequeue().unwrap().assigned_agent.is_some());

        // Pressure: behaves like Priority, no stamping.
        cpu.store(95, Ordering::SeqCst);
        queue.enqueue(task(TaskPriority::Normal, "pressured"));
        assert!(queue.dequeue().unwrap().assigned_agent.is_none());
    }

    #[test]
    fn failed_tasks_retry_until_the_budget_runs_out() {
        let queue = TaskQueue::new(QueueStrategy::Priority, 2);
        queue.enqueue(task(TaskPriority::Normal, "flaky"));

        let mut seen = 0;
        while let Some(t) = queue.dequeue() {
            seen += 1;
            queue.fail(t, "simulated failure");
        }
        // Original attempt + two retries.
        assert_eq!(seen, 3);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn depths_report_per_priority() {
        let queue = TaskQueue::new(QueueStrategy::Priority, 0);
        queue.enqueue(task(TaskPriority::High, "h"));
        queue.enqueue(task(TaskPriority::High, "h"));
        queue.enqueue(task(TaskPriority::Low, "l"));
        let depths = queue.depths();
        assert_eq!(depths[&TaskPriority::High], 2);
        assert_eq!(depths[&TaskPriority::Low], 1);
        assert_eq!(depths[&TaskPriority::Critical], 0);
    }
}
