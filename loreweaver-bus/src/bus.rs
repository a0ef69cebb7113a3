//! The message bus implementation.

use crate::config::{BusConfig, BusError, OverflowPolicy};
use crate::redact::redact_secrets;
use chrono::Utc;
use loreweaver_types::{AgentId, AgentMessage, MessageType};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Predicate deciding whether a subscription accepts a message.
pub type MessageFilter = Arc<dyn Fn(&AgentMessage) -> bool + Send + Sync>;

/// What happened to a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Enqueued on the receiver's queue.
    Delivered,
    /// The receiver's subscriptions rejected the message type.
    Filtered,
    /// Enqueued, evicting the oldest queued message.
    DeliveredDroppingOldest,
    /// The queue was full and the policy discarded the new message.
    DroppedNew,
}

/// Counters exposed for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Messages enqueued onto any queue.
    pub messages_sent: u64,
    /// Messages handed to a receiver via `receive`.
    pub messages_delivered: u64,
    /// Messages dropped by the expiry sweep.
    pub messages_expired: u64,
    /// Broadcast operations performed.
    pub broadcast_count: u64,
}

/// Snapshot of one agent's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    /// Messages currently queued.
    pub size: usize,
    /// Queue capacity.
    pub capacity: usize,
}

struct Queue {
    messages: VecDeque<AgentMessage>,
    overflow: OverflowPolicy,
}

struct Subscription {
    types: HashSet<MessageType>,
    filter: Option<MessageFilter>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, Queue>,
    subscriptions: HashMap<String, Vec<Subscription>>,
    history: VecDeque<AgentMessage>,
    stats: BusStats,
}

/// The inter-agent message bus. Cheap to share via `Arc`.
pub struct MessageBus {
    config: BusConfig,
    inner: Mutex<Inner>,
    shutdown: Notify,
    running: AtomicBool,
}

impl MessageBus {
    /// A bus with the given configuration and no registered agents.
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
            shutdown: Notify::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Register an agent with the default overflow policy.
    pub fn register(&self, agent_id: &AgentId) {
        self.register_with_policy(agent_id, self.config.default_overflow);
    }

    /// Register an agent with an explicit overflow policy. Registering
    /// an already-known agent is a no-op.
    pub fn register_with_policy(&self, agent_id: &AgentId, overflow: OverflowPolicy) {
        let mut inner = self.inner.lock().expect("bus state poisoned");
        inner
            .queues
            .entry(agent_id.as_str().to_string())
            .or_insert_with(|| Queue {
                messages: VecDeque::new(),
                overflow,
            });
        tracing::debug!(agent = %agent_id, "agent registered on bus");
    }

    /// Unregister an agent, destroying its queue and subscriptions.
    pub fn unregister(&self, agent_id: &AgentId) {
        let mut inner = self.inner.lock().expect("bus state poisoned");
        inner.queues.remove(agent_id.as_str());
        inner.subscriptions.remove(agent_id.as_str());
        tracing::debug!(agent = %agent_id, "agent unregistered from bus");
    }

    /// Whether an agent is currently registered.
    pub fn is_registered(&self, agent_id: &AgentId) -> bool {
        self.inner
            .lock()
            .expect("bus state poisoned")
            .queues
            .contains_key(agent_id.as_str())
    }

    /// Send a message, filling `timestamp` and `correlation_id` when
    /// absent. Broadcast-addressed messages fan out to every agent
    /// except the sender.
    pub async fn send(&self, mut message: AgentMessage) -> Result<SendOutcome, BusError> {
        stamp(&mut message);

        if message.is_broadcast() {
            self.broadcast(message, &[]).await?;
            return Ok(SendOutcome::Delivered);
        }

        let receiver = message.receiver_id.as_str().to_string();
        loop {
            let outcome = {
                let mut inner = self.inner.lock().expect("bus state poisoned");
                if !inner.queues.contains_key(&receiver) {
                    return Err(BusError::UnknownReceiver(receiver));
                }
                if !subscription_allows(&inner, &receiver, &message) {
                    return Ok(SendOutcome::Filtered);
                }
                try_enqueue(&mut inner, &self.config, &receiver, message.clone())
            };
            match outcome {
                EnqueueOutcome::Stored(result) => return Ok(result),
                EnqueueOutcome::QueueFull => {
                    // Block policy: wait for room without holding the lock.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    /// Deliver a per-receiver copy to every registered agent except
    /// the sender and the `exclude` set.
    pub async fn broadcast(
        &self,
        mut message: AgentMessage,
        exclude: &[AgentId],
    ) -> Result<usize, BusError> {
        stamp(&mut message);

        let receivers: Vec<String> = {
            let inner = self.inner.lock().expect("bus state poisoned");
            let excluded: HashSet<&str> = exclude
                .iter()
                .map(AgentId::as_str)
                .chain(std::iter::once(message.sender_id.as_str()))
                .collect();
            inner
                .queues
                .keys()
                .filter(|id| !excluded.contains(id.as_str()))
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        for receiver in receivers {
            let mut copy = message.clone();
            copy.receiver_id = AgentId::new(receiver.clone());
            let outcome = {
                let mut inner = self.inner.lock().expect("bus state poisoned");
                if !inner.queues.contains_key(&receiver) {
                    continue; // unregistered between snapshot and delivery
                }
                if !subscription_allows(&inner, &receiver, &copy) {
                    continue;
                }
                try_enqueue(&mut inner, &self.config, &receiver, copy)
            };
            match outcome {
                EnqueueOutcome::Stored(SendOutcome::DroppedNew) => {}
                EnqueueOutcome::Stored(_) => delivered += 1,
                // Broadcast never blocks on one slow receiver.
                EnqueueOutcome::QueueFull => {}
            }
        }

        let mut inner = self.inner.lock().expect("bus state poisoned");
        inner.stats.broadcast_count += 1;
        tracing::debug!(sender = %message.sender_id, delivered, "broadcast complete");
        Ok(delivered)
    }

    /// Receive the next message for an agent, waiting up to `timeout`.
    ///
    /// Polls cooperatively at 100 ms granularity; per-receiver FIFO
    /// order is preserved.
    pub async fn receive(
        &self,
        agent_id: &AgentId,
        timeout: Duration,
    ) -> Result<Option<AgentMessage>, BusError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock().expect("bus state poisoned");
                let queue = inner
                    .queues
                    .get_mut(agent_id.as_str())
                    .ok_or_else(|| BusError::NotRegistered(agent_id.to_string()))?;
                if let Some(message) = queue.messages.pop_front() {
                    inner.stats.messages_delivered += 1;
                    return Ok(Some(message));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(100).min(timeout)).await;
        }
    }

    /// Subscribe an agent to a set of message types with an optional
    /// predicate. An agent with at least one subscription only
    /// receives messages some subscription accepts.
    pub fn subscribe(
        &self,
        agent_id: &AgentId,
        types: &[MessageType],
        filter: Option<MessageFilter>,
    ) {
        let mut inner = self.inner.lock().expect("bus state poisoned");
        inner
            .subscriptions
            .entry(agent_id.as_str().to_string())
            .or_default()
            .push(Subscription {
                types: types.iter().copied().collect(),
                filter,
            });
    }

    /// Drop subscriptions. With `types = None` every subscription for
    /// the agent is removed; otherwise the named types are removed
    /// from each subscription, discarding subscriptions left empty.
    pub fn unsubscribe(&self, agent_id: &AgentId, types: Option<&[MessageType]>) {
        let mut inner = self.inner.lock().expect("bus state poisoned");
        match types {
            None => {
                inner.subscriptions.remove(agent_id.as_str());
            }
            Some(types) => {
                let removed: HashSet<MessageType> = types.iter().copied().collect();
                if let Some(subs) = inner.subscriptions.get_mut(agent_id.as_str()) {
                    for sub in subs.iter_mut() {
                        sub.types.retain(|t| !removed.contains(t));
                    }
                    subs.retain(|sub| !sub.types.is_empty());
                }
            }
        }
    }

    /// Query recorded history, newest first, optionally filtered by
    /// participant and message type.
    pub fn history(
        &self,
        agent_id: Option<&AgentId>,
        message_type: Option<MessageType>,
        limit: usize,
    ) -> Vec<AgentMessage> {
        let inner = self.inner.lock().expect("bus state poisoned");
        inner
            .history
            .iter()
            .rev()
            .filter(|m| {
                agent_id.is_none_or(|id| {
                    m.sender_id.as_str() == id.as_str() || m.receiver_id.as_str() == id.as_str()
                })
            })
            .filter(|m| message_type.is_none_or(|t| m.message_type == t))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> BusStats {
        self.inner.lock().expect("bus state poisoned").stats
    }

    /// Queue snapshot for one agent.
    pub fn queue_status(&self, agent_id: &AgentId) -> Option<QueueStatus> {
        let inner = self.inner.lock().expect("bus state poisoned");
        inner.queues.get(agent_id.as_str()).map(|q| QueueStatus {
            size: q.messages.len(),
            capacity: self.config.max_queue_size,
        })
    }

    /// Start the background cleanup loop (sweeps every 60 s). Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(60)) => {
                        let expired = bus.sweep_expired();
                        if expired > 0 {
                            tracing::debug!(expired, "swept expired messages");
                        }
                    }
                    _ = bus.shutdown.notified() => break,
                }
            }
            tracing::debug!("bus cleanup loop stopped");
        });
    }

    /// Stop the cleanup loop. Queued messages stay queued.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.shutdown.notify_waiters();
        }
    }

    /// Drop every queued message older than the configured timeout.
    /// The background loop calls this once per minute; callers may
    /// invoke it directly.
    pub fn sweep_expired(&self) -> u64 {
        let cutoff = Utc::now()
            - chrono::TimeDelta::from_std(self.config.message_timeout)
                .unwrap_or(chrono::TimeDelta::zero());
        let mut inner = self.inner.lock().expect("bus state poisoned");
        let mut expired = 0;
        for queue in inner.queues.values_mut() {
            // Queues are in arrival order: stop at the first fresh message.
            while let Some(front) = queue.messages.front() {
                let stale = front.timestamp.map(|t| t < cutoff).unwrap_or(false);
                if stale {
                    queue.messages.pop_front();
                    expired += 1;
                } else {
                    break;
                }
            }
        }
        inner.stats.messages_expired += expired;
        expired
    }
}

enum EnqueueOutcome {
    Stored(SendOutcome),
    /// Block policy with a full queue: caller should wait and retry.
    QueueFull,
}

fn try_enqueue(
    inner: &mut Inner,
    config: &BusConfig,
    receiver: &str,
    message: AgentMessage,
) -> EnqueueOutcome {
    let record_history = config.enable_history;
    let sanitize = config.sanitize_history;
    let history_capacity = config.history_capacity;

    let queue = inner
        .queues
        .get_mut(receiver)
        .expect("caller checked registration");

    let outcome = if queue.messages.len() >= config.max_queue_size {
        match queue.overflow {
            OverflowPolicy::Block => return EnqueueOutcome::QueueFull,
            OverflowPolicy::DropNew => {
                tracing::warn!(receiver, "queue full, dropping new message");
                return EnqueueOutcome::Stored(SendOutcome::DroppedNew);
            }
            OverflowPolicy::DropOldest => {
                queue.messages.pop_front();
                queue.messages.push_back(message.clone());
                SendOutcome::DeliveredDroppingOldest
            }
        }
    } else {
        queue.messages.push_back(message.clone());
        SendOutcome::Delivered
    };

    inner.stats.messages_sent += 1;
    if record_history {
        let stored = if sanitize {
            sanitize_message(&message)
        } else {
            message
        };
        inner.history.push_back(stored);
        while inner.history.len() > history_capacity {
            inner.history.pop_front();
        }
    }
    EnqueueOutcome::Stored(outcome)
}

fn subscription_allows(inner: &Inner, receiver: &str, message: &AgentMessage) -> bool {
    match inner.subscriptions.get(receiver) {
        // No subscriptions: everything is accepted.
        None => true,
        Some(subs) if subs.is_empty() => true,
        Some(subs) => subs.iter().any(|sub| {
            sub.types.contains(&message.message_type)
                && sub.filter.as_ref().is_none_or(|f| f(message))
        }),
    }
}

fn stamp(message: &mut AgentMessage) {
    if message.timestamp.is_none() {
        message.timestamp = Some(Utc::now());
    }
    if message.correlation_id.is_none() {
        message.correlation_id = Some(uuid::Uuid::new_v4().to_string());
    }
}

fn sanitize_message(message: &AgentMessage) -> AgentMessage {
    let mut stored = message.clone();
    if let serde_json::Value::String(text) = &stored.content {
        stored.content = serde_json::Value::String(redact_secrets(text));
    }
    stored
}
