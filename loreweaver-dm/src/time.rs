//! The per-session game clock and the pluggable event-rule engine.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use loreweaver_store::{GameRecord, GameRecordKind, GameRecordRepository};
use loreweaver_types::{DurationSecs, GameEvent, RuleId, SessionId};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A time-driven or condition-driven event rule.
///
/// Rules keep their own per-session state (last trigger times,
/// already-fired flags) behind interior mutability; the manager calls
/// them from a single iteration, highest priority first.
#[async_trait]
pub trait EventRule: Send + Sync {
    /// Stable rule id.
    fn rule_id(&self) -> &RuleId;

    /// Display name for logs.
    fn name(&self) -> &str;

    /// Iteration order: higher fires first.
    fn priority(&self) -> i32;

    /// Whether the rule fires for this advancement.
    async fn should_trigger(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
        delta: DurationSecs,
    ) -> bool;

    /// Fire the rule, producing the event.
    async fn execute(&self, session_id: &SessionId) -> GameEvent;

    /// Clear any per-session state (called on session cleanup).
    fn reset_session(&self, _session_id: &SessionId) {}
}

/// Fires every `interval` of game time (spell-slot recovery and kin).
pub struct PeriodicRule {
    rule_id: RuleId,
    name: String,
    priority: i32,
    interval: DurationSecs,
    event_type: String,
    description: String,
    effects: HashMap<String, serde_json::Value>,
    last_trigger: Mutex<HashMap<String, DateTime<Utc>>>,
    /// Game time observed by the should_trigger that said yes; execute
    /// moves it into last_trigger.
    pending: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl PeriodicRule {
    /// A periodic rule firing every `interval`.
    pub fn new(
        rule_id: RuleId,
        name: impl Into<String>,
        interval: DurationSecs,
        event_type: impl Into<String>,
        description: impl Into<String>,
        effects: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            rule_id,
            name: name.into(),
            priority: 10,
            interval,
            event_type: event_type.into(),
            description: description.into(),
            effects,
            last_trigger: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The standard spell-slot recovery rule: full recovery every
    /// eight in-game hours.
    pub fn spell_recovery(rule_id: RuleId) -> Self {
        let mut effects = HashMap::new();
        effects.insert("recovery_percentage".to_string(), json!(1.0));
        effects.insert("recovery_interval_hours".to_string(), json!(8));
        Self::new(
            rule_id,
            "spell slot recovery",
            DurationSecs::from_hours(8),
            "spell_slot_recovery",
            "Spell slots recover after a long rest.",
            effects,
        )
    }
}

#[async_trait]
impl EventRule for PeriodicRule {
    fn rule_id(&self) -> &RuleId {
        &self.rule_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn should_trigger(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
        _delta: DurationSecs,
    ) -> bool {
        let fire = {
            let last = self.last_trigger.lock().expect("rule state poisoned");
            match last.get(session_id.as_str()) {
                Some(previous) => now - *previous >= self.interval.to_delta(),
                // Never fired: anchor the interval at this first check.
                None => {
                    drop(last);
                    self.mark_triggered(session_id, now);
                    false
                }
            }
        };
        if fire {
            self.pending
                .lock()
                .expect("rule state poisoned")
                .insert(session_id.as_str().to_string(), now);
        }
        fire
    }

    async fn execute(&self, session_id: &SessionId) -> GameEvent {
        let fired_at = self
            .pending
            .lock()
            .expect("rule state poisoned")
            .remove(session_id.as_str())
            .unwrap_or_else(Utc::now);
        self.mark_triggered(session_id, fired_at);
        GameEvent {
            event_id: format!("{}-{}", self.event_type, session_id),
            event_type: self.event_type.clone(),
            description: self.description.clone(),
            effects: self.effects.clone(),
        }
    }

    fn reset_session(&self, session_id: &SessionId) {
        self.last_trigger
            .lock()
            .expect("rule state poisoned")
            .remove(session_id.as_str());
        self.pending
            .lock()
            .expect("rule state poisoned")
            .remove(session_id.as_str());
    }
}

impl PeriodicRule {
    /// Record a trigger (or the anchor point) for a session.
    pub fn mark_triggered(&self, session_id: &SessionId, at: DateTime<Utc>) {
        self.last_trigger
            .lock()
            .expect("rule state poisoned")
            .insert(session_id.as_str().to_string(), at);
    }
}

/// Fires once per session on a calendar date.
pub struct CalendarRule {
    rule_id: RuleId,
    name: String,
    priority: i32,
    date: NaiveDate,
    event_type: String,
    description: String,
    effects: HashMap<String, serde_json::Value>,
    triggered: Mutex<HashSet<String>>,
}

impl CalendarRule {
    /// A rule firing on `date`.
    pub fn new(
        rule_id: RuleId,
        name: impl Into<String>,
        date: NaiveDate,
        event_type: impl Into<String>,
        description: impl Into<String>,
        effects: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            rule_id,
            name: name.into(),
            priority: 20,
            date,
            event_type: event_type.into(),
            description: description.into(),
            effects,
            triggered: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl EventRule for CalendarRule {
    fn rule_id(&self) -> &RuleId {
        &self.rule_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn should_trigger(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
        _delta: DurationSecs,
    ) -> bool {
        if self
            .triggered
            .lock()
            .expect("rule state poisoned")
            .contains(session_id.as_str())
        {
            return false;
        }
        now.date_naive() == self.date
    }

    async fn execute(&self, session_id: &SessionId) -> GameEvent {
        self.triggered
            .lock()
            .expect("rule state poisoned")
            .insert(session_id.as_str().to_string());
        GameEvent {
            event_id: format!("{}-{}", self.event_type, self.date),
            event_type: self.event_type.clone(),
            description: self.description.clone(),
            effects: self.effects.clone(),
        }
    }

    fn reset_session(&self, session_id: &SessionId) {
        self.triggered
            .lock()
            .expect("rule state poisoned")
            .remove(session_id.as_str());
    }
}

/// Condition/handler callbacks supplied by the deployment.
pub struct CustomRule {
    rule_id: RuleId,
    name: String,
    priority: i32,
    condition:
        Box<dyn Fn(&SessionId, DateTime<Utc>, DurationSecs) -> bool + Send + Sync>,
    handler: Box<dyn Fn(&SessionId) -> GameEvent + Send + Sync>,
}

impl CustomRule {
    /// A rule delegating to the given callbacks.
    pub fn new(
        rule_id: RuleId,
        name: impl Into<String>,
        priority: i32,
        condition: impl Fn(&SessionId, DateTime<Utc>, DurationSecs) -> bool + Send + Sync + 'static,
        handler: impl Fn(&SessionId) -> GameEvent + Send + Sync + 'static,
    ) -> Self {
        Self {
            rule_id,
            name: name.into(),
            priority,
            condition: Box::new(condition),
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl EventRule for CustomRule {
    fn rule_id(&self) -> &RuleId {
        &self.rule_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn should_trigger(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
        delta: DurationSecs,
    ) -> bool {
        (self.condition)(session_id, now, delta)
    }

    async fn execute(&self, session_id: &SessionId) -> GameEvent {
        (self.handler)(session_id)
    }
}

struct RuleEntry {
    rule: Arc<dyn EventRule>,
    enabled: AtomicBool,
}

/// Status report for the time manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeManagerStatus {
    /// Sessions with a live clock.
    pub active_sessions: usize,
    /// Registered rules.
    pub rule_count: usize,
    /// Rules currently enabled.
    pub enabled_rules: usize,
}

/// Per-session monotonic game clock plus the rule engine.
pub struct TimeManager {
    records: Arc<dyn GameRecordRepository>,
    clocks: Mutex<HashMap<String, DateTime<Utc>>>,
    rules: Mutex<Vec<RuleEntry>>,
}

impl TimeManager {
    /// A manager writing time records to the given repository.
    pub fn new(records: Arc<dyn GameRecordRepository>) -> Self {
        Self {
            records,
            clocks: Mutex::new(HashMap::new()),
            rules: Mutex::new(Vec::new()),
        }
    }

    /// Register a rule; the list stays sorted by priority, highest
    /// first.
    pub fn register_rule(&self, rule: Arc<dyn EventRule>) {
        let mut rules = self.rules.lock().expect("rules poisoned");
        tracing::info!(rule = rule.name(), priority = rule.priority(), "event rule registered");
        rules.push(RuleEntry {
            rule,
            enabled: AtomicBool::new(true),
        });
        rules.sort_by_key(|entry| std::cmp::Reverse(entry.rule.priority()));
    }

    /// Remove a rule by id. Returns whether it existed.
    pub fn unregister_rule(&self, rule_id: &RuleId) -> bool {
        let mut rules = self.rules.lock().expect("rules poisoned");
        let before = rules.len();
        rules.retain(|entry| entry.rule.rule_id() != rule_id);
        rules.len() < before
    }

    /// Enable or disable a rule at runtime. Returns whether it exists.
    pub fn set_rule_enabled(&self, rule_id: &RuleId, enabled: bool) -> bool {
        let rules = self.rules.lock().expect("rules poisoned");
        match rules.iter().find(|entry| entry.rule.rule_id() == rule_id) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Initialise a session clock at the given in-game time.
    pub fn set_time(&self, session_id: &SessionId, time: DateTime<Utc>) {
        self.clocks
            .lock()
            .expect("clocks poisoned")
            .insert(session_id.as_str().to_string(), time);
    }

    /// Whether this process already holds a clock for the session.
    /// When it does not, the caller must seed one from persisted
    /// state before reading [`current_time`](Self::current_time).
    pub fn has_clock(&self, session_id: &SessionId) -> bool {
        self.clocks
            .lock()
            .expect("clocks poisoned")
            .contains_key(session_id.as_str())
    }

    /// The session's current in-game time (initialising to now when
    /// unset).
    pub fn current_time(&self, session_id: &SessionId) -> DateTime<Utc> {
        let mut clocks = self.clocks.lock().expect("clocks poisoned");
        *clocks
            .entry(session_id.as_str().to_string())
            .or_insert_with(Utc::now)
    }

    /// Advance the session clock by `delta` (≥ 0 by construction) and
    /// write a time record.
    pub async fn advance(&self, session_id: &SessionId, delta: DurationSecs) -> DateTime<Utc> {
        let (before, after) = {
            let mut clocks = self.clocks.lock().expect("clocks poisoned");
            let clock = clocks
                .entry(session_id.as_str().to_string())
                .or_insert_with(Utc::now);
            let before = *clock;
            *clock += delta.to_delta();
            (before, *clock)
        };

        let record = GameRecord::new(
            session_id.clone(),
            GameRecordKind::TimeAdvance,
            json!({
                "delta_secs": delta.as_secs(),
                "before": before,
                "after": after,
            }),
        );
        if let Err(err) = self.records.append(record).await {
            tracing::warn!(error = %err, "failed to write time record");
        }

        tracing::debug!(session = %session_id, delta = %delta, "game time advanced");
        after
    }

    /// Run every enabled rule in priority order; rule errors are
    /// logged (via panics being impossible here, a rule signals
    /// failure by its own means) and never interrupt iteration.
    pub async fn check_events(
        &self,
        session_id: &SessionId,
        delta: DurationSecs,
    ) -> Vec<GameEvent> {
        let now = self.current_time(session_id);
        let rules: Vec<Arc<dyn EventRule>> = {
            let rules = self.rules.lock().expect("rules poisoned");
            rules
                .iter()
                .filter(|entry| entry.enabled.load(Ordering::SeqCst))
                .map(|entry| Arc::clone(&entry.rule))
                .collect()
        };

        let mut events = Vec::new();
        for rule in rules {
            if rule.should_trigger(session_id, now, delta).await {
                let event = rule.execute(session_id).await;
                tracing::info!(rule = rule.name(), event = %event.event_type, "event triggered");
                events.push(event);
            }
        }
        events
    }

    /// Drop the session clock and reset per-session rule state.
    pub fn cleanup_session(&self, session_id: &SessionId) {
        self.clocks
            .lock()
            .expect("clocks poisoned")
            .remove(session_id.as_str());
        let rules = self.rules.lock().expect("rules poisoned");
        for entry in rules.iter() {
            entry.rule.reset_session(session_id);
        }
    }

    /// Status report.
    pub fn status(&self) -> TimeManagerStatus {
        let rules = self.rules.lock().expect("rules poisoned");
        TimeManagerStatus {
            active_sessions: self.clocks.lock().expect("clocks poisoned").len(),
            rule_count: rules.len(),
            enabled_rules: rules
                .iter()
                .filter(|entry| entry.enabled.load(Ordering::SeqCst))
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreweaver_store::MemoryGameRecordStore;

    fn manager() -> TimeManager {
        TimeManager::new(Arc::new(MemoryGameRecordStore::new()))
    }

    fn session() -> SessionId {
        SessionId::new("s1")
    }

    #[tokio::test]
    async fn advance_moves_the_clock_by_exactly_delta() {
        let manager = manager();
        let start = Utc::now();
        manager.set_time(&session(), start);

        let after = manager.advance(&session(), DurationSecs::from_secs(60)).await;
        assert_eq!(after - start, chrono::TimeDelta::seconds(60));
        assert_eq!(manager.current_time(&session()), after);
    }

    #[tokio::test]
    async fn advance_writes_a_time_record() {
        let records = Arc::new(MemoryGameRecordStore::new());
        let manager = TimeManager::new(Arc::clone(&records) as _);
        manager.set_time(&session(), Utc::now());
        manager.advance(&session(), DurationSecs::from_secs(30)).await;

        use loreweaver_store::GameRecordRepository;
        let rows = records
            .list(&session(), Some(GameRecordKind::TimeAdvance), 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload["delta_secs"], 30);
    }

    #[tokio::test]
    async fn periodic_rule_fires_when_the_interval_elapses() {
        let manager = manager();
        let start = Utc::now();
        manager.set_time(&session(), start);

        let rule = Arc::new(PeriodicRule::spell_recovery(RuleId::new("spell")));
        rule.mark_triggered(&session(), start);
        manager.register_rule(Arc::clone(&rule) as _);

        // Seven hours: nothing.
        manager.advance(&session(), DurationSecs::from_hours(7)).await;
        assert!(manager
            .check_events(&session(), DurationSecs::from_hours(7))
            .await
            .is_empty());

        // One more hour crosses the eight-hour interval.
        manager.advance(&session(), DurationSecs::from_hours(1)).await;
        let events = manager
            .check_events(&session(), DurationSecs::from_hours(1))
            .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "spell_slot_recovery");
    }

    #[tokio::test]
    async fn calendar_rule_fires_once_per_session() {
        let manager = manager();
        let date = NaiveDate::from_ymd_opt(2026, 12, 21).unwrap();
        let midwinter = date.and_hms_opt(9, 0, 0).unwrap().and_utc();
        manager.set_time(&session(), midwinter);

        manager.register_rule(Arc::new(CalendarRule::new(
            RuleId::new("midwinter"),
            "midwinter festival",
            date,
            "holiday",
            "The midwinter festival begins.",
            HashMap::new(),
        )));

        let first = manager.check_events(&session(), DurationSecs::ZERO).await;
        assert_eq!(first.len(), 1);
        let second = manager.check_events(&session(), DurationSecs::ZERO).await;
        assert!(second.is_empty(), "calendar rules fire once per session");
    }

    #[tokio::test]
    async fn rules_run_in_priority_order() {
        let manager = manager();
        manager.set_time(&session(), Utc::now());

        for (id, priority) in [("low", 1), ("high", 99)] {
            manager.register_rule(Arc::new(CustomRule::new(
                RuleId::new(id),
                id,
                priority,
                |_, _, _| true,
                move |_| GameEvent {
                    event_id: id.to_string(),
                    event_type: id.to_string(),
                    description: String::new(),
                    effects: HashMap::new(),
                },
            )));
        }

        let events = manager.check_events(&session(), DurationSecs::ZERO).await;
        assert_eq!(events[0].event_type, "high");
        assert_eq!(events[1].event_type, "low");
    }

    #[tokio::test]
    async fn disabled_rules_do_not_fire() {
        let manager = manager();
        manager.set_time(&session(), Utc::now());
        manager.register_rule(Arc::new(CustomRule::new(
            RuleId::new("always"),
            "always",
            0,
            |_, _, _| true,
            |_| GameEvent {
                event_id: "e".into(),
                event_type: "always".into(),
                description: String::new(),
                effects: HashMap::new(),
            },
        )));

        assert!(manager.set_rule_enabled(&RuleId::new("always"), false));
        assert!(manager
            .check_events(&session(), DurationSecs::ZERO)
            .await
            .is_empty());

        assert!(manager.set_rule_enabled(&RuleId::new("always"), true));
        assert_eq!(
            manager
                .check_events(&session(), DurationSecs::ZERO)
                .await
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn cleanup_resets_clock_and_rule_state() {
        let manager = manager();
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let day = date.and_hms_opt(12, 0, 0).unwrap().and_utc();
        manager.set_time(&session(), day);
        manager.register_rule(Arc::new(CalendarRule::new(
            RuleId::new("fair"),
            "fair",
            date,
            "holiday",
            "",
            HashMap::new(),
        )));

        assert_eq!(
            manager.check_events(&session(), DurationSecs::ZERO).await.len(),
            1
        );
        manager.cleanup_session(&session());
        assert_eq!(manager.status().active_sessions, 0);

        // After cleanup the calendar rule may fire again.
        manager.set_time(&session(), day);
        assert_eq!(
            manager.check_events(&session(), DurationSecs::ZERO).await.len(),
            1
        );
    }
}
