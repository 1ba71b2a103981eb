//! In-process topic bus.
//!
//! Publishing is a two-phase operation:
//!
//!   Validate → Enqueue → [Drain: Deliver → Dead-letter on failure]
//!
//! Validation runs synchronously on the publisher's thread and its error is
//! the publisher's error. Accepted events join a FIFO queue. Whichever thread
//! finds the bus idle becomes the dispatcher and drains the queue before
//! `publish` returns; a publish made from inside a handler only enqueues, so
//! handlers never recurse into each other.
//!
//! Each queued event carries the dispatch depth of the event whose handler
//! published it, plus one. Events deeper than `max_dispatch_depth` are
//! dead-lettered instead of delivered, which breaks publish cycles. A
//! dead-letter notice sits one level below the event that failed, and a
//! notice past the limit is dropped with a warning.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, ThreadId},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use concord_contracts::{
    error::{ConcordError, ConcordResult},
    message::{AgentEvent, DEAD_LETTER_TOPIC},
};
use concord_core::traits::EventValidator;

/// A subscriber callback. An `Err` is dead-lettered; it never reaches the
/// publisher.
pub type EventHandler = Arc<dyn Fn(&AgentEvent) -> ConcordResult<()> + Send + Sync>;

/// Opaque handle returned by [`MessageBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

fn default_max_dispatch_depth() -> usize {
    16
}

fn default_dead_letter_capacity() -> usize {
    1024
}

/// Bus limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Deepest handler-triggered publish chain that is still delivered.
    #[serde(default = "default_max_dispatch_depth")]
    pub max_dispatch_depth: usize,
    /// Dead letters retained before the oldest is dropped.
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: default_max_dispatch_depth(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

impl BusConfig {
    /// Parse `s` as TOML. Unknown keys are ignored, so the bus limits can
    /// share a file with the policy settings.
    pub fn from_toml_str(s: &str) -> ConcordResult<Self> {
        toml::from_str(s).map_err(|e| ConcordError::Config {
            reason: format!("failed to parse bus TOML: {e}"),
        })
    }
}

/// An event that could not be delivered, kept in the bus's terminal sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub failed_topic: String,
    pub event: AgentEvent,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Regular,
    /// A notice to `"deadletter"` subscribers; its failures are only logged.
    DeadLetterNotice,
}

struct Queued {
    event: AgentEvent,
    depth: usize,
    delivery: Delivery,
}

struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
}

#[derive(Default)]
struct DispatchState {
    queue: VecDeque<Queued>,
    dispatcher: Option<ThreadId>,
    current_depth: usize,
}

/// Topic-keyed publish/subscribe bus with validators and a dead-letter sink.
///
/// Construct one per runtime and share it behind an `Arc`. No lock is held
/// while a validator or handler runs.
pub struct MessageBus {
    config: BusConfig,
    next_id: AtomicU64,
    subscribers: Mutex<BTreeMap<String, Vec<Subscription>>>,
    validators: Mutex<Vec<Arc<dyn EventValidator>>>,
    dispatch: Mutex<DispatchState>,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl MessageBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(BTreeMap::new()),
            validators: Mutex::new(Vec::new()),
            dispatch: Mutex::new(DispatchState::default()),
            dead_letters: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // ── Subscriptions ───────────────────────────────────────────────────────

    /// Append `handler` to `topic`'s subscriber list. The same handler may be
    /// subscribed more than once; each subscription is invoked.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&AgentEvent) -> ConcordResult<()> + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(topic = %topic, subscription = id.0, "subscribed");
        lock(&self.subscribers)
            .entry(topic)
            .or_default()
            .push(Subscription {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let mut emptied = None;
        let mut removed = false;
        for (topic, subs) in subscribers.iter_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos);
                removed = true;
                if subs.is_empty() {
                    emptied = Some(topic.clone());
                }
                break;
            }
        }
        if let Some(topic) = emptied {
            subscribers.remove(&topic);
        }
        debug!(subscription = id.0, removed, "unsubscribed");
        removed
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.subscribers).get(topic).map_or(0, Vec::len)
    }

    /// Register a validator. Validators run in registration order.
    pub fn add_validator(&self, validator: Box<dyn EventValidator>) {
        info!(validator = %validator.name(), "registered bus validator");
        lock(&self.validators).push(Arc::from(validator));
    }

    // ── Publishing ──────────────────────────────────────────────────────────

    /// Validate `event` and, if accepted, deliver it to every subscriber of
    /// its topic.
    ///
    /// # Errors
    ///
    /// Returns the first validator error unchanged; nothing is enqueued or
    /// delivered in that case. Handler failures are dead-lettered and do not
    /// surface here.
    pub fn publish(&self, event: AgentEvent) -> ConcordResult<()> {
        let validators: Vec<Arc<dyn EventValidator>> = lock(&self.validators).clone();
        for validator in &validators {
            if let Err(e) = validator.validate(&event) {
                warn!(
                    topic = %event.topic,
                    event_id = %event.id,
                    validator = %validator.name(),
                    error = %e,
                    "event rejected by validator"
                );
                return Err(e);
            }
        }

        let me = thread::current().id();
        let become_dispatcher = {
            let mut state = lock(&self.dispatch);
            let depth = match state.dispatcher {
                Some(owner) if owner == me => state.current_depth + 1,
                _ => 0,
            };
            debug!(topic = %event.topic, event_id = %event.id, depth, "event queued");
            state.queue.push_back(Queued {
                event,
                depth,
                delivery: Delivery::Regular,
            });
            if state.dispatcher.is_none() {
                state.dispatcher = Some(me);
                true
            } else {
                false
            }
        };

        if become_dispatcher {
            self.drain(me);
        }
        Ok(())
    }

    /// Snapshot of the dead-letter sink, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        lock(&self.dead_letters).iter().cloned().collect()
    }

    // ── Dispatch ────────────────────────────────────────────────────────────

    fn drain(&self, me: ThreadId) {
        let _guard = DispatcherGuard { bus: self, owner: me };
        loop {
            let next = {
                let mut state = lock(&self.dispatch);
                match state.queue.pop_front() {
                    Some(next) => {
                        state.current_depth = next.depth;
                        next
                    }
                    None => {
                        state.dispatcher = None;
                        state.current_depth = 0;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, queued: Queued) {
        let Queued {
            event,
            depth,
            delivery,
        } = queued;

        if delivery == Delivery::DeadLetterNotice && depth > self.config.max_dispatch_depth {
            warn!(
                event_id = %event.id,
                depth,
                max_depth = self.config.max_dispatch_depth,
                "dispatch depth exceeded, dropping dead-letter notice"
            );
            return;
        }

        if delivery == Delivery::Regular && depth > self.config.max_dispatch_depth {
            warn!(
                topic = %event.topic,
                event_id = %event.id,
                depth,
                max_depth = self.config.max_dispatch_depth,
                "dispatch depth exceeded, dead-lettering event"
            );
            let reason = format!(
                "dispatch depth {} exceeds limit {}",
                depth, self.config.max_dispatch_depth
            );
            self.dead_letter(&event, reason, depth);
            return;
        }

        let handlers: Vec<EventHandler> = lock(&self.subscribers)
            .get(&event.topic)
            .map(|subs| subs.iter().map(|s| s.handler.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(topic = %event.topic, event_id = %event.id, "no subscribers for topic");
            return;
        }

        debug!(topic = %event.topic, event_id = %event.id, handlers = handlers.len(), "delivering event");
        for handler in handlers {
            if let Err(e) = handler(&event) {
                match delivery {
                    Delivery::Regular => {
                        error!(topic = %event.topic, event_id = %event.id, error = %e, "event handler failed");
                        self.dead_letter(&event, e.to_string(), depth);
                    }
                    Delivery::DeadLetterNotice => {
                        error!(event_id = %event.id, error = %e, "dead-letter handler failed");
                    }
                }
            }
        }
    }

    /// Record `event` in the sink and queue one notice for `"deadletter"`
    /// subscribers.
    ///
    /// The notice sits one level below the failed event, so a dead-letter
    /// handler that republishes keeps climbing towards `max_dispatch_depth`.
    fn dead_letter(&self, event: &AgentEvent, reason: String, depth: usize) {
        {
            let mut sink = lock(&self.dead_letters);
            if self.config.dead_letter_capacity == 0 {
                warn!(event_id = %event.id, "dead-letter sink disabled, dropping");
            } else {
                while sink.len() >= self.config.dead_letter_capacity {
                    sink.pop_front();
                }
                sink.push_back(DeadLetter {
                    failed_topic: event.topic.clone(),
                    event: event.clone(),
                    reason,
                    recorded_at: Utc::now(),
                });
            }
        }

        let event_value = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "failed to encode dead-lettered event");
                serde_json::Value::Null
            }
        };
        let payload = match json!({ "failed_topic": event.topic, "event": event_value }) {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let notice = AgentEvent::new(DEAD_LETTER_TOPIC, payload);
        let notice = match &event.correlation_id {
            Some(cid) => notice.with_correlation_id(cid.clone()),
            None => notice,
        };

        lock(&self.dispatch).queue.push_back(Queued {
            event: notice,
            depth: depth + 1,
            delivery: Delivery::DeadLetterNotice,
        });
    }
}

/// Releases the dispatcher slot if a handler unwinds mid-drain.
struct DispatcherGuard<'a> {
    bus: &'a MessageBus,
    owner: ThreadId,
}

impl Drop for DispatcherGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.bus.dispatch);
        if state.dispatcher == Some(self.owner) {
            state.dispatcher = None;
            state.current_depth = 0;
        }
    }
}
