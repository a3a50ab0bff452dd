//! Append-only event log
//!
//! - Sequence numbers per scenario start at 1 and never skip
//! - An idempotency key is assigned a sequence exactly once; re-appending
//!   with a used key returns the original event
//! - Appends to one scenario are serialized by that scenario's stream lock;
//!   different scenarios proceed in parallel
//! - With a journal, an event is fsynced before it becomes visible; no
//!   journal file stays open between appends
//! - Update and delete do not exist; asking for them is an error

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::core::{ScenarioId, TenantContext, TenantId};
use crate::observability::{LogEvent, Logger, MetricsRegistry};

use super::errors::{EventLogError, EventLogResult};
use super::event::{Event, EventPayload, EventSource, ScenarioKey};
use super::journal::EventJournal;

#[derive(Debug, Default)]
struct Stream {
    events: Vec<Event>,
    by_key: HashMap<String, usize>,
    /// Verified length of the scenario's journal file
    committed: u64,
}

impl Stream {
    fn head(&self) -> u64 {
        self.events.len() as u64
    }
}

/// Request for one append
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub scenario_id: ScenarioId,
    pub payload: EventPayload,
    pub idempotency_key: String,
    pub source: EventSource,
    /// Version the caller based its decision on; `None` skips the check
    pub expected_version: Option<u64>,
}

impl AppendRequest {
    pub fn new(scenario_id: ScenarioId, payload: EventPayload, idempotency_key: impl Into<String>) -> Self {
        Self {
            scenario_id,
            payload,
            idempotency_key: idempotency_key.into(),
            source: EventSource::User,
            expected_version: None,
        }
    }

    pub fn source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    pub fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Result of an append
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub event: Event,
    /// True when the idempotency key was already used
    pub duplicate: bool,
}

/// The event log of every scenario
#[derive(Debug)]
pub struct EventLog {
    streams: RwLock<HashMap<ScenarioKey, Arc<Mutex<Stream>>>>,
    journal: Option<EventJournal>,
    metrics: Arc<MetricsRegistry>,
}

impl EventLog {
    /// In-memory log; events live as long as the process.
    pub fn in_memory(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            journal: None,
            metrics,
        }
    }

    /// Journaled log under `data_dir`, replaying every existing journal.
    ///
    /// # Errors
    ///
    /// `JournalCorruption` if any journal fails verification. Fatal.
    pub fn open(data_dir: &Path, metrics: Arc<MetricsRegistry>) -> EventLogResult<Self> {
        let journal = EventJournal::open(data_dir)?;
        let mut streams = HashMap::new();
        for (key, events) in journal.replay_all()? {
            let by_key = events
                .iter()
                .enumerate()
                .map(|(i, e)| (e.idempotency_key.clone(), i))
                .collect();
            let committed = journal.committed_len(&key)?;
            streams.insert(
                key,
                Arc::new(Mutex::new(Stream {
                    events,
                    by_key,
                    committed,
                })),
            );
        }
        Ok(Self {
            streams: RwLock::new(streams),
            journal: Some(journal),
            metrics,
        })
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    fn stream(&self, key: &ScenarioKey) -> EventLogResult<Option<Arc<Mutex<Stream>>>> {
        let streams = self.streams.read().map_err(|_| EventLogError::poisoned())?;
        Ok(streams.get(key).cloned())
    }

    fn stream_or_create(&self, key: &ScenarioKey) -> EventLogResult<Arc<Mutex<Stream>>> {
        if let Some(stream) = self.stream(key)? {
            return Ok(stream);
        }
        let mut streams = self.streams.write().map_err(|_| EventLogError::poisoned())?;
        Ok(Arc::clone(streams.entry(key.clone()).or_default()))
    }

    /// Append one event to a scenario's stream.
    ///
    /// # Errors
    ///
    /// - `ConcurrentModification` if `expected_version` is set and differs
    ///   from the current head
    /// - `JournalIo` if the durable write fails; nothing becomes visible
    pub fn append(&self, ctx: &TenantContext, request: AppendRequest) -> EventLogResult<Appended> {
        let key: ScenarioKey = (ctx.tenant_id.clone(), request.scenario_id);
        let stream = self.stream_or_create(&key)?;
        let mut stream = stream.lock().map_err(|_| EventLogError::poisoned())?;

        if let Some(&index) = stream.by_key.get(&request.idempotency_key) {
            self.metrics.increment_idempotent_replays();
            let event = stream.events[index].clone();
            Logger::info(
                LogEvent::IdempotentReplay,
                &[
                    ("scenario_id", request.scenario_id.to_string().as_str()),
                    ("sequence", event.sequence.to_string().as_str()),
                ],
            );
            return Ok(Appended {
                event,
                duplicate: true,
            });
        }

        let head = stream.head();
        if let Some(expected) = request.expected_version {
            if expected != head {
                self.metrics.increment_concurrent_conflicts();
                Logger::warn(
                    LogEvent::ConcurrentModification,
                    &[
                        ("scenario_id", request.scenario_id.to_string().as_str()),
                        ("expected", expected.to_string().as_str()),
                        ("actual", head.to_string().as_str()),
                    ],
                );
                return Err(EventLogError::ConcurrentModification {
                    scenario_id: request.scenario_id,
                    expected,
                    actual: head,
                });
            }
        }

        let event = Event {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id.clone(),
            scenario_id: request.scenario_id,
            sequence: head + 1,
            payload: request.payload,
            idempotency_key: request.idempotency_key,
            actor_id: ctx.actor_id.clone(),
            source: request.source,
            correlation_id: ctx.correlation_id,
            causation_id: ctx.causation_id,
            recorded_at: Utc::now(),
        };

        if let Some(journal) = &self.journal {
            stream.committed = journal.append(&event, stream.committed)?;
        }

        let index = stream.events.len();
        stream.by_key.insert(event.idempotency_key.clone(), index);
        stream.events.push(event.clone());
        self.metrics.increment_events_appended();

        Logger::info(
            LogEvent::EventAppended,
            &[
                ("tenant_id", ctx.tenant_id.as_str()),
                ("scenario_id", event.scenario_id.to_string().as_str()),
                ("sequence", event.sequence.to_string().as_str()),
                ("type", event.event_type()),
                ("actor_id", ctx.actor_id.as_str()),
            ],
        );
        Ok(Appended {
            event,
            duplicate: false,
        })
    }

    /// Ordered history of a scenario, optionally cut at `up_to` (inclusive).
    ///
    /// Unknown scenarios have an empty history.
    pub fn replay(
        &self,
        tenant_id: &str,
        scenario_id: ScenarioId,
        up_to: Option<u64>,
    ) -> EventLogResult<Vec<Event>> {
        let key = (tenant_id.to_string(), scenario_id);
        let stream = match self.stream(&key)? {
            Some(stream) => stream,
            None => return Ok(Vec::new()),
        };
        let stream = stream.lock().map_err(|_| EventLogError::poisoned())?;
        let limit = up_to.map_or(stream.events.len(), |v| (v as usize).min(stream.events.len()));
        Ok(stream.events[..limit].to_vec())
    }

    /// Events after `after` (exclusive), for incremental folding
    pub fn since(&self, tenant_id: &str, scenario_id: ScenarioId, after: u64) -> EventLogResult<Vec<Event>> {
        let key = (tenant_id.to_string(), scenario_id);
        let stream = match self.stream(&key)? {
            Some(stream) => stream,
            None => return Ok(Vec::new()),
        };
        let stream = stream.lock().map_err(|_| EventLogError::poisoned())?;
        let start = (after as usize).min(stream.events.len());
        Ok(stream.events[start..].to_vec())
    }

    /// Current version (last sequence number, 0 when empty)
    pub fn head(&self, tenant_id: &str, scenario_id: ScenarioId) -> EventLogResult<u64> {
        let key = (tenant_id.to_string(), scenario_id);
        match self.stream(&key)? {
            Some(stream) => Ok(stream.lock().map_err(|_| EventLogError::poisoned())?.head()),
            None => Ok(0),
        }
    }

    pub fn exists(&self, tenant_id: &str, scenario_id: ScenarioId) -> EventLogResult<bool> {
        Ok(self.head(tenant_id, scenario_id)? > 0)
    }

    /// Scenario ids of a tenant, sorted
    pub fn scenarios(&self, tenant_id: &str) -> EventLogResult<Vec<ScenarioId>> {
        let streams = self.streams.read().map_err(|_| EventLogError::poisoned())?;
        let mut ids: Vec<ScenarioId> = streams
            .keys()
            .filter(|(tenant, _)| tenant == tenant_id)
            .map(|(_, id)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Tenants with at least one scenario, sorted
    pub fn tenants(&self) -> EventLogResult<Vec<TenantId>> {
        let streams = self.streams.read().map_err(|_| EventLogError::poisoned())?;
        let mut tenants: Vec<TenantId> = streams.keys().map(|(tenant, _)| tenant.clone()).collect();
        tenants.sort();
        tenants.dedup();
        Ok(tenants)
    }

    /// Events cannot be changed once appended.
    pub fn update(&self, _event: &Event) -> EventLogResult<()> {
        Err(EventLogError::ImmutableLogViolation(
            "update is not supported; append a compensating event".into(),
        ))
    }

    /// Events cannot be removed once appended.
    pub fn delete(&self, _event_id: Uuid) -> EventLogResult<()> {
        Err(EventLogError::ImmutableLogViolation(
            "delete is not supported; append a compensating event".into(),
        ))
    }
}
