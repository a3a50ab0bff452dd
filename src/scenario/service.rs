//! Scenario service
//!
//! Every command follows the same path:
//!
//! 1. Replay and project the scenario
//! 2. Check the command against the projected state and the published tree
//! 3. Append exactly one event, expecting the projected version
//!
//! A concurrent append between 1 and 3 fails the version check; commands
//! without a caller-supplied version are then re-run against the new state,
//! a bounded number of times. State is never mutated directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::authoring::{Installed, TreeBundle};
use crate::catalog::{AnswerValidator, QuestionCatalog, QuestionUsage};
use crate::condition::ConditionStore;
use crate::config::EngineConfig;
use crate::core::{AnswerValue, NodeId, QuestionId, ScenarioId, TenantContext, TreeId};
use crate::events::{
    export_json_lines, AppendRequest, Appended, Event, EventLog, EventLogError, EventPayload,
    EventSource, ScenarioKey,
};
use crate::navigation::{Availability, AvailabilityCache, NavigationEngine};
use crate::observability::{LogEvent, Logger, MetricsRegistry};
use crate::projection::{ProjectedState, ScenarioStatus, StateProjector};
use crate::tree::{PublishedTree, TreeError, TreeStore};

use super::errors::{ScenarioError, ScenarioResult};
use super::feed::{AnswerFeed, HiddenAnswerPolicy};

/// Attempts for commands that did not pin a version
const MAX_ATTEMPTS: usize = 3;

/// Idempotency key of the creation event
const CREATE_KEY: &str = "scenario-created";

/// An answer offered by a user
#[derive(Debug, Clone)]
pub struct AnswerInput {
    pub question_code: String,
    pub value: AnswerValue,
    pub idempotency_key: String,
    pub effective_from: Option<DateTime<Utc>>,
    pub expected_version: Option<u64>,
}

impl AnswerInput {
    pub fn new(
        question_code: impl Into<String>,
        value: AnswerValue,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            question_code: question_code.into(),
            value,
            idempotency_key: idempotency_key.into(),
            effective_from: None,
            expected_version: None,
        }
    }

    pub fn effective_from(mut self, at: DateTime<Utc>) -> Self {
        self.effective_from = Some(at);
        self
    }

    pub fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// A raw externally-ingested field
#[derive(Debug, Clone)]
pub struct ImportInput {
    pub question_code: String,
    pub raw: Value,
    pub idempotency_key: String,
    pub effective_from: Option<DateTime<Utc>>,
}

impl ImportInput {
    pub fn new(question_code: impl Into<String>, raw: Value, idempotency_key: impl Into<String>) -> Self {
        Self {
            question_code: question_code.into(),
            raw,
            idempotency_key: idempotency_key.into(),
            effective_from: None,
        }
    }
}

struct Loaded {
    events: Vec<Event>,
    state: ProjectedState,
    tree: Arc<PublishedTree>,
}

impl Loaded {
    fn require(&self, allowed: bool, action: &'static str) -> ScenarioResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(ScenarioError::InvalidStatus {
                scenario_id: self.state.scenario_id,
                status: self.state.status,
                action,
            })
        }
    }

    fn require_open(&self, action: &'static str) -> ScenarioResult<()> {
        self.require(self.state.status.is_open(), action)
    }
}

/// Command and query surface over one event log
pub struct ScenarioService {
    catalog: Arc<QuestionCatalog>,
    conditions: Arc<ConditionStore>,
    trees: Arc<TreeStore>,
    log: Arc<EventLog>,
    cache: Arc<AvailabilityCache>,
    metrics: Arc<MetricsRegistry>,
    hidden_answers: HiddenAnswerPolicy,
}

impl ScenarioService {
    /// Service over `log` with empty catalogs and no availability cache.
    pub fn new(log: Arc<EventLog>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            catalog: Arc::new(QuestionCatalog::new()),
            conditions: Arc::new(ConditionStore::new()),
            trees: Arc::new(TreeStore::new()),
            log,
            cache: Arc::new(AvailabilityCache::disabled(Arc::clone(&metrics))),
            metrics,
            hidden_answers: HiddenAnswerPolicy::default(),
        }
    }

    pub fn in_memory() -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        Self::new(Arc::new(EventLog::in_memory(Arc::clone(&metrics))), metrics)
    }

    /// Service as configured: journaled when `data_dir` is set.
    ///
    /// # Errors
    ///
    /// Journal corruption is fatal and returned as is.
    pub fn from_config(config: &EngineConfig) -> ScenarioResult<Self> {
        let metrics = Arc::new(MetricsRegistry::new());
        let log = match &config.data_dir {
            Some(dir) => EventLog::open(dir, Arc::clone(&metrics))?,
            None => EventLog::in_memory(Arc::clone(&metrics)),
        };
        let cache = AvailabilityCache::new(
            config.cache_refresh(),
            config.cache_enabled,
            Arc::clone(&metrics),
        );
        Ok(Self::new(Arc::new(log), metrics)
            .with_cache(Arc::new(cache))
            .with_hidden_answer_policy(config.hidden_answer_policy))
    }

    pub fn with_cache(mut self, cache: Arc<AvailabilityCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_hidden_answer_policy(mut self, policy: HiddenAnswerPolicy) -> Self {
        self.hidden_answers = policy;
        self
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn conditions(&self) -> &ConditionStore {
        &self.conditions
    }

    pub fn trees(&self) -> &TreeStore {
        &self.trees
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn cache(&self) -> &Arc<AvailabilityCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn hidden_answer_policy(&self) -> HiddenAnswerPolicy {
        self.hidden_answers
    }

    // ---- authoring ----

    /// Define a bundle's questions and conditions, build its tree and publish it.
    pub fn install_bundle(&self, ctx: &TenantContext, bundle: &TreeBundle) -> ScenarioResult<Installed> {
        Ok(bundle.install(ctx, &self.catalog, &self.conditions, &self.trees)?)
    }

    /// Publish a draft tree against this service's catalog and conditions.
    pub fn publish_tree(&self, ctx: &TenantContext, tree_id: TreeId) -> ScenarioResult<Arc<PublishedTree>> {
        Ok(self.trees.publish(ctx, tree_id, &self.catalog, &self.conditions)?)
    }

    /// Archive a question unless an open scenario's tree still pins it.
    pub fn archive_question(&self, ctx: &TenantContext, question_id: QuestionId) -> ScenarioResult<()> {
        self.catalog.archive(ctx, question_id, self)?;
        Ok(())
    }

    // ---- queries ----

    fn load(&self, ctx: &TenantContext, scenario_id: ScenarioId) -> ScenarioResult<Loaded> {
        let events = self.log.replay(&ctx.tenant_id, scenario_id, None)?;
        let state = StateProjector::project(&ctx.tenant_id, scenario_id, &events);
        self.metrics.increment_projections();
        let tree_id = state.tree_id.ok_or(ScenarioError::NotFound(scenario_id))?;
        let tree = self.trees.published(ctx, tree_id)?;
        Ok(Loaded {
            events,
            state,
            tree,
        })
    }

    fn navigation<'a>(&'a self, tree: &'a PublishedTree) -> NavigationEngine<'a> {
        NavigationEngine::new(tree).with_metrics(&self.metrics)
    }

    /// Current projected state, with derived navigation filled in.
    pub fn state(&self, ctx: &TenantContext, scenario_id: ScenarioId) -> ScenarioResult<ProjectedState> {
        let mut loaded = self.load(ctx, scenario_id)?;
        self.navigation(&loaded.tree).refresh_navigation(&mut loaded.state);
        Ok(loaded.state)
    }

    /// State as of version `up_to`, for time-travel inspection.
    pub fn state_at(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        up_to: u64,
    ) -> ScenarioResult<ProjectedState> {
        let events = self.log.replay(&ctx.tenant_id, scenario_id, Some(up_to))?;
        let state = StateProjector::project(&ctx.tenant_id, scenario_id, &events);
        self.metrics.increment_projections();
        if !state.is_created() {
            return Err(ScenarioError::NotFound(scenario_id));
        }
        Ok(state)
    }

    /// Created scenarios of the caller's tenant
    pub fn scenarios(&self, ctx: &TenantContext) -> ScenarioResult<Vec<ScenarioId>> {
        let mut out = Vec::new();
        for id in self.log.scenarios(&ctx.tenant_id)? {
            if self.log.exists(&ctx.tenant_id, id)? {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Node availability, served from the cache when fresh enough.
    pub fn availability(&self, ctx: &TenantContext, scenario_id: ScenarioId) -> ScenarioResult<Arc<Availability>> {
        let head = self.log.head(&ctx.tenant_id, scenario_id)?;
        if head == 0 {
            return Err(ScenarioError::NotFound(scenario_id));
        }
        let key: ScenarioKey = (ctx.tenant_id.clone(), scenario_id);
        if let Some(hit) = self.cache.get(&key, head) {
            return Ok(hit);
        }
        let loaded = self.load(ctx, scenario_id)?;
        let availability = self.navigation(&loaded.tree).available_nodes(&loaded.state);
        Ok(self.cache.put(key, availability))
    }

    /// Rebuild one cache entry; used by the background refresher.
    ///
    /// Terminal scenarios no longer change, so they are left out of the
    /// cache.
    pub fn recompute_availability(&self, key: &ScenarioKey) -> Option<Availability> {
        let ctx = TenantContext::system(key.0.clone());
        let loaded = self.load(&ctx, key.1).ok()?;
        if loaded.state.status.is_terminal() {
            return None;
        }
        Some(self.navigation(&loaded.tree).available_nodes(&loaded.state))
    }

    /// Typed answers for downstream consumers, under the hidden-answer policy.
    pub fn answer_feed(&self, ctx: &TenantContext, scenario_id: ScenarioId) -> ScenarioResult<AnswerFeed> {
        let loaded = self.load(ctx, scenario_id)?;
        let availability = self.navigation(&loaded.tree).available_nodes(&loaded.state);
        Ok(AnswerFeed::build(&loaded.state, &availability, self.hidden_answers))
    }

    /// Ordered events, optionally cut at `up_to`.
    pub fn events(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        up_to: Option<u64>,
    ) -> ScenarioResult<Vec<Event>> {
        let events = self.log.replay(&ctx.tenant_id, scenario_id, up_to)?;
        if events.is_empty() {
            return Err(ScenarioError::NotFound(scenario_id));
        }
        Ok(events)
    }

    /// Every event as one JSON line with actor, time and correlation.
    pub fn audit_export(&self, ctx: &TenantContext, scenario_id: ScenarioId) -> ScenarioResult<String> {
        let events = self.events(ctx, scenario_id, None)?;
        Ok(export_json_lines(&events)?)
    }

    // ---- commands ----

    /// Start a scenario on a published tree. Creating an existing scenario
    /// again returns its current state.
    pub fn create(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        tree_id: TreeId,
    ) -> ScenarioResult<ProjectedState> {
        let tree = self.trees.published(ctx, tree_id)?;
        let request = AppendRequest::new(
            scenario_id,
            EventPayload::ScenarioCreated {
                tree_id,
                tree_version: tree.tree.version,
            },
            CREATE_KEY,
        )
        .expect_version(0);
        self.log.append(ctx, request)?;
        self.state(ctx, scenario_id)
    }

    /// Record a user answer after schema and VALIDATION rule checks.
    pub fn provide_answer(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        input: AnswerInput,
    ) -> ScenarioResult<Appended> {
        let code = input.question_code.as_str();
        self.append_checked(
            ctx,
            scenario_id,
            &input.idempotency_key,
            input.expected_version,
            |loaded| {
                loaded.require_open("answer")?;
                let question = loaded
                    .tree
                    .question_by_code(code)
                    .ok_or_else(|| ScenarioError::UnknownQuestion(code.to_string()))?;

                if let Err(e) = AnswerValidator::validate(question, &input.value) {
                    self.rejected(scenario_id, code, e.code());
                    return Err(e.into());
                }
                if let Err(failing) =
                    self.navigation(&loaded.tree)
                        .check_answer(code, &input.value, &loaded.state.answers)
                {
                    self.rejected(scenario_id, code, "SCN_VALIDATION_FAILED");
                    return Err(ScenarioError::RuleViolation {
                        question: code.to_string(),
                        failing,
                    });
                }

                Ok((
                    EventPayload::AnswerProvided {
                        question_code: code.to_string(),
                        node_id: loaded.tree.node_for_code(code).map(|n| n.id.clone()),
                        value: input.value.clone(),
                        effective_from: input.effective_from,
                        valid: true,
                    },
                    EventSource::User,
                ))
            },
        )
    }

    /// Record an imported value. Values that fail coercion or validation are
    /// recorded with `valid = false` rather than dropped.
    pub fn import_answer(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        input: ImportInput,
    ) -> ScenarioResult<Appended> {
        let code = input.question_code.as_str();
        self.append_checked(ctx, scenario_id, &input.idempotency_key, None, |loaded| {
            loaded.require_open("import into")?;
            let question = loaded
                .tree
                .question_by_code(code)
                .ok_or_else(|| ScenarioError::UnknownQuestion(code.to_string()))?;

            let (value, mut problem) = match AnswerValidator::coerce(question, &input.raw) {
                Ok(value) => {
                    let problem = AnswerValidator::validate(question, &value)
                        .err()
                        .map(|e| e.to_string());
                    (value, problem)
                }
                Err(e) => (AnswerValue::from_json_scalar(&input.raw), Some(e.to_string())),
            };
            if problem.is_none()
                && self
                    .navigation(&loaded.tree)
                    .check_answer(code, &value, &loaded.state.answers)
                    .is_err()
            {
                problem = Some("validation rule failed".to_string());
            }
            if let Some(reason) = &problem {
                Logger::warn(
                    LogEvent::ImportValueInvalid,
                    &[
                        ("scenario_id", scenario_id.to_string().as_str()),
                        ("question", code),
                        ("reason", reason.as_str()),
                    ],
                );
            }
            let valid = problem.is_none();

            Ok((
                EventPayload::AnswerProvided {
                    question_code: code.to_string(),
                    node_id: loaded.tree.node_for_code(code).map(|n| n.id.clone()),
                    value,
                    effective_from: input.effective_from,
                    valid,
                },
                EventSource::Import,
            ))
        })
    }

    /// Remove the current answer; the prior value stays in history.
    pub fn clear_answer(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        code: &str,
        idempotency_key: &str,
    ) -> ScenarioResult<Appended> {
        self.append_checked(ctx, scenario_id, idempotency_key, None, |loaded| {
            loaded.require_open("clear answers of")?;
            if loaded.tree.question_by_code(code).is_none() {
                return Err(ScenarioError::UnknownQuestion(code.to_string()));
            }
            Ok((
                EventPayload::AnswerCleared {
                    question_code: code.to_string(),
                },
                EventSource::User,
            ))
        })
    }

    pub fn enter_node(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        node_id: &NodeId,
        idempotency_key: &str,
    ) -> ScenarioResult<Appended> {
        self.append_checked(ctx, scenario_id, idempotency_key, None, |loaded| {
            loaded.require_open("navigate")?;
            self.require_visible(loaded, node_id)?;
            Ok((
                EventPayload::NodeEntered {
                    node_id: node_id.clone(),
                },
                EventSource::User,
            ))
        })
    }

    pub fn exit_node(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        node_id: &NodeId,
        idempotency_key: &str,
    ) -> ScenarioResult<Appended> {
        self.append_checked(ctx, scenario_id, idempotency_key, None, |loaded| {
            loaded.require_open("navigate")?;
            if loaded.tree.node(node_id).is_none() {
                return Err(TreeError::NodeNotFound(node_id.clone()).into());
            }
            Ok((
                EventPayload::NodeExited {
                    node_id: node_id.clone(),
                },
                EventSource::User,
            ))
        })
    }

    pub fn complete_stage(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        node_id: &NodeId,
        idempotency_key: &str,
    ) -> ScenarioResult<Appended> {
        self.append_checked(ctx, scenario_id, idempotency_key, None, |loaded| {
            loaded.require_open("complete stages of")?;
            self.require_visible(loaded, node_id)?;
            Ok((
                EventPayload::StageCompleted {
                    node_id: node_id.clone(),
                },
                EventSource::User,
            ))
        })
    }

    /// Submit once every required visible question has a valid answer.
    pub fn submit(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        idempotency_key: &str,
    ) -> ScenarioResult<Appended> {
        self.append_checked(ctx, scenario_id, idempotency_key, None, |loaded| {
            loaded.require(loaded.state.status == ScenarioStatus::InProgress, "submit")?;
            let availability = self.navigation(&loaded.tree).available_nodes(&loaded.state);
            if !availability.is_complete() {
                return Err(ScenarioError::RequiredUnanswered {
                    missing: availability.missing_required,
                });
            }
            Ok((EventPayload::ScenarioSubmitted, EventSource::User))
        })
    }

    /// External confirmation of a submitted scenario.
    pub fn complete(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        idempotency_key: &str,
    ) -> ScenarioResult<Appended> {
        self.append_checked(ctx, scenario_id, idempotency_key, None, |loaded| {
            loaded.require(loaded.state.status == ScenarioStatus::Submitted, "complete")?;
            Ok((EventPayload::ScenarioCompleted, EventSource::User))
        })
    }

    pub fn cancel(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        reason: &str,
        idempotency_key: &str,
    ) -> ScenarioResult<Appended> {
        self.append_checked(ctx, scenario_id, idempotency_key, None, |loaded| {
            loaded.require(!loaded.state.status.is_terminal(), "cancel")?;
            Ok((
                EventPayload::ScenarioCancelled {
                    reason: reason.to_string(),
                },
                EventSource::User,
            ))
        })
    }

    /// Cancel every open scenario idle for at least `timeout` as of `now`.
    ///
    /// Returns the cancelled scenarios. A scenario that receives an event
    /// while being swept is left alone.
    pub fn cancel_stale(&self, now: DateTime<Utc>, timeout: Duration) -> ScenarioResult<Vec<ScenarioKey>> {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|e| ScenarioError::Internal(format!("timeout out of range: {}", e)))?;
        let mut cancelled = Vec::new();

        for tenant in self.log.tenants()? {
            let ctx = TenantContext::system(tenant.clone());
            for scenario_id in self.log.scenarios(&tenant)? {
                let events = self.log.replay(&tenant, scenario_id, None)?;
                let state = StateProjector::project(&tenant, scenario_id, &events);
                let idle_since = match state.updated_at {
                    Some(at) if state.is_created() && state.status.is_open() => at,
                    _ => continue,
                };
                if now - idle_since < timeout {
                    continue;
                }

                let request = AppendRequest::new(
                    scenario_id,
                    EventPayload::ScenarioCancelled {
                        reason: "timeout".to_string(),
                    },
                    format!("timeout-{}", state.version),
                )
                .source(EventSource::System)
                .expect_version(state.version);
                match self.log.append(&ctx, request) {
                    Ok(appended) => {
                        let key: ScenarioKey = (tenant.clone(), scenario_id);
                        self.cache.invalidate(&key);
                        if !appended.duplicate {
                            Logger::info(
                                LogEvent::ScenarioTimedOut,
                                &[
                                    ("tenant_id", tenant.as_str()),
                                    ("scenario_id", scenario_id.to_string().as_str()),
                                    ("idle_since", idle_since.to_rfc3339().as_str()),
                                ],
                            );
                            cancelled.push(key);
                        }
                    }
                    Err(EventLogError::ConcurrentModification { .. }) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(cancelled)
    }

    // ---- internals ----

    fn require_visible(&self, loaded: &Loaded, node_id: &NodeId) -> ScenarioResult<()> {
        if loaded.tree.node(node_id).is_none() {
            return Err(TreeError::NodeNotFound(node_id.clone()).into());
        }
        let availability = self.navigation(&loaded.tree).available_nodes(&loaded.state);
        if availability.is_visible(node_id) {
            Ok(())
        } else {
            Err(ScenarioError::NodeUnavailable(node_id.clone()))
        }
    }

    fn rejected(&self, scenario_id: ScenarioId, code: &str, reason: &str) {
        self.metrics.increment_answers_rejected();
        Logger::info(
            LogEvent::AnswerRejected,
            &[
                ("scenario_id", scenario_id.to_string().as_str()),
                ("question", code),
                ("reason", reason),
            ],
        );
    }

    /// Load, decide, append; see the module docs.
    fn append_checked<F>(
        &self,
        ctx: &TenantContext,
        scenario_id: ScenarioId,
        idempotency_key: &str,
        expected_version: Option<u64>,
        decide: F,
    ) -> ScenarioResult<Appended>
    where
        F: Fn(&Loaded) -> ScenarioResult<(EventPayload, EventSource)>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let loaded = self.load(ctx, scenario_id)?;

            // a used key answers with its original event, whatever the state
            if let Some(event) = loaded
                .events
                .iter()
                .find(|e| e.idempotency_key == idempotency_key)
            {
                self.metrics.increment_idempotent_replays();
                Logger::info(
                    LogEvent::IdempotentReplay,
                    &[
                        ("scenario_id", scenario_id.to_string().as_str()),
                        ("sequence", event.sequence.to_string().as_str()),
                    ],
                );
                return Ok(Appended {
                    event: event.clone(),
                    duplicate: true,
                });
            }

            let (payload, source) = decide(&loaded)?;
            let request = AppendRequest::new(scenario_id, payload, idempotency_key)
                .source(source)
                .expect_version(expected_version.unwrap_or(loaded.state.version));

            match self.log.append(ctx, request) {
                Ok(appended) => {
                    self.cache.invalidate(&(ctx.tenant_id.clone(), scenario_id));
                    return Ok(appended);
                }
                Err(EventLogError::ConcurrentModification { .. })
                    if expected_version.is_none() && attempt < MAX_ATTEMPTS =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl QuestionUsage for ScenarioService {
    /// Non-terminal scenarios whose tree pins `question_id`. Scenarios that
    /// cannot be read count as references.
    fn active_references(&self, question_id: QuestionId) -> usize {
        let tenants = match self.log.tenants() {
            Ok(tenants) => tenants,
            Err(_) => return 1,
        };
        let mut count = 0;
        for tenant in tenants {
            let ctx = TenantContext::system(tenant.clone());
            let scenarios = match self.log.scenarios(&tenant) {
                Ok(ids) => ids,
                Err(_) => {
                    count += 1;
                    continue;
                }
            };
            for scenario_id in scenarios {
                let events = match self.log.replay(&tenant, scenario_id, None) {
                    Ok(events) => events,
                    Err(_) => {
                        count += 1;
                        continue;
                    }
                };
                let state = StateProjector::project(&tenant, scenario_id, &events);
                if state.status.is_terminal() {
                    continue;
                }
                let pins = state
                    .tree_id
                    .and_then(|id| self.trees.published(&ctx, id).ok())
                    .map_or(false, |tree| tree.questions.contains_key(&question_id));
                if pins {
                    count += 1;
                }
            }
        }
        count
    }
}
