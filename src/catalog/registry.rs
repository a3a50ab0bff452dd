//! Question catalog
//!
//! Holds every question version. Versions are immutable records; a schema
//! change is a new version of the same code, never an edit.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::core::{LenderId, QuestionId, TenantContext, TenantId};
use crate::observability::{LogEvent, Logger};

use super::errors::{CatalogError, CatalogResult};
use super::question::{DataType, Lifecycle, Question, QuestionScope, QuestionSpec, ValidationSchema};

/// Answers "is this question referenced by an active scenario?".
///
/// Implemented by the scenario runtime; the catalog itself knows nothing
/// about scenarios.
pub trait QuestionUsage {
    /// Number of active (non-terminal) scenarios referencing `question_id`
    fn active_references(&self, question_id: QuestionId) -> usize;
}

/// Usage source that never reports references
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUsage;

impl QuestionUsage for NoUsage {
    fn active_references(&self, _question_id: QuestionId) -> usize {
        0
    }
}

/// Question catalog
#[derive(Debug, Default)]
pub struct QuestionCatalog {
    questions: RwLock<HashMap<QuestionId, Question>>,
}

fn poisoned() -> CatalogError {
    CatalogError::Internal("catalog lock poisoned".into())
}

impl QuestionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define version 1 of a new question.
    ///
    /// System questions are owned by nobody; every other scope is owned by
    /// the calling tenant.
    pub fn define(&self, ctx: &TenantContext, spec: QuestionSpec) -> CatalogResult<Question> {
        Self::check_spec(&spec.code, spec.data_type, &spec.schema)?;
        let owner = Self::owner_for(ctx, &spec.scope);

        let mut questions = self.questions.write().map_err(|_| poisoned())?;
        if questions
            .values()
            .any(|q| q.code == spec.code && q.scope == spec.scope && q.owner == owner)
        {
            return Err(CatalogError::QuestionExists {
                code: spec.code,
                version: 1,
            });
        }

        let question = Question::from_spec(spec, owner, 1);
        questions.insert(question.id, question.clone());
        Ok(question)
    }

    /// Record the next version of an existing question with a new schema.
    ///
    /// The new version starts in draft; the previous version is untouched.
    pub fn new_version(
        &self,
        ctx: &TenantContext,
        id: QuestionId,
        schema: ValidationSchema,
    ) -> CatalogResult<Question> {
        let mut questions = self.questions.write().map_err(|_| poisoned())?;
        let base = Self::owned(&questions, ctx, id)?.clone();
        Self::check_spec(&base.code, base.data_type, &schema)?;

        let latest = questions
            .values()
            .filter(|q| q.code == base.code && q.scope == base.scope && q.owner == base.owner)
            .map(|q| q.version)
            .max()
            .unwrap_or(base.version);

        let spec = QuestionSpec {
            code: base.code.clone(),
            prompt: base.prompt.clone(),
            scope: base.scope.clone(),
            data_type: base.data_type,
            schema,
            valid_from: None,
            valid_to: base.validity.valid_to,
        };
        let question = Question::from_spec(spec, base.owner.clone(), latest + 1);
        questions.insert(question.id, question.clone());
        Ok(question)
    }

    pub fn get(&self, id: QuestionId) -> CatalogResult<Question> {
        let questions = self.questions.read().map_err(|_| poisoned())?;
        questions.get(&id).cloned().ok_or_else(|| CatalogError::not_found(id))
    }

    /// Every question visible to the tenant (its own plus system ones)
    pub fn list(&self, tenant: &str) -> Vec<Question> {
        let mut list: Vec<Question> = self
            .questions
            .read()
            .map(|q| {
                q.values()
                    .filter(|q| Self::visible_to(q, tenant))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by(|a, b| a.code.cmp(&b.code).then(a.version.cmp(&b.version)));
        list
    }

    pub fn activate(&self, ctx: &TenantContext, id: QuestionId) -> CatalogResult<Question> {
        self.transition(ctx, id, Lifecycle::Active, &NoUsage)
    }

    pub fn deprecate(&self, ctx: &TenantContext, id: QuestionId) -> CatalogResult<Question> {
        self.transition(ctx, id, Lifecycle::Deprecated, &NoUsage)
    }

    /// Archive a question.
    ///
    /// # Errors
    ///
    /// `QuestionInUse` if any active scenario still references it.
    pub fn archive(
        &self,
        ctx: &TenantContext,
        id: QuestionId,
        usage: &dyn QuestionUsage,
    ) -> CatalogResult<Question> {
        self.transition(ctx, id, Lifecycle::Archived, usage)
    }

    fn transition(
        &self,
        ctx: &TenantContext,
        id: QuestionId,
        to: Lifecycle,
        usage: &dyn QuestionUsage,
    ) -> CatalogResult<Question> {
        // usage reaches into other stores, so it is never asked under our lock
        if to == Lifecycle::Archived {
            let code = {
                let questions = self.questions.read().map_err(|_| poisoned())?;
                let question = Self::owned(&questions, ctx, id)?;
                Self::check_transition(question, to)?;
                question.code.clone()
            };
            let scenarios = usage.active_references(id);
            if scenarios > 0 {
                return Err(CatalogError::QuestionInUse { code, scenarios });
            }
        }

        let mut questions = self.questions.write().map_err(|_| poisoned())?;
        let from = {
            let question = Self::owned(&questions, ctx, id)?;
            Self::check_transition(question, to)?;
            question.lifecycle
        };

        let question = questions.get_mut(&id).ok_or_else(|| CatalogError::not_found(id))?;
        question.lifecycle = to;
        if to == Lifecycle::Archived && question.validity.valid_to.is_none() {
            question.validity.valid_to = Some(Utc::now());
        }
        Logger::info(
            LogEvent::QuestionTransition,
            &[
                ("code", question.code.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("actor", ctx.actor_id.as_str()),
            ],
        );
        Ok(question.clone())
    }

    fn check_transition(question: &Question, to: Lifecycle) -> CatalogResult<()> {
        if question.lifecycle.can_transition_to(to) {
            Ok(())
        } else {
            Err(CatalogError::InvalidLifecycleTransition {
                code: question.code.clone(),
                from: question.lifecycle,
                to,
            })
        }
    }

    /// Rename a non-protected question.
    pub fn rename(
        &self,
        ctx: &TenantContext,
        id: QuestionId,
        new_code: impl Into<String>,
    ) -> CatalogResult<Question> {
        let new_code = new_code.into();
        let mut questions = self.questions.write().map_err(|_| poisoned())?;
        let question = Self::owned(&questions, ctx, id)?;
        if question.is_protected() {
            return Err(CatalogError::ProtectedQuestion(question.code.clone()));
        }
        if new_code.trim().is_empty() {
            return Err(CatalogError::InvalidDefinition("question code must not be empty".into()));
        }
        let (scope, owner) = (question.scope.clone(), question.owner.clone());
        if questions
            .values()
            .any(|q| q.id != id && q.code == new_code && q.scope == scope && q.owner == owner)
        {
            return Err(CatalogError::QuestionExists {
                code: new_code,
                version: 1,
            });
        }

        let question = questions.get_mut(&id).ok_or_else(|| CatalogError::not_found(id))?;
        question.code = new_code;
        Ok(question.clone())
    }

    /// Delete a draft, non-protected question.
    pub fn delete(&self, ctx: &TenantContext, id: QuestionId) -> CatalogResult<()> {
        let mut questions = self.questions.write().map_err(|_| poisoned())?;
        let question = Self::owned(&questions, ctx, id)?;
        if question.is_protected() {
            return Err(CatalogError::ProtectedQuestion(question.code.clone()));
        }
        if question.lifecycle != Lifecycle::Draft {
            return Err(CatalogError::InvalidDefinition(format!(
                "question '{}' is {}; only drafts can be deleted, archive instead",
                question.code, question.lifecycle
            )));
        }
        questions.remove(&id);
        Ok(())
    }

    /// Resolve the version of `code` valid now for `tenant`.
    pub fn find(&self, code: &str, tenant: &str) -> Option<Question> {
        self.find_as_of(code, tenant, Utc::now())
    }

    /// Resolve the version of `code` valid at `at` for `tenant`.
    ///
    /// Narrow scopes win over broad ones (lender/custom, then tenant, then
    /// system); within a scope the highest valid version wins.
    pub fn find_as_of(&self, code: &str, tenant: &str, at: DateTime<Utc>) -> Option<Question> {
        let questions = self.questions.read().ok()?;
        questions
            .values()
            .filter(|q| q.code == code && Self::visible_to(q, tenant) && q.is_valid_at(at))
            .min_by(|a, b| {
                a.scope
                    .rank()
                    .cmp(&b.scope.rank())
                    .then(b.version.cmp(&a.version))
            })
            .cloned()
    }

    /// Archive every question of a lender.
    ///
    /// All-or-nothing: if any of them is referenced by an active scenario
    /// nothing is archived.
    pub fn archive_lender(
        &self,
        ctx: &TenantContext,
        lender_id: &LenderId,
        usage: &dyn QuestionUsage,
    ) -> CatalogResult<Vec<QuestionId>> {
        let scope = QuestionScope::Lender(lender_id.clone());
        let is_target = |q: &Question| {
            q.scope == scope
                && q.owner.as_deref() == Some(ctx.tenant_id.as_str())
                && q.lifecycle != Lifecycle::Archived
        };

        let candidates: Vec<(QuestionId, String)> = {
            let questions = self.questions.read().map_err(|_| poisoned())?;
            questions
                .values()
                .filter(|q| is_target(*q))
                .map(|q| (q.id, q.code.clone()))
                .collect()
        };
        for (id, code) in &candidates {
            let scenarios = usage.active_references(*id);
            if scenarios > 0 {
                return Err(CatalogError::QuestionInUse {
                    code: code.clone(),
                    scenarios,
                });
            }
        }

        let mut questions = self.questions.write().map_err(|_| poisoned())?;
        let now = Utc::now();
        let mut archived = Vec::with_capacity(candidates.len());
        for (id, _) in &candidates {
            if let Some(q) = questions.get_mut(id).filter(|q| is_target(&**q)) {
                q.lifecycle = Lifecycle::Archived;
                q.validity.valid_to.get_or_insert(now);
                Logger::info(
                    LogEvent::QuestionTransition,
                    &[("code", q.code.as_str()), ("to", "archived"), ("lender", lender_id.as_str())],
                );
                archived.push(*id);
            }
        }
        Ok(archived)
    }

    fn owner_for(ctx: &TenantContext, scope: &QuestionScope) -> Option<TenantId> {
        match scope {
            QuestionScope::System => None,
            _ => Some(ctx.tenant_id.clone()),
        }
    }

    fn visible_to(question: &Question, tenant: &str) -> bool {
        match &question.owner {
            None => true,
            Some(owner) => owner == tenant,
        }
    }

    /// Look up a question the caller may administer.
    ///
    /// System questions are administered by any tenant's administrators;
    /// tenant-owned ones only by their owner.
    fn owned<'a>(
        questions: &'a HashMap<QuestionId, Question>,
        ctx: &TenantContext,
        id: QuestionId,
    ) -> CatalogResult<&'a Question> {
        questions
            .get(&id)
            .filter(|q| Self::visible_to(q, &ctx.tenant_id))
            .ok_or_else(|| CatalogError::not_found(id))
    }

    fn check_spec(code: &str, data_type: DataType, schema: &ValidationSchema) -> CatalogResult<()> {
        if code.trim().is_empty() {
            return Err(CatalogError::InvalidDefinition("question code must not be empty".into()));
        }
        if matches!(data_type, DataType::Enum | DataType::MultiSelect) && schema.options.is_empty() {
            return Err(CatalogError::InvalidDefinition(format!(
                "question '{}' of type {} needs options",
                code,
                data_type.as_str()
            )));
        }
        if let Some(pattern) = &schema.pattern {
            Regex::new(pattern).map_err(|e| {
                CatalogError::InvalidDefinition(format!("question '{}' pattern: {}", code, e))
            })?;
        }
        if let (Some(min), Some(max)) = (schema.min, schema.max) {
            if min > max {
                return Err(CatalogError::InvalidDefinition(format!(
                    "question '{}' has min {} > max {}",
                    code, min, max
                )));
            }
        }
        Ok(())
    }
}
