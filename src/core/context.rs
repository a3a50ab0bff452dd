//! Caller context
//!
//! Every operation receives the tenant and actor explicitly; there is no
//! process-wide "current tenant".

use uuid::Uuid;

use super::ids::TenantId;

/// Context carried through every engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// Tenant owning the data being read or written
    pub tenant_id: TenantId,

    /// Who performs the action (user id, service name, importer id)
    pub actor_id: String,

    /// Groups every event produced by one logical request
    pub correlation_id: Uuid,

    /// Event that caused this request, if any
    pub causation_id: Option<Uuid>,
}

impl TenantContext {
    /// Create a context with a fresh correlation id
    pub fn new(tenant_id: impl Into<TenantId>, actor_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
            correlation_id: Uuid::new_v4(),
            causation_id: None,
        }
    }

    /// Context used by the engine itself (timeouts, maintenance)
    pub fn system(tenant_id: impl Into<TenantId>) -> Self {
        Self::new(tenant_id, SYSTEM_ACTOR)
    }

    /// Keep the correlation id of an upstream request
    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Record the event that caused this request
    pub fn caused_by(mut self, event_id: Uuid) -> Self {
        self.causation_id = Some(event_id);
        self
    }

    /// Returns true if the engine is acting on its own behalf
    pub fn is_system(&self) -> bool {
        self.actor_id == SYSTEM_ACTOR
    }
}

/// Actor id used for engine-initiated events
pub const SYSTEM_ACTOR: &str = "system";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_fresh_correlation() {
        let a = TenantContext::new("acme", "alice");
        let b = TenantContext::new("acme", "alice");
        assert_ne!(a.correlation_id, b.correlation_id);
        assert!(a.causation_id.is_none());
    }

    #[test]
    fn test_builders() {
        let corr = Uuid::new_v4();
        let cause = Uuid::new_v4();
        let ctx = TenantContext::new("acme", "bob")
            .with_correlation(corr)
            .caused_by(cause);
        assert_eq!(ctx.correlation_id, corr);
        assert_eq!(ctx.causation_id, Some(cause));
        assert!(!ctx.is_system());
        assert!(TenantContext::system("acme").is_system());
    }
}
