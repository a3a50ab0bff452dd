//! Shared fixtures for integration tests

#![allow(dead_code)]

use scenariotree::authoring::{Installed, TreeBundle};
use scenariotree::core::{AnswerValue, ScenarioId, TenantContext};
use scenariotree::scenario::{AnswerInput, ScenarioService};
use uuid::Uuid;

pub const MORTGAGE: &str = include_str!("../fixtures/mortgage.json");

pub fn ctx() -> TenantContext {
    TenantContext::new("acme", "officer-1")
}

pub fn mortgage_bundle() -> TreeBundle {
    TreeBundle::from_json(MORTGAGE).expect("fixture bundle parses")
}

/// In-memory service with the mortgage tree installed for `acme`
pub fn mortgage_service() -> (ScenarioService, Installed) {
    let service = ScenarioService::in_memory();
    let installed = service
        .install_bundle(&ctx(), &mortgage_bundle())
        .expect("fixture bundle installs");
    (service, installed)
}

pub fn start(service: &ScenarioService, installed: &Installed) -> ScenarioId {
    let id = Uuid::new_v4();
    service
        .create(&ctx(), id, installed.tree.id())
        .expect("scenario starts");
    id
}

pub fn answer(service: &ScenarioService, id: ScenarioId, code: &str, value: AnswerValue) {
    let key = format!("{}-{}", code, Uuid::new_v4());
    service
        .provide_answer(&ctx(), id, AnswerInput::new(code, value, key))
        .expect("answer accepted");
}
