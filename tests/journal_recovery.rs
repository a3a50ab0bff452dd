//! Journal Recovery Tests
//!
//! - Reopening a journal reproduces every scenario's events and state
//! - Appends continue the recovered sequence
//! - A corrupt journal halts startup
//! - Appends write through the journal path and cut leftover bytes

mod common;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;

use scenariotree::config::EngineConfig;
use scenariotree::core::{AnswerValue, TenantContext};
use scenariotree::events::{AppendRequest, EventJournal, EventLog, EventPayload};
use scenariotree::observability::MetricsRegistry;
use scenariotree::projection::StateProjector;
use scenariotree::scenario::{AnswerInput, ScenarioService};
use tempfile::TempDir;
use uuid::Uuid;

use common::{ctx, mortgage_bundle};

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn open(dir: &TempDir) -> EventLog {
    EventLog::open(dir.path(), Arc::new(MetricsRegistry::new())).unwrap()
}

// =============================================================================
// Recovery
// =============================================================================

#[test]
fn test_reopen_reproduces_state() {
    let temp_dir = create_temp_data_dir();
    let config = EngineConfig {
        data_dir: Some(temp_dir.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let scenario_id = Uuid::new_v4();

    let before = {
        let service = ScenarioService::from_config(&config).unwrap();
        let installed = service.install_bundle(&ctx(), &mortgage_bundle()).unwrap();
        service.create(&ctx(), scenario_id, installed.tree.id()).unwrap();
        for (i, (code, value)) in [
            ("loan_purpose", AnswerValue::text("refinance")),
            ("cash_out", AnswerValue::Bool(true)),
            ("cash_out_amount", AnswerValue::number(4000)),
        ]
        .into_iter()
        .enumerate()
        {
            service
                .provide_answer(&ctx(), scenario_id, AnswerInput::new(code, value, format!("a{}", i)))
                .unwrap();
        }
        service.events(&ctx(), scenario_id, None).unwrap()
    };

    let log = open(&temp_dir);
    assert!(log.is_durable());
    let after = log.replay("acme", scenario_id, None).unwrap();
    assert_eq!(after, before);
    assert_eq!(
        StateProjector::project("acme", scenario_id, &after),
        StateProjector::project("acme", scenario_id, &before)
    );
}

#[test]
fn test_appends_continue_after_reopen() {
    let temp_dir = create_temp_data_dir();
    let scenario_id = Uuid::new_v4();
    let ctx = TenantContext::new("acme", "officer-1");

    {
        let log = open(&temp_dir);
        for i in 0..3 {
            let payload = EventPayload::answer("fico", AnswerValue::number(700 + i));
            log.append(&ctx, AppendRequest::new(scenario_id, payload, format!("k{}", i)))
                .unwrap();
        }
    }

    let log = open(&temp_dir);
    // keys survive the restart
    let replayed = log
        .append(&ctx, AppendRequest::new(scenario_id, EventPayload::answer("fico", AnswerValue::number(1)), "k1"))
        .unwrap();
    assert!(replayed.duplicate);
    assert_eq!(replayed.event.sequence, 2);

    let next = log
        .append(
            &ctx,
            AppendRequest::new(scenario_id, EventPayload::answer("fico", AnswerValue::number(760)), "k3")
                .expect_version(3),
        )
        .unwrap();
    assert_eq!(next.event.sequence, 4);

    let reopened = open(&temp_dir);
    assert_eq!(reopened.head("acme", scenario_id).unwrap(), 4);
}

#[test]
fn test_corrupt_journal_halts_startup() {
    let temp_dir = create_temp_data_dir();
    let scenario_id = Uuid::new_v4();
    let ctx = TenantContext::new("acme", "officer-1");

    {
        let log = open(&temp_dir);
        log.append(
            &ctx,
            AppendRequest::new(scenario_id, EventPayload::answer("fico", AnswerValue::number(700)), "k0"),
        )
        .unwrap();
    }

    let journal = EventJournal::open(temp_dir.path()).unwrap();
    let path = journal.path_for(&("acme".to_string(), scenario_id));
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "{{\"crc\":1,\"event\":{{}}}}").unwrap();
    drop(file);

    let err = EventLog::open(temp_dir.path(), Arc::new(MetricsRegistry::new())).unwrap_err();
    assert_eq!(err.code(), "SCN_JOURNAL_CORRUPTION");

    let config = EngineConfig {
        data_dir: Some(temp_dir.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let err = ScenarioService::from_config(&config).err().unwrap();
    assert_eq!(err.code(), "SCN_JOURNAL_CORRUPTION");
}

// =============================================================================
// Append Path
// =============================================================================

fn fico(n: i64) -> EventPayload {
    EventPayload::answer("fico", AnswerValue::number(n))
}

#[test]
fn test_each_append_opens_the_journal_path() {
    let temp_dir = create_temp_data_dir();
    let scenario_id = Uuid::new_v4();
    let ctx = TenantContext::new("acme", "officer-1");
    let log = open(&temp_dir);
    log.append(&ctx, AppendRequest::new(scenario_id, fico(700), "k0")).unwrap();

    // replace the file with a copy; a handle kept open would write to the old one
    let path = EventJournal::open(temp_dir.path())
        .unwrap()
        .path_for(&("acme".to_string(), scenario_id));
    let content = fs::read(&path).unwrap();
    fs::remove_file(&path).unwrap();
    fs::write(&path, content).unwrap();

    log.append(&ctx, AppendRequest::new(scenario_id, fico(720), "k1")).unwrap();
    let events = EventJournal::read_file(&path).unwrap();
    assert_eq!(events.len(), 2);
}

#[test]
fn test_many_scenarios_append_and_reopen() {
    let temp_dir = create_temp_data_dir();
    let ctx = TenantContext::new("acme", "officer-1");
    let ids: Vec<Uuid> = (0..300).map(|_| Uuid::new_v4()).collect();
    {
        let log = open(&temp_dir);
        for id in &ids {
            log.append(&ctx, AppendRequest::new(*id, fico(700), "k0")).unwrap();
        }
    }

    let log = open(&temp_dir);
    assert_eq!(log.scenarios("acme").unwrap().len(), ids.len());
    for id in &ids {
        log.append(&ctx, AppendRequest::new(*id, fico(710), "k1")).unwrap();
    }
    assert_eq!(log.head("acme", ids[0]).unwrap(), 2);
}

#[test]
fn test_torn_tail_is_cut_by_the_next_append() {
    let temp_dir = create_temp_data_dir();
    let scenario_id = Uuid::new_v4();
    let ctx = TenantContext::new("acme", "officer-1");
    let log = open(&temp_dir);
    log.append(&ctx, AppendRequest::new(scenario_id, fico(700), "k0")).unwrap();

    // bytes of an append that failed after a partial write
    let path = EventJournal::open(temp_dir.path())
        .unwrap()
        .path_for(&("acme".to_string(), scenario_id));
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    write!(file, "{{\"crc\":42,\"event\":{{\"id\"").unwrap();
    drop(file);

    let next = log.append(&ctx, AppendRequest::new(scenario_id, fico(720), "k1")).unwrap();
    assert_eq!(next.event.sequence, 2);

    let reopened = open(&temp_dir);
    assert_eq!(reopened.replay("acme", scenario_id, None).unwrap().len(), 2);
}
