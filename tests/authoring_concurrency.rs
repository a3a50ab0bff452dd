//! Authoring Concurrency Tests
//!
//! - Publishing trees while archiving questions always makes progress
//! - Archival still sees scenarios pinned to freshly published trees

mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use scenariotree::catalog::{CatalogError, DataType, QuestionScope, QuestionSpec};
use scenariotree::scenario::{ScenarioError, ScenarioService};
use scenariotree::tree::NodeSpec;

use common::{ctx, mortgage_service, start};

const ROUNDS: usize = 150;

// =============================================================================
// Lock Ordering
// =============================================================================

#[test]
fn test_publish_and_archive_run_concurrently() {
    let (service, installed) = mortgage_service();
    start(&service, &installed);
    let service: Arc<ScenarioService> = Arc::new(service);
    let pinned = installed.questions["loan_purpose"];

    let (done_tx, done_rx) = mpsc::channel();

    let publisher = {
        let service = Arc::clone(&service);
        let done = done_tx.clone();
        thread::spawn(move || {
            for i in 0..ROUNDS {
                let tree = service
                    .trees()
                    .create_tree(&ctx(), format!("draft-{}", i))
                    .unwrap();
                service
                    .trees()
                    .add_node(&ctx(), tree.id, NodeSpec::question(pinned, "Purpose"))
                    .unwrap();
                service.publish_tree(&ctx(), tree.id).unwrap();
            }
            done.send("publisher").unwrap();
        })
    };

    let archiver = {
        let service = Arc::clone(&service);
        let done = done_tx;
        thread::spawn(move || {
            for i in 0..ROUNDS {
                let question = service
                    .catalog()
                    .define(
                        &ctx(),
                        QuestionSpec::new(format!("scratch_{}", i), "Scratch", QuestionScope::Tenant, DataType::Text),
                    )
                    .unwrap();
                service.catalog().activate(&ctx(), question.id).unwrap();
                service.archive_question(&ctx(), question.id).unwrap();
            }
            done.send("archiver").unwrap();
        })
    };

    for _ in 0..2 {
        done_rx
            .recv_timeout(Duration::from_secs(60))
            .expect("publish and archive finish without blocking each other");
    }
    publisher.join().unwrap();
    archiver.join().unwrap();
}

#[test]
fn test_archive_still_sees_pinned_questions() {
    let (service, installed) = mortgage_service();
    start(&service, &installed);
    let pinned = installed.questions["loan_purpose"];

    let err = service.archive_question(&ctx(), pinned).unwrap_err();
    assert!(matches!(
        err,
        ScenarioError::Catalog(CatalogError::QuestionInUse { scenarios: 1, .. })
    ));

    // the rejected archival left the question usable for publishing
    let tree = service.trees().create_tree(&ctx(), "follow-up").unwrap();
    service
        .trees()
        .add_node(&ctx(), tree.id, NodeSpec::question(pinned, "Purpose"))
        .unwrap();
    let published = service.publish_tree(&ctx(), tree.id).unwrap();
    assert!(published.questions.contains_key(&pinned));
}
