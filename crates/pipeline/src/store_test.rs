//! Pipeline store tests

use std::sync::Arc;
use std::thread;

use tether_protocol::{Audience, OperationType, Pipeline, PipelineStep, StepKind};

use crate::{PipelineError, PipelineState, PipelineStore};

fn orders() -> Audience {
    Audience::new("billing", "kafka", OperationType::Consumer, "orders")
}

fn refunds() -> Audience {
    Audience::new("billing", "kafka", OperationType::Consumer, "refunds")
}

fn pipeline(id: &str) -> Pipeline {
    Pipeline::new(id, format!("pipeline-{id}"))
        .with_step(PipelineStep::new("mask", StepKind::Transform).with_config(&b"{\"path\":\"email\"}"[..]))
}

fn ids(pipelines: &[Arc<Pipeline>]) -> Vec<&str> {
    pipelines.iter().map(|p| p.id.as_str()).collect()
}

#[test]
fn test_attach_makes_pipeline_active() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    let active = store.active_pipelines_for(&orders());
    assert_eq!(ids(&active), vec!["p1"]);
    assert!(store.is_active(&orders(), "p1"));
    assert_eq!(store.state_of(&orders(), "p1"), PipelineState::Active);
}

#[test]
fn test_unknown_audience_is_empty() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    assert!(store.active_pipelines_for(&refunds()).is_empty());
    assert!(store.paused_pipelines_for(&refunds()).is_empty());
    assert!(!store.is_active(&refunds(), "p1"));
}

#[test]
fn test_lookup_preserves_attach_order() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("zeta"));
    store.attach(&orders(), pipeline("alpha"));
    store.attach(&orders(), pipeline("mid"));

    assert_eq!(ids(&store.active_pipelines_for(&orders())), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_reattach_replaces_in_place() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));
    store.attach(&orders(), pipeline("p2"));
    store.attach(&orders(), Pipeline::new("p1", "renamed"));

    let active = store.active_pipelines_for(&orders());
    assert_eq!(ids(&active), vec!["p1", "p2"]);
    assert_eq!(active[0].name, "renamed");
    assert_eq!(store.active_count(), 2);
}

#[test]
fn test_attach_paused_id_reactivates_it() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));
    store.attach(&orders(), pipeline("p2"));
    store.pause(&orders(), "p1").unwrap();

    store.attach(&orders(), Pipeline::new("p1", "replacement"));

    assert!(store.paused_pipelines_for(&orders()).is_empty());
    let active = store.active_pipelines_for(&orders());
    assert_eq!(ids(&active), vec!["p1", "p2"]);
    assert_eq!(active[0].name, "replacement");
    assert_eq!(store.paused_count(), 0);
}

#[test]
fn test_audiences_are_isolated() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));
    store.attach(&refunds(), pipeline("p1"));

    store.pause(&orders(), "p1").unwrap();

    assert!(store.active_pipelines_for(&orders()).is_empty());
    assert_eq!(ids(&store.active_pipelines_for(&refunds())), vec!["p1"]);
}

#[test]
fn test_pause_moves_to_paused() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    store.pause(&orders(), "p1").unwrap();

    assert!(store.active_pipelines_for(&orders()).is_empty());
    assert_eq!(ids(&store.paused_pipelines_for(&orders())), vec!["p1"]);
    assert_eq!(store.state_of(&orders(), "p1"), PipelineState::Paused);
}

#[test]
fn test_pause_unknown_leaves_store_unchanged() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    let err = store.pause(&orders(), "missing").unwrap_err();
    assert!(matches!(err, PipelineError::NotActive { ref pipeline_id, .. } if pipeline_id == "missing"));
    assert!(err.is_not_found());

    assert_eq!(ids(&store.active_pipelines_for(&orders())), vec!["p1"]);
    assert_eq!(store.paused_count(), 0);
}

#[test]
fn test_pause_twice_fails_second_time() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    store.pause(&orders(), "p1").unwrap();
    assert!(matches!(
        store.pause(&orders(), "p1"),
        Err(PipelineError::NotActive { .. })
    ));
    assert_eq!(store.paused_count(), 1);
    assert_eq!(store.active_count(), 0);
}

#[test]
fn test_resume_unknown_leaves_store_unchanged() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    // active but not paused
    let err = store.resume(&orders(), "p1").unwrap_err();
    assert!(matches!(err, PipelineError::NotPaused { .. }));

    assert_eq!(store.active_count(), 1);
    assert_eq!(store.paused_count(), 0);
}

#[test]
fn test_pause_resume_restores_identical_pipeline() {
    let store = PipelineStore::new();
    let original = pipeline("p1");
    store.attach(&orders(), original.clone());
    store.attach(&orders(), pipeline("p2"));

    store.pause(&orders(), "p1").unwrap();
    store.resume(&orders(), "p1").unwrap();

    let active = store.active_pipelines_for(&orders());
    assert_eq!(ids(&active), vec!["p1", "p2"]);
    assert_eq!(*active[0], original);
    assert!(store.paused_pipelines_for(&orders()).is_empty());
}

#[test]
fn test_detach_active() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    assert_eq!(store.detach(&orders(), "p1"), PipelineState::Active);
    assert_eq!(store.state_of(&orders(), "p1"), PipelineState::Absent);
    assert_eq!(store.active_count(), 0);
}

#[test]
fn test_detach_paused() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));
    store.pause(&orders(), "p1").unwrap();

    assert_eq!(store.detach(&orders(), "p1"), PipelineState::Paused);
    assert_eq!(store.state_of(&orders(), "p1"), PipelineState::Absent);
    assert_eq!(store.paused_count(), 0);

    // a later resume has nothing to bring back
    assert!(matches!(
        store.resume(&orders(), "p1"),
        Err(PipelineError::NotPaused { .. })
    ));
}

#[test]
fn test_detach_unknown_is_noop() {
    let store = PipelineStore::new();
    store.attach(&orders(), pipeline("p1"));

    assert_eq!(store.detach(&orders(), "missing"), PipelineState::Absent);
    assert_eq!(store.detach(&refunds(), "p1"), PipelineState::Absent);
    assert_eq!(store.active_count(), 1);
}

#[test]
fn test_attach_pause_resume_detach_scenario() {
    let store = PipelineStore::new();
    let aud = orders();

    store.attach(&aud, pipeline("p1"));
    assert_eq!(ids(&store.active_pipelines_for(&aud)), vec!["p1"]);

    store.pause(&aud, "p1").unwrap();
    assert!(store.active_pipelines_for(&aud).is_empty());

    store.resume(&aud, "p1").unwrap();
    assert_eq!(ids(&store.active_pipelines_for(&aud)), vec!["p1"]);

    store.detach(&aud, "p1");
    assert!(store.active_pipelines_for(&aud).is_empty());
    assert!(store.paused_pipelines_for(&aud).is_empty());
}

#[test]
fn test_concurrent_pause_resume_keeps_pipeline_in_one_set() {
    let store = Arc::new(PipelineStore::new());
    store.attach(&orders(), pipeline("p1"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    if i % 2 == 0 {
                        let _ = store.pause(&orders(), "p1");
                    } else {
                        let _ = store.resume(&orders(), "p1");
                    }
                    assert_ne!(store.state_of(&orders(), "p1"), PipelineState::Absent);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_ne!(store.state_of(&orders(), "p1"), PipelineState::Absent);
}
