//! Tests for worker/inline strategy selection, job states and worker teardown.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;

use std::time::Duration;

use common::{png_bytes, Script, ScriptedSpawner};
use esg_export::config::OffloadMode;
use esg_export::error::ExportError;
use esg_export::offload::{JobState, OffloadCoordinator, RendererKind, ThreadSpawner};
use esg_export::snapshot::Snapshot;
use esg_export::{WorkerRequest, WorkerResponse};
use futures::executor::block_on;
use test_case::test_case;

use JobState::{Completed, Dispatched, Failed, Idle, Terminated};

fn request(filename: &str) -> WorkerRequest {
    let snapshot = Snapshot::from_png(&png_bytes(30, 60), 30, 60);
    WorkerRequest::generate_pdf(snapshot.to_markup(), filename)
}

fn coordinator(mode: OffloadMode) -> OffloadCoordinator {
    OffloadCoordinator::new(mode, None)
}

#[test]
fn test_worker_success_terminates_once() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let report = block_on(coordinator(OffloadMode::Auto).run(&spawner, request("r.pdf")));

    assert_eq!(report.kind, Some(RendererKind::Worker));
    assert!(report.outcome.unwrap().starts_with(b"%PDF-"));
    assert_eq!(report.job.history(), &[Idle, Dispatched, Completed, Terminated]);
    assert_eq!(spawner.spawned(), 1);
    assert_eq!(spawner.stats.posted.get(), 1);
    assert_eq!(spawner.terminated(), 1);
}

#[test_case(Script::Respond(WorkerResponse::failed("r.pdf", "Image too large")) ; "logical failure")]
#[test_case(Script::TransportError("script error".into()) ; "transport failure")]
#[test_case(Script::Malformed("not a response".into()) ; "malformed message")]
#[test_case(Script::RejectPost ; "post rejected")]
fn test_worker_failure_terminates_once(script: Script) {
    let spawner = ScriptedSpawner::new(script);
    let report = block_on(coordinator(OffloadMode::Worker).run(&spawner, request("r.pdf")));

    assert!(report.outcome.is_err());
    assert_eq!(report.job.history(), &[Idle, Dispatched, Failed, Terminated]);
    assert_eq!(spawner.spawned(), 1);
    assert_eq!(spawner.terminated(), 1);
}

#[test]
fn test_failure_kinds_are_distinguished() {
    let run = |script| {
        let spawner = ScriptedSpawner::new(script);
        block_on(coordinator(OffloadMode::Worker).run(&spawner, request("r.pdf")))
            .outcome
            .unwrap_err()
    };
    assert!(matches!(
        run(Script::Respond(WorkerResponse::failed("r.pdf", "Image too large"))),
        ExportError::Worker(msg) if msg == "Image too large"
    ));
    assert!(matches!(
        run(Script::TransportError("boom".into())),
        ExportError::WorkerTransport(_)
    ));
    assert!(matches!(
        run(Script::Malformed("{}".into())),
        ExportError::MalformedResponse(_)
    ));
    let missing_blob = WorkerResponse {
        success: true,
        filename: "r.pdf".into(),
        pdf_blob: None,
        error: None,
    };
    assert!(matches!(
        run(Script::Respond(missing_blob)),
        ExportError::MalformedResponse(_)
    ));
}

#[test]
fn test_inline_mode_spawns_no_worker() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let report = block_on(coordinator(OffloadMode::Inline).run(&spawner, request("r.pdf")));

    assert_eq!(report.kind, Some(RendererKind::Inline));
    assert!(report.outcome.is_ok());
    assert_eq!(report.job.history(), &[Idle, Completed]);
    assert_eq!(spawner.spawned(), 0);
    assert_eq!(spawner.terminated(), 0);
}

#[test]
fn test_auto_falls_back_to_inline() {
    let spawner = ScriptedSpawner::unavailable();
    let report = block_on(coordinator(OffloadMode::Auto).run(&spawner, request("r.pdf")));
    assert_eq!(report.kind, Some(RendererKind::Inline));
    assert!(report.outcome.is_ok());
    assert_eq!(spawner.spawned(), 0);
}

#[test]
fn test_forced_worker_without_support_fails() {
    let spawner = ScriptedSpawner::unavailable();
    let report = block_on(coordinator(OffloadMode::Worker).run(&spawner, request("r.pdf")));
    assert_eq!(report.kind, None);
    assert!(matches!(
        report.outcome,
        Err(ExportError::WorkerUnavailable(_))
    ));
    assert_eq!(report.job.history(), &[Idle, Failed]);
}

#[test]
fn test_inline_failure_reports_worker_message() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let bad = WorkerRequest::generate_pdf("<p>no image</p>", "r.pdf");
    let report = block_on(coordinator(OffloadMode::Inline).run(&spawner, bad));
    assert_eq!(report.job.history(), &[Idle, Failed]);
    assert!(matches!(report.outcome, Err(ExportError::Worker(_))));
}

#[test]
fn test_timeout_fails_and_terminates() {
    let spawner = ScriptedSpawner::new(Script::Silent);
    let coordinator =
        OffloadCoordinator::new(OffloadMode::Worker, Some(Duration::from_millis(20)));
    let report = block_on(coordinator.run(&spawner, request("r.pdf")));

    assert!(matches!(report.outcome, Err(ExportError::Timeout(20))));
    assert_eq!(report.job.history(), &[Idle, Dispatched, Failed, Terminated]);
    assert_eq!(spawner.terminated(), 1);
}

#[test]
fn test_timeout_does_not_affect_fast_worker() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let coordinator =
        OffloadCoordinator::new(OffloadMode::Worker, Some(Duration::from_secs(30)));
    let report = block_on(coordinator.run(&spawner, request("r.pdf")));
    assert!(report.outcome.is_ok());
    assert_eq!(spawner.terminated(), 1);
}

#[test]
fn test_mismatched_filename_still_completes() {
    let spawner = ScriptedSpawner::new(Script::Respond(WorkerResponse::ok(
        "other.pdf",
        b"%PDF-1.5".to_vec(),
    )));
    let report = block_on(coordinator(OffloadMode::Worker).run(&spawner, request("r.pdf")));
    assert_eq!(report.outcome.unwrap(), b"%PDF-1.5");
    assert_eq!(report.job.state(), Terminated);
}

#[test]
fn test_each_job_gets_a_fresh_worker() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let coordinator = coordinator(OffloadMode::Worker);
    let a = block_on(coordinator.run(&spawner, request("a.pdf")));
    let b = block_on(coordinator.run(&spawner, request("b.pdf")));

    assert_ne!(a.job.id(), b.job.id());
    assert_eq!(spawner.spawned(), 2);
    assert_eq!(spawner.terminated(), 2);
    let filenames: Vec<String> = spawner
        .stats
        .requests
        .borrow()
        .iter()
        .map(|r| r.filename.clone())
        .collect();
    assert_eq!(filenames, ["a.pdf", "b.pdf"]);
}

#[test]
fn test_thread_worker_end_to_end() {
    let report = block_on(coordinator(OffloadMode::Worker).run(&ThreadSpawner, request("t.pdf")));
    assert_eq!(report.kind, Some(RendererKind::Worker));
    let pdf = report.outcome.unwrap();
    let doc = lopdf::Document::load_mem(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}
