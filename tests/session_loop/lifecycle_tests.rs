// Session start, interruption, failure exits and what they leave on disk.

#[path = "../support/mod.rs"]
mod support;

use chartloop_core::{
    CancelSignal, ChartLoop, ChartRequest, JsonFileStructureProvider, TerminalReason,
};
use chartloop_core::model::ModelRequest;
use chartloop_session::read_events;
use std::fs;
use std::sync::Arc;
use support::*;
use tempfile::tempdir;

#[tokio::test]
async fn unreadable_design_ends_the_session_before_synthesis() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = Arc::new(ScriptedProvider::new().respond_with(CODER_A, counting_coder("a", false)));
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let structure = JsonFileStructureProvider::new(dir.path().join("missing.json"));
    let outcome = chart
        .run(&structure, &ChartRequest::new("missing design"), CancelSignal::never())
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::DesignFailed);
    assert!(!outcome.success);
    assert!(provider.requests().await.is_empty());
    assert!(
        outcome
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("Design failed"))
    );
}

#[tokio::test]
async fn design_file_drives_a_full_session() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let design_path = dir.path().join("design.json");
    fs::write(
        &design_path,
        r#"{"diagram_type": "flowchart", "direction": "LR",
            "nodes": [{"id": "a", "label": "Ingest"}, {"id": "b", "label": "Publish"}],
            "edges": [{"source": "a", "target": "b"}]}"#,
    )
    .expect("write design");
    let provider = ScriptedProvider::new()
        .respond_with(CODER_A, counting_coder("a", false))
        .respond_with(CRITIC, critic(checklist(5, 0)));
    let chart = ChartLoop::new(provider, ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run(
            &JsonFileStructureProvider::new(&design_path),
            &ChartRequest::default(),
            CancelSignal::never(),
        )
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::Approved);
    assert_eq!(outcome.score, Some(1.0));
}

#[tokio::test]
async fn cancelling_before_start_records_a_cancelled_session() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = Arc::new(ScriptedProvider::new());
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let (handle, signal) = CancelSignal::new();
    handle.cancel();
    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), signal)
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::Cancelled);
    assert!(!outcome.success);
    assert!(provider.requests().await.is_empty());
}

#[tokio::test]
async fn cancelling_mid_session_keeps_the_best_image_and_a_readable_log() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let (handle, signal) = CancelSignal::new();

    let reject_all = critic(checklist(4, 4));
    let cancelling_critic: Responder = Arc::new(move |request: &ModelRequest| {
        handle.cancel();
        reject_all(request)
    });
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", false))
            .respond_with(CRITIC, cancelling_critic),
    );
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), signal)
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::Cancelled);
    assert!(outcome.success);
    assert!(!outcome.approved);
    assert_eq!(outcome.visual_iterations, 1);
    assert_eq!(provider.calls(CODER_A).await, 1);
    assert!(outcome.image_path.expect("image").exists());

    let events = read_events(&outcome.session_dir.join("events.jsonl")).expect("events");
    let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds.first(), Some(&"session_started"));
    assert_eq!(kinds.last(), Some(&"session_finished"));
    assert!(kinds.contains(&"render"));
    assert!(events.windows(2).all(|w| w[1].seq == w[0].seq + 1));
}

#[tokio::test]
async fn critic_outage_ends_with_the_rendered_image() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", false))
            .respond_with(
                CRITIC,
                Arc::new(|request: &ModelRequest| {
                    if request.image_count() == 0 {
                        Ok(questions_json(&checklist(4, 0)))
                    } else {
                        Err("vision model offline".to_string())
                    }
                }),
            ),
    );
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::EvaluationFailed);
    assert!(outcome.success);
    assert!(!outcome.approved);
    assert!(outcome.score.is_none());
    assert!(
        outcome
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("Evaluation failed"))
    );
}

#[tokio::test]
async fn manifest_lists_every_artifact_and_render() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = ScriptedProvider::new()
        .reply(CODER_A, fence("flowchart TB\n    a[BROKEN --> b"))
        .reply(CODER_A, fence("flowchart TB\n    a --> b"))
        .respond_with(CRITIC, critic(checklist(4, 0)));
    let chart = ChartLoop::new(provider, ScriptedRenderer::rejecting_marked(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::new("audit"), CancelSignal::never())
        .await
        .expect("session");
    assert!(outcome.approved);

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outcome.manifest_path).expect("manifest"))
            .expect("json");
    assert_eq!(manifest["task"], "audit");
    assert_eq!(manifest["terminal"], "approved");
    let iterations = manifest["iterations"].as_array().expect("iterations");
    assert_eq!(iterations.len(), 2);
    assert_eq!(iterations[0]["render"]["success"], false);
    assert_eq!(iterations[1]["render"]["success"], true);
    assert!(iterations[1]["evaluation"]["score"].as_f64().is_some());
    assert_eq!(manifest["repairs"].as_array().map(Vec::len), Some(1));
    assert!(outcome.session_dir.join("final.mmd").exists());
    assert!(outcome.session_dir.join("final.png").exists());
}

#[tokio::test]
async fn plateau_publishes_the_current_image_not_an_earlier_better_one() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = ScriptedProvider::new()
        .respond_with(CODER_A, counting_coder("a", false))
        .respond_with(CRITIC, round_critic(vec![checklist(4, 1), checklist(4, 2)], None));
    let chart = ChartLoop::new(provider, ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::Plateaued);
    assert_eq!(outcome.visual_iterations, 2);
    assert_eq!(outcome.score, Some(0.5));
    let artifact = outcome.artifact.expect("artifact");
    assert_eq!(artifact.version, 2);
    let published = fs::read_to_string(outcome.code_path.expect("code")).expect("read code");
    assert_eq!(published, artifact.code);
}

#[tokio::test]
async fn critic_outage_publishes_the_latest_render() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = ScriptedProvider::new()
        .respond_with(CODER_A, counting_coder("a", false))
        .respond_with(CRITIC, round_critic(vec![checklist(4, 2)], Some(2)));
    let chart = ChartLoop::new(provider, ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::EvaluationFailed);
    assert!(outcome.success);
    assert_eq!(outcome.visual_iterations, 2);
    assert!(outcome.score.is_none());
    let artifact = outcome.artifact.expect("artifact");
    assert_eq!(artifact.version, 2);
    let published = fs::read_to_string(outcome.code_path.expect("code")).expect("read code");
    assert_eq!(published, artifact.code);
}
