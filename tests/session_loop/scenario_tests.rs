// End-to-end loop scenarios with scripted coders, critic and renderer.

#[path = "../support/mod.rs"]
mod support;

use chartloop_core::domain::SynthesizerId;
use chartloop_core::render::{RenderBackend, RenderRequest};
use chartloop_core::{CancelSignal, ChartLoop, ChartRequest, TerminalReason};
use std::fs;
use std::sync::Arc;
use support::*;
use tempfile::tempdir;

#[tokio::test]
async fn second_coder_fixes_what_the_first_could_not() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(
                CODER_A,
                fence("flowchart TB\n    start --> load[BROKEN\n    load --> check"),
            )
            .reply(
                CODER_A,
                fence("flowchart TB\n    start --> load[BROKEN again]]\n    load --> check"),
            )
            .reply(
                CODER_B,
                fence("flowchart TB\n    start([Start]) --> load[Load input]\n    load --> check{Valid?}"),
            )
            .respond_with(CRITIC, critic(checklist(4, 0))),
    );
    let renderer = Arc::new(ScriptedRenderer::rejecting_marked());
    let chart = ChartLoop::new(Arc::clone(&provider), Arc::clone(&renderer), &config);

    let outcome = chart
        .run_design(
            five_node_design(),
            &ChartRequest::new("five step pipeline"),
            CancelSignal::never(),
        )
        .await
        .expect("session");

    assert!(outcome.success);
    assert!(outcome.approved);
    assert_eq!(outcome.repair_identities, vec![SynthesizerId::A, SynthesizerId::B]);
    assert_eq!(outcome.render_attempts, 3);
    assert_eq!(outcome.visual_iterations, 1);

    let artifact = outcome.artifact.expect("final artifact");
    assert_eq!(artifact.producer, SynthesizerId::B);
    let rendered = renderer.rendered().await;
    assert_eq!(rendered.last(), Some(&artifact.code));

    // The accepted code renders again on its own.
    let again = renderer
        .render(RenderRequest::new(artifact.code.clone(), dir.path(), "isolated"))
        .await;
    assert!(again.success);

    let code_path = outcome.code_path.expect("published code");
    assert_eq!(fs::read_to_string(code_path).expect("read code"), artifact.code);
    assert!(outcome.image_path.expect("published image").exists());
}

#[tokio::test]
async fn renderer_that_always_fails_exhausts_the_budget() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", false))
            .respond_with(CODER_B, counting_coder("b", false))
            .respond_with(CRITIC, critic(checklist(4, 0))),
    );
    let renderer = Arc::new(ScriptedRenderer::failing());
    let chart = ChartLoop::new(Arc::clone(&provider), Arc::clone(&renderer), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert!(!outcome.success);
    assert!(!outcome.approved);
    assert_eq!(outcome.terminal, TerminalReason::BudgetExhausted);
    assert_eq!(outcome.render_attempts, config.loop_config.max_render_attempts());
    assert_eq!(renderer.count().await as u32, outcome.render_attempts);
    assert!(outcome.image_path.is_none());
    assert!(
        outcome
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("Parse error")),
        "last error: {:?}",
        outcome.last_error
    );
    assert_eq!(provider.calls(CRITIC).await, 0);

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outcome.manifest_path).expect("manifest"))
            .expect("manifest json");
    assert_eq!(manifest["terminal"], "budget_exhausted");
    assert_eq!(manifest["success"], false);
}

#[tokio::test]
async fn first_round_above_threshold_is_approved_immediately() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", false))
            .respond_with(CRITIC, critic(checklist(10, 1))),
    );
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert!(outcome.success);
    assert!(outcome.approved);
    assert_eq!(outcome.terminal, TerminalReason::Approved);
    assert_eq!(outcome.visual_iterations, 1);
    let score = outcome.score.expect("score");
    assert!((score - 0.9).abs() < 1e-9, "score {score}");
    assert_eq!(provider.calls(CODER_A).await, 1);
    assert_eq!(provider.calls(CODER_B).await, 0);
}

#[tokio::test]
async fn repeated_complaints_stop_at_plateau_without_another_revision() {
    let dir = tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", false))
            .respond_with(CRITIC, critic(checklist(4, 2))),
    );
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert!(outcome.success);
    assert!(!outcome.approved);
    assert_eq!(outcome.terminal, TerminalReason::Plateaued);
    assert_eq!(outcome.visual_iterations, 2);
    assert_eq!(outcome.score, Some(0.5));

    // One generate and one revise; the plateau round triggers no further call.
    let coder_calls = provider.requests_for(CODER_A).await;
    assert_eq!(coder_calls.len(), 2);
    let revise_prompt = prompt_of(&coder_calls[1]);
    assert!(revise_prompt.contains(REJECT_MARKER));
}
