// Budget caps and loop switches.

#[path = "../support/mod.rs"]
mod support;

use chartloop_core::domain::SynthesizerId;
use chartloop_core::model::ModelRequest;
use chartloop_core::{CancelSignal, ChartLoop, ChartRequest, TerminalReason};
use std::sync::Arc;
use support::*;
use tempfile::tempdir;

#[tokio::test]
async fn render_attempts_never_exceed_twice_the_retry_budget() {
    for retries in 1..=4 {
        for rounds in 1..=3 {
            let dir = tempdir().expect("tempdir");
            let mut config = test_config(dir.path());
            config.loop_config.max_render_retries = retries;
            config.loop_config.max_ping_pong_rounds = rounds;

            let provider = ScriptedProvider::new()
                .respond_with(CODER_A, counting_coder("a", true))
                .respond_with(CODER_B, counting_coder("b", true));
            let renderer = Arc::new(ScriptedRenderer::rejecting_marked());
            let chart = ChartLoop::new(provider, Arc::clone(&renderer), &config);

            let outcome = chart
                .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
                .await
                .expect("session");

            let cap = retries * 2;
            assert_eq!(outcome.terminal, TerminalReason::BudgetExhausted);
            assert!(outcome.render_attempts <= cap, "retries {retries}, rounds {rounds}");
            assert!(renderer.count().await as u32 <= cap);
            assert!(outcome.repair_identities.len() as u32 <= cap);
        }
    }
}

#[tokio::test]
async fn visual_iterations_stop_at_the_configured_maximum() {
    let dir = tempdir().expect("tempdir");
    let mut config = test_config(dir.path());
    config.loop_config.max_visual_iterations = 3;
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", false))
            .respond_with(CRITIC, shifting_critic(4)),
    );
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::BudgetExhausted);
    assert_eq!(outcome.visual_iterations, 3);
    assert!(outcome.success);
    assert!(!outcome.approved);
    assert_eq!(outcome.score, Some(0.0));
    assert_eq!(provider.calls(CODER_A).await, 3);
}

#[tokio::test]
async fn failed_synthesis_consumes_a_render_slot() {
    let dir = tempdir().expect("tempdir");
    let mut config = test_config(dir.path());
    config.loop_config.max_render_retries = 2;
    let provider = Arc::new(ScriptedProvider::new().respond_with(
        CODER_A,
        Arc::new(|_: &ModelRequest| Ok("I would rather describe the diagram in words.".to_string())),
    ));
    let renderer = Arc::new(ScriptedRenderer::accepting());
    let chart = ChartLoop::new(Arc::clone(&provider), Arc::clone(&renderer), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::BudgetExhausted);
    assert_eq!(outcome.render_attempts, 4);
    assert_eq!(renderer.count().await, 0);
    assert_eq!(provider.calls(CODER_A).await, 4);
    assert!(
        outcome
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("Code error"))
    );
}

#[tokio::test]
async fn single_coder_mode_revises_instead_of_repairing() {
    let dir = tempdir().expect("tempdir");
    let mut config = test_config(dir.path());
    config.loop_config.use_dual_coder = false;
    config.loop_config.max_render_retries = 1;
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", false))
            .respond_with(CODER_B, counting_coder("b", false)),
    );
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::failing(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert!(!outcome.success);
    assert_eq!(outcome.render_attempts, 2);
    assert!(outcome.repair_identities.is_empty());
    assert_eq!(provider.calls(CODER_B).await, 0);

    let coder_calls = provider.requests_for(CODER_A).await;
    assert_eq!(coder_calls.len(), 2);
    let revise_prompt = prompt_of(&coder_calls[1]);
    assert!(revise_prompt.contains("Fix syntax error"));
    assert!(revise_prompt.contains(RENDER_ERROR));
}

#[tokio::test]
async fn failed_repair_run_feeds_simplification_advice_to_revise() {
    let dir = tempdir().expect("tempdir");
    let mut config = test_config(dir.path());
    config.loop_config.max_ping_pong_rounds = 1;
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond_with(CODER_A, counting_coder("a", true))
            .respond_with(CODER_B, counting_coder("b", true)),
    );
    let chart = ChartLoop::new(
        Arc::clone(&provider),
        ScriptedRenderer::rejecting_marked(),
        &config,
    );

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    assert!(!outcome.success);
    // generate, repair A, then revise
    let coder_calls = provider.requests_for(CODER_A).await;
    assert!(coder_calls.len() >= 3);
    assert!(prompt_of(&coder_calls[2]).contains("Simplify diagram significantly"));
    assert_eq!(
        &outcome.repair_identities[..2],
        &[SynthesizerId::A, SynthesizerId::B]
    );
}

#[tokio::test]
async fn skipping_inspection_keeps_the_first_image() {
    let dir = tempdir().expect("tempdir");
    let mut config = test_config(dir.path());
    config.loop_config.skip_inspection = true;
    let provider = Arc::new(ScriptedProvider::new().respond_with(CODER_A, counting_coder("a", false)));
    let chart = ChartLoop::new(Arc::clone(&provider), ScriptedRenderer::accepting(), &config);

    let outcome = chart
        .run_design(
            five_node_design(),
            &ChartRequest::default().with_output_name("pipeline"),
            CancelSignal::never(),
        )
        .await
        .expect("session");

    assert_eq!(outcome.terminal, TerminalReason::InspectionSkipped);
    assert!(outcome.success);
    assert!(!outcome.approved);
    assert!(outcome.score.is_none());
    assert_eq!(provider.calls(CRITIC).await, 0);
    assert_eq!(
        outcome.code_path,
        Some(config.paths.output_dir.join("pipeline.mmd"))
    );
    assert_eq!(
        outcome.image_path,
        Some(config.paths.output_dir.join("pipeline.png"))
    );
}

#[tokio::test]
async fn one_repair_run_makes_two_attempts_per_round() {
    let dir = tempdir().expect("tempdir");
    let mut config = test_config(dir.path());
    config.loop_config.max_ping_pong_rounds = 2;
    config.loop_config.max_render_retries = 3;
    let provider = ScriptedProvider::new()
        .respond_with(CODER_A, counting_coder("a", true))
        .respond_with(CODER_B, counting_coder("b", true));
    let chart = ChartLoop::new(provider, ScriptedRenderer::rejecting_marked(), &config);

    let outcome = chart
        .run_design(five_node_design(), &ChartRequest::default(), CancelSignal::never())
        .await
        .expect("session");

    // generate, four repairs, one revise; the second run finds no budget
    assert_eq!(outcome.render_attempts, 6);
    assert_eq!(
        outcome.repair_identities,
        vec![SynthesizerId::A, SynthesizerId::B, SynthesizerId::A, SynthesizerId::B]
    );
}
