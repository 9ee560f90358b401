// Visual evaluator against a scripted critic.

#[path = "../support/mod.rs"]
mod support;

use chartloop_core::domain::{QuestionSource, RenderedImage};
use chartloop_core::evaluator::{EvaluationError, EvaluatorConfig, VisualEvaluator};
use chartloop_core::model::ModelRequest;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use support::*;
use tempfile::tempdir;

fn evaluator(provider: Arc<ScriptedProvider>, threshold: f64) -> VisualEvaluator<Arc<ScriptedProvider>> {
    VisualEvaluator::new(
        EvaluatorConfig {
            provider: "ollama".into(),
            model: CRITIC.into(),
            temperature: Some(0.0),
            seed: None,
            timeout: Duration::from_secs(5),
            approval_threshold: threshold,
        },
        provider,
    )
}

fn image(dir: &Path) -> RenderedImage {
    let path = dir.join("diagram.png");
    fs::write(&path, b"\x89PNG\r\n\x1a\nimage").expect("write image");
    RenderedImage { path, bytes: 13 }
}

#[tokio::test]
async fn score_stays_in_range_and_approval_follows_the_threshold() {
    let dir = tempdir().expect("tempdir");
    let img = image(dir.path());

    for total in [4usize, 5, 7, 10] {
        for failing in 0..=total {
            let provider = Arc::new(
                ScriptedProvider::new().respond_with(CRITIC, critic(checklist(total, failing))),
            );
            let round = evaluator(provider, 0.8)
                .evaluate(&five_node_design(), &img)
                .await
                .expect("round");

            assert!((0.0..=1.0).contains(&round.score));
            assert_eq!(round.approved, round.score >= 0.8);
            assert_eq!(round.answers.len(), total);
            assert_eq!(round.feedback.issues.len(), failing);
            assert_eq!(round.source, QuestionSource::Generated);
        }
    }
}

#[tokio::test]
async fn every_inspection_carries_the_image() {
    let dir = tempdir().expect("tempdir");
    let provider = Arc::new(ScriptedProvider::new().respond_with(CRITIC, critic(checklist(4, 1))));
    evaluator(Arc::clone(&provider), 0.8)
        .evaluate(&five_node_design(), &image(dir.path()))
        .await
        .expect("round");

    let requests = provider.requests_for(CRITIC).await;
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[0].image_count(), 0);
    assert!(requests[1..].iter().all(|r| r.image_count() == 1));
}

#[tokio::test]
async fn unusable_checklist_falls_back_to_built_in_questions() {
    let dir = tempdir().expect("tempdir");
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(CRITIC, r#"["Only one question?"]"#)
            .respond_with(CRITIC, Arc::new(|_: &ModelRequest| Ok("Yes.".to_string()))),
    );
    let round = evaluator(provider, 0.8)
        .evaluate(&five_node_design(), &image(dir.path()))
        .await
        .expect("round");

    assert_eq!(round.source, QuestionSource::Fallback);
    assert!(round.questions.len() >= 4);
    assert!(round.questions.len() <= 10);
    assert!(round.approved);
    assert_eq!(round.score, 1.0);
}

#[tokio::test]
async fn failed_inspections_count_as_no_and_answers_stay_in_order() {
    let dir = tempdir().expect("tempdir");
    let questions = checklist(4, 0);
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(CRITIC, questions_json(&questions))
            .reply(CRITIC, "YES")
            .fail(CRITIC, "timeout")
            .reply(CRITIC, "I cannot tell")
            .reply(CRITIC, "yes"),
    );
    let round = evaluator(provider, 0.8)
        .evaluate(&five_node_design(), &image(dir.path()))
        .await
        .expect("round");

    let ids: Vec<u32> = round.answers.iter().map(|a| a.question_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(round.answers.iter().filter(|a| a.answer).count(), 2);
    assert_eq!(round.score, 0.5);
    assert!(!round.approved);
    assert!(!round.feedback.suggestions.is_empty());
}

#[tokio::test]
async fn all_inspections_failing_is_an_evaluation_failure() {
    let dir = tempdir().expect("tempdir");
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(CRITIC, questions_json(&checklist(4, 0)))
            .respond_with(CRITIC, Arc::new(|_: &ModelRequest| Err("offline".to_string()))),
    );
    let result = evaluator(provider, 0.8)
        .evaluate(&five_node_design(), &image(dir.path()))
        .await;

    assert!(matches!(
        result,
        Err(EvaluationError::AllInspectionsFailed { count: 4, .. })
    ));
}

#[tokio::test]
async fn missing_image_is_reported() {
    let dir = tempdir().expect("tempdir");
    let provider = Arc::new(ScriptedProvider::new());
    let missing = RenderedImage {
        path: dir.path().join("nope.png"),
        bytes: 0,
    };
    let result = evaluator(provider, 0.8).evaluate(&five_node_design(), &missing).await;
    assert!(matches!(result, Err(EvaluationError::Image { .. })));
}
