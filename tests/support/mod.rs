// Shared test doubles for the loop tests.
//
// ScriptedProvider answers chat requests per model name, first from a reply
// queue and then from an optional responder closure. ScriptedRenderer
// writes a real image file for accepted code so the critic can read it back.

#![allow(dead_code)]

use async_trait::async_trait;
use chartloop_core::AppConfig;
use chartloop_core::domain::{DesignSpec, RenderOutcome, RenderedImage};
use chartloop_core::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use chartloop_core::render::{RenderBackend, RenderRequest};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

pub const CODER_A: &str = "coder-a";
pub const CODER_B: &str = "coder-b";
pub const CRITIC: &str = "critic";

/// Word that makes the scripted critic answer "no".
pub const REJECT_MARKER: &str = "crowded";

/// Word that makes the scripted renderer reject code.
pub const BROKEN_MARKER: &str = "BROKEN";

pub const RENDER_ERROR: &str = "Parse error on line 2: Expecting 'SEMI', got 'NODE_STRING'";

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

pub type Responder = Arc<dyn Fn(&ModelRequest) -> Result<String, String> + Send + Sync>;

#[derive(Default)]
pub struct ScriptedProvider {
    queues: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    responders: HashMap<String, Responder>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, model: &str, text: impl Into<String>) -> Self {
        self.queues
            .get_mut()
            .entry(model.to_string())
            .or_default()
            .push_back(Ok(text.into()));
        self
    }

    pub fn fail(mut self, model: &str, reason: impl Into<String>) -> Self {
        self.queues
            .get_mut()
            .entry(model.to_string())
            .or_default()
            .push_back(Err(reason.into()));
        self
    }

    pub fn respond_with(mut self, model: &str, responder: Responder) -> Self {
        self.responders.insert(model.to_string(), responder);
        self
    }

    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn requests_for(&self, model: &str) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.model == model)
            .cloned()
            .collect()
    }

    pub async fn calls(&self, model: &str) -> usize {
        self.requests_for(model).await.len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().await.push(request.clone());

        let queued = self
            .queues
            .lock()
            .await
            .get_mut(&request.model)
            .and_then(VecDeque::pop_front);
        let reply = match queued {
            Some(reply) => reply,
            None => match self.responders.get(&request.model) {
                Some(responder) => responder(&request),
                None => Err(format!("no scripted reply for model '{}'", request.model)),
            },
        };

        reply
            .map(ModelResponse::new)
            .map_err(|reason| ModelError::invalid_response(request.provider.clone(), reason))
    }
}

/// Text of the last user message of a request.
pub fn prompt_of(request: &ModelRequest) -> &str {
    request
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

pub enum RenderMode {
    Accept,
    RejectMarked,
    AlwaysFail,
}

pub struct ScriptedRenderer {
    mode: RenderMode,
    rendered: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(RenderMode::Accept)
    }

    /// Rejects any code containing [`BROKEN_MARKER`].
    pub fn rejecting_marked() -> Self {
        Self::new(RenderMode::RejectMarked)
    }

    pub fn failing() -> Self {
        Self::new(RenderMode::AlwaysFail)
    }

    pub async fn rendered(&self) -> Vec<String> {
        self.rendered.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.rendered.lock().await.len()
    }
}

#[async_trait]
impl RenderBackend for ScriptedRenderer {
    async fn render(&self, request: RenderRequest) -> RenderOutcome {
        self.rendered.lock().await.push(request.code.clone());

        let reject = match self.mode {
            RenderMode::Accept => false,
            RenderMode::RejectMarked => request.code.contains(BROKEN_MARKER),
            RenderMode::AlwaysFail => true,
        };
        if reject {
            return RenderOutcome::failed(
                RENDER_ERROR,
                format!("Error: {RENDER_ERROR}\n{}", request.code),
                3,
            );
        }

        let path = request.output_dir.join(format!("{}.png", request.stem));
        match tokio::fs::write(&path, PNG_BYTES).await {
            Ok(()) => RenderOutcome::succeeded(
                RenderedImage {
                    path,
                    bytes: PNG_BYTES.len() as u64,
                },
                3,
            ),
            Err(err) => RenderOutcome::failed("Output file not created", err.to_string(), 3),
        }
    }
}

pub fn fence(code: &str) -> String {
    format!("Here is the diagram:\n\n```mermaid\n{code}\n```\n")
}

/// A coder that returns a fresh, distinct diagram on every call.
pub fn counting_coder(label: &'static str, broken: bool) -> Responder {
    let counter = Arc::new(AtomicUsize::new(0));
    Arc::new(move |_request: &ModelRequest| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let marker = if broken { BROKEN_MARKER } else { "ok" };
        Ok(fence(&format!(
            "flowchart TB\n    start([{label} {n}]) --> check{{{marker}}}\n    check --> done"
        )))
    })
}

pub fn questions_json(questions: &[String]) -> String {
    let items: Vec<serde_json::Value> = questions
        .iter()
        .map(|q| serde_json::json!({"category": "layout", "question": q, "focus": "flow"}))
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// A critic that asks `questions` every round and answers "no" to those
/// containing [`REJECT_MARKER`].
pub fn critic(questions: Vec<String>) -> Responder {
    let checklist = questions_json(&questions);
    Arc::new(move |request: &ModelRequest| {
        if request.image_count() == 0 {
            return Ok(checklist.clone());
        }
        if prompt_of(request).contains(REJECT_MARKER) {
            Ok("NO - spread the nodes further apart".to_string())
        } else {
            Ok("YES, this looks right".to_string())
        }
    })
}

/// `total` questions of which `failing` contain the reject marker.
pub fn checklist(total: usize, failing: usize) -> Vec<String> {
    (1..=total)
        .map(|i| {
            if i <= failing {
                format!("Is region {i} {REJECT_MARKER} or tangled?")
            } else {
                format!("Is region {i} clearly laid out?")
            }
        })
        .collect()
}

/// A critic whose rejected questions use fresh words every round, so two
/// rounds never look alike.
pub fn shifting_critic(total: usize) -> Responder {
    let round = Arc::new(AtomicUsize::new(0));
    Arc::new(move |request: &ModelRequest| {
        if request.image_count() == 0 {
            let r = round.fetch_add(1, Ordering::SeqCst) + 1;
            let questions: Vec<String> = (1..=total)
                .map(|i| {
                    format!("{REJECT_MARKER} r{r}q{i} w{r}a{i} w{r}b{i} w{r}c{i} w{r}d{i} w{r}e{i}")
                })
                .collect();
            return Ok(questions_json(&questions));
        }
        Ok("NO - rearrange this part".to_string())
    })
}

/// A critic that asks `rounds[0]` in the first round, `rounds[1]` in the
/// second and so on (the last list repeats), answering "no" to questions
/// containing [`REJECT_MARKER`]. From the 1-based round `outage_from` on,
/// every inspection call fails.
pub fn round_critic(rounds: Vec<Vec<String>>, outage_from: Option<usize>) -> Responder {
    let round = Arc::new(AtomicUsize::new(0));
    let checklists: Vec<String> = rounds.iter().map(|q| questions_json(q)).collect();
    Arc::new(move |request: &ModelRequest| {
        if request.image_count() == 0 {
            let r = round.fetch_add(1, Ordering::SeqCst);
            let idx = r.min(checklists.len() - 1);
            return Ok(checklists[idx].clone());
        }
        let current = round.load(Ordering::SeqCst);
        if outage_from.is_some_and(|from| current >= from) {
            return Err("vision model offline".to_string());
        }
        if prompt_of(request).contains(REJECT_MARKER) {
            Ok("NO - spread the nodes further apart".to_string())
        } else {
            Ok("YES".to_string())
        }
    })
}

/// A five-step flowchart with one decision.
pub fn five_node_design() -> DesignSpec {
    DesignSpec::from_json(
        r#"{
            "kind": "flowchart",
            "direction": "TB",
            "nodes": [
                {"id": "start", "label": "Start", "shape": "stadium"},
                {"id": "load", "label": "Load input"},
                {"id": "check", "label": "Valid?", "shape": "decision"},
                {"id": "save", "label": "Save"},
                {"id": "fail", "label": "Report error"}
            ],
            "edges": [
                {"from": "start", "to": "load"},
                {"from": "load", "to": "check"},
                {"from": "check", "to": "save", "label": "yes"},
                {"from": "check", "to": "fail", "label": "no"}
            ]
        }"#,
    )
    .expect("valid design")
}

/// Defaults wired to the scripted model names, writing under `root`.
pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.agents.coder_a.model = CODER_A.to_string();
    config.agents.coder_b.model = CODER_B.to_string();
    config.agents.evaluator.model = CRITIC.to_string();
    config.loop_config.llm_timeout_secs = 5;
    config.paths.log_dir = root.join("logs");
    config.paths.output_dir = root.join("out");
    config
}
