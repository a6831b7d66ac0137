//! Scripted collaborators and graph fixtures shared by the executor, navigation and
//! service tests.

use std::sync::{
    Mutex,
    atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::{
    delegate::{AiDelegate, ApiDelegate, ApiRequest, Completion, DelegateError, ModelConfig, SpeechDelegate, VoiceConfig},
    graph::FlowGraph,
    model::FlowModel,
    session::HistoryEntry,
};

/// Routes engine logs to the test writer, filtered by `RUST_LOG` (default `debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Flow model for tenant `acme` with the given node list.
pub fn flow_model(
    id: &str,
    nodes: Value,
) -> FlowModel {
    serde_json::from_value(json!({ "id": id, "tenant_id": "acme", "nodes": nodes })).unwrap()
}

pub fn flow(nodes: Value) -> FlowGraph {
    FlowGraph::from_model(&flow_model("f1", nodes), 1).unwrap()
}

/// start -> msg1("Hi") -> cond(contains "price" -> msg2, default -> msg3)
pub fn price_nodes() -> Value {
    json!([
        { "id": "start", "type": "start", "next": "msg1" },
        { "id": "msg1", "type": "message", "content": "Hi", "next": "cond" },
        { "id": "cond", "type": "condition", "next": [
            { "condition": { "operator": "contains", "value": "price" }, "target": "msg2" },
            { "condition": { "operator": "default" }, "target": "msg3" }
        ] },
        { "id": "msg2", "type": "message", "content": "It costs 10" },
        { "id": "msg3", "type": "message", "content": "How can I help?" }
    ])
}

pub fn price_flow() -> FlowGraph {
    flow(price_nodes())
}

pub struct ScriptedAi {
    reply: String,
    tokens: u64,
    failure: Option<DelegateError>,
    failures_left: AtomicU32,
    pub calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
    models: Mutex<Vec<ModelConfig>>,
    gate: Option<Notify>,
}

impl ScriptedAi {
    pub fn replying(
        reply: &str,
        tokens: u64,
    ) -> Self {
        Self {
            reply: reply.to_string(),
            tokens,
            failure: None,
            failures_left: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Fails `times` times with `error`, then replies.
    pub fn failing_then(
        error: DelegateError,
        times: u32,
        reply: &str,
    ) -> Self {
        Self {
            failure: Some(error),
            failures_left: AtomicU32::new(times),
            ..Self::replying(reply, 1)
        }
    }

    /// Waits for [`ScriptedAi::release`] before replying.
    pub fn gated(reply: &str) -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::replying(reply, 1)
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn models(&self) -> Vec<ModelConfig> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiDelegate for ScriptedAi {
    async fn complete(
        &self,
        prompt: &str,
        _history: &[HistoryEntry],
        config: &ModelConfig,
    ) -> Result<Completion, DelegateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.models.lock().unwrap().push(config.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(failure) = &self.failure
            && self.failures_left.load(Ordering::SeqCst) > 0
        {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(failure.clone());
        }
        Ok(Completion {
            text: self.reply.clone(),
            tokens_used: self.tokens,
        })
    }
}

/// AI client that crashes instead of answering.
pub struct PanickingAi;

#[async_trait]
impl AiDelegate for PanickingAi {
    async fn complete(
        &self,
        _prompt: &str,
        _history: &[HistoryEntry],
        _config: &ModelConfig,
    ) -> Result<Completion, DelegateError> {
        panic!("model client crashed")
    }
}

pub struct ScriptedApi {
    reply: Result<Value, DelegateError>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedApi {
    pub fn replying(reply: Value) -> Self {
        Self {
            reply: Ok(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: DelegateError) -> Self {
        Self {
            reply: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiDelegate for ScriptedApi {
    async fn call(
        &self,
        request: &ApiRequest,
    ) -> Result<Value, DelegateError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}

pub struct ScriptedSpeech {
    transcript: String,
    audio: Vec<u8>,
    hints: Mutex<Vec<Option<String>>>,
}

impl ScriptedSpeech {
    pub fn new(
        transcript: &str,
        audio: Vec<u8>,
    ) -> Self {
        Self {
            transcript: transcript.to_string(),
            audio,
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn language_hints(&self) -> Vec<Option<String>> {
        self.hints.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechDelegate for ScriptedSpeech {
    async fn text_to_speech(
        &self,
        _text: &str,
        _voice: &VoiceConfig,
    ) -> Result<Vec<u8>, DelegateError> {
        Ok(self.audio.clone())
    }

    async fn speech_to_text(
        &self,
        _audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, DelegateError> {
        self.hints.lock().unwrap().push(language_hint.map(str::to_string));
        Ok(self.transcript.clone())
    }
}
