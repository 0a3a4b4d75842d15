//! One user turn: completion, tool rounds, and cancellation.
//!
//! [`TurnRunner::run`] truncates the log, appends the user message, then
//! alternates between a streamed completion and sequential tool execution
//! until the model answers without tool calls or [`MAX_TOOL_ROUNDS`] is
//! reached. The log is truncated again when the turn ends.
//!
//! Each completion call is raced against a caller-supplied cancellation
//! future. When cancellation wins, the partial response is discarded and
//! the log keeps only what earlier rounds produced.

use super::session::Session;
use crate::api::streaming::{collect_reasoning, extract_usage};
use crate::api::{
    CompletionService, StreamEvent, assemble_tool_calls, collect_text, validate_tool_calls,
};
use crate::tools::ToolSet;
use crate::{ApiError, ChatRequest, Message, UsageInfo};
use std::future::Future;
use tracing::{debug, info, warn};

/// Upper bound on completion/tool rounds in a single turn.
pub const MAX_TOOL_ROUNDS: usize = 5;

// ── Observer ───────────────────────────────────────────────────────

/// Receives progress from a running turn. Every method defaults to a no-op.
pub trait TurnObserver: Send {
    fn on_text_delta(&mut self, _delta: &str) {}

    fn on_reasoning_delta(&mut self, _delta: &str) {}

    /// A complete response has been received for `round`.
    fn on_response(&mut self, _round: usize, _text: &str) {}

    fn on_tool_call(&mut self, _name: &str, _arguments: &str) {}

    fn on_tool_result(&mut self, _name: &str, _result: &str) {}

    /// Tool calls removed because they lacked an id, a name, or valid JSON.
    fn on_dropped_tool_calls(&mut self, _count: usize) {}

    fn on_usage(&mut self, _usage: &UsageInfo) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

fn forward(observer: &mut dyn TurnObserver, event: &StreamEvent) {
    match event {
        StreamEvent::TextDelta(t) => observer.on_text_delta(t),
        StreamEvent::ReasoningDelta(t) => observer.on_reasoning_delta(t),
        _ => {}
    }
}

// ── Request parameters ─────────────────────────────────────────────

/// Model and sampling parameters for every completion in a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams {
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_completion_tokens: Option<u32>,
}

impl RequestParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            top_p: None,
            max_completion_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_completion_tokens(mut self, max: u32) -> Self {
        self.max_completion_tokens = Some(max);
        self
    }
}

// ── Outcome ────────────────────────────────────────────────────────

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without requesting tools.
    Completed { text: String, rounds: usize },
    /// Every round requested tools; the turn stopped at the limit.
    RoundLimit { rounds: usize },
    /// The cancellation future resolved during a completion call.
    Cancelled { rounds: usize },
}

impl TurnOutcome {
    pub fn rounds(&self) -> usize {
        match self {
            TurnOutcome::Completed { rounds, .. }
            | TurnOutcome::RoundLimit { rounds }
            | TurnOutcome::Cancelled { rounds } => *rounds,
        }
    }

    /// Final assistant text, empty unless the turn completed.
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Completed { text, .. } => text,
            _ => "",
        }
    }
}

// ── Runner ─────────────────────────────────────────────────────────

/// Runs user turns against a completion service and a tool set.
pub struct TurnRunner<'a> {
    service: &'a dyn CompletionService,
    tools: &'a ToolSet,
    params: RequestParams,
    max_rounds: usize,
}

impl<'a> TurnRunner<'a> {
    pub fn new(service: &'a dyn CompletionService, tools: &'a ToolSet, params: RequestParams) -> Self {
        Self {
            service,
            tools,
            params,
            max_rounds: MAX_TOOL_ROUNDS,
        }
    }

    /// Override the round limit (at least one round always runs).
    pub fn max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    fn request(&self, session: &Session) -> ChatRequest {
        let defs = self.tools.definitions();
        let has_tools = !defs.is_empty();
        ChatRequest {
            model: self.params.model.clone(),
            messages: session.log().to_vec(),
            max_completion_tokens: self.params.max_completion_tokens,
            temperature: self.params.temperature,
            top_p: self.params.top_p,
            tools: has_tools.then_some(defs),
            tool_choice: has_tools.then(|| "auto".to_string()),
            stream: true,
        }
    }

    /// Run one turn for `input`.
    ///
    /// Errors from the completion service end the turn; tool failures never
    /// do, they are returned to the model as `"Error: ..."` results.
    pub async fn run(
        &self,
        session: &mut Session,
        input: &str,
        observer: &mut dyn TurnObserver,
        cancel: impl Future<Output = ()>,
    ) -> Result<TurnOutcome, ApiError> {
        session.truncate();
        session.push_user(input);
        tokio::pin!(cancel);

        for round in 1..=self.max_rounds {
            let request = self.request(session);
            debug!(
                round,
                model = %request.model,
                messages = request.messages.len(),
                "requesting completion"
            );

            let events = {
                let mut sink = |event: &StreamEvent| forward(&mut *observer, event);
                tokio::select! {
                    result = self.service.stream_chat(&request, &mut sink) => Some(result),
                    () = &mut cancel => None,
                }
            };
            let Some(events) = events else {
                info!(round, "turn cancelled; discarding partial response");
                return Ok(TurnOutcome::Cancelled { rounds: round });
            };
            let events = events?;

            if let Some(usage) = extract_usage(&events) {
                observer.on_usage(&usage);
            }
            let reasoning = collect_reasoning(&events);
            if !reasoning.is_empty() {
                debug!(round, chars = reasoning.len(), "reasoning received");
            }
            let text = collect_text(&events);
            observer.on_response(round, &text);

            let assembled = assemble_tool_calls(&events);
            let received = assembled.len();
            let calls = validate_tool_calls(assembled);
            if calls.len() < received {
                warn!(round, dropped = received - calls.len(), "dropped malformed tool calls");
                observer.on_dropped_tool_calls(received - calls.len());
            }

            if calls.is_empty() {
                session.push(Message::assistant_text(text.clone()));
                session.truncate();
                return Ok(TurnOutcome::Completed {
                    text,
                    rounds: round,
                });
            }

            session.push(Message::assistant_with_tool_calls(text, calls.clone()));
            for call in &calls {
                let name = call.function.name.as_str();
                let arguments = call.function.arguments.as_str();
                observer.on_tool_call(name, arguments);
                let result = self.tools.execute(name, arguments).await;
                observer.on_tool_result(name, &result);
                session.push(Message::tool_result(call.id.clone(), result));
            }
        }

        info!(max_rounds = self.max_rounds, "tool round limit reached");
        session.truncate();
        Ok(TurnOutcome::RoundLimit {
            rounds: self.max_rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EventSink;
    use crate::context::ContextConfig;
    use crate::tools::{Tool, ToolFuture};
    use crate::{MessageRole, ToolDef};
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Replays one scripted event list per call.
    struct Scripted {
        responses: Mutex<Vec<Vec<StreamEvent>>>,
        requests: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(mut responses: Vec<Vec<StreamEvent>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionService for Scripted {
        fn stream_chat<'a>(
            &'a self,
            request: &'a ChatRequest,
            on_event: EventSink<'a>,
        ) -> BoxFuture<'a, Result<Vec<StreamEvent>, ApiError>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push(request.messages.len());
                let events = self.responses.lock().unwrap().pop().unwrap_or_default();
                for ev in &events {
                    on_event(ev);
                }
                Ok(events)
            })
        }
    }

    struct Pending;

    impl CompletionService for Pending {
        fn stream_chat<'a>(
            &'a self,
            _request: &'a ChatRequest,
            _on_event: EventSink<'a>,
        ) -> BoxFuture<'a, Result<Vec<StreamEvent>, ApiError>> {
            Box::pin(std::future::pending())
        }
    }

    struct Echo;

    impl Tool for Echo {
        fn definition(&self) -> ToolDef {
            ToolDef::new("echo", "Echo", serde_json::json!({"type": "object"}))
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let out = format!("echo {arguments}");
            Box::pin(async move { out })
        }
    }

    fn call(index: usize, id: &str) -> StreamEvent {
        StreamEvent::ToolCallDelta {
            index,
            id: Some(id.into()),
            name: Some("echo".into()),
            arguments_delta: "{}".into(),
        }
    }

    #[derive(Default)]
    struct Recorder {
        text: String,
        tools: Vec<String>,
        dropped: usize,
    }

    impl TurnObserver for Recorder {
        fn on_text_delta(&mut self, delta: &str) {
            self.text.push_str(delta);
        }

        fn on_tool_result(&mut self, name: &str, _result: &str) {
            self.tools.push(name.to_string());
        }

        fn on_dropped_tool_calls(&mut self, count: usize) {
            self.dropped += count;
        }
    }

    #[tokio::test]
    async fn plain_answer_completes_in_one_round() {
        let service = Scripted::new(vec![vec![
            StreamEvent::TextDelta("Hi ".into()),
            StreamEvent::TextDelta("there".into()),
            StreamEvent::Done,
        ]]);
        let tools = ToolSet::new();
        let mut session = Session::new("sys", ContextConfig::default());
        let mut recorder = Recorder::default();
        let outcome = TurnRunner::new(&service, &tools, RequestParams::new("m"))
            .run(&mut session, "hello", &mut recorder, std::future::pending())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                text: "Hi there".into(),
                rounds: 1
            }
        );
        assert_eq!(recorder.text, "Hi there");
        assert_eq!(session.len(), 3);
        assert_eq!(session.log()[2].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let service = Scripted::new(vec![
            vec![call(0, "c1"), call(1, "c2"), StreamEvent::Done],
            vec![StreamEvent::TextDelta("done".into()), StreamEvent::Done],
        ]);
        let tools = ToolSet::new().with(Echo);
        let mut session = Session::new("sys", ContextConfig::default());
        let mut recorder = Recorder::default();
        let outcome = TurnRunner::new(&service, &tools, RequestParams::new("m"))
            .run(&mut session, "go", &mut recorder, std::future::pending())
            .await
            .unwrap();
        assert_eq!(outcome.rounds(), 2);
        assert_eq!(outcome.text(), "done");
        assert_eq!(recorder.tools, vec!["echo", "echo"]);
        // sys, user, assistant(calls), tool, tool, assistant
        let roles: Vec<MessageRole> = session.log().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Tool,
                MessageRole::Assistant
            ]
        );
        assert_eq!(*service.requests.lock().unwrap(), vec![2, 5]);
    }

    #[tokio::test]
    async fn round_limit_is_enforced() {
        let script = (0..10).map(|i| vec![call(0, &format!("c{i}")), StreamEvent::Done]).collect();
        let service = Scripted::new(script);
        let tools = ToolSet::new().with(Echo);
        let mut session = Session::new("sys", ContextConfig::default());
        let outcome = TurnRunner::new(&service, &tools, RequestParams::new("m"))
            .run(&mut session, "loop", &mut NoopObserver, std::future::pending())
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::RoundLimit { rounds: MAX_TOOL_ROUNDS });
        assert_eq!(service.requests.lock().unwrap().len(), MAX_TOOL_ROUNDS);
    }

    #[tokio::test]
    async fn malformed_calls_are_dropped() {
        let service = Scripted::new(vec![vec![
            StreamEvent::ToolCallDelta {
                index: 0,
                id: None,
                name: Some("echo".into()),
                arguments_delta: "{}".into(),
            },
            StreamEvent::TextDelta("no tools".into()),
            StreamEvent::Done,
        ]]);
        let tools = ToolSet::new().with(Echo);
        let mut session = Session::new("sys", ContextConfig::default());
        let mut recorder = Recorder::default();
        let outcome = TurnRunner::new(&service, &tools, RequestParams::new("m"))
            .run(&mut session, "go", &mut recorder, std::future::pending())
            .await
            .unwrap();
        assert_eq!(outcome.text(), "no tools");
        assert_eq!(recorder.dropped, 1);
        assert!(session.log().iter().all(|m| m.role != MessageRole::Tool));
    }

    #[tokio::test]
    async fn cancellation_discards_the_round() {
        let tools = ToolSet::new();
        let mut session = Session::new("sys", ContextConfig::default());
        let outcome = TurnRunner::new(&Pending, &tools, RequestParams::new("m"))
            .run(&mut session, "wait", &mut NoopObserver, async {})
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Cancelled { rounds: 1 });
        assert_eq!(session.len(), 2);
        assert_eq!(session.log()[1].text(), "wait");
    }

    #[test]
    fn request_omits_tools_when_none_registered() {
        let tools = ToolSet::new();
        let session = Session::new("sys", ContextConfig::default());
        let runner = TurnRunner::new(&Pending, &tools, RequestParams::new("m").temperature(0.2));
        let req = runner.request(&session);
        assert!(req.tools.is_none());
        assert!(req.tool_choice.is_none());
        assert!(req.stream);
        assert_eq!(req.temperature, Some(0.2));
    }
}
