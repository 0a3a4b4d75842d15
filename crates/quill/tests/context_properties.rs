//! Invariants of truncation, file contexts, and snippet editing, plus a full
//! turn against a scripted completion service.
//!
//! Property case counts follow `PROPTEST_CASES` (default 64).

use futures::future::BoxFuture;
use proptest::prelude::*;
use quill::api::EventSink;
use quill::context::FileContextStore;
use quill::context::file_context::{file_context_message, file_context_path};
use quill::context::tokens::estimate_log;
use quill::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(64);
    ProptestConfig::with_cases(cases)
}

// ── Log generation ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Entry {
    User(usize),
    Assistant(usize),
    ToolGroup { calls: usize, size: usize },
    File { name: u8, size: usize },
}

fn entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        (1usize..600).prop_map(Entry::User),
        (1usize..600).prop_map(Entry::Assistant),
        (1usize..4, 1usize..800).prop_map(|(calls, size)| Entry::ToolGroup { calls, size }),
        (0u8..8, 1usize..1200).prop_map(|(name, size)| Entry::File { name, size }),
    ]
}

fn build_log(entries: &[Entry]) -> Vec<Message> {
    let mut log = vec![Message::system("You are a coding assistant.")];
    let mut next_id = 0;
    for e in entries {
        match e {
            Entry::User(n) => log.push(Message::user("u".repeat(*n))),
            Entry::Assistant(n) => log.push(Message::assistant_text("a".repeat(*n))),
            Entry::ToolGroup { calls, size } => {
                let ids: Vec<String> = (0..*calls)
                    .map(|_| {
                        next_id += 1;
                        format!("call-{next_id}")
                    })
                    .collect();
                let tool_calls = ids
                    .iter()
                    .map(|id| ToolCall::new(id.clone(), "read_file", r#"{"path":"x"}"#))
                    .collect();
                log.push(Message::assistant_with_tool_calls("", tool_calls));
                for id in ids {
                    log.push(Message::tool_result(id, "r".repeat(*size)));
                }
            }
            Entry::File { name, size } => log.push(file_context_message(
                Path::new(&format!("/w/file{name}.rs")),
                &"f".repeat(*size),
            )),
        }
    }
    log
}

/// Every tool result has its requesting assistant message, and every
/// assistant message with tool calls has all of its results.
fn tool_groups_complete(log: &[Message]) -> bool {
    let requested: HashSet<&str> = log.iter().flat_map(|m| m.tool_call_ids()).collect();
    let answered: HashSet<&str> = log
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    requested == answered
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn truncate_keeps_root_system_prompt(
        entries in prop::collection::vec(entry(), 0..40),
        max_tokens in 200usize..5000,
        cap in 1usize..30,
    ) {
        let log = build_log(&entries);
        let budget = ContextBudget::new().with_max_tokens(max_tokens);
        let out = quill::context::truncate(&log, &budget, cap);
        prop_assert_eq!(&out[0], &log[0]);
    }

    #[test]
    fn truncate_never_splits_tool_groups(
        entries in prop::collection::vec(entry(), 0..40),
        max_tokens in 200usize..5000,
        cap in 1usize..30,
    ) {
        let log = build_log(&entries);
        let budget = ContextBudget::new().with_max_tokens(max_tokens);
        let out = quill::context::truncate(&log, &budget, cap);
        prop_assert!(tool_groups_complete(&out));
    }

    #[test]
    fn truncate_is_noop_below_pressure(
        entries in prop::collection::vec(entry(), 0..20),
    ) {
        let log = build_log(&entries);
        let budget = ContextBudget::new();
        let (tokens, _) = estimate_log(&log);
        prop_assume!(budget.classify(tokens) == PressureState::Healthy);
        prop_assert_eq!(quill::context::truncate(&log, &budget, log.len()), log);
    }

    #[test]
    fn truncate_keeps_relative_order(
        entries in prop::collection::vec(entry(), 0..40),
        cap in 1usize..30,
    ) {
        let log = build_log(&entries);
        let budget = ContextBudget::new().with_max_tokens(2000);
        let out = quill::context::truncate(&log, &budget, cap);
        let others: Vec<&Message> = log.iter().filter(|m| m.role != MessageRole::System).collect();
        let kept: Vec<&Message> = out.iter().filter(|m| m.role != MessageRole::System).collect();
        // Kept conversation is a suffix of the original conversation.
        prop_assert!(others.ends_with(&kept));
    }

    #[test]
    fn adding_same_file_twice_leaves_one_entry(
        entries in prop::collection::vec(entry(), 0..15),
        size in 1usize..500,
    ) {
        let mut log = build_log(&entries);
        let store = ContextConfig::default().file_store();
        let path = Path::new("/w/target.rs");
        let content = "t".repeat(size);
        store.add(&mut log, path, &content);
        store.add(&mut log, path, &content);
        let count = log
            .iter()
            .filter(|m| file_context_path(m) == Some("/w/target.rs"))
            .count();
        prop_assert_eq!(count, 1);
    }

    #[test]
    fn unique_snippet_is_replaced_exactly(
        prefix in "[a-z \n]{0,60}",
        snippet in "[A-Z]{1,12}",
        suffix in "[a-z \n]{0,60}",
        replacement in "[a-zA-Z0-9 \n]{0,20}",
    ) {
        let content = format!("{prefix}{snippet}{suffix}");
        let out = SnippetEditor::new().apply(&content, &snippet, &replacement).unwrap();
        prop_assert_eq!(out, format!("{prefix}{replacement}{suffix}"));
    }
}

// ── Scenarios ──────────────────────────────────────────────────────

#[test]
fn healthy_three_message_log_is_unchanged() {
    let log = vec![
        Message::system("sys"),
        Message::user("hi"),
        Message::assistant_text("hello"),
    ];
    assert_eq!(quill::context::truncate(&log, &ContextBudget::new(), 50), log);
}

#[cfg(feature = "fuzzy")]
#[test]
fn unrelated_two_line_snippet_is_below_threshold() {
    let err = SnippetEditor::new()
        .apply("a\nb\nc\nd", "x\ny", "z")
        .unwrap_err();
    assert!(matches!(err, EditError::BelowThreshold { min_score: 85, .. }), "{err:?}");
}

#[cfg(feature = "fuzzy")]
#[test]
fn duplicated_best_window_is_ambiguous() {
    let content = "fn alpha() {}\nfn beta() {}\nfn alpha() {}";
    let err = SnippetEditor::new()
        .apply(content, "fn alpha( {}", "fn gamma() {}")
        .unwrap_err();
    assert!(matches!(err, EditError::Ambiguous { occurrences: 2, .. }), "{err:?}");
}

#[test]
fn exact_path_short_circuits_fuzzy_search() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.py"), "a").unwrap();
    std::fs::write(dir.path().join("main2.py"), "b").unwrap();
    let files = FileTools::new(Workspace::new(dir.path()));
    let found = files.locate("main.py").unwrap();
    assert_eq!(found.file_name().unwrap(), "main.py");
}

#[test]
fn finder_returns_none_below_min_score() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.py"), "a").unwrap();
    std::fs::write(dir.path().join("readme.md"), "b").unwrap();
    let finder = FileFinder::new(Exclusions::default());
    assert_eq!(finder.find(dir.path(), "zzzzqqqq.toml"), None);
}

#[test]
fn approaching_limit_evicts_largest_not_oldest() {
    let store = FileContextStore::new(ContextBudget::new().with_max_tokens(1000), 3);
    let mut log = vec![Message::system("s".repeat(2000))];
    store.add(&mut log, Path::new("/w/oldest"), &"a".repeat(300));
    store.add(&mut log, Path::new("/w/largest"), &"b".repeat(900));
    store.add(&mut log, Path::new("/w/newer"), &"c".repeat(200));
    assert_eq!(ContextBudget::new().with_max_tokens(1000).state(&log), PressureState::Approaching);

    let outcome = store.add(&mut log, Path::new("/w/small"), "d");
    assert_eq!(
        outcome,
        AddOutcome::Inserted {
            evicted: vec!["/w/largest".to_string()]
        }
    );
}

// ── Full turn ──────────────────────────────────────────────────────

struct ScriptedService {
    rounds: Mutex<Vec<Vec<StreamEvent>>>,
}

impl ScriptedService {
    fn new(mut rounds: Vec<Vec<StreamEvent>>) -> Self {
        rounds.reverse();
        Self {
            rounds: Mutex::new(rounds),
        }
    }
}

impl CompletionService for ScriptedService {
    fn stream_chat<'a>(
        &'a self,
        _request: &'a ChatRequest,
        on_event: EventSink<'a>,
    ) -> BoxFuture<'a, Result<Vec<StreamEvent>, ApiError>> {
        Box::pin(async move {
            let events = self.rounds.lock().unwrap().pop().unwrap_or_default();
            for ev in &events {
                on_event(ev);
            }
            Ok(events)
        })
    }
}

fn tool_call(index: usize, id: &str, name: &str, args: &str) -> Vec<StreamEvent> {
    // Split the arguments across two fragments, like a real stream.
    let mid = args.len() / 2;
    let (head, tail) = args.split_at(mid);
    vec![
        StreamEvent::ToolCallDelta {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments_delta: head.into(),
        },
        StreamEvent::ToolCallDelta {
            index,
            id: None,
            name: None,
            arguments_delta: tail.into(),
        },
    ]
}

#[tokio::test]
async fn full_turn_reads_and_edits_a_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.rs"), "fn old() {}\n").unwrap();
    let tools = ToolSet::new().with_file_tools(FileTools::new(Workspace::new(dir.path())));

    let mut first = tool_call(0, "c1", "read_file", r#"{"path":"lib.rs"}"#);
    first.push(StreamEvent::Done);
    let mut second = tool_call(
        0,
        "c2",
        "edit_file",
        r#"{"path":"lib.rs","original_snippet":"fn old() {}","new_snippet":"fn new() {}"}"#,
    );
    second.push(StreamEvent::Done);
    let third = vec![
        StreamEvent::TextDelta("Renamed.".into()),
        StreamEvent::Done,
    ];
    let service = ScriptedService::new(vec![first, second, third]);

    let mut session = Session::new("sys", ContextConfig::default());
    let outcome = TurnRunner::new(&service, &tools, RequestParams::new("test-model"))
        .run(&mut session, "rename old to new", &mut NoopObserver, std::future::pending())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            text: "Renamed.".into(),
            rounds: 3
        }
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("lib.rs")).unwrap(),
        "fn new() {}\n"
    );
    let results: Vec<&str> = session
        .log()
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .map(Message::text)
        .collect();
    assert_eq!(results[0], "Content of file 'lib.rs':\n\nfn old() {}\n");
    assert_eq!(results[1], "Successfully edited file 'lib.rs'");
    assert!(tool_groups_complete(session.log()));
}

#[tokio::test]
async fn unknown_tool_is_answered_not_fatal() {
    let tools = ToolSet::new();
    let mut first = tool_call(0, "c1", "launch_rockets", "{}");
    first.push(StreamEvent::Done);
    let service = ScriptedService::new(vec![
        first,
        vec![StreamEvent::TextDelta("ok".into()), StreamEvent::Done],
    ]);
    let mut session = Session::new("sys", ContextConfig::default());
    let outcome = TurnRunner::new(&service, &tools, RequestParams::new("m"))
        .run(&mut session, "go", &mut NoopObserver, std::future::pending())
        .await
        .unwrap();
    assert_eq!(outcome.text(), "ok");
    let tool_msg = session
        .log()
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert_eq!(tool_msg.text(), "Error: unknown tool 'launch_rockets'");
}
