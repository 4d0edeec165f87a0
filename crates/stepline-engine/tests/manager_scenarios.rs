//! End-to-end runs through the step manager, one scenario per test.

use std::collections::HashMap;

use stepline_engine::{StepManager, StepperConfig};
use stepline_testing::EventScript;
use stepline_types::{StepKind, StepStatus};

fn manager() -> StepManager {
    StepManager::new(StepperConfig::new())
}

#[test]
fn reasoning_then_announced_tool_call() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.llm_started("R"));
    mgr.process(&script.llm_ended_with_intents("R", &[("c1", "search")]));

    let steps = mgr.steps();
    assert_eq!(steps.len(), 2);

    assert_eq!(steps[0].kind, StepKind::Thinking);
    assert_eq!(steps[0].title, "Thinking…");
    assert_eq!(steps[0].status, StepStatus::Completed);

    assert_eq!(steps[1].kind, StepKind::Tool);
    assert_eq!(steps[1].title, "search");
    assert_eq!(steps[1].status, StepStatus::Running);
}

#[test]
fn start_end_pair_reconciles_with_announced_call() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.llm_started("R"));
    mgr.process(&script.llm_ended_with_intents("R", &[("c1", "search")]));

    let announced_id = mgr.steps()[1].id;

    mgr.process(&script.tool_started("R", "search", "c1"));
    assert_eq!(mgr.steps().len(), 2, "start must not duplicate the intent");

    mgr.process(&script.tool_ended("R", "c1", "three results"));
    let steps = mgr.steps();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].id, announced_id, "same step, updated in place");
    assert_eq!(steps[1].status, StepStatus::Completed);
    match &steps[1].data {
        stepline_types::StepData::Tool { output, .. } => {
            assert_eq!(output.as_deref(), Some("three results"));
        }
        other => panic!("expected tool data, got {:?}", other),
    }
}

#[test]
fn tool_title_map_renames_the_step() {
    let mut script = EventScript::new();
    let mut map = HashMap::new();
    map.insert("search".to_string(), "Searching the web".to_string());
    let mut mgr = StepManager::new(StepperConfig::new().with_tool_title_map(map));

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.llm_started("R"));
    mgr.process(&script.llm_ended_with_intents("R", &[("c1", "search")]));

    assert_eq!(mgr.steps()[1].title, "Searching the web");
}

#[test]
fn duplicate_completion_is_a_noop() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.tool_started("R", "search", "c1"));
    let done = script.tool_ended("R", "c1", "results");

    let first = mgr.process(&done);
    assert_eq!(first.len(), 1);
    let snapshot: Vec<_> = mgr
        .steps()
        .iter()
        .map(|s| (s.id, s.status, s.updated_at))
        .collect();

    let second = mgr.process(&done);
    assert!(second.is_empty(), "redelivery must not report changes");

    let after: Vec<_> = mgr
        .steps()
        .iter()
        .map(|s| (s.id, s.status, s.updated_at))
        .collect();
    assert_eq!(snapshot, after);
}

#[test]
fn errored_call_is_terminal() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.tool_started_with_error("R", "fetch", "c2", "timeout"));

    assert_eq!(mgr.steps().len(), 2); // thinking + errored tool
    let tool = &mgr.steps()[1];
    assert_eq!(tool.status, StepStatus::Error);

    let changed = mgr.process(&script.tool_ended("R", "c2", "late"));
    assert!(changed.is_empty());
    assert_eq!(mgr.steps()[1].status, StepStatus::Error);
    match &mgr.steps()[1].data {
        stepline_types::StepData::Tool { output, error, .. } => {
            assert!(output.is_none(), "frozen step must not absorb late output");
            assert_eq!(error.as_deref(), Some("timeout"));
        }
        other => panic!("expected tool data, got {:?}", other),
    }
}

#[test]
fn orphan_completion_creates_a_completed_step() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    let changed = mgr.process(&script.tool_ended("R", "c9", "output"));

    assert_eq!(changed.len(), 1);
    let tool = &changed[0];
    assert_eq!(tool.kind, StepKind::Tool);
    assert_eq!(tool.status, StepStatus::Completed);
}

#[test]
fn full_run_with_two_turns() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.llm_started("R"));
    mgr.process(&script.llm_ended_with_intents("R", &[("c1", "search")]));
    mgr.process(&script.tool_started("R", "search", "c1"));
    mgr.process(&script.tool_ended("R", "c1", "found it"));
    mgr.process(&script.llm_started("R"));
    mgr.process(&script.llm_ended("R"));
    mgr.process(&script.agent_ended("R"));

    let kinds: Vec<_> = mgr.steps().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::Thinking,
            StepKind::Tool,
            StepKind::Thinking,
            StepKind::Finished,
        ]
    );
    assert!(
        mgr.steps().iter().all(|s| s.status == StepStatus::Completed),
        "a finished run leaves nothing spinning"
    );
    assert!(mgr.is_finished());
}

#[test]
fn sibling_tool_calls_become_separate_steps() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.llm_ended_with_intents("R", &[("c1", "search"), ("c2", "read_file")]));

    let steps = mgr.steps();
    assert_eq!(steps.len(), 3); // thinking + two sibling calls
    assert_eq!(steps[1].title, "search");
    assert_eq!(steps[2].title, "read_file");

    let mut mgr2 = mgr;
    mgr2.process(&script.tool_ended("R", "c1", "a"));
    assert_eq!(mgr2.steps()[1].status, StepStatus::Completed);
    assert_eq!(
        mgr2.steps()[2].status,
        StepStatus::Running,
        "sibling call unaffected"
    );
}

#[test]
fn hosted_web_search_is_born_completed() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    let changed = mgr.process(&script.web_search("R", "rust editions", &["https://doc.rust-lang.org"]));

    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].title, "Searching the web");
    assert_eq!(changed[0].status, StepStatus::Completed);
    match &changed[0].data {
        stepline_types::StepData::WebSearch { query, sources } => {
            assert_eq!(query.as_deref(), Some("rust editions"));
            assert_eq!(sources.len(), 1);
        }
        other => panic!("expected web search data, got {:?}", other),
    }
}

#[test]
fn code_interpreter_completes_via_bare_tool_ended() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("R"));
    mgr.process(&script.code_interpreter("R", "print(1 + 1)"));

    let running = mgr.steps().last().unwrap().clone();
    assert_eq!(running.title, "Running code");
    assert_eq!(running.status, StepStatus::Running);

    mgr.process(&script.tool_ended_untracked("R", "2"));

    let done = mgr.steps().last().unwrap();
    assert_eq!(done.id, running.id, "completion lands on the running step");
    assert_eq!(done.status, StepStatus::Completed);
    match &done.data {
        stepline_types::StepData::CodeInterpreter { outputs, .. } => {
            assert_eq!(outputs, &vec!["2".to_string()]);
        }
        other => panic!("expected code interpreter data, got {:?}", other),
    }
}

#[test]
fn handoff_updates_state_but_adds_no_step() {
    let mut script = EventScript::new();
    let mut mgr = manager();

    mgr.process(&script.agent_started("Manager"));
    mgr.process(&script.llm_started("Manager"));
    let before = mgr.steps().len();

    let changed = mgr.process(&script.handoff("Manager", "Writer"));
    assert!(changed.is_empty());
    assert_eq!(mgr.steps().len(), before);

    // The next reasoning cycle after handing off is a fresh turn
    mgr.process(&script.llm_started("Manager"));
    let thinking_steps = mgr
        .steps()
        .iter()
        .filter(|s| s.kind == StepKind::Thinking)
        .count();
    assert_eq!(thinking_steps, 2);
}
