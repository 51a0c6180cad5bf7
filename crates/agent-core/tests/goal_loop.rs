//! Goal-loop behavior against a scripted host and model.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use gaia_core_types::{ActionResult, Goal, GoalStatus, ReasonCode, StateChange};
use goal_agent::{
    BrowserGateway, GatewayAction, GoalRunner, GoalRunnerConfig, MockVisionProvider, PageView,
};

struct ScriptedGateway {
    /// When true every snapshot carries the same dom hash.
    frozen_dom: bool,
    snapshots: AtomicU64,
}

impl ScriptedGateway {
    fn new(frozen_dom: bool) -> Self {
        Self {
            frozen_dom,
            snapshots: AtomicU64::new(0),
        }
    }

    fn ok_result() -> ActionResult {
        ActionResult {
            success: true,
            effective: true,
            reason_code: ReasonCode::Ok,
            reason: "ok".into(),
            snapshot_id_used: None,
            ref_id_used: None,
            stale_recovered: false,
            transport_success: true,
            locator_found: true,
            interaction_success: true,
            state_change: StateChange::default(),
            live_texts: Vec::new(),
            retry_path: Vec::new(),
            attempt_count: 1,
            attempt_logs: Vec::new(),
            screenshot: None,
            current_url: "https://example.test".into(),
            tab_id: 0,
        }
    }
}

#[async_trait]
impl BrowserGateway for ScriptedGateway {
    async fn snapshot(&self, _url: Option<&str>) -> Result<PageView, goal_agent::AgentError> {
        let n = self.snapshots.fetch_add(1, Ordering::SeqCst);
        let dom_hash = if self.frozen_dom {
            "frozen".to_string()
        } else {
            format!("hash-{n}")
        };
        Ok(PageView::from_snapshot_payload(&serde_json::json!({
            "snapshot_id": format!("s:{n}:abcdef012345"),
            "dom_hash": dom_hash,
            "url": "https://example.test",
            "elements": [
                {"tag": "button", "text": "Do nothing", "ref_id": "t0-f0-e0",
                 "attributes": {"type": "button"}}
            ]
        })))
    }

    async fn screenshot(&self) -> Result<Option<String>, goal_agent::AgentError> {
        Ok(None)
    }

    async fn act(&self, _action: GatewayAction) -> Result<ActionResult, goal_agent::AgentError> {
        Ok(Self::ok_result())
    }

    async fn page_errors(&self, _limit: usize) -> Result<Vec<String>, goal_agent::AgentError> {
        Ok(Vec::new())
    }
}

fn goal(max_steps: u32) -> Goal {
    let mut goal = Goal::new("TC1", "noop page", "exercise the only control");
    goal.max_steps = max_steps;
    goal
}

fn decision_json(element_id: u32, value: &str) -> String {
    format!(
        r#"{{"action":"click","element_id":{element_id},"value":"{value}","reasoning":"poke","confidence":0.7,"is_goal_achieved":false}}"#
    )
}

fn fast() -> GoalRunnerConfig {
    GoalRunnerConfig { step_delay_ms: 0 }
}

#[tokio::test]
async fn goal_gate_terminates_with_success() {
    let provider = MockVisionProvider::scripted([
        decision_json(0, "a"),
        decision_json(0, "b"),
        r#"{"action":"wait","reasoning":"done","confidence":1.0,"is_goal_achieved":true,"goal_achievement_reason":"success text visible"}"#.to_string(),
    ]);
    let runner = GoalRunner::new(ScriptedGateway::new(false), provider).with_config(fast());
    let outcome = runner.execute_goal(&goal(20)).await;
    assert!(outcome.success);
    assert_eq!(outcome.status, GoalStatus::Achieved);
    assert_eq!(outcome.final_reason, "success text visible");
    assert_eq!(outcome.total_steps, 3);
}

#[tokio::test]
async fn frozen_dom_stops_within_ten_steps_as_screen_unchanged() {
    // Decisions vary so the repeat-action detector stays quiet; the frozen
    // DOM signature must trip first.
    let replies: Vec<String> = (0..30).map(|i| decision_json(0, &format!("v{i}"))).collect();
    let runner = GoalRunner::new(
        ScriptedGateway::new(true),
        MockVisionProvider::scripted(replies),
    )
    .with_config(fast());
    let outcome = runner.execute_goal(&goal(30)).await;
    assert!(!outcome.success);
    assert_eq!(outcome.status, GoalStatus::Stagnated);
    assert!(outcome.final_reason.contains("screen unchanged"));
    assert!(outcome.total_steps <= 10);
}

#[tokio::test]
async fn identical_decisions_stop_as_repeated_action() {
    let replies: Vec<String> = (0..30).map(|_| decision_json(0, "same")).collect();
    let runner = GoalRunner::new(
        ScriptedGateway::new(false),
        MockVisionProvider::scripted(replies),
    )
    .with_config(fast());
    let outcome = runner.execute_goal(&goal(30)).await;
    assert_eq!(outcome.status, GoalStatus::Stagnated);
    assert!(outcome.final_reason.contains("repeated action"));
    assert!(outcome.total_steps <= 5);
}

#[tokio::test]
async fn step_budget_caps_the_loop() {
    let replies: Vec<String> = (0..40).map(|i| decision_json(0, &format!("v{i}"))).collect();
    let runner = GoalRunner::new(
        ScriptedGateway::new(false),
        MockVisionProvider::scripted(replies),
    )
    .with_config(fast());
    let outcome = runner.execute_goal(&goal(4)).await;
    assert_eq!(outcome.status, GoalStatus::MaxStepsReached);
    assert_eq!(outcome.total_steps, 4);
    assert_eq!(outcome.steps.len(), 4);
}
