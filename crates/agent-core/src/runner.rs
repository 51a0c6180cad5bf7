//! The goal loop.
//!
//! Snapshot → decide → act → evaluate, until the goal gate fires, a
//! stagnation detector trips, or the step budget runs out. The VLM's
//! `is_goal_achieved` verdict is the only success-direction termination.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use gaia_core_types::{
    ActionDecision, DecisionAction, Goal, GoalOutcome, GoalStatus, StepResult,
};

use crate::gateway::{BrowserGateway, GatewayAction};
use crate::parser::parse_decision;
use crate::prompt::build_decision_prompt;
use crate::provider::VisionProvider;
use crate::stagnation::{StagnationReason, StagnationTracker};
use crate::view::PageView;

#[derive(Clone, Debug)]
pub struct GoalRunnerConfig {
    /// Pause between steps.
    pub step_delay_ms: u64,
}

impl Default for GoalRunnerConfig {
    fn default() -> Self {
        Self { step_delay_ms: 500 }
    }
}

pub struct GoalRunner<G, P> {
    gateway: G,
    provider: P,
    config: GoalRunnerConfig,
}

impl<G: BrowserGateway, P: VisionProvider> GoalRunner<G, P> {
    pub fn new(gateway: G, provider: P) -> Self {
        Self {
            gateway,
            provider,
            config: GoalRunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GoalRunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Drive one goal to completion.
    pub async fn execute_goal(&self, goal: &Goal) -> GoalOutcome {
        let started = Instant::now();
        let mut steps: Vec<StepResult> = Vec::new();
        let mut history: Vec<String> = Vec::new();
        let mut tracker = StagnationTracker::new();

        info!(goal = %goal.name, max_steps = goal.max_steps, "goal started");

        if let Some(start_url) = &goal.start_url {
            if let Err(err) = self.gateway.snapshot(Some(start_url)).await {
                warn!(%err, "initial navigation failed");
            }
        }

        let mut step_number = 0u32;
        while step_number < goal.max_steps {
            step_number += 1;
            let step_started = Instant::now();

            let view = match self.gateway.snapshot(None).await {
                Ok(view) if !view.elements.is_empty() => view,
                Ok(view) => {
                    if let Some(reason) = tracker.observe_missing_dom() {
                        return self.stagnated(goal, steps, step_number, reason, started);
                    }
                    // Thin pages still move the loop forward; the model may
                    // choose to wait or navigate.
                    view
                }
                Err(err) => {
                    warn!(%err, step = step_number, "snapshot failed");
                    if let Some(reason) = tracker.observe_missing_dom() {
                        return self.stagnated(goal, steps, step_number, reason, started);
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.step_delay_ms)).await;
                    continue;
                }
            };

            if let Some(reason) = tracker.observe_dom(&view.dom_hash) {
                return self.stagnated(goal, steps, step_number, reason, started);
            }

            let screenshot = self.gateway.screenshot().await.unwrap_or(None);
            let prompt = build_decision_prompt(goal, &history, &view.listing());
            let decision = match self
                .provider
                .analyze_with_vision(&prompt, screenshot.as_deref())
                .await
            {
                Ok(text) => parse_decision(&text),
                Err(err) => ActionDecision::wait_with_diagnostic(format!("provider error: {err}")),
            };

            info!(
                step = step_number,
                action = decision.action.as_str(),
                element = ?decision.element_id,
                confidence = decision.confidence,
                "decision"
            );

            if decision.is_goal_achieved {
                let reason = decision
                    .goal_achievement_reason
                    .clone()
                    .unwrap_or_else(|| "goal achieved".to_string());
                info!(goal = %goal.name, %reason, "goal achieved");
                return GoalOutcome {
                    goal_id: goal.id.clone(),
                    goal_name: goal.name.clone(),
                    success: true,
                    status: GoalStatus::Achieved,
                    steps,
                    total_steps: step_number,
                    final_reason: reason,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
            }

            if let Some(reason) = tracker.observe_decision(&decision.signature()) {
                return self.stagnated(goal, steps, step_number, reason, started);
            }

            let interacting = matches!(
                decision.action,
                DecisionAction::Click | DecisionAction::Fill | DecisionAction::Press
            );
            if let Some(reason) = tracker.observe_login_gate(
                view.auth_gate_visible(),
                goal.has_credentials(),
                interacting,
            ) {
                return self.stagnated(goal, steps, step_number, reason, started);
            }

            let (success, error) = self.execute_decision(&view, &decision).await;
            if let Some(reason) = tracker.observe_recovery(!success && error_is_recovery(&error)) {
                return self.stagnated(goal, steps, step_number, reason, started);
            }

            if success {
                history.push(format!(
                    "Step {step_number}: {} - {}",
                    decision.action.as_str(),
                    decision.reasoning
                ));
            } else if let Some(error) = &error {
                warn!(step = step_number, %error, "action failed");
            }

            steps.push(StepResult {
                step_number,
                decision,
                success,
                error,
                duration_ms: step_started.elapsed().as_millis() as u64,
            });

            tokio::time::sleep(Duration::from_millis(self.config.step_delay_ms)).await;
        }

        info!(goal = %goal.name, "max steps reached");
        GoalOutcome {
            goal_id: goal.id.clone(),
            goal_name: goal.name.clone(),
            success: false,
            status: GoalStatus::MaxStepsReached,
            steps,
            total_steps: step_number,
            final_reason: format!("maximum steps exceeded ({})", goal.max_steps),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn execute_decision(
        &self,
        view: &PageView,
        decision: &ActionDecision,
    ) -> (bool, Option<String>) {
        let ref_id = match decision.element_id {
            Some(id) => match view.element(id) {
                Some(el) => Some(el.ref_id.clone()),
                None => {
                    return (
                        false,
                        Some(format!("no element with id {id} in the current view")),
                    )
                }
            },
            None => None,
        };

        if matches!(
            decision.action,
            DecisionAction::Click | DecisionAction::Fill | DecisionAction::Hover | DecisionAction::Select
        ) && ref_id.is_none()
        {
            return (
                false,
                Some(format!("{} requires an element_id", decision.action.as_str())),
            );
        }

        let action = GatewayAction {
            snapshot_id: view.snapshot_id.clone(),
            ref_id,
            kind: decision.action,
            value: decision.value.clone(),
        };
        match self.gateway.act(action).await {
            Ok(result) if result.success => (true, None),
            Ok(result) => (false, Some(format!("{}: {}", result.reason_code, result.reason))),
            Err(err) => (false, Some(err.to_string())),
        }
    }

    fn stagnated(
        &self,
        goal: &Goal,
        steps: Vec<StepResult>,
        total_steps: u32,
        reason: StagnationReason,
        started: Instant,
    ) -> GoalOutcome {
        warn!(goal = %goal.name, reason = ?reason, "goal stagnated");
        GoalOutcome {
            goal_id: goal.id.clone(),
            goal_name: goal.name.clone(),
            success: false,
            status: GoalStatus::Stagnated,
            steps,
            total_steps,
            final_reason: reason.message().to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn error_is_recovery(error: &Option<String>) -> bool {
    error
        .as_deref()
        .map(|e| e.contains("stale_snapshot") || e.contains("snapshot_not_found"))
        .unwrap_or(false)
}
