//! Goal-loop models shared between the agent crate and its callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GoalPriority {
    Must,
    Should,
    #[default]
    May,
}

/// A client-side test intent. No steps, only the destination: the agent
/// decides each action on its own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub priority: GoalPriority,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub failure_criteria: Vec<String>,
    #[serde(default)]
    pub test_data: BTreeMap<String, Value>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub start_url: Option<String>,
}

fn default_max_steps() -> u32 {
    20
}

impl Goal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            priority: GoalPriority::default(),
            keywords: Vec::new(),
            success_criteria: Vec::new(),
            failure_criteria: Vec::new(),
            test_data: BTreeMap::new(),
            max_steps: default_max_steps(),
            start_url: None,
        }
    }

    /// Whether usable login credentials were provided alongside the goal.
    pub fn has_credentials(&self) -> bool {
        let has = |key: &str| {
            self.test_data
                .get(key)
                .and_then(Value::as_str)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
        };
        (has("email") || has("username") || has("id")) && has("password")
    }
}

/// Action vocabulary the decision model may choose from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Click,
    Fill,
    Press,
    Scroll,
    Wait,
    Navigate,
    Hover,
    Select,
}

impl DecisionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionAction::Click => "click",
            DecisionAction::Fill => "fill",
            DecisionAction::Press => "press",
            DecisionAction::Scroll => "scroll",
            DecisionAction::Wait => "wait",
            DecisionAction::Navigate => "navigate",
            DecisionAction::Hover => "hover",
            DecisionAction::Select => "select",
        }
    }
}

/// The model's single next action, parsed from its strict-JSON reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionDecision {
    pub action: DecisionAction,
    #[serde(default)]
    pub element_id: Option<u32>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub is_goal_achieved: bool,
    #[serde(default)]
    pub goal_achievement_reason: Option<String>,
}

impl ActionDecision {
    /// Fallback decision when the reply cannot be parsed.
    pub fn wait_with_diagnostic(diagnostic: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Wait,
            element_id: None,
            value: None,
            reasoning: diagnostic.into(),
            confidence: 0.0,
            is_goal_achieved: false,
            goal_achievement_reason: None,
        }
    }

    /// Normalized signature used by the repeat-action stagnation detector.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}",
            self.action.as_str(),
            self.element_id.map(|id| id.to_string()).unwrap_or_default(),
            self.value.as_deref().unwrap_or_default().trim().to_lowercase()
        )
    }
}

/// One loop iteration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub step_number: u32,
    pub decision: ActionDecision,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Achieved,
    Stagnated,
    MaxStepsReached,
    Failed,
}

/// Final outcome of driving one goal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalOutcome {
    pub goal_id: String,
    pub goal_name: String,
    pub success: bool,
    pub status: GoalStatus,
    pub steps: Vec<StepResult>,
    pub total_steps: u32,
    pub final_reason: String,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn priority_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&GoalPriority::Must).unwrap(), "\"MUST\"");
    }

    #[test]
    fn credentials_require_both_halves() {
        let mut goal = Goal::new("TC1", "login", "log in");
        assert!(!goal.has_credentials());
        goal.test_data.insert("email".into(), json!("a@b.test"));
        assert!(!goal.has_credentials());
        goal.test_data.insert("password".into(), json!("secret"));
        assert!(goal.has_credentials());
    }

    #[test]
    fn decision_signature_normalizes_value() {
        let a = ActionDecision {
            action: DecisionAction::Fill,
            element_id: Some(3),
            value: Some("  Hello ".into()),
            reasoning: "r1".into(),
            confidence: 0.9,
            is_goal_achieved: false,
            goal_achievement_reason: None,
        };
        let b = ActionDecision {
            value: Some("hello".into()),
            reasoning: "different reasoning".into(),
            ..a.clone()
        };
        assert_eq!(a.signature(), b.signature());
    }
}
