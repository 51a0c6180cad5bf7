//! Decision prompt construction.

use gaia_core_types::Goal;

/// How many prior actions the model sees.
pub const HISTORY_WINDOW: usize = 5;

/// Build the single-step decision prompt: goal, criteria, test data, recent
/// actions, and the element listing. The screenshot travels separately.
pub fn build_decision_prompt(goal: &Goal, history: &[String], elements_text: &str) -> String {
    let success = if goal.success_criteria.is_empty() {
        "none given".to_string()
    } else {
        goal.success_criteria.join(", ")
    };
    let failure = if goal.failure_criteria.is_empty() {
        "none".to_string()
    } else {
        goal.failure_criteria.join(", ")
    };
    let keywords = if goal.keywords.is_empty() {
        "none".to_string()
    } else {
        goal.keywords.join(", ")
    };
    let test_data =
        serde_json::to_string_pretty(&goal.test_data).unwrap_or_else(|_| "{}".to_string());
    let recent: Vec<&str> = history
        .iter()
        .rev()
        .take(HISTORY_WINDOW)
        .rev()
        .map(String::as_str)
        .collect();
    let actions_so_far = if recent.is_empty() {
        "none (first step)".to_string()
    } else {
        recent.join("\n")
    };

    format!(
        r#"You are a web test automation agent.
Analyze the DOM elements on the current screen against the goal and decide the single next action.

## Goal
- name: {name}
- description: {description}
- priority: {priority:?}
- success criteria: {success}
- failure criteria: {failure}
- keywords: {keywords}

## Available test data
{test_data}

## Actions taken so far
{actions_so_far}

## DOM elements on the current screen (clickable/fillable)
{elements_text}

## Instructions
0. Prefer elements related to the goal keywords.
1. Tab/section UI first: if a role="tab" element gates the form, click the tab before filling.
2. Inputs may be inactive until their tab or toggle is activated.
3. Set is_goal_achieved: true only when a success criterion is visible on screen.
4. Work out intermediate steps yourself; the goal lists no steps.

## Response format (JSON only, no markdown)
{{
    "action": "click" | "fill" | "press" | "scroll" | "wait",
    "element_id": <element id number>,
    "value": "<input value for fill, or key name for press (e.g. Enter)>",
    "reasoning": "<why this action>",
    "confidence": 0.0-1.0,
    "is_goal_achieved": true | false,
    "goal_achievement_reason": "<why the goal is met, when is_goal_achieved is true>"
}}

JSON response:"#,
        name = goal.name,
        description = goal.description,
        priority = goal.priority,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_goal_and_listing() {
        let mut goal = Goal::new("TC1", "Login succeeds", "Log in with valid credentials");
        goal.success_criteria.push("welcome message".into());
        goal.keywords.push("login".into());
        let prompt = build_decision_prompt(&goal, &[], "[0] <button> \"Sign In\"");
        assert!(prompt.contains("Login succeeds"));
        assert!(prompt.contains("welcome message"));
        assert!(prompt.contains("[0] <button> \"Sign In\""));
        assert!(prompt.contains("none (first step)"));
    }

    #[test]
    fn prompt_shows_only_the_recent_history_window() {
        let goal = Goal::new("TC1", "g", "d");
        let history: Vec<String> = (1..=8).map(|i| format!("Step {i}: click")).collect();
        let prompt = build_decision_prompt(&goal, &history, "");
        assert!(!prompt.contains("Step 3: click"));
        assert!(prompt.contains("Step 4: click"));
        assert!(prompt.contains("Step 8: click"));
    }
}
