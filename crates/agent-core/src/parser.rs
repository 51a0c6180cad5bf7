//! Strict-JSON decision parsing.
//!
//! Models wrap JSON in markdown fences more often than not; strip them, then
//! parse strictly. Anything unparseable becomes a WAIT with confidence 0 and
//! the diagnostic in `reasoning`, so the loop keeps control.

use gaia_core_types::ActionDecision;
use tracing::warn;

fn strip_fences(text: &str) -> &str {
    let mut out = text.trim();
    if let Some(rest) = out.strip_prefix("```json") {
        out = rest;
    } else if let Some(rest) = out.strip_prefix("```") {
        out = rest;
    }
    if let Some(rest) = out.strip_suffix("```") {
        out = rest;
    }
    out.trim()
}

/// Parse a model reply into a decision.
pub fn parse_decision(response_text: &str) -> ActionDecision {
    let cleaned = strip_fences(response_text);
    match serde_json::from_str::<ActionDecision>(cleaned) {
        Ok(decision) => decision,
        Err(err) => {
            let preview: String = cleaned.chars().take(200).collect();
            warn!(%err, preview = %preview, "decision parse failed");
            ActionDecision::wait_with_diagnostic(format!("decision parse failed: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_core_types::DecisionAction;

    #[test]
    fn parses_plain_json() {
        let decision = parse_decision(
            r#"{"action":"click","element_id":3,"reasoning":"submit the form","confidence":0.9,"is_goal_achieved":false}"#,
        );
        assert_eq!(decision.action, DecisionAction::Click);
        assert_eq!(decision.element_id, Some(3));
        assert!((decision.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn strips_markdown_fences() {
        let decision = parse_decision(
            "```json\n{\"action\":\"fill\",\"element_id\":1,\"value\":\"a@b.test\",\"reasoning\":\"\",\"confidence\":0.8,\"is_goal_achieved\":false}\n```",
        );
        assert_eq!(decision.action, DecisionAction::Fill);
        assert_eq!(decision.value.as_deref(), Some("a@b.test"));
    }

    #[test]
    fn parse_failure_becomes_wait_with_zero_confidence() {
        let decision = parse_decision("I think you should click the login button.");
        assert_eq!(decision.action, DecisionAction::Wait);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.reasoning.contains("decision parse failed"));
        assert!(!decision.is_goal_achieved);
    }

    #[test]
    fn goal_gate_round_trips() {
        let decision = parse_decision(
            r#"{"action":"wait","reasoning":"done","confidence":1.0,"is_goal_achieved":true,"goal_achievement_reason":"welcome message visible"}"#,
        );
        assert!(decision.is_goal_achieved);
        assert_eq!(
            decision.goal_achievement_reason.as_deref(),
            Some("welcome message visible")
        );
    }
}
