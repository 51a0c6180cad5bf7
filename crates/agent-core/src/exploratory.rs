//! Exploratory variant of the goal loop.
//!
//! Instead of a destination, the agent hunts for untested interactive
//! elements, feeds inputs canonical test values, and records everything
//! suspicious as an issue. Coverage is counted over tested elements and
//! visited base URLs.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use gaia_core_types::DecisionAction;

use crate::gateway::{BrowserGateway, GatewayAction};
use crate::parser::parse_decision;
use crate::provider::VisionProvider;
use crate::stagnation::StagnationTracker;
use crate::testdata::canonical_value_for;
use crate::view::{DomElementView, PageView};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub kind: String,
    pub message: String,
    pub step: u32,
    pub url: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CoverageReport {
    pub steps_taken: u32,
    pub tested_elements: usize,
    pub visited_urls: usize,
    pub issues: Vec<Issue>,
}

#[derive(Clone, Debug)]
pub struct ExploratoryConfig {
    pub max_steps: u32,
    pub step_delay_ms: u64,
}

impl Default for ExploratoryConfig {
    fn default() -> Self {
        Self {
            max_steps: 30,
            step_delay_ms: 500,
        }
    }
}

pub struct ExploratoryAgent<G, P> {
    gateway: G,
    provider: P,
    config: ExploratoryConfig,
}

/// Identity of a tested element: stable across snapshots even though ref
/// ids are snapshot-scoped.
fn element_signature(el: &DomElementView) -> String {
    format!(
        "{}|{}|{}|{}",
        el.tag,
        el.text.trim().to_lowercase(),
        el.aria_label.as_deref().unwrap_or(""),
        el.placeholder.as_deref().unwrap_or("")
    )
}

/// Hash of the URL without query or fragment.
fn base_url_hash(url: &str) -> u64 {
    let base = match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    };
    let mut hasher = DefaultHasher::new();
    base.hash(&mut hasher);
    hasher.finish()
}

impl<G: BrowserGateway, P: VisionProvider> ExploratoryAgent<G, P> {
    pub fn new(gateway: G, provider: P) -> Self {
        Self {
            gateway,
            provider,
            config: ExploratoryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExploratoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Explore from `start_url` until the step budget runs out or the page
    /// stops changing.
    pub async fn explore(&self, start_url: &str) -> CoverageReport {
        let started = Instant::now();
        let mut tested: HashSet<String> = HashSet::new();
        let mut visited: HashSet<u64> = HashSet::new();
        let mut issues: Vec<Issue> = Vec::new();
        let mut tracker = StagnationTracker::new();
        let mut known_errors = 0usize;

        if let Err(err) = self.gateway.snapshot(Some(start_url)).await {
            warn!(%err, "exploration could not open the start url");
        }

        let mut step = 0u32;
        while step < self.config.max_steps {
            step += 1;

            let view = match self.gateway.snapshot(None).await {
                Ok(view) => view,
                Err(err) => {
                    if tracker.observe_missing_dom().is_some() {
                        issues.push(Issue {
                            severity: IssueSeverity::High,
                            kind: "dom_unreachable".into(),
                            message: err.to_string(),
                            step,
                            url: String::new(),
                        });
                        break;
                    }
                    continue;
                }
            };
            visited.insert(base_url_hash(&view.url));
            if tracker.observe_dom(&view.dom_hash).is_some() {
                info!(step, "exploration stopped: screen unchanged");
                break;
            }

            // New console errors since the last step are findings.
            if let Ok(errors) = self.gateway.page_errors(200).await {
                for error in errors.iter().skip(known_errors) {
                    issues.push(Issue {
                        severity: IssueSeverity::Medium,
                        kind: "console_error".into(),
                        message: error.clone(),
                        step,
                        url: view.url.clone(),
                    });
                }
                known_errors = errors.len();
            }

            let Some(target) = self.pick_untested(&view, &tested).await else {
                info!(step, "exploration exhausted the interactive surface");
                break;
            };

            let el = match view.element(target.0) {
                Some(el) => el.clone(),
                None => continue,
            };
            tested.insert(element_signature(&el));

            let action = GatewayAction {
                snapshot_id: view.snapshot_id.clone(),
                ref_id: Some(el.ref_id.clone()),
                kind: target.1,
                value: target.2.clone(),
            };
            match self.gateway.act(action).await {
                Ok(result) if result.success => {}
                Ok(result) => {
                    issues.push(Issue {
                        severity: if result.reason_code.is_programmer_error() {
                            IssueSeverity::High
                        } else {
                            IssueSeverity::Low
                        },
                        kind: result.reason_code.to_string(),
                        message: format!(
                            "{} on <{}> \"{}\": {}",
                            target.1.as_str(),
                            el.tag,
                            el.text,
                            result.reason
                        ),
                        step,
                        url: view.url.clone(),
                    });
                }
                Err(err) => {
                    issues.push(Issue {
                        severity: IssueSeverity::Medium,
                        kind: "gateway_error".into(),
                        message: err.to_string(),
                        step,
                        url: view.url.clone(),
                    });
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.step_delay_ms)).await;
        }

        info!(
            steps = step,
            tested = tested.len(),
            visited = visited.len(),
            issues = issues.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "exploration finished"
        );
        CoverageReport {
            steps_taken: step,
            tested_elements: tested.len(),
            visited_urls: visited.len(),
            issues,
        }
    }

    /// Ask the model for an untested action; fall back to the first
    /// untested element when the reply is unusable.
    async fn pick_untested(
        &self,
        view: &PageView,
        tested: &HashSet<String>,
    ) -> Option<(u32, DecisionAction, Option<String>)> {
        let untested: Vec<&DomElementView> = view
            .elements
            .iter()
            .filter(|el| !tested.contains(&element_signature(el)))
            .collect();
        if untested.is_empty() {
            return None;
        }

        let listing = view.listing();
        let tested_note = format!(
            "{} of {} elements already exercised; pick an element NOT yet tested.",
            view.elements.len() - untested.len(),
            view.elements.len()
        );
        let prompt = format!(
            r#"You are an exploratory web testing agent. {tested_note}

## DOM elements
{listing}

## Response format (JSON only, no markdown)
{{"action": "click" | "fill" | "press", "element_id": <id>, "value": "<for fill>", "reasoning": "...", "confidence": 0.0-1.0, "is_goal_achieved": false}}

JSON response:"#
        );

        let decision = match self.provider.analyze_with_vision(&prompt, None).await {
            Ok(text) => parse_decision(&text),
            Err(_) => return self.fallback_pick(&untested),
        };

        let element_id = match decision.element_id {
            Some(id) if view.element(id).is_some() => id,
            _ => return self.fallback_pick(&untested),
        };
        let el = view.element(element_id)?;

        let (kind, value) = match decision.action {
            DecisionAction::Fill => {
                let label = format!(
                    "{} {} {}",
                    el.placeholder.as_deref().unwrap_or(""),
                    el.aria_label.as_deref().unwrap_or(""),
                    el.input_type.as_deref().unwrap_or("")
                );
                (
                    DecisionAction::Fill,
                    Some(
                        decision
                            .value
                            .unwrap_or_else(|| canonical_value_for(&label).to_string()),
                    ),
                )
            }
            DecisionAction::Press => (DecisionAction::Press, decision.value),
            _ => (DecisionAction::Click, None),
        };
        Some((element_id, kind, value))
    }

    fn fallback_pick(
        &self,
        untested: &[&DomElementView],
    ) -> Option<(u32, DecisionAction, Option<String>)> {
        let el = untested.first()?;
        if el.tag == "input" || el.tag == "textarea" {
            let label = format!(
                "{} {} {}",
                el.placeholder.as_deref().unwrap_or(""),
                el.aria_label.as_deref().unwrap_or(""),
                el.input_type.as_deref().unwrap_or("")
            );
            Some((
                el.id,
                DecisionAction::Fill,
                Some(canonical_value_for(&label).to_string()),
            ))
        } else {
            Some((el.id, DecisionAction::Click, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_hash_ignores_query_and_fragment() {
        let a = base_url_hash("https://example.test/page?x=1#top");
        let b = base_url_hash("https://example.test/page?y=2#bottom");
        let c = base_url_hash("https://example.test/other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn element_signature_is_snapshot_independent() {
        let payload = json!({
            "snapshot_id": "s:1:a", "dom_hash": "h1", "url": "u",
            "elements": [{"tag": "button", "text": "Go", "ref_id": "t0-f0-e0"}]
        });
        let payload2 = json!({
            "snapshot_id": "s:2:b", "dom_hash": "h2", "url": "u",
            "elements": [{"tag": "button", "text": "Go", "ref_id": "t0-f0-e7"}]
        });
        let a = PageView::from_snapshot_payload(&payload);
        let b = PageView::from_snapshot_payload(&payload2);
        assert_eq!(
            element_signature(&a.elements[0]),
            element_signature(&b.elements[0])
        );
    }
}
