//! The effect-verifying inner loop.

use std::time::{Duration, Instant};

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotParams;
use chromiumoxide::page::Page;
use tracing::{debug, info, warn};

use browser_session::{navigate_if_needed, Session, SessionError};
use gaia_core_types::{
    ActionKind, ActionRequest, ActionResult, AttemptLog, ElementMeta, ProbeScroll, ReasonCode,
    StateChange,
};
use snapshot_engine::{capture_snapshot, CaptureOptions};

use crate::errors::ExecError;
use crate::evidence::{
    collect_evidence, focus_signature, read_target_state, runtime_dom_hash, PageEvidence,
    TargetState,
};
use crate::flags::{compute_state_change, ChangeInputs};
use crate::locate::{resolve_locator, LocateFailure, ResolvedLocator};
use crate::reveal::page_scroll_script;
use crate::stale::{initial_ref_state, rescue_stale_ref, RefState};

/// Visible-text lexicon that marks a click as submit-like.
const SUBMIT_LEXICON: &[&str] = &[
    "submit", "sign in", "log in", "login", "sign up", "signup", "register",
];

const DEFAULT_PROBE_SCHEDULE: &[u64] = &[350, 700, 1500];
const SUBMIT_PROBE_SCHEDULE: &[u64] = &[250];
const SCROLL_PROBE_POSITIONS: &[&str] = &["top", "mid", "bottom"];
const MAX_LOCATOR_ATTEMPTS: usize = 3;

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Total wall-clock budget for one action, seconds. Clamped to 10..120.
    pub max_action_seconds: f64,
    pub capture: CaptureOptions,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_action_seconds: 45.0,
            capture: CaptureOptions::default(),
        }
    }
}

impl ExecutorConfig {
    fn budget(&self, submit_like: bool) -> Duration {
        let seconds = self.max_action_seconds.clamp(10.0, 120.0);
        let seconds = if submit_like { seconds.min(20.0) } else { seconds };
        Duration::from_secs_f64(seconds)
    }
}

/// A click on a submit control gets the short probe schedule and no
/// verification: the page may be mid-navigation by the first probe.
pub fn is_submit_like(kind: ActionKind, meta: &ElementMeta) -> bool {
    if kind != ActionKind::Click {
        return false;
    }
    if meta
        .attribute("type")
        .map(|t| t.eq_ignore_ascii_case("submit"))
        .unwrap_or(false)
    {
        return true;
    }
    let haystack = format!(
        "{} {} {} {} {} {}",
        meta.selector,
        meta.full_selector,
        meta.text,
        meta.attribute("type").unwrap_or(""),
        meta.attribute("role").unwrap_or(""),
        meta.attribute("aria-label").unwrap_or(""),
    )
    .to_lowercase();
    SUBMIT_LEXICON.iter().any(|word| haystack.contains(word))
}

fn ref_state_failure(state: RefState) -> (ReasonCode, &'static str) {
    match state {
        RefState::SnapshotNotFound => (
            ReasonCode::SnapshotNotFound,
            "snapshot not found; re-decide against the latest snapshot",
        ),
        RefState::RefNotFound => (
            ReasonCode::NotFound,
            "ref not present in snapshot; re-decide against the latest snapshot",
        ),
        RefState::Stale => (
            ReasonCode::StaleSnapshot,
            "snapshot/ref is stale; re-decide against the latest snapshot",
        ),
    }
}

fn ref_state_tag(state: RefState) -> &'static str {
    match state {
        RefState::SnapshotNotFound => "snapshot_not_found",
        RefState::RefNotFound => "not_found",
        RefState::Stale => "stale_snapshot",
    }
}

async fn viewport_screenshot(page: &Page) -> Option<String> {
    let bytes = page
        .screenshot(CaptureScreenshotParams::builder().build())
        .await
        .ok()?;
    Some(base64::engine::general_purpose::STANDARD.encode(bytes))
}

struct BeforeState {
    url: String,
    dom_hash: String,
    evidence: PageEvidence,
    focus: String,
    target: TargetState,
}

async fn capture_before_state(
    session: &mut Session,
    page: &Page,
    dom_ref: &str,
    light: bool,
) -> Result<BeforeState, ExecError> {
    let url = page
        .url()
        .await
        .map_err(SessionError::from)?
        .unwrap_or_default();
    Ok(BeforeState {
        url,
        dom_hash: runtime_dom_hash(session, page).await?,
        evidence: collect_evidence(session, page, light).await?,
        focus: focus_signature(session, page).await?,
        target: read_target_state(page, dom_ref).await,
    })
}

struct AfterProbe {
    change: StateChange,
    effective: bool,
    live_texts: Vec<String>,
}

#[allow(clippy::too_many_arguments)]
async fn probe_after_state(
    session: &mut Session,
    page: &Page,
    request: &ActionRequest,
    before: &BeforeState,
    dom_ref: &str,
    light: bool,
    probe_wait_ms: u64,
    probe_scroll: ProbeScroll,
    verify: bool,
) -> Result<AfterProbe, ExecError> {
    let after_url = page
        .url()
        .await
        .map_err(SessionError::from)?
        .unwrap_or_default();
    let after_dom_hash = runtime_dom_hash(session, page).await?;
    let after_evidence = collect_evidence(session, page, light).await?;
    let after_focus = focus_signature(session, page).await?;
    let after_target = read_target_state(page, dom_ref).await;

    let expected_value = request.value_as_string();
    let (mut change, effective) = compute_state_change(&ChangeInputs {
        kind: request.kind,
        expected_value: expected_value.as_deref(),
        before_url: &before.url,
        after_url: &after_url,
        before_dom_hash: &before.dom_hash,
        after_dom_hash: &after_dom_hash,
        before_evidence: &before.evidence,
        after_evidence: &after_evidence,
        before_target: &before.target,
        after_target: &after_target,
        before_focus: &before.focus,
        after_focus: &after_focus,
    });
    change.probe_wait_ms = probe_wait_ms;
    change.probe_scroll = probe_scroll;

    let live_texts: Vec<String> = after_evidence
        .live_texts
        .iter()
        .filter(|t| !t.trim().is_empty())
        .take(8)
        .cloned()
        .collect();
    change.live_texts_after = live_texts.clone();

    Ok(AfterProbe {
        change,
        effective: if verify { effective } else { true },
        live_texts,
    })
}

/// Execute one element action end to end: resolve, recover, scope-check,
/// act, verify, classify.
pub async fn execute_ref_action(
    session: &mut Session,
    config: &ExecutorConfig,
    request: &ActionRequest,
    url: Option<&str>,
) -> ActionResult {
    if request.carries_legacy_selector() {
        return ActionResult::failure(
            ReasonCode::LegacySelectorForbidden,
            "element actions must address elements by (snapshot_id, ref_id); raw selectors are forbidden",
        );
    }

    match execute_inner(session, config, request, url).await {
        Ok(result) => result,
        Err(err) => {
            warn!(%err, "action failed outside the attempt loop");
            ActionResult::failure(err.reason_code(), err.to_string())
        }
    }
}

async fn execute_inner(
    session: &mut Session,
    config: &ExecutorConfig,
    request: &ActionRequest,
    url: Option<&str>,
) -> Result<ActionResult, ExecError> {
    let page = session.current_page().await?;

    if let Some(url) = url {
        navigate_if_needed(&page, url, false).await?;
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }

    let started = Instant::now();
    let mut retry_path: Vec<String> = Vec::new();
    let mut attempt_logs: Vec<AttemptLog> = Vec::new();
    let mut stale_recovered = false;
    let mut reason_code = ReasonCode::UnknownError;
    let mut last_live_texts: Vec<String> = Vec::new();

    let mut snapshot_id = request.snapshot_id.clone();
    let mut ref_id = request.ref_id.clone();

    let current_tab_index = session.current_tab_index().await?;
    let mut meta: Option<ElementMeta> = session
        .snapshots
        .get(&snapshot_id)
        .and_then(|snap| snap.element(&ref_id))
        .cloned();

    let state = initial_ref_state(
        &snapshot_id,
        session.snapshots.get(&snapshot_id),
        &ref_id,
        current_tab_index,
    );

    if let Some(state) = state {
        retry_path.push(format!("recover:{}", ref_state_tag(state)));
        let live_url = page
            .url()
            .await
            .map_err(SessionError::from)?
            .unwrap_or_default();
        match capture_snapshot(session, &page, Some(&live_url), &config.capture).await {
            Ok(fresh) => {
                let recovered = fresh
                    .element(&ref_id)
                    .cloned()
                    .or_else(|| rescue_stale_ref(meta.as_ref(), &fresh).cloned());
                if let Some(recovered) = recovered {
                    snapshot_id = fresh.snapshot_id.clone();
                    ref_id = recovered.ref_id.clone();
                    meta = Some(recovered);
                    stale_recovered = true;
                    reason_code = ReasonCode::StaleRefRecovered;
                    retry_path.push("recover:ok".to_string());
                    session.clear_recovery_failures();
                    debug!(snapshot = %snapshot_id, ref_id = %ref_id, "stale ref recovered");
                }
            }
            Err(err) => {
                retry_path.push(format!("recover:error:{err}"));
            }
        }

        if !stale_recovered {
            session.record_recovery_failure();
            let (code, message) = ref_state_failure(state);
            let mut result = ActionResult::failure(code, message);
            result.retry_path = retry_path;
            result.attempt_logs = attempt_logs;
            return Ok(result);
        }
    }

    let Some(meta) = meta else {
        let mut result =
            ActionResult::failure(ReasonCode::NotFound, "no usable ref metadata");
        result.retry_path = retry_path;
        return Ok(result);
    };

    // Scope checks: the ref must name the live tab and a reachable frame.
    let live_tab_index = session.current_tab_index().await?;
    if meta.scope.tab_index != live_tab_index {
        let mut result = ActionResult::failure(
            ReasonCode::TabScopeMismatch,
            format!(
                "ref tab scope mismatch: ref={}, current={}",
                meta.scope.tab_index, live_tab_index
            ),
        );
        result.stale_recovered = stale_recovered;
        result.retry_path = retry_path;
        return Ok(result);
    }

    let frame_count = {
        let timeout = session.config.evaluate_timeout_ms;
        session
            .evaluate_with_timeout(&page, snapshot_engine::script::COUNT_FRAMES_JS, timeout)
            .await?
            .as_u64()
            .unwrap_or(1) as usize
    };
    if meta.scope.frame_index >= frame_count {
        let mut result = ActionResult::failure(
            ReasonCode::FrameScopeMismatch,
            format!(
                "ref frame scope mismatch: ref={}, frame_count={}",
                meta.scope.frame_index, frame_count
            ),
        );
        result.stale_recovered = stale_recovered;
        result.retry_path = retry_path;
        return Ok(result);
    }

    let submit_like = is_submit_like(request.kind, &meta);
    let verify_for_action = request.verify && !submit_like;
    let probe_schedule: &[u64] = if submit_like {
        SUBMIT_PROBE_SCHEDULE
    } else {
        DEFAULT_PROBE_SCHEDULE
    };
    let budget = config.budget(submit_like);
    let deadline_exceeded = |started: Instant| started.elapsed() >= budget;

    // All candidates derive from the dom-ref today; the list form stays so
    // additional strategies can slot in.
    let candidates: Vec<(&str, String)> = vec![("dom_ref", meta.dom_ref.clone())];
    let mut state_change = StateChange::default();
    let mut transport_success = true;
    let mut locator_found = false;
    let mut interaction_success = false;

    'attempts: for (attempt_idx, (mode, _candidate)) in
        candidates.iter().take(MAX_LOCATOR_ATTEMPTS).enumerate()
    {
        let attempt = attempt_idx + 1;
        if deadline_exceeded(started) {
            reason_code = ReasonCode::ActionTimeout;
            attempt_logs.push(AttemptLog {
                attempt,
                mode: mode.to_string(),
                selector: meta.dom_ref.clone(),
                frame_index: None,
                reason_code,
                error: Some(format!("action budget exceeded ({:.1}s)", budget.as_secs_f64())),
                state_change: None,
            });
            break;
        }
        retry_path.push(format!("{attempt}:{mode}"));

        let locator: ResolvedLocator = match resolve_locator(session, &page, &meta).await? {
            Ok(locator) => locator,
            Err(failure) => {
                reason_code = match failure {
                    LocateFailure::Ambiguous { .. } => ReasonCode::AmbiguousRefTarget,
                    LocateFailure::DomRefMissing => ReasonCode::StaleSnapshot,
                    LocateFailure::NotFound => ReasonCode::NotFound,
                };
                attempt_logs.push(AttemptLog {
                    attempt,
                    mode: mode.to_string(),
                    selector: format!("[data-gaia-dom-ref=\"{}\"]", meta.dom_ref),
                    frame_index: Some(meta.scope.frame_index),
                    reason_code,
                    error: Some(format!("{failure:?}")),
                    state_change: None,
                });
                continue;
            }
        };
        locator_found = true;

        let before =
            capture_before_state(session, &page, &locator.dom_ref, submit_like).await?;

        let action_timeout = request.options.timeout_or(8_000);
        let dispatch = crate::dispatch::perform_action(
            session,
            &page,
            request.kind,
            &locator,
            request.value.as_ref(),
            &request.options,
        );
        match tokio::time::timeout(Duration::from_millis(action_timeout), dispatch).await {
            Ok(Ok(())) => {
                interaction_success = true;
            }
            Ok(Err(err)) => {
                reason_code = ReasonCode::NotActionable;
                attempt_logs.push(AttemptLog {
                    attempt,
                    mode: mode.to_string(),
                    selector: locator.selector.clone(),
                    frame_index: Some(meta.scope.frame_index),
                    reason_code,
                    error: Some(err.to_string()),
                    state_change: None,
                });
                continue;
            }
            Err(_) => {
                reason_code = ReasonCode::ActionTimeout;
                attempt_logs.push(AttemptLog {
                    attempt,
                    mode: mode.to_string(),
                    selector: locator.selector.clone(),
                    frame_index: Some(meta.scope.frame_index),
                    reason_code,
                    error: Some(format!("action primitive exceeded {action_timeout} ms")),
                    state_change: None,
                });
                continue;
            }
        }

        if submit_like {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        let mut effective = false;
        for &probe_wait_ms in probe_schedule {
            if deadline_exceeded(started) {
                reason_code = ReasonCode::ActionTimeout;
                break;
            }
            tokio::time::sleep(Duration::from_millis(probe_wait_ms)).await;
            let probe = probe_after_state(
                session,
                &page,
                request,
                &before,
                &locator.dom_ref,
                submit_like,
                probe_wait_ms,
                ProbeScroll::None,
                verify_for_action,
            )
            .await?;
            state_change = probe.change;
            if !probe.live_texts.is_empty() {
                last_live_texts = probe.live_texts;
            }
            effective = probe.effective;
            if effective {
                break;
            }
        }

        // Last resort for clicks and key presses: effects that only appear
        // once the page is forced to a different scroll position.
        if verify_for_action
            && !effective
            && matches!(request.kind, ActionKind::Click | ActionKind::Press)
        {
            for position in SCROLL_PROBE_POSITIONS {
                if deadline_exceeded(started) {
                    reason_code = ReasonCode::ActionTimeout;
                    break;
                }
                let timeout = session.config.evaluate_timeout_ms;
                if let Err(err) = session
                    .evaluate_with_timeout(&page, page_scroll_script(position), timeout)
                    .await
                {
                    debug!(%err, "scroll probe evaluate failed");
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
                let probe_scroll = match *position {
                    "top" => ProbeScroll::Top,
                    "mid" => ProbeScroll::Mid,
                    _ => ProbeScroll::Bottom,
                };
                let probe = probe_after_state(
                    session,
                    &page,
                    request,
                    &before,
                    &locator.dom_ref,
                    submit_like,
                    1500,
                    probe_scroll,
                    true,
                )
                .await?;
                state_change = probe.change;
                if !probe.live_texts.is_empty() {
                    last_live_texts = probe.live_texts;
                }
                effective = probe.effective;
                if effective {
                    break;
                }
            }
        }

        if reason_code == ReasonCode::ActionTimeout {
            attempt_logs.push(AttemptLog {
                attempt,
                mode: mode.to_string(),
                selector: locator.selector.clone(),
                frame_index: Some(meta.scope.frame_index),
                reason_code,
                error: Some(format!("action budget exceeded ({:.1}s)", budget.as_secs_f64())),
                state_change: Some(state_change.clone()),
            });
            break 'attempts;
        }

        reason_code = if effective {
            ReasonCode::Ok
        } else {
            ReasonCode::NoStateChange
        };
        attempt_logs.push(AttemptLog {
            attempt,
            mode: mode.to_string(),
            selector: locator.selector.clone(),
            frame_index: Some(meta.scope.frame_index),
            reason_code,
            error: None,
            state_change: Some(state_change.clone()),
        });
        debug!(attempt, mode = %mode, reason = %reason_code, "attempt classified");

        if effective {
            session.current_url = page
                .url()
                .await
                .map_err(SessionError::from)?
                .unwrap_or_default();
            let tab_id = session.current_tab_index().await.unwrap_or(0);
            info!(
                session = %session.id,
                kind = request.kind.as_str(),
                ref_id = %ref_id,
                stale_recovered,
                "action effective"
            );
            return Ok(ActionResult {
                success: true,
                effective: true,
                reason_code: ReasonCode::Ok,
                reason: "ref action executed and state changed".to_string(),
                snapshot_id_used: Some(snapshot_id.to_string()),
                ref_id_used: Some(ref_id.to_string()),
                stale_recovered,
                transport_success,
                locator_found,
                interaction_success,
                state_change,
                live_texts: last_live_texts,
                retry_path,
                attempt_count: attempt_logs.len(),
                attempt_logs,
                screenshot: viewport_screenshot(&page).await,
                current_url: session.current_url.clone(),
                tab_id,
            });
        }
    }

    session.current_url = page
        .url()
        .await
        .map_err(SessionError::from)?
        .unwrap_or_default();
    let tab_id = session.current_tab_index().await.unwrap_or(0);
    if reason_code == ReasonCode::UnknownError {
        transport_success = false;
    }
    Ok(ActionResult {
        success: false,
        effective: false,
        reason_code,
        reason: "ref action failed or produced no state change".to_string(),
        snapshot_id_used: Some(snapshot_id.to_string()),
        ref_id_used: Some(ref_id.to_string()),
        stale_recovered,
        transport_success,
        locator_found,
        interaction_success,
        state_change,
        live_texts: last_live_texts,
        retry_path,
        attempt_count: attempt_logs.len(),
        attempt_logs,
        screenshot: viewport_screenshot(&page).await,
        current_url: session.current_url.clone(),
        tab_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_core_types::{BoundingBox, ElementScope, ElementType, RefId};
    use std::collections::BTreeMap;

    fn meta_with(attrs: &[(&str, &str)], text: &str) -> ElementMeta {
        let attributes: BTreeMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ElementMeta {
            ref_id: RefId::compose(0, 0, 0),
            dom_ref: "gaia-button-x-0".into(),
            tag: "button".into(),
            text: text.into(),
            selector: "#go".into(),
            full_selector: "#go".into(),
            frame_name: String::new(),
            attributes,
            bounding_box: BoundingBox::default(),
            element_type: ElementType::Button,
            scope: ElementScope {
                tab_index: 0,
                frame_index: 0,
                is_main_frame: true,
            },
        }
    }

    #[test]
    fn submit_type_marks_click_submit_like() {
        let meta = meta_with(&[("type", "submit")], "Go");
        assert!(is_submit_like(ActionKind::Click, &meta));
        assert!(!is_submit_like(ActionKind::Fill, &meta));
    }

    #[test]
    fn lexicon_text_marks_click_submit_like() {
        assert!(is_submit_like(ActionKind::Click, &meta_with(&[], "Sign In")));
        assert!(is_submit_like(ActionKind::Click, &meta_with(&[], "Register now")));
        assert!(!is_submit_like(ActionKind::Click, &meta_with(&[], "Read more")));
    }

    #[test]
    fn budget_is_clamped_and_capped_for_submit_like() {
        let config = ExecutorConfig {
            max_action_seconds: 500.0,
            ..Default::default()
        };
        assert_eq!(config.budget(false), Duration::from_secs_f64(120.0));
        assert_eq!(config.budget(true), Duration::from_secs_f64(20.0));

        let tiny = ExecutorConfig {
            max_action_seconds: 1.0,
            ..Default::default()
        };
        assert_eq!(tiny.budget(false), Duration::from_secs_f64(10.0));
    }

    #[test]
    fn probe_schedules_match_the_click_class() {
        assert_eq!(SUBMIT_PROBE_SCHEDULE, &[250]);
        assert_eq!(DEFAULT_PROBE_SCHEDULE, &[350, 700, 1500]);
    }

    #[tokio::test]
    async fn legacy_selector_is_rejected_before_any_browser_work() {
        use browser_session::{BrowserSessionConfig, ScreencastBroadcaster};
        use std::sync::Arc;

        let mut request = ActionRequest::new(
            "s:1:abc".into(),
            "t0-f0-e0".into(),
            ActionKind::Click,
        );
        request.selector = Some(".btn".into());

        // The session never launches: the guard must fire before any
        // browser work, so an unlaunched session stays unlaunched.
        let mut session = browser_session::Session::new(
            "s".into(),
            BrowserSessionConfig::default(),
            Arc::new(ScreencastBroadcaster::new()),
        );
        let result =
            execute_ref_action(&mut session, &ExecutorConfig::default(), &request, None).await;
        assert_eq!(result.reason_code, ReasonCode::LegacySelectorForbidden);
        assert!(!result.success);
        assert_eq!(result.attempt_count, 0);
        assert!(!session.is_launched());
    }
}
