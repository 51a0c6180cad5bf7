//! Before/after page evidence capture.
//!
//! Two collectors exist: the full one for ordinary actions and a light one
//! for submit-like clicks, where navigation may race the evaluation.

use chromiumoxide::page::Page;
use serde::{Deserialize, Serialize};

use browser_session::Session;
use snapshot_engine::runtime_hash_from_signature;

use crate::errors::ExecError;

/// Shared helper injected ahead of per-element scripts: finds every element
/// carrying the given dom-ref across the main document, same-origin iframes
/// and open shadow roots, with viewport coordinates translated to the top
/// frame.
pub const FIND_BY_DOM_REF_PRELUDE: &str = r#"
const __gaiaFindByDomRef = (domRef) => {
    const docs = [];
    const seen = new Set([document]);
    const queue = [{ doc: document, offsetX: 0, offsetY: 0 }];
    while (queue.length > 0) {
        const entry = queue.shift();
        docs.push(entry);
        let iframes = [];
        try { iframes = Array.from(entry.doc.querySelectorAll('iframe')); } catch (_) {}
        for (const frameEl of iframes) {
            let child = null;
            try { child = frameEl.contentDocument; } catch (_) { child = null; }
            if (!child || seen.has(child)) continue;
            seen.add(child);
            const rect = frameEl.getBoundingClientRect();
            queue.push({ doc: child, offsetX: entry.offsetX + rect.x, offsetY: entry.offsetY + rect.y });
        }
    }
    const out = [];
    for (const entry of docs) {
        const roots = [entry.doc];
        const seenRoots = new Set([entry.doc]);
        const pending = [entry.doc];
        while (pending.length > 0) {
            const root = pending.shift();
            let nodes = [];
            try { nodes = Array.from(root.querySelectorAll('*')); } catch (_) { continue; }
            for (const node of nodes) {
                if (node.shadowRoot && !seenRoots.has(node.shadowRoot)) {
                    seenRoots.add(node.shadowRoot);
                    roots.push(node.shadowRoot);
                    pending.push(node.shadowRoot);
                }
            }
        }
        for (const root of roots) {
            let found = [];
            try { found = Array.from(root.querySelectorAll('[data-gaia-dom-ref="' + domRef + '"]')); } catch (_) { continue; }
            for (const el of found) {
                out.push({ el, offsetX: entry.offsetX, offsetY: entry.offsetY });
            }
        }
    }
    return out;
};
"#;

const RUNTIME_SIGNATURE_JS: &str = r#"
(() => {
    const nodes = Array.from(document.querySelectorAll(
        'input, textarea, select, button, a, [role="button"], [role="tab"], [role="dialog"], [aria-label], [type="submit"]'
    )).slice(0, 220);
    const parts = nodes.map((el) => {
        const text = (el.innerText || el.value || el.getAttribute('aria-label') || '').trim().slice(0, 64);
        const tag = el.tagName ? el.tagName.toLowerCase() : '';
        const role = el.getAttribute('role') || '';
        const type = el.getAttribute('type') || '';
        const id = el.id || '';
        return tag + '|' + role + '|' + type + '|' + id + '|' + text;
    });
    return parts.join('||');
})()
"#;

const FULL_EVIDENCE_JS: &str = r#"
(() => {
    const bodyText = ((document.body && document.body.innerText) || '')
        .replace(/\s+/g, ' ')
        .trim();
    const clipped = bodyText.slice(0, 4000);
    const numberTokens = (clipped.match(/\d+/g) || []).slice(0, 40);

    const liveNodes = Array.from(document.querySelectorAll(
        '[role="status"],[aria-live],.toast,.alert,.snackbar,[class*="toast"],[class*="alert"],[class*="snackbar"],[class*="notification"]'
    )).slice(0, 20);
    const liveTexts = liveNodes
        .map((el) => ((el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim()))
        .filter(Boolean)
        .map((t) => t.slice(0, 140));

    const counterNodes = Array.from(document.querySelectorAll(
        '[aria-live], [role="status"], [class*="badge"], [class*="count"], [data-count], [data-badge]'
    )).slice(0, 60);
    const counters = counterNodes
        .map((el) => (
            (el.textContent || '').trim() ||
            (el.getAttribute('data-count') || '').trim() ||
            (el.getAttribute('data-badge') || '').trim()
        ))
        .filter(Boolean)
        .map((t) => t.slice(0, 60));

    const listCount = document.querySelectorAll(
        'li, tr, [role="row"], [role="listitem"], [class*="item"], [class*="row"], [class*="card"]'
    ).length;
    const interactiveCount = document.querySelectorAll(
        'button, a, input, textarea, select, [role="button"], [role="tab"], [role="menuitem"], [role="link"]'
    ).length;

    const loginVisible = /(log in|sign in)/i.test(clipped);
    const logoutVisible = /(log out|sign out)/i.test(clipped);

    return {
        text_digest: clipped.slice(0, 2000),
        number_tokens: numberTokens,
        live_texts: liveTexts,
        counters: counters,
        list_count: Number(listCount || 0),
        interactive_count: Number(interactiveCount || 0),
        login_visible: Boolean(loginVisible),
        logout_visible: Boolean(logoutVisible),
        scroll_y: Number(window.scrollY || 0),
        doc_height: Number((document.documentElement && document.documentElement.scrollHeight) || 0)
    };
})()
"#;

const LIGHT_EVIDENCE_JS: &str = r#"
(() => {
    const listCount = document.querySelectorAll(
        'li, tr, [role="row"], [role="listitem"], [class*="item"], [class*="row"], [class*="card"]'
    ).length;
    const interactiveCount = document.querySelectorAll(
        'button, a, input, textarea, select, [role="button"], [role="tab"], [role="menuitem"], [role="link"]'
    ).length;
    const bodyText = ((document.body && document.body.innerText) || '');
    const clipped = bodyText.replace(/\s+/g, ' ').trim().slice(0, 800);
    const liveNodes = Array.from(document.querySelectorAll(
        '[role="status"],[aria-live],.toast,.alert,.snackbar,[class*="toast"],[class*="alert"],[class*="snackbar"],[class*="notification"]'
    )).slice(0, 8);
    const liveTexts = liveNodes
        .map((el) => ((el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim()))
        .filter(Boolean)
        .map((t) => t.slice(0, 100));
    const loginVisible = /(log in|sign in)/i.test(bodyText);
    const logoutVisible = /(log out|sign out)/i.test(bodyText);
    return {
        text_digest: clipped,
        number_tokens: [],
        live_texts: liveTexts,
        counters: [],
        list_count: Number(listCount || 0),
        interactive_count: Number(interactiveCount || 0),
        login_visible: Boolean(loginVisible),
        logout_visible: Boolean(logoutVisible),
        scroll_y: Number(window.scrollY || 0),
        doc_height: Number((document.documentElement && document.documentElement.scrollHeight) || 0)
    };
})()
"#;

const FOCUS_SIGNATURE_JS: &str = r#"
(() => {
    const el = document.activeElement;
    if (!el || el === document.body) return 'body';
    const tag = el.tagName ? el.tagName.toLowerCase() : '';
    const id = el.id || '';
    const name = el.getAttribute ? (el.getAttribute('name') || '') : '';
    const ref = el.getAttribute ? (el.getAttribute('data-gaia-dom-ref') || '') : '';
    return tag + '|' + id + '|' + name + '|' + ref;
})()
"#;

/// Digest of the page used to decide whether an action did anything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEvidence {
    #[serde(default)]
    pub text_digest: String,
    #[serde(default)]
    pub number_tokens: Vec<String>,
    #[serde(default)]
    pub live_texts: Vec<String>,
    #[serde(default)]
    pub counters: Vec<String>,
    #[serde(default)]
    pub list_count: i64,
    #[serde(default)]
    pub interactive_count: i64,
    #[serde(default)]
    pub login_visible: bool,
    #[serde(default)]
    pub logout_visible: bool,
    #[serde(default)]
    pub scroll_y: f64,
    #[serde(default)]
    pub doc_height: f64,
}

/// Visibility/value/focus of the action target itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub focused: bool,
}

pub async fn collect_evidence(
    session: &mut Session,
    page: &Page,
    light: bool,
) -> Result<PageEvidence, ExecError> {
    let script = if light { LIGHT_EVIDENCE_JS } else { FULL_EVIDENCE_JS };
    let timeout = session.config.evaluate_timeout_ms;
    let raw = session.evaluate_with_timeout(page, script, timeout).await?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

pub async fn runtime_dom_hash(session: &mut Session, page: &Page) -> Result<String, ExecError> {
    let timeout = session.config.evaluate_timeout_ms;
    let raw = session
        .evaluate_with_timeout(page, RUNTIME_SIGNATURE_JS, timeout)
        .await?;
    let signature = raw.as_str().map(str::to_string).unwrap_or_default();
    Ok(runtime_hash_from_signature(&signature))
}

pub async fn focus_signature(session: &mut Session, page: &Page) -> Result<String, ExecError> {
    let timeout = session.config.evaluate_timeout_ms;
    let raw = session
        .evaluate_with_timeout(page, FOCUS_SIGNATURE_JS, timeout)
        .await?;
    Ok(raw.as_str().map(str::to_string).unwrap_or_default())
}

/// Read the target element state by dom-ref. Failure to read is evidence in
/// itself (`found=false`), never an error.
pub async fn read_target_state(page: &Page, dom_ref: &str) -> TargetState {
    let dom_ref_json = serde_json::to_string(dom_ref).unwrap_or_else(|_| "\"\"".to_string());
    let script = format!(
        r#"(() => {{
{FIND_BY_DOM_REF_PRELUDE}
    const matches = __gaiaFindByDomRef({dom_ref_json});
    if (matches.length === 0) return {{ found: false, visible: false, value: null, focused: false }};
    const el = matches[0].el;
    const win = el.ownerDocument.defaultView || window;
    const style = win.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
    const value = (el.value !== undefined && el.value !== null) ? String(el.value) : null;
    const focused = el.ownerDocument.activeElement === el;
    return {{ found: true, visible: visible, value: value, focused: focused }};
}})()"#
    );
    // Safe read: a target that cannot be inspected reports found=false
    // instead of failing the action or poisoning the connection.
    let fut = page.evaluate(script.as_str());
    match tokio::time::timeout(std::time::Duration::from_secs(2), fut).await {
        Ok(Ok(result)) => result
            .into_value()
            .ok()
            .and_then(|v: serde_json::Value| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        _ => TargetState::default(),
    }
}
