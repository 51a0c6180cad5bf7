//! Element reveal and container-aware scrolling.
//!
//! Before interacting, the target is walked up to its nearest scrollable
//! ancestor and nudged inside a safety margin; `scrollIntoView(center)` is
//! the fallback.

use chromiumoxide::page::Page;

use browser_session::Session;

use crate::errors::ExecError;
use crate::evidence::FIND_BY_DOM_REF_PRELUDE;

/// Scroll the element's scroll context so the element sits inside a 24px
/// margin, then center it in the viewport.
pub async fn reveal_element(
    session: &mut Session,
    page: &Page,
    dom_ref: &str,
    match_index: usize,
) -> Result<(), ExecError> {
    let dom_ref_json = serde_json::to_string(dom_ref)
        .map_err(|err| ExecError::InvalidInput(err.to_string()))?;
    let script = format!(
        r#"(() => {{
{FIND_BY_DOM_REF_PRELUDE}
    const matches = __gaiaFindByDomRef({dom_ref_json});
    const hit = matches[{match_index}];
    if (!hit) return {{ moved: false, container: 'none' }};
    const el = hit.el;
    const win = el.ownerDocument.defaultView || window;
    const margin = 24;
    const isScrollable = (node) => {{
        const style = win.getComputedStyle(node);
        const oy = ((style.overflowY || '') + ' ' + (style.overflow || '')).toLowerCase();
        const ox = ((style.overflowX || '') + ' ' + (style.overflow || '')).toLowerCase();
        const canY = /(auto|scroll|overlay)/.test(oy) && node.scrollHeight > node.clientHeight + 2;
        const canX = /(auto|scroll|overlay)/.test(ox) && node.scrollWidth > node.clientWidth + 2;
        return canY || canX;
    }};

    let container = null;
    let p = el.parentElement;
    while (p) {{
        if (isScrollable(p)) {{ container = p; break; }}
        p = p.parentElement;
    }}

    let moved = false;
    if (container) {{
        const er = el.getBoundingClientRect();
        const cr = container.getBoundingClientRect();
        let dy = 0;
        let dx = 0;
        if (er.top < cr.top + margin) dy = er.top - (cr.top + margin);
        else if (er.bottom > cr.bottom - margin) dy = er.bottom - (cr.bottom - margin);
        if (er.left < cr.left + margin) dx = er.left - (cr.left + margin);
        else if (er.right > cr.right - margin) dx = er.right - (cr.right - margin);
        if (dy !== 0) {{ container.scrollTop += dy; moved = true; }}
        if (dx !== 0) {{ container.scrollLeft += dx; moved = true; }}
    }}

    try {{
        el.scrollIntoView({{ behavior: 'instant', block: 'center', inline: 'nearest' }});
    }} catch (_) {{}}

    return {{ moved: moved, container: container ? container.tagName.toLowerCase() : 'window' }};
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    session.evaluate_with_timeout(page, &script, timeout).await?;
    Ok(())
}

/// Scroll the element's nearest scrollable container (or the window) by a
/// parsed payload: down/up/top/bottom or a pixel delta.
pub async fn scroll_container(
    session: &mut Session,
    page: &Page,
    dom_ref: &str,
    match_index: usize,
    payload: &serde_json::Value,
) -> Result<(), ExecError> {
    let (mode, delta) = parse_scroll_payload(payload);
    let dom_ref_json = serde_json::to_string(dom_ref)
        .map_err(|err| ExecError::InvalidInput(err.to_string()))?;
    let script = format!(
        r#"(() => {{
{FIND_BY_DOM_REF_PRELUDE}
    const matches = __gaiaFindByDomRef({dom_ref_json});
    const hit = matches[{match_index}];
    if (!hit) return {{ moved: false }};
    const el = hit.el;
    const win = el.ownerDocument.defaultView || window;
    const isScrollable = (node) => {{
        const style = win.getComputedStyle(node);
        const oy = ((style.overflowY || '') + ' ' + (style.overflow || '')).toLowerCase();
        const ox = ((style.overflowX || '') + ' ' + (style.overflow || '')).toLowerCase();
        const canY = /(auto|scroll|overlay)/.test(oy) && node.scrollHeight > node.clientHeight + 2;
        const canX = /(auto|scroll|overlay)/.test(ox) && node.scrollWidth > node.clientWidth + 2;
        return canY || canX;
    }};
    let container = null;
    let p = el.parentElement;
    while (p) {{
        if (isScrollable(p)) {{ container = p; break; }}
        p = p.parentElement;
    }}
    const target = container || el.ownerDocument.scrollingElement || el.ownerDocument.documentElement;
    const beforeTop = target.scrollTop;
    const mode = "{mode}";
    if (mode === 'top') {{
        target.scrollTop = 0;
    }} else if (mode === 'bottom') {{
        target.scrollTop = target.scrollHeight;
    }} else {{
        target.scrollTop += {delta};
    }}
    try {{
        el.scrollIntoView({{ behavior: 'instant', block: 'nearest', inline: 'nearest' }});
    }} catch (_) {{}}
    return {{ moved: target.scrollTop !== beforeTop, top: target.scrollTop }};
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    session.evaluate_with_timeout(page, &script, timeout).await?;
    Ok(())
}

/// Force the whole page to a vertical position for the last-resort scroll
/// probes.
pub fn page_scroll_script(position: &str) -> &'static str {
    match position {
        "top" => "window.scrollTo(0, 0)",
        "mid" => "window.scrollTo(0, Math.max(0, Math.floor(((document.documentElement && document.documentElement.scrollHeight) || 0) * 0.5)))",
        _ => "window.scrollTo(0, Math.max(0, ((document.documentElement && document.documentElement.scrollHeight) || 0)))",
    }
}

/// Interpret a scroll value: `down`/`up` page deltas, `top`/`bottom`
/// absolutes, or a raw pixel delta.
pub fn parse_scroll_payload(value: &serde_json::Value) -> (String, i64) {
    if let Some(n) = value.as_i64() {
        return ("delta".to_string(), n);
    }
    if let Some(f) = value.as_f64() {
        return ("delta".to_string(), f as i64);
    }
    let text = value
        .as_str()
        .unwrap_or("down")
        .trim()
        .to_lowercase();
    match text.as_str() {
        "down" | "pagedown" | "page_down" | "" => ("delta".to_string(), 800),
        "up" | "pageup" | "page_up" => ("delta".to_string(), -800),
        "top" => ("top".to_string(), 0),
        "bottom" => ("bottom".to_string(), 0),
        other => match other.parse::<f64>() {
            Ok(n) => ("delta".to_string(), n as i64),
            Err(_) => ("delta".to_string(), 800),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scroll_payload_accepts_directions_and_deltas() {
        assert_eq!(parse_scroll_payload(&json!("down")), ("delta".into(), 800));
        assert_eq!(parse_scroll_payload(&json!("UP")), ("delta".into(), -800));
        assert_eq!(parse_scroll_payload(&json!("top")), ("top".into(), 0));
        assert_eq!(parse_scroll_payload(&json!("bottom")), ("bottom".into(), 0));
        assert_eq!(parse_scroll_payload(&json!(250)), ("delta".into(), 250));
        assert_eq!(parse_scroll_payload(&json!("-120")), ("delta".into(), -120));
        assert_eq!(parse_scroll_payload(&json!("garbage")), ("delta".into(), 800));
    }
}
