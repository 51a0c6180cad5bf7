//! Per-kind action dispatch.
//!
//! Pointer and keyboard interactions go through the CDP input domain so the
//! SUT sees trusted events; value/selection mutations that have no input
//! primitive are scripted with the matching DOM events fired.

use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
    InsertTextParams, MouseButton,
};
use chromiumoxide::page::Page;
use serde_json::Value;

use browser_session::Session;
use gaia_core_types::{ActionKind, ActionOptions, MouseButtonChoice};

use crate::errors::ExecError;
use crate::evidence::FIND_BY_DOM_REF_PRELUDE;
use crate::locate::ResolvedLocator;
use crate::reveal::{reveal_element, scroll_container};

struct KeyDefinition {
    key: &'static str,
    code: &'static str,
    text: Option<&'static str>,
    key_code: i64,
}

fn key_definition(name: &str) -> Option<KeyDefinition> {
    let def = match name {
        "Enter" => KeyDefinition { key: "Enter", code: "Enter", text: Some("\r"), key_code: 13 },
        "Tab" => KeyDefinition { key: "Tab", code: "Tab", text: None, key_code: 9 },
        "Escape" => KeyDefinition { key: "Escape", code: "Escape", text: None, key_code: 27 },
        "Backspace" => KeyDefinition { key: "Backspace", code: "Backspace", text: None, key_code: 8 },
        "Delete" => KeyDefinition { key: "Delete", code: "Delete", text: None, key_code: 46 },
        "ArrowUp" => KeyDefinition { key: "ArrowUp", code: "ArrowUp", text: None, key_code: 38 },
        "ArrowDown" => KeyDefinition { key: "ArrowDown", code: "ArrowDown", text: None, key_code: 40 },
        "ArrowLeft" => KeyDefinition { key: "ArrowLeft", code: "ArrowLeft", text: None, key_code: 37 },
        "ArrowRight" => KeyDefinition { key: "ArrowRight", code: "ArrowRight", text: None, key_code: 39 },
        "Home" => KeyDefinition { key: "Home", code: "Home", text: None, key_code: 36 },
        "End" => KeyDefinition { key: "End", code: "End", text: None, key_code: 35 },
        "PageUp" => KeyDefinition { key: "PageUp", code: "PageUp", text: None, key_code: 33 },
        "PageDown" => KeyDefinition { key: "PageDown", code: "PageDown", text: None, key_code: 34 },
        " " | "Space" => KeyDefinition { key: " ", code: "Space", text: Some(" "), key_code: 32 },
        _ => return None,
    };
    Some(def)
}

fn cdp_button(choice: MouseButtonChoice) -> MouseButton {
    match choice {
        MouseButtonChoice::Left => MouseButton::Left,
        MouseButtonChoice::Right => MouseButton::Right,
        MouseButtonChoice::Middle => MouseButton::Middle,
    }
}

async fn dispatch_mouse(
    page: &Page,
    params: DispatchMouseEventParams,
) -> Result<(), ExecError> {
    page.execute(params)
        .await
        .map_err(|err| ExecError::Interaction(err.to_string()))?;
    Ok(())
}

async fn mouse_click(
    page: &Page,
    x: f64,
    y: f64,
    options: &ActionOptions,
) -> Result<(), ExecError> {
    let button = cdp_button(options.button.unwrap_or_default());
    let modifiers = options.modifier_bits();
    let click_count = if options.double_click { 2 } else { 1 };

    let moved = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseMoved)
        .x(x)
        .y(y)
        .modifiers(modifiers)
        .build()
        .map_err(ExecError::Interaction)?;
    dispatch_mouse(page, moved).await?;

    let pressed = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MousePressed)
        .x(x)
        .y(y)
        .button(button.clone())
        .click_count(click_count)
        .modifiers(modifiers)
        .build()
        .map_err(ExecError::Interaction)?;
    dispatch_mouse(page, pressed).await?;

    let released = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseReleased)
        .x(x)
        .y(y)
        .button(button)
        .click_count(click_count)
        .modifiers(modifiers)
        .build()
        .map_err(ExecError::Interaction)?;
    dispatch_mouse(page, released).await?;
    Ok(())
}

async fn press_key(page: &Page, key_name: &str, modifiers: i64) -> Result<(), ExecError> {
    let (key, code, text, key_code) = match key_definition(key_name) {
        Some(def) => (
            def.key.to_string(),
            def.code.to_string(),
            def.text.map(str::to_string),
            def.key_code,
        ),
        None => {
            // Single printable character.
            let ch = key_name.chars().next().unwrap_or('\0');
            if ch == '\0' {
                return Err(ExecError::InvalidInput(format!("unsupported key: {key_name}")));
            }
            (
                ch.to_string(),
                format!("Key{}", ch.to_ascii_uppercase()),
                Some(ch.to_string()),
                ch.to_ascii_uppercase() as i64,
            )
        }
    };

    let mut down = DispatchKeyEventParams::builder()
        .r#type(if text.is_some() {
            DispatchKeyEventType::KeyDown
        } else {
            DispatchKeyEventType::RawKeyDown
        })
        .key(key.clone())
        .code(code.clone())
        .windows_virtual_key_code(key_code)
        .native_virtual_key_code(key_code)
        .modifiers(modifiers)
        .build()
        .map_err(ExecError::Interaction)?;
    down.text = text.clone();
    page.execute(down)
        .await
        .map_err(|err| ExecError::Interaction(err.to_string()))?;

    let up = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key(key)
        .code(code)
        .windows_virtual_key_code(key_code)
        .native_virtual_key_code(key_code)
        .modifiers(modifiers)
        .build()
        .map_err(ExecError::Interaction)?;
    page.execute(up)
        .await
        .map_err(|err| ExecError::Interaction(err.to_string()))?;
    Ok(())
}

/// Focus the element and clear any existing value, firing an input event so
/// framework listeners observe the clear.
async fn focus_and_clear(
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
    if (!hit) return {{ ok: false, error: 'not_found' }};
    const el = hit.el;
    el.focus();
    if (el.value !== undefined && el.value !== null && el.value !== '') {{
        el.value = '';
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    }}
    return {{ ok: true }};
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    let result = session.evaluate_with_timeout(page, &script, timeout).await?;
    if result.get("ok").and_then(Value::as_bool) != Some(true) {
        return Err(ExecError::Interaction("fill target not focusable".to_string()));
    }
    Ok(())
}

async fn select_option(
    session: &mut Session,
    page: &Page,
    dom_ref: &str,
    match_index: usize,
    value: &Value,
) -> Result<(), ExecError> {
    let dom_ref_json = serde_json::to_string(dom_ref)
        .map_err(|err| ExecError::InvalidInput(err.to_string()))?;
    let payload = serde_json::to_string(value)
        .map_err(|err| ExecError::InvalidInput(err.to_string()))?;
    let script = format!(
        r#"(() => {{
{FIND_BY_DOM_REF_PRELUDE}
    const matches = __gaiaFindByDomRef({dom_ref_json});
    const hit = matches[{match_index}];
    if (!hit) return {{ ok: false, error: 'not_found' }};
    const el = hit.el;
    if (!el.options) return {{ ok: false, error: 'not_a_select' }};
    const payload = {payload};
    const options = Array.from(el.options);
    const wanted = [];
    if (Array.isArray(payload)) {{
        for (const v of payload) wanted.push({{ value: String(v) }});
    }} else if (payload && typeof payload === 'object') {{
        wanted.push(payload);
    }} else {{
        wanted.push({{ value: String(payload) }});
    }}
    let matched = 0;
    for (const option of options) option.selected = false;
    for (const want of wanted) {{
        let hitOption = null;
        if (want.index !== undefined && want.index !== null) {{
            hitOption = options[Number(want.index)] || null;
        }}
        if (!hitOption && want.value !== undefined && want.value !== null) {{
            hitOption = options.find((o) => o.value === String(want.value)) || null;
        }}
        if (!hitOption && want.label !== undefined && want.label !== null) {{
            hitOption = options.find((o) => (o.label || o.text || '').trim() === String(want.label).trim()) || null;
        }}
        if (hitOption) {{
            hitOption.selected = true;
            matched += 1;
        }}
    }}
    if (matched === 0) return {{ ok: false, error: 'no_option_matched' }};
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return {{ ok: true, matched: matched }};
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    let result = session.evaluate_with_timeout(page, &script, timeout).await?;
    if result.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = result
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("select failed");
        return Err(ExecError::Interaction(error.to_string()));
    }
    Ok(())
}

async fn drag_slider(
    session: &mut Session,
    page: &Page,
    dom_ref: &str,
    match_index: usize,
    value: &Value,
) -> Result<(), ExecError> {
    let target = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()))
        .ok_or_else(|| ExecError::InvalidInput("dragSlider requires a numeric value".into()))?;
    let dom_ref_json = serde_json::to_string(dom_ref)
        .map_err(|err| ExecError::InvalidInput(err.to_string()))?;
    let script = format!(
        r#"(() => {{
{FIND_BY_DOM_REF_PRELUDE}
    const matches = __gaiaFindByDomRef({dom_ref_json});
    const hit = matches[{match_index}];
    if (!hit) return false;
    const el = hit.el;
    if (el.value === undefined) return false;
    el.focus();
    el.value = String({target});
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    let result = session.evaluate_with_timeout(page, &script, timeout).await?;
    if result.as_bool() != Some(true) {
        return Err(ExecError::Interaction(
            "dragSlider target is not an input-like element".to_string(),
        ));
    }
    Ok(())
}

async fn drag_target_center(
    session: &mut Session,
    page: &Page,
    selector: &str,
) -> Result<(f64, f64), ExecError> {
    let selector_json = serde_json::to_string(selector)
        .map_err(|err| ExecError::InvalidInput(err.to_string()))?;
    let script = format!(
        r#"(() => {{
    const el = document.querySelector({selector_json});
    if (!el) return null;
    el.scrollIntoView({{ behavior: 'instant', block: 'center', inline: 'nearest' }});
    const rect = el.getBoundingClientRect();
    return {{ x: rect.x + rect.width / 2, y: rect.y + rect.height / 2 }};
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    let raw = session.evaluate_with_timeout(page, &script, timeout).await?;
    let x = raw.get("x").and_then(Value::as_f64);
    let y = raw.get("y").and_then(Value::as_f64);
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ExecError::Interaction(format!(
            "dragAndDrop target not found: {selector}"
        ))),
    }
}

async fn drag_and_drop(
    session: &mut Session,
    page: &Page,
    locator: &ResolvedLocator,
    value: &Value,
) -> Result<(), ExecError> {
    let target_selector = match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("target_selector")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    if target_selector.trim().is_empty() {
        return Err(ExecError::InvalidInput(
            "dragAndDrop requires a non-empty target_selector".into(),
        ));
    }
    let (tx, ty) = drag_target_center(session, page, &target_selector).await?;
    let (sx, sy) = (locator.center_x, locator.center_y);

    let pressed = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MousePressed)
        .x(sx)
        .y(sy)
        .button(MouseButton::Left)
        .click_count(1)
        .build()
        .map_err(ExecError::Interaction)?;
    dispatch_mouse(page, pressed).await?;

    // Two intermediate moves so drag handlers see motion, not a teleport.
    for step in 1..=2 {
        let t = step as f64 / 2.0;
        let moved = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(sx + (tx - sx) * t)
            .y(sy + (ty - sy) * t)
            .button(MouseButton::Left)
            .build()
            .map_err(ExecError::Interaction)?;
        dispatch_mouse(page, moved).await?;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let released = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseReleased)
        .x(tx)
        .y(ty)
        .button(MouseButton::Left)
        .click_count(1)
        .build()
        .map_err(ExecError::Interaction)?;
    dispatch_mouse(page, released).await?;
    Ok(())
}

/// Dispatch one resolved action. The caller owns timeout and verification.
pub async fn perform_action(
    session: &mut Session,
    page: &Page,
    kind: ActionKind,
    locator: &ResolvedLocator,
    value: Option<&Value>,
    options: &ActionOptions,
) -> Result<(), ExecError> {
    match kind {
        ActionKind::Click => {
            reveal_element(session, page, &locator.dom_ref, locator.match_index).await?;
            mouse_click(page, locator.center_x, locator.center_y, options).await
        }
        ActionKind::Hover => {
            reveal_element(session, page, &locator.dom_ref, locator.match_index).await?;
            let moved = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseMoved)
                .x(locator.center_x)
                .y(locator.center_y)
                .build()
                .map_err(ExecError::Interaction)?;
            dispatch_mouse(page, moved).await
        }
        ActionKind::Fill => {
            let text = value
                .and_then(Value::as_str)
                .ok_or_else(|| ExecError::InvalidInput("fill requires a string value".into()))?;
            reveal_element(session, page, &locator.dom_ref, locator.match_index).await?;
            focus_and_clear(session, page, &locator.dom_ref, locator.match_index).await?;
            page.execute(InsertTextParams::new(text))
                .await
                .map_err(|err| ExecError::Interaction(err.to_string()))?;
            Ok(())
        }
        ActionKind::Press => {
            let key = value
                .and_then(Value::as_str)
                .unwrap_or("Enter")
                .to_string();
            reveal_element(session, page, &locator.dom_ref, locator.match_index).await?;
            press_key(page, &key, options.modifier_bits()).await
        }
        ActionKind::Select => {
            let value = value
                .ok_or_else(|| ExecError::InvalidInput("select requires a value".into()))?;
            reveal_element(session, page, &locator.dom_ref, locator.match_index).await?;
            select_option(session, page, &locator.dom_ref, locator.match_index, value).await
        }
        ActionKind::Scroll => {
            let payload = value.cloned().unwrap_or(Value::String("down".into()));
            scroll_container(session, page, &locator.dom_ref, locator.match_index, &payload).await
        }
        ActionKind::ScrollIntoView => {
            reveal_element(session, page, &locator.dom_ref, locator.match_index).await
        }
        ActionKind::DragAndDrop => {
            let value = value.ok_or_else(|| {
                ExecError::InvalidInput("dragAndDrop requires a target_selector value".into())
            })?;
            reveal_element(session, page, &locator.dom_ref, locator.match_index).await?;
            drag_and_drop(session, page, locator, value).await
        }
        ActionKind::DragSlider => {
            let value = value
                .ok_or_else(|| ExecError::InvalidInput("dragSlider requires a value".into()))?;
            drag_slider(session, page, &locator.dom_ref, locator.match_index, value).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_have_definitions() {
        let enter = key_definition("Enter").unwrap();
        assert_eq!(enter.key_code, 13);
        assert_eq!(enter.text, Some("\r"));
        assert!(key_definition("Tab").unwrap().text.is_none());
        assert!(key_definition("NotAKey").is_none());
    }

    #[test]
    fn mouse_button_choices_map_to_cdp() {
        assert!(matches!(cdp_button(MouseButtonChoice::Left), MouseButton::Left));
        assert!(matches!(cdp_button(MouseButtonChoice::Right), MouseButton::Right));
        assert!(matches!(cdp_button(MouseButtonChoice::Middle), MouseButton::Middle));
    }
}
