//! Tab addressing.
//!
//! Tabs resolve by CDP target id (exact), by unambiguous target-id prefix,
//! or by integer index into the page list. An ambiguous prefix reports every
//! match so the caller can disambiguate.

use chromiumoxide::page::Page;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabPayload {
    pub tab_id: usize,
    #[serde(rename = "targetId")]
    pub target_id: String,
    pub active: bool,
    pub url: String,
    pub title: String,
}

/// Outcome of resolving a tab identifier against the live page list.
#[derive(Debug)]
pub enum TabResolution {
    Resolved { index: usize, page: Page },
    Ambiguous { matches: Vec<String> },
    NotFound,
}

/// Interpret a loosely typed tab identifier as an integer index. Accepts
/// bare integers, numeric strings and `tab:`/`tab-`/`tab_` prefixes.
pub fn coerce_tab_index(raw: &Value) -> Option<usize> {
    match raw {
        Value::Bool(_) => None,
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(s) => {
            let mut text = s.trim();
            if text.is_empty() {
                return None;
            }
            let lowered = text.to_lowercase();
            for prefix in ["tab:", "tab-", "tab_"] {
                if lowered.starts_with(prefix) {
                    text = text[prefix.len()..].trim();
                    break;
                }
            }
            text.parse::<usize>().ok()
        }
        _ => None,
    }
}

/// Prefix match over a list of target ids.
#[derive(Debug, PartialEq, Eq)]
pub enum PrefixMatch {
    Exact(usize),
    Unique(usize),
    Ambiguous(Vec<String>),
    None,
}

/// Match a needle against target ids: exact id wins, then a unique
/// case-insensitive prefix; multiple prefix hits are ambiguous.
pub fn match_target_prefix(target_ids: &[String], needle: &str) -> PrefixMatch {
    let needle = needle.trim();
    if needle.is_empty() {
        return PrefixMatch::None;
    }
    let lower = needle.to_lowercase();
    let mut prefix_hits: Vec<(usize, &String)> = Vec::new();
    for (idx, id) in target_ids.iter().enumerate() {
        if id == needle {
            return PrefixMatch::Exact(idx);
        }
        if id.to_lowercase().starts_with(&lower) {
            prefix_hits.push((idx, id));
        }
    }
    match prefix_hits.len() {
        0 => PrefixMatch::None,
        1 => PrefixMatch::Unique(prefix_hits[0].0),
        _ => PrefixMatch::Ambiguous(prefix_hits.into_iter().map(|(_, id)| id.clone()).collect()),
    }
}

/// Resolve a tab identifier (index or target id / prefix) to a live page.
pub async fn resolve_tab_identifier(pages: &[Page], identifier: &Value) -> TabResolution {
    if let Some(index) = coerce_tab_index(identifier) {
        return match pages.get(index) {
            Some(page) => TabResolution::Resolved {
                index,
                page: page.clone(),
            },
            None => TabResolution::NotFound,
        };
    }

    let needle = match identifier.as_str() {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return TabResolution::NotFound,
    };

    let target_ids: Vec<String> = pages
        .iter()
        .map(|p| p.target_id().as_ref().to_string())
        .collect();

    match match_target_prefix(&target_ids, &needle) {
        PrefixMatch::Exact(idx) | PrefixMatch::Unique(idx) => TabResolution::Resolved {
            index: idx,
            page: pages[idx].clone(),
        },
        PrefixMatch::Ambiguous(matches) => TabResolution::Ambiguous { matches },
        PrefixMatch::None => TabResolution::NotFound,
    }
}

/// Build the wire payload for one tab.
pub async fn tab_payload(page: &Page, index: usize, active: bool) -> TabPayload {
    let url = page.url().await.ok().flatten().unwrap_or_default();
    let title = page.get_title().await.ok().flatten().unwrap_or_default();
    TabPayload {
        tab_id: index,
        target_id: page.target_id().as_ref().to_string(),
        active,
        url,
        title,
    }
}

/// Payloads for the whole tab list; `current` marks the active page.
pub async fn tabs_payload(pages: &[Page], current_index: usize) -> Vec<TabPayload> {
    let mut out = Vec::with_capacity(pages.len());
    for (idx, page) in pages.iter().enumerate() {
        out.push(tab_payload(page, idx, idx == current_index).await);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_accepts_integers_and_prefixed_strings() {
        assert_eq!(coerce_tab_index(&json!(2)), Some(2));
        assert_eq!(coerce_tab_index(&json!("3")), Some(3));
        assert_eq!(coerce_tab_index(&json!("tab:4")), Some(4));
        assert_eq!(coerce_tab_index(&json!("TAB-1")), Some(1));
        assert_eq!(coerce_tab_index(&json!(true)), None);
        assert_eq!(coerce_tab_index(&json!("ABCD1234")), None);
    }

    #[test]
    fn exact_target_id_beats_prefix() {
        let ids = vec!["ABCD".to_string(), "ABCD1234".to_string()];
        assert_eq!(match_target_prefix(&ids, "ABCD"), PrefixMatch::Exact(0));
    }

    #[test]
    fn unique_prefix_resolves() {
        let ids = vec!["ABCD1234".to_string(), "EFGH5678".to_string()];
        assert_eq!(match_target_prefix(&ids, "efgh"), PrefixMatch::Unique(1));
    }

    #[test]
    fn shared_prefix_is_ambiguous_with_all_matches() {
        let ids = vec!["ABCD1111".to_string(), "ABCD2222".to_string()];
        match match_target_prefix(&ids, "ABCD") {
            PrefixMatch::Ambiguous(matches) => {
                assert_eq!(matches, vec!["ABCD1111".to_string(), "ABCD2222".to_string()]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn unknown_needle_is_none() {
        let ids = vec!["ABCD1111".to_string()];
        assert_eq!(match_target_prefix(&ids, "ZZZZ"), PrefixMatch::None);
        assert_eq!(match_target_prefix(&ids, "   "), PrefixMatch::None);
    }
}
