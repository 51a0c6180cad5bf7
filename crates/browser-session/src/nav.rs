//! URL normalization and navigation helpers.

use std::time::Duration;

use chromiumoxide::page::Page;
use tracing::debug;

use crate::errors::SessionError;

/// Settle budget after a fresh navigation, giving SPA frameworks time to
/// hydrate before the DOM is enumerated.
pub const POST_NAVIGATION_SETTLE: Duration = Duration::from_secs(3);

/// Cap on waiting for the document to finish loading.
pub const READY_STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Normalize a URL for comparison: hash navigation and trailing-slash
/// differences do not count as distinct locations.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut normalized = trimmed.replace("/#", "#");
    if normalized.ends_with('/') && !normalized.ends_with("://") {
        normalized = normalized.trim_end_matches('/').to_string();
    }
    normalized
}

/// Poll `document.readyState` until the page reports complete or the cap is
/// reached. Never an error: a slow page simply proceeds.
pub async fn wait_for_ready_state(page: &Page, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let ready = page
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|res| res.into_value::<String>().ok())
            .map(|state| state == "complete")
            .unwrap_or(false);
        if ready || tokio::time::Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// Navigate only when the requested URL differs from the live one after
/// normalization. Returns whether a navigation happened.
pub async fn navigate_if_needed(page: &Page, url: &str, settle: bool) -> Result<bool, SessionError> {
    let requested = normalize_url(url);
    if requested.is_empty() {
        return Ok(false);
    }
    let current = page.url().await?.unwrap_or_default();
    if normalize_url(&current) == requested {
        return Ok(false);
    }
    debug!(from = %current, to = %url, "navigating");
    page.goto(url).await?;
    wait_for_ready_state(page, READY_STATE_TIMEOUT).await;
    if settle {
        tokio::time::sleep(POST_NAVIGATION_SETTLE).await;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_navigation_is_collapsed() {
        assert_eq!(
            normalize_url("https://example.com/#basics"),
            "https://example.com#basics"
        );
    }

    #[test]
    fn trailing_slash_is_removed() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn protocol_only_urls_keep_their_slashes() {
        assert_eq!(normalize_url("https://"), "https://");
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(normalize_url("  https://a.test  "), "https://a.test");
        assert_eq!(normalize_url("   "), "");
    }
}
