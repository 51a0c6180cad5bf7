//! Browser process launch with anti-automation mitigations.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSessionConfig;
use crate::errors::SessionError;

/// Injected before any SUT script runs. Removes the webdriver marker and
/// fills in the signals headless automation normally lacks.
const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => false });
window.chrome = window.chrome || { runtime: {} };
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
if (navigator.permissions && navigator.permissions.query) {
    const originalQuery = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters)
    );
}
"#;

const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-features=IsolateOrigins,site-per-process",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-popup-blocking",
    "--no-sandbox",
    "--disable-setuid-sandbox",
];

/// A launched browser plus the event-handler task that keeps it alive.
pub struct BrowserHandle {
    pub browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserHandle {
    pub async fn shutdown(mut self) {
        if let Err(err) = self.browser.close().await {
            debug!(?err, "browser close reported an error");
        }
        let _ = tokio::time::timeout(Duration::from_secs(3), self.browser.wait()).await;
        self.handler_task.abort();
    }
}

/// Locate a Chrome/Chromium executable on PATH.
pub fn find_chrome() -> Option<PathBuf> {
    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium-browser",
        "chromium",
        "chrome",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }
    None
}

/// Launch a browser for one session and stamp the stealth script on its
/// initial page.
pub async fn launch_browser(config: &BrowserSessionConfig) -> Result<(BrowserHandle, Page), SessionError> {
    let mut builder = BrowserConfig::builder()
        .window_size(config.window_width, config.window_height);

    if !config.headless {
        builder = builder.with_head();
    }
    if let Some(executable) = config.executable.clone().or_else(find_chrome) {
        info!(executable = %executable.display(), "using browser executable");
        builder = builder.chrome_executable(executable);
    }
    if let Some(dir) = &config.user_data_dir {
        builder = builder.user_data_dir(dir);
    }
    for arg in LAUNCH_ARGS {
        builder = builder.arg(*arg);
    }
    for arg in &config.extra_args {
        builder = builder.arg(arg.as_str());
    }

    let browser_config = builder.build().map_err(SessionError::LaunchFailed)?;
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|err| SessionError::LaunchFailed(err.to_string()))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(err) = event {
                warn!(%err, "browser event handler error");
                break;
            }
        }
        debug!("browser event handler finished");
    });

    let page = browser.new_page("about:blank").await?;
    apply_stealth(&page).await?;

    Ok((
        BrowserHandle {
            browser,
            handler_task,
        },
        page,
    ))
}

/// Install the stealth init script on a page so it runs before any document
/// script on every navigation.
pub async fn apply_stealth(page: &Page) -> Result<(), SessionError> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
        STEALTH_INIT_SCRIPT,
    ))
    .await?;
    Ok(())
}
