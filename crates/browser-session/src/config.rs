//! Per-session browser configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrowserSessionConfig {
    /// Headful by default so a human can intervene on captchas and auth
    /// gates.
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub extra_args: Vec<String>,
    /// Budget for a single in-page evaluation before the connection is
    /// considered poisoned.
    pub evaluate_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    /// All persistent artifacts (traces, pdfs, screenshots, downloads) must
    /// live under this root.
    pub data_root: PathBuf,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            user_data_dir: None,
            window_width: 1280,
            window_height: 720,
            extra_args: Vec::new(),
            evaluate_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            data_root: std::env::temp_dir().join("gaia"),
        }
    }
}

impl BrowserSessionConfig {
    /// Resolve a caller-supplied artifact path against the data root,
    /// rejecting anything that would escape it.
    pub fn artifact_path(&self, requested: &str) -> Result<PathBuf, crate::errors::SessionError> {
        let candidate = PathBuf::from(requested);
        let joined = if candidate.is_absolute() {
            candidate
        } else {
            self.data_root.join(candidate)
        };
        let mut normalized = PathBuf::new();
        for part in joined.components() {
            match part {
                std::path::Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(crate::errors::SessionError::PathOutsideDataRoot(
                            requested.to_string(),
                        ));
                    }
                }
                std::path::Component::CurDir => {}
                other => normalized.push(other),
            }
        }
        if !normalized.starts_with(&self.data_root) {
            return Err(crate::errors::SessionError::PathOutsideDataRoot(
                requested.to_string(),
            ));
        }
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BrowserSessionConfig {
        BrowserSessionConfig {
            data_root: PathBuf::from("/var/lib/gaia"),
            ..Default::default()
        }
    }

    #[test]
    fn relative_artifact_paths_land_under_the_root() {
        let cfg = config();
        let path = cfg.artifact_path("traces/run1.json").unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/gaia/traces/run1.json"));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let cfg = config();
        assert!(cfg.artifact_path("../etc/passwd").is_err());
        assert!(cfg.artifact_path("/etc/passwd").is_err());
        assert!(cfg.artifact_path("traces/../../../etc").is_err());
    }

    #[test]
    fn absolute_paths_inside_the_root_are_accepted() {
        let cfg = config();
        let path = cfg.artifact_path("/var/lib/gaia/pdf/out.pdf").unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/gaia/pdf/out.pdf"));
    }
}
