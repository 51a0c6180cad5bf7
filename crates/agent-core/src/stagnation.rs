//! Stagnation detectors.
//!
//! The loop must terminate even when the page and the model conspire to go
//! nowhere: repeated identical decisions, a DOM that never changes, a DOM
//! that cannot be read at all, an auth gate with no credentials, or failed
//! auto-recoveries.

use serde::Serialize;

pub const REPEAT_DECISION_LIMIT: u32 = 5;
pub const REPEAT_DOM_LIMIT: u32 = 10;
pub const MISSING_DOM_LIMIT: u32 = 3;
pub const LOGIN_GATE_LIMIT: u32 = 3;
pub const RECOVERY_FAILURE_LIMIT: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StagnationReason {
    RepeatedAction,
    ScreenUnchanged,
    DomUnreachable,
    LoginGate,
    RecoveryFailed,
}

impl StagnationReason {
    pub fn message(self) -> &'static str {
        match self {
            StagnationReason::RepeatedAction => "stopped: repeated action with no progress",
            StagnationReason::ScreenUnchanged => "stopped: screen unchanged across steps",
            StagnationReason::DomUnreachable => "stopped: DOM unreachable",
            StagnationReason::LoginGate => {
                "stopped: login gate without credentials; recover credentials first"
            }
            StagnationReason::RecoveryFailed => "stopped: repeated auto-recovery failures",
        }
    }
}

#[derive(Debug, Default)]
pub struct StagnationTracker {
    last_decision_signature: Option<String>,
    decision_repeats: u32,
    last_dom_signature: Option<String>,
    dom_repeats: u32,
    missing_dom_streak: u32,
    login_gate_streak: u32,
    recovery_failure_streak: u32,
}

impl StagnationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decision signature; fires after 5 identical in a row.
    pub fn observe_decision(&mut self, signature: &str) -> Option<StagnationReason> {
        if self.last_decision_signature.as_deref() == Some(signature) {
            self.decision_repeats += 1;
        } else {
            self.last_decision_signature = Some(signature.to_string());
            self.decision_repeats = 1;
        }
        (self.decision_repeats >= REPEAT_DECISION_LIMIT).then_some(StagnationReason::RepeatedAction)
    }

    /// Record one DOM signature; fires after 10 identical in a row.
    pub fn observe_dom(&mut self, signature: &str) -> Option<StagnationReason> {
        self.missing_dom_streak = 0;
        if self.last_dom_signature.as_deref() == Some(signature) {
            self.dom_repeats += 1;
        } else {
            self.last_dom_signature = Some(signature.to_string());
            self.dom_repeats = 1;
        }
        (self.dom_repeats >= REPEAT_DOM_LIMIT).then_some(StagnationReason::ScreenUnchanged)
    }

    /// Record a step where no DOM could be retrieved; fires on the third.
    pub fn observe_missing_dom(&mut self) -> Option<StagnationReason> {
        self.missing_dom_streak += 1;
        (self.missing_dom_streak >= MISSING_DOM_LIMIT).then_some(StagnationReason::DomUnreachable)
    }

    /// Record a step spent poking at a login gate without credentials.
    pub fn observe_login_gate(&mut self, gate_visible: bool, has_credentials: bool, interacting: bool) -> Option<StagnationReason> {
        if gate_visible && !has_credentials && interacting {
            self.login_gate_streak += 1;
        } else {
            self.login_gate_streak = 0;
        }
        (self.login_gate_streak >= LOGIN_GATE_LIMIT).then_some(StagnationReason::LoginGate)
    }

    /// Record an auto-recovery outcome; fires once failures exceed the limit.
    pub fn observe_recovery(&mut self, failed: bool) -> Option<StagnationReason> {
        if failed {
            self.recovery_failure_streak += 1;
        } else {
            self.recovery_failure_streak = 0;
        }
        (self.recovery_failure_streak > RECOVERY_FAILURE_LIMIT)
            .then_some(StagnationReason::RecoveryFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_identical_decisions_stop_the_loop() {
        let mut tracker = StagnationTracker::new();
        for _ in 0..4 {
            assert_eq!(tracker.observe_decision("click|3|"), None);
        }
        assert_eq!(
            tracker.observe_decision("click|3|"),
            Some(StagnationReason::RepeatedAction)
        );
    }

    #[test]
    fn a_different_decision_resets_the_streak() {
        let mut tracker = StagnationTracker::new();
        for _ in 0..4 {
            tracker.observe_decision("click|3|");
        }
        assert_eq!(tracker.observe_decision("fill|1|x"), None);
        for _ in 0..3 {
            assert_eq!(tracker.observe_decision("fill|1|x"), None);
        }
        assert_eq!(
            tracker.observe_decision("fill|1|x"),
            Some(StagnationReason::RepeatedAction)
        );
    }

    #[test]
    fn ten_identical_dom_signatures_stop_the_loop() {
        let mut tracker = StagnationTracker::new();
        for _ in 0..9 {
            assert_eq!(tracker.observe_dom("hash-a"), None);
        }
        assert_eq!(
            tracker.observe_dom("hash-a"),
            Some(StagnationReason::ScreenUnchanged)
        );
    }

    #[test]
    fn three_missing_doms_stop_the_loop() {
        let mut tracker = StagnationTracker::new();
        assert_eq!(tracker.observe_missing_dom(), None);
        assert_eq!(tracker.observe_missing_dom(), None);
        assert_eq!(
            tracker.observe_missing_dom(),
            Some(StagnationReason::DomUnreachable)
        );
    }

    #[test]
    fn a_readable_dom_resets_the_missing_streak() {
        let mut tracker = StagnationTracker::new();
        tracker.observe_missing_dom();
        tracker.observe_missing_dom();
        tracker.observe_dom("hash-a");
        assert_eq!(tracker.observe_missing_dom(), None);
    }

    #[test]
    fn login_gate_without_credentials_stops_after_three_interactions() {
        let mut tracker = StagnationTracker::new();
        assert_eq!(tracker.observe_login_gate(true, false, true), None);
        assert_eq!(tracker.observe_login_gate(true, false, true), None);
        assert_eq!(
            tracker.observe_login_gate(true, false, true),
            Some(StagnationReason::LoginGate)
        );
    }

    #[test]
    fn credentials_disarm_the_login_gate_detector() {
        let mut tracker = StagnationTracker::new();
        for _ in 0..5 {
            assert_eq!(tracker.observe_login_gate(true, true, true), None);
        }
    }

    #[test]
    fn recovery_failures_stop_once_the_limit_is_exceeded() {
        let mut tracker = StagnationTracker::new();
        assert_eq!(tracker.observe_recovery(true), None);
        assert_eq!(tracker.observe_recovery(true), None);
        assert_eq!(
            tracker.observe_recovery(true),
            Some(StagnationReason::RecoveryFailed)
        );
        let mut reset = StagnationTracker::new();
        reset.observe_recovery(true);
        reset.observe_recovery(false);
        assert_eq!(reset.observe_recovery(true), None);
    }
}
