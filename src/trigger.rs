use std::time::{Duration, Instant};

use crate::config::DEFAULT_AUTO_PROCESS_DELAY;

/// Debounces parameter edits into a single automatic batch run.
///
/// Edits only arm the trigger while auto-processing is enabled, no batch is
/// running and the user has interacted at least once since load. The first
/// change after construction or [`reset()`](Self::reset) is treated as the
/// host restoring saved values and never arms it.
///
/// Time is passed in explicitly so hosts and tests control the clock.
#[derive(Debug, Clone)]
pub struct AutoProcessTrigger {
    enabled: bool,
    pending: bool,
    has_interacted: bool,
    last_change: Option<Instant>,
    delay: Duration,
}

impl Default for AutoProcessTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_PROCESS_DELAY)
    }
}

impl AutoProcessTrigger {
    pub fn new(delay: Duration) -> Self {
        Self {
            enabled: false,
            pending: false,
            has_interacted: false,
            last_change: None,
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn auto-processing on or off. Disabling drops any pending run.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending = false;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Record a parameter change at `now`.
    pub fn notify_parameter_changed(&mut self, now: Instant, batch_active: bool) {
        if self.enabled && !batch_active && self.has_interacted {
            self.pending = true;
            self.last_change = Some(now);
        }
        self.has_interacted = true;
    }

    /// Returns `true` exactly once per quiet period, when the delay since
    /// the last change has elapsed and no batch is running.
    pub fn tick(&mut self, now: Instant, batch_active: bool) -> bool {
        if !self.pending || batch_active {
            return false;
        }
        let Some(last) = self.last_change else {
            return false;
        };
        if now.saturating_duration_since(last) < self.delay {
            return false;
        }
        self.pending = false;
        log::debug!("auto-process firing after {:?}", now - last);
        true
    }

    /// Forget prior interaction, e.g. before restoring saved settings.
    pub fn reset(&mut self) {
        self.pending = false;
        self.has_interacted = false;
        self.last_change = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> (AutoProcessTrigger, Instant) {
        let mut trigger = AutoProcessTrigger::default();
        trigger.set_enabled(true);
        let t0 = Instant::now();
        trigger.notify_parameter_changed(t0, false);
        (trigger, t0)
    }

    #[test]
    fn test_first_change_does_not_arm() {
        let (trigger, _) = armed();
        assert!(!trigger.is_pending());
    }

    #[test]
    fn test_fires_once_after_delay() {
        let (mut trigger, t0) = armed();
        trigger.notify_parameter_changed(t0, false);
        assert!(trigger.is_pending());

        assert!(!trigger.tick(t0 + Duration::from_millis(10), false));
        assert!(trigger.tick(t0 + Duration::from_millis(50), false));
        assert!(!trigger.tick(t0 + Duration::from_millis(100), false));
    }

    #[test]
    fn test_rapid_edits_coalesce() {
        let (mut trigger, t0) = armed();
        for ms in [0, 20, 40, 60] {
            trigger.notify_parameter_changed(t0 + Duration::from_millis(ms), false);
            assert!(!trigger.tick(t0 + Duration::from_millis(ms + 5), false));
        }
        assert!(!trigger.tick(t0 + Duration::from_millis(100), false));
        assert!(trigger.tick(t0 + Duration::from_millis(110), false));
    }

    #[test]
    fn test_ignored_while_disabled_or_busy() {
        let (mut trigger, t0) = armed();
        trigger.notify_parameter_changed(t0, true);
        assert!(!trigger.is_pending());

        trigger.set_enabled(false);
        trigger.notify_parameter_changed(t0, false);
        assert!(!trigger.is_pending());
    }

    #[test]
    fn test_waits_for_batch_to_finish() {
        let (mut trigger, t0) = armed();
        trigger.notify_parameter_changed(t0, false);
        let later = t0 + Duration::from_millis(80);
        assert!(!trigger.tick(later, true));
        assert!(trigger.tick(later, false));
    }

    #[test]
    fn test_reset_requires_new_interaction() {
        let (mut trigger, t0) = armed();
        trigger.reset();
        trigger.notify_parameter_changed(t0, false);
        assert!(!trigger.is_pending());
    }
}
