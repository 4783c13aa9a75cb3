use std::time::{Duration, Instant};

/// Quiescence window applied to search keystrokes
pub const FILTER_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Trailing-edge debounce: only the last value of a burst is released,
/// once `window` has passed without a newer push.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Queue `value`, replacing anything pending and restarting the window
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Release the pending value if its window has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|(_, at)| now.saturating_duration_since(*at) >= self.window);
        if !ready {
            return None;
        }
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending value without releasing it
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// The navigator's filter text. Only changes through the debouncer or
/// through [`FilterState::apply_now`].
#[derive(Debug, Clone)]
pub struct FilterState {
    applied: String,
    debounce: Debouncer<String>,
}

impl FilterState {
    pub fn new(window: Duration) -> Self {
        Self {
            applied: String::new(),
            debounce: Debouncer::new(window),
        }
    }

    /// Filter text the tree is currently built with
    pub fn applied(&self) -> &str {
        &self.applied
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Record a keystroke's resulting text
    pub fn on_input(&mut self, text: impl Into<String>, now: Instant) {
        self.debounce.push(text.into(), now);
    }

    /// Apply a settled value. Returns true when the applied filter changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.debounce.poll(now) {
            Some(text) => self.set(text),
            None => false,
        }
    }

    /// Bypass the debounce, discarding anything pending
    pub fn apply_now(&mut self, text: impl Into<String>) -> bool {
        self.debounce.clear();
        self.set(text.into())
    }

    fn set(&mut self, text: String) -> bool {
        if text == self.applied {
            return false;
        }
        tracing::debug!("Filter applied: {:?}", text);
        self.applied = text;
        true
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(FILTER_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debouncer_waits_for_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(1000));
        d.push("a", t0);

        assert_eq!(d.poll(t0 + ms(999)), None);
        assert_eq!(d.poll(t0 + ms(1000)), Some("a"));
        assert_eq!(d.poll(t0 + ms(5000)), None);
    }

    #[test]
    fn test_debouncer_keystroke_resets_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(1000));
        d.push("g", t0);
        d.push("gr", t0 + ms(600));
        d.push("gre", t0 + ms(1200));

        assert_eq!(d.poll(t0 + ms(1600)), None);
        assert_eq!(d.poll(t0 + ms(2200)), Some("gre"));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_filter_state_applies_last_value() {
        let t0 = Instant::now();
        let mut f = FilterState::default();
        f.on_input("h", t0);
        f.on_input("he", t0 + ms(100));

        assert!(!f.tick(t0 + ms(500)));
        assert_eq!(f.applied(), "");
        assert!(f.tick(t0 + ms(1100)));
        assert_eq!(f.applied(), "he");
    }

    #[test]
    fn test_filter_state_unchanged_value() {
        let t0 = Instant::now();
        let mut f = FilterState::new(ms(10));
        f.on_input("x", t0);
        assert!(f.tick(t0 + ms(10)));
        f.on_input("x", t0 + ms(20));
        assert!(!f.tick(t0 + ms(30)));
    }

    #[test]
    fn test_apply_now_discards_pending() {
        let t0 = Instant::now();
        let mut f = FilterState::default();
        f.on_input("abc", t0);
        assert!(!f.apply_now(""));
        assert!(!f.is_pending());
        assert!(!f.tick(t0 + ms(2000)));
        assert_eq!(f.applied(), "");
    }
}
