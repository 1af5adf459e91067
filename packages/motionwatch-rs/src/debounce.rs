// Consecutive-count debounce for one boolean condition.
//
// The output only flips after `threshold` consecutive updates agree on the
// new value. Any update that disagrees with the pending target restarts the
// count.

use crate::config::DEBOUNCE_THRESHOLD;

#[derive(Debug, Clone)]
pub struct DebounceFilter {
    current: bool,
    target: bool,
    counter: u8,
    threshold: u8,
}

impl Default for DebounceFilter {
    fn default() -> Self {
        Self::new(DEBOUNCE_THRESHOLD)
    }
}

impl DebounceFilter {
    /// A filter starting in the inactive state. A zero threshold behaves
    /// like one.
    pub fn new(threshold: u8) -> Self {
        Self {
            current: false,
            target: false,
            counter: 0,
            threshold,
        }
    }

    /// Feed one raw observation and return the debounced state.
    pub fn update(&mut self, value: bool) -> bool {
        if value != self.target {
            self.target = value;
            self.counter = 0;
        }

        if self.target != self.current {
            self.counter = self.counter.saturating_add(1);
            if self.counter >= self.threshold {
                self.current = self.target;
                self.counter = 0;
            }
        }

        self.current
    }

    pub fn state(&self) -> bool {
        self.current
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn reset(&mut self, initial: bool) {
        self.current = initial;
        self.target = initial;
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_needs_threshold_consecutive_updates() {
        let mut filter = DebounceFilter::new(3);
        assert!(!filter.update(true));
        assert!(!filter.update(true));
        assert!(filter.update(true));
        assert!(filter.state());
    }

    #[test]
    fn test_contrary_update_restarts_count() {
        let mut filter = DebounceFilter::new(3);
        filter.update(true);
        filter.update(true);
        // One observation of the old value in the run
        assert!(!filter.update(false));
        assert!(!filter.update(true));
        assert!(!filter.update(true));
        assert!(filter.update(true));
    }

    #[test]
    fn test_default_threshold_of_two() {
        let mut filter = DebounceFilter::default();
        assert_eq!(filter.threshold(), 2);
        assert!(!filter.update(true));
        assert!(filter.update(true));
        assert!(filter.update(false));
        assert!(!filter.update(false));
    }

    #[test]
    fn test_steady_input_never_flips() {
        let mut filter = DebounceFilter::new(2);
        for _ in 0..10 {
            assert!(!filter.update(false));
        }
    }

    #[test]
    fn test_threshold_one_follows_input() {
        let mut filter = DebounceFilter::new(1);
        assert!(filter.update(true));
        assert!(!filter.update(false));
    }

    #[test]
    fn test_reset() {
        let mut filter = DebounceFilter::new(2);
        filter.update(true);
        filter.reset(true);
        assert!(filter.state());
        assert!(filter.update(false));
        assert!(!filter.update(false));
    }
}
