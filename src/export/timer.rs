use std::time::Instant;

/// Slot holding at most one pending deadline.
///
/// `arm_if_idle` refuses to replace an armed deadline; only `rearm` and
/// `cancel` can discard one.
#[derive(Debug, Default)]
pub struct OneShotTimer {
    deadline: Option<Instant>,
    arms: u64,
}

impl OneShotTimer {
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Number of times a deadline has been installed.
    pub fn arm_count(&self) -> u64 {
        self.arms
    }

    /// Arm for `at` unless a deadline is already pending.
    pub fn arm_if_idle(&mut self, at: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.install(at);
        true
    }

    /// Discard any pending deadline and arm for `at`.
    pub fn rearm(&mut self, at: Instant) {
        self.install(at);
    }

    /// Drop the pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Disarm and return true once `now` has reached the deadline.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    fn install(&mut self, at: Instant) {
        self.deadline = Some(at);
        self.arms += 1;
    }
}
