/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::time::Instant;

/// How many pulls may pass between actual clock reads.
const TIMEOUT_CHECK_INTERVAL: u32 = 100;

/// Counter-gated deadline polling.
///
/// Reading a monotonic clock per record is measurable overhead on tight
/// scans, so the deadline is only consulted on the first pull and then
/// every [`TIMEOUT_CHECK_INTERVAL`] pulls.
#[derive(Debug, Default)]
pub(crate) struct TimeoutChecker {
    counter: u32,
}

impl TimeoutChecker {
    /// Returns `true` when the deadline has passed. Amortized: most calls
    /// only decrement a counter.
    pub(crate) fn check(&mut self, deadline: Option<Instant>) -> bool {
        if self.counter > 0 {
            self.counter -= 1;
            return false;
        }
        self.counter = TIMEOUT_CHECK_INTERVAL - 1;
        deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn no_deadline_never_times_out() {
        let mut checker = TimeoutChecker::default();
        for _ in 0..1000 {
            assert!(!checker.check(None));
        }
    }

    #[test]
    fn expired_deadline_is_seen_on_the_first_check() {
        let mut checker = TimeoutChecker::default();
        let past = Instant::now() - Duration::from_millis(1);
        assert!(checker.check(Some(past)));
    }

    #[test]
    fn checks_are_amortized() {
        let mut checker = TimeoutChecker::default();
        let past = Instant::now() - Duration::from_millis(1);
        assert!(checker.check(Some(past)));

        // the next clock read is an interval away
        let mut hits = 0;
        for _ in 0..TIMEOUT_CHECK_INTERVAL {
            if checker.check(Some(past)) {
                hits += 1;
            }
        }
        assert_eq!(hits, 1);
    }
}
