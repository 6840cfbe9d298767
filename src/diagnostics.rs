// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Throttled warnings.

Layout code warns from inside tight per-frame loops, so a single bad input could otherwise flood
the log. The first [`MAX_WARNINGS`] warnings are logged, followed by one notice, after which the
rest are dropped for the lifetime of the process.
*/

use std::sync::atomic::{AtomicUsize, Ordering};

pub const MAX_WARNINGS: usize = 100;

static WARNINGS_THROWN: AtomicUsize = AtomicUsize::new(0);

/// Logs `message` as a warning, subject to the process-wide limit.
pub fn throw_warning(message: &str) {
    let thrown = WARNINGS_THROWN.fetch_add(1, Ordering::Relaxed);
    if thrown < MAX_WARNINGS {
        logwise::warn_sync!("{message}", message = logwise::privacy::LogIt(message));
    } else if thrown == MAX_WARNINGS {
        logwise::warn_sync!("too many warnings thrown, further warnings are suppressed");
    }
}

/// Number of warnings thrown so far, suppressed ones included.
pub fn warnings_thrown() -> usize {
    WARNINGS_THROWN.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_advances_past_limit() {
        let before = warnings_thrown();
        for _ in 0..(MAX_WARNINGS + 5) {
            throw_warning("repeated");
        }
        assert!(warnings_thrown() >= before + MAX_WARNINGS + 5);
    }
}
