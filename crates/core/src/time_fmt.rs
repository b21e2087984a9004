// SPDX-License-Identifier: MIT

//! Compact elapsed-time formatting for log lines.

use std::time::Duration;

/// Format an elapsed duration as `1h 02m`, `3m 05s`, or `4.2s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 3600.0 {
        let hours = (secs / 3600.0) as u64;
        let minutes = ((secs % 3600.0) / 60.0) as u64;
        format!("{hours}h {minutes:02}m")
    } else if secs >= 60.0 {
        let minutes = (secs / 60.0) as u64;
        let rem = (secs % 60.0) as u64;
        format!("{minutes}m {rem:02}s")
    } else {
        format!("{secs:.1}s")
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
