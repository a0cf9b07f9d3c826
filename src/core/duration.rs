//! Human-readable rendering of elapsed time for traced entries
//!
//! Spans below one day render as a compact duration such as `1.5s`,
//! `2m3s` or `1h0m0s`. Longer spans are split into days (and years at or
//! above 365 days) followed by the compact remainder, e.g. `1y2d3h0m0s`.

use std::fmt::Write as _;
use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Render an elapsed duration for the `duration` field
pub fn format_duration(elapsed: Duration) -> String {
    if elapsed < DAY {
        return format_compact(elapsed);
    }

    let mut out = String::new();
    let mut remaining = elapsed.as_secs();
    let subsec = elapsed.subsec_nanos();

    if elapsed >= YEAR {
        let years = remaining / YEAR.as_secs();
        remaining -= years * YEAR.as_secs();
        let _ = write!(out, "{}y", years);
    }

    let days = remaining / DAY.as_secs();
    remaining -= days * DAY.as_secs();
    let _ = write!(
        out,
        "{}d{}",
        days,
        format_compact(Duration::new(remaining, subsec))
    );
    out
}

/// Compact unit rendering: `0s`, `850ns`, `1.5µs`, `12.25ms`, `3.2s`,
/// `4m0s`, `1h2m3.5s`.
pub fn format_compact(elapsed: Duration) -> String {
    let nanos = elapsed.as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_MICRO {
        return format!("{}ns", nanos);
    }
    if nanos < NANOS_PER_MILLI {
        return format!("{}µs", fraction(nanos, NANOS_PER_MICRO, 3));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", fraction(nanos, NANOS_PER_MILLI, 6));
    }

    let secs = nanos / NANOS_PER_SEC;
    let mut out = String::new();
    let hours = secs / 3600;
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if secs >= 60 {
        let _ = write!(out, "{}m", (secs / 60) % 60);
    }
    let _ = write!(
        out,
        "{}s",
        fraction((secs % 60) * NANOS_PER_SEC + nanos % NANOS_PER_SEC, NANOS_PER_SEC, 9)
    );
    out
}

/// `value / unit` with up to `digits` decimals, trailing zeros removed
fn fraction(value: u128, unit: u128, digits: usize) -> String {
    let whole = value / unit;
    let rest = value % unit;
    if rest == 0 {
        return whole.to_string();
    }

    let decimals = format!("{:0width$}", rest, width = digits);
    format!("{}.{}", whole, decimals.trim_end_matches('0'))
}
