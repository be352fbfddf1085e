//! Tracking poll-due policy.
//!
//! Pure decision functions driving which orders get an external tracking-API
//! call on a sweep. All comparisons happen in America/Sao_Paulo, the same
//! timezone the renderer formats for.

use chrono::{DateTime, Duration, TimeZone, Timelike};
use chrono_tz::America::Sao_Paulo;
use chrono_tz::Tz;

use crate::models::Order;
use crate::status::{is_terminal, STATUS_OUT_FOR_DELIVERY, STATUS_POSTED};

/// Default check-count cap; `AppConfig` can raise or lower it via
/// `MAX_CHECKS_PER_ORDER`. Beyond the cap an order throttles to one poll
/// per day.
pub const MAX_CHECKS: i32 = 100;

/// Daily re-check windows (hour, minute) for statuses without a dedicated
/// cadence. An order is due at most once per window.
pub const CHECK_WINDOWS: [(u32, u32); 2] = [(10, 30), (14, 30)];

/// Width of each check window.
const WINDOW_TOLERANCE_MINUTES: i64 = 5;

/// Converts a UTC instant to local Sao Paulo time.
pub fn to_local(instant: DateTime<chrono::Utc>) -> DateTime<Tz> {
    instant.with_timezone(&Sao_Paulo)
}

/// Polls are suppressed entirely between 22:00 and 06:00 local time.
pub fn within_active_hours(now: DateTime<Tz>) -> bool {
    let hour = now.hour();
    !(hour >= 22 || hour < 6)
}

/// Whether `order` is due for a tracking re-check at local time `now`.
/// `max_checks` is the configured check-count cap.
pub fn is_due(order: &Order, now: DateTime<Tz>, max_checks: i32) -> bool {
    let status = order
        .internal_status
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    if is_terminal(&status) {
        return false;
    }

    let last_checked = order.last_checked_at.map(to_local);

    if order.check_count >= max_checks {
        return match last_checked {
            None => true,
            Some(checked) => now - checked >= Duration::hours(24),
        };
    }

    if status == STATUS_OUT_FOR_DELIVERY {
        return match last_checked {
            None => true,
            Some(checked) => now - checked >= Duration::minutes(30),
        };
    }

    if status == STATUS_POSTED {
        let days_since_change = order
            .status_changed_at
            .map(|changed| (now - to_local(changed)).num_days())
            .unwrap_or(0);
        if days_since_change == 0 {
            return last_checked.is_none();
        }
        return match last_checked {
            None => true,
            Some(checked) => now - checked >= Duration::hours(8),
        };
    }

    for (hour, minute) in CHECK_WINDOWS {
        let Some(target) = now
            .date_naive()
            .and_hms_opt(hour, minute, 0)
            .and_then(|naive| Sao_Paulo.from_local_datetime(&naive).single())
        else {
            continue;
        };
        if now >= target && now - target < Duration::minutes(WINDOW_TOLERANCE_MINUTES) {
            let checked_since_window = last_checked.is_some_and(|checked| checked >= target);
            if !checked_since_window {
                return true;
            }
        }
    }
    false
}
