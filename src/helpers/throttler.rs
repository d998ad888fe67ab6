//! Throttled logging: report the first few occurrences of a condition in
//! full, then fall back to reporting only every Nth occurrence so a hot
//! loop hitting the same error thousands of times doesn't flood the log.
//!
//! Call sites are distinguished by `(line, ptr)`, the same key the original
//! `THROTTLED_LOGE`/`THROTTLED_LOGW` macros use, so the same error at two
//! different call sites — or for two different objects at the same call
//! site — throttles independently.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Stats {
    last_reported_at: Option<Instant>,
    request_counter: i64,
    skip_since_last_report: i64,
}

/// Throttles repeated reports keyed by `(call_site_line, object_ptr)`.
pub struct Throttler {
    every_instance_limit: i64,
    max_delay: Duration,
    stats: Mutex<HashMap<(u32, usize), Stats>>,
}

impl Throttler {
    pub fn new(every_instance_limit: i64, max_delay: Duration) -> Self {
        Throttler {
            every_instance_limit,
            max_delay,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the caller should actually log this occurrence.
    /// `object_ptr` disambiguates independent instances (e.g. one throttle
    /// budget per open file); pass 0 if there's no natural instance key.
    pub fn report(&self, line: u32, object_ptr: usize) -> bool {
        let mut guard = self.stats.lock().expect("throttler mutex poisoned");
        let stats = guard.entry((line, object_ptr)).or_default();
        let now = Instant::now();
        stats.request_counter += 1;

        let recently_reported = stats
            .last_reported_at
            .map(|t| now.duration_since(t) < self.max_delay)
            .unwrap_or(false);

        let do_it = if stats.request_counter > self.every_instance_limit && recently_reported {
            (stats.skip_since_last_report + 1) % Self::report_frequency(stats.request_counter) == 0
        } else {
            true
        };

        if do_it {
            if stats.request_counter == self.every_instance_limit {
                tracing::warn!(
                    "this condition has happened {} times now, further occurrences will be throttled",
                    stats.request_counter
                );
            } else if stats.skip_since_last_report > 0 {
                tracing::warn!(
                    "this condition has happened {} times, skipped {} reports since the last one",
                    stats.request_counter,
                    stats.skip_since_last_report
                );
            }
            stats.last_reported_at = Some(now);
            stats.skip_since_last_report = 0;
        } else {
            stats.skip_since_last_report += 1;
        }
        do_it
    }

    /// 2-10 -> 1, 11-100 -> 10, 101-1000 -> 100, ...
    fn report_frequency(counter: i64) -> i64 {
        let power = ((counter - 1) as f64).log10().floor().max(0.0) as u32;
        10_i64.pow(power)
    }
}

/// Process-wide throttler shared by every `throttled_warn!`/`throttled_error!`
/// call site, mirroring the single static-local instance pattern the
/// original helper documents.
pub fn global() -> &'static Throttler {
    static THROTTLER: OnceLock<Throttler> = OnceLock::new();
    THROTTLER.get_or_init(|| Throttler::new(20, Duration::from_secs(10)))
}

/// Log a warning through the global throttler, keyed by call site.
#[macro_export]
macro_rules! throttled_warn {
    ($object_ptr:expr, $($arg:tt)*) => {
        if $crate::helpers::throttler::global().report(line!(), $object_ptr as usize) {
            tracing::warn!($($arg)*);
        }
    };
}
