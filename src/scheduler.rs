//! Scheduled rate changes
//!
//! Once a day (and once whenever an entry is set up) the pending "future"
//! rates and schedule of an entry are promoted into the current slots if the
//! scheduled effective date has been reached.

use crate::error::Result;
use crate::host::{Host, ListenerHandle};
use crate::keys;
use crate::logging::{LogContext, get_logger, get_logger_with_context};
use crate::store::{OptionsMap, RateStore, parse_scheduled_date};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Result of evaluating the pending changes of an entry
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionOutcome {
    /// No effective date is stored
    NotScheduled,
    /// The effective date is still ahead
    NotDue { scheduled: NaiveDate },
    /// The date is due but every future field holds its sentinel; the date is kept
    NothingPending { scheduled: NaiveDate },
    /// Pending values were promoted; `options` is the complete new mapping
    Promoted {
        options: OptionsMap,
        promoted: Vec<&'static str>,
    },
}

/// Decide what promotion, if any, applies to `options` on `today`
pub fn evaluate_promotion(options: &OptionsMap, today: NaiveDate) -> PromotionOutcome {
    let scheduled = match parse_scheduled_date(options) {
        Ok(Some(date)) => date,
        Ok(None) => return PromotionOutcome::NotScheduled,
        Err(raw) => {
            get_logger("scheduler").warn(&format!("Ignoring malformed scheduled_date '{raw}'"));
            return PromotionOutcome::NotScheduled;
        }
    };

    if today < scheduled {
        return PromotionOutcome::NotDue { scheduled };
    }

    let mut new_options = options.clone();
    let mut promoted = Vec::new();

    for (future_key, current_key) in keys::RATE_PROMOTIONS {
        if let Some(value) = options.get(future_key).and_then(Value::as_f64)
            && value > 0.0
        {
            new_options.insert(current_key.to_string(), Value::from(value));
            new_options.insert(future_key.to_string(), Value::from(0.0));
            promoted.push(current_key);
        }
    }

    if let Some(schedule) = options
        .get(keys::FUTURE_PEAK_SCHEDULE)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        new_options.insert(keys::PEAK_SCHEDULE.to_string(), Value::from(schedule));
        new_options.insert(keys::FUTURE_PEAK_SCHEDULE.to_string(), Value::Null);
        promoted.push(keys::PEAK_SCHEDULE);
    }

    if promoted.is_empty() {
        return PromotionOutcome::NothingPending { scheduled };
    }

    new_options.insert(keys::SCHEDULED_DATE.to_string(), Value::Null);
    PromotionOutcome::Promoted {
        options: new_options,
        promoted,
    }
}

/// Promote pending rates of the entry behind `store` if they are due.
///
/// Returns whether a promotion was written.
pub async fn apply_scheduled_rates(store: &RateStore) -> Result<bool> {
    let logger = get_logger_with_context(LogContext::new("scheduler").with_entry_id(&store.entry_id()));
    let today = store.host().today();

    match evaluate_promotion(&store.options(), today) {
        PromotionOutcome::NotScheduled => Ok(false),
        PromotionOutcome::NotDue { scheduled } => {
            logger.debug(&format!("Rate change scheduled for {scheduled}, today is {today}"));
            Ok(false)
        }
        PromotionOutcome::NothingPending { scheduled } => {
            logger.debug(&format!(
                "Rate change date {scheduled} reached but no future values are set"
            ));
            Ok(false)
        }
        PromotionOutcome::Promoted { options, promoted } => {
            logger.info(&format!(
                "Applying scheduled changes: {}",
                promoted.join(", ")
            ));
            store.replace_options(options).await?;
            Ok(true)
        }
    }
}

/// First instant strictly after `now` whose local wall-clock time is `at`.
///
/// A wall-clock time skipped by a DST jump fires at the first valid instant
/// after the gap.
pub fn next_fire(now: DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        let local = day.and_time(at);
        let candidate = tz.from_local_datetime(&local).earliest().or_else(|| {
            // Walk forward out of a DST gap
            (1..=180).find_map(|m| {
                tz.from_local_datetime(&(local + Duration::minutes(m)))
                    .earliest()
            })
        });
        if let Some(candidate) = candidate
            && candidate > now
        {
            return candidate;
        }
        day = day.succ_opt().unwrap_or(day);
    }
}

/// Run `action` every day at local time `at` until the handle is dropped
pub fn track_time_change<F, Fut>(host: Arc<dyn Host>, at: NaiveTime, action: F) -> ListenerHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    ListenerHandle::spawn(format!("daily@{at}"), async move {
        loop {
            let now = host.now();
            let fire_at = next_fire(now, at);
            let wait = (fire_at - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            action().await;
        }
    })
}
