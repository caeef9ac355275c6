//! Next-run computation for recurring schedules.
//!
//! All functions are pure and take the evaluation instant explicitly, so
//! they work in any time zone. Wall-clock targets that fall into a DST gap
//! move forward by one hour; ambiguous ones resolve to the earlier instant.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};

use filequeue_core::error::AppError;
use filequeue_core::result::AppResult;
use filequeue_entity::schedule::Recurrence;

/// Parse an `HH:MM` time of day.
pub fn parse_time(value: &str) -> AppResult<NaiveTime> {
    let invalid = || AppError::validation(format!("Invalid time '{value}', expected HH:MM"));

    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Map a day number with `0 = Sunday` to a weekday.
pub fn weekday_from_sunday(day: u8) -> AppResult<Weekday> {
    match day {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(AppError::validation(format!(
            "Invalid day of week {other}, expected 0 (Sunday) to 6 (Saturday)"
        ))),
    }
}

/// Reject rules that can never produce a sensible next run.
pub fn validate(rule: &Recurrence) -> AppResult<()> {
    match rule {
        Recurrence::Minutes { interval: 0 } => {
            Err(AppError::validation("Schedule interval must be at least one minute"))
        }
        Recurrence::Monthly { day, .. } if !(1..=31).contains(day) => Err(AppError::validation(
            format!("Invalid day of month {day}, expected 1 to 31"),
        )),
        _ => Ok(()),
    }
}

/// The first run of `rule` at or after `now`.
///
/// Interval rules count from `now`. Daily and monthly rules pick the next
/// occurrence that is not in the past. Weekly rules pick today only when
/// the time of day has not passed yet.
///
/// A daily or monthly target equal to `now` is returned as is; callers that
/// just fired the rule need a time strictly after `now`.
pub fn next_run<Tz: TimeZone>(rule: &Recurrence, now: &DateTime<Tz>) -> AppResult<DateTime<Tz>> {
    validate(rule)?;
    let tz = now.timezone();
    let today = now.date_naive();

    match *rule {
        Recurrence::Minutes { interval } => {
            Ok(now.clone() + Duration::minutes(i64::from(interval)))
        }
        Recurrence::Daily { time } => {
            let candidate = resolve(&tz, today.and_time(time))?;
            if candidate < *now {
                resolve(&tz, add_days(today, 1)?.and_time(time))
            } else {
                Ok(candidate)
            }
        }
        Recurrence::Weekly { day, time } => {
            let current = i64::from(now.weekday().num_days_from_sunday());
            let target = i64::from(day.num_days_from_sunday());
            let mut days = target - current;
            if days < 0 || (days == 0 && *now > resolve(&tz, today.and_time(time))?) {
                days += 7;
            }
            resolve(&tz, add_days(today, days)?.and_time(time))
        }
        Recurrence::Monthly { day, time } => {
            let candidate = resolve(&tz, month_day(today.year(), today.month(), day)?.and_time(time))?;
            if candidate >= *now {
                return Ok(candidate);
            }
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            resolve(&tz, month_day(year, month, day)?.and_time(time))
        }
    }
}

/// Number of days in a month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

/// The requested day of month, clamped to the month's length.
fn month_day(year: i32, month: u32, day: u32) -> AppResult<NaiveDate> {
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::internal(format!("Invalid date {year}-{month}-{day}")))
}

fn add_days(date: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| AppError::internal(format!("Date out of range: {date} + {days} days")))
}

/// Map a wall-clock time onto the zone.
fn resolve<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> AppResult<DateTime<Tz>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .ok_or_else(|| AppError::internal(format!("Local time {local} does not exist")))
}
