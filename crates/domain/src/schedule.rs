//! Cron schedules — parsing expressions and computing the next fire time.
//!
//! Expressions use the standard 5-field form (`min hour day month weekday`),
//! a 6-field form with leading seconds, or a 7-field form with leading seconds
//! and a trailing year. Weekdays are numbered `0`-`7` with both `0` and `7`
//! meaning Sunday, or named `SUN`-`SAT`. Occurrences are evaluated in the
//! automation's IANA timezone so DST shifts are honored, and reported in UTC.

use std::str::FromStr;

use chrono_tz::Tz;
use cron::Schedule;

use crate::error::InvalidScheduleError;
use crate::time::Timestamp;

/// A parsed cron expression bound to a timezone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
}

impl CronSchedule {
    /// Parse `expression` and resolve `timezone` (UTC when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidScheduleError::Expression`] for a malformed
    /// expression and [`InvalidScheduleError::Timezone`] for an unknown zone.
    pub fn parse(expression: &str, timezone: Option<&str>) -> Result<Self, InvalidScheduleError> {
        let timezone = match timezone {
            None => Tz::UTC,
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| InvalidScheduleError::Timezone(name.to_string()))?,
        };
        let invalid = |reason: String| InvalidScheduleError::Expression {
            expression: expression.to_string(),
            reason,
        };
        let normalized = normalize_expression(expression).map_err(invalid)?;
        let schedule =
            Schedule::from_str(&normalized).map_err(|err| invalid(err.to_string()))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
            timezone,
        })
    }

    /// The first occurrence strictly after `from`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidScheduleError::Exhausted`] when the schedule has no
    /// future occurrence (e.g. a year field in the past).
    pub fn next_after(&self, from: Timestamp) -> Result<Timestamp, InvalidScheduleError> {
        let local = from.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .map(|next| next.to_utc())
            .find(|next| *next > from)
            .ok_or_else(|| InvalidScheduleError::Exhausted(self.expression.clone()))
    }
}

/// Compute the next fire time of `expression` strictly after `from`.
///
/// # Errors
///
/// See [`CronSchedule::parse`] and [`CronSchedule::next_after`].
pub fn compute_next_run(
    expression: &str,
    timezone: Option<&str>,
    from: Timestamp,
) -> Result<Timestamp, InvalidScheduleError> {
    CronSchedule::parse(expression, timezone)?.next_after(from)
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Expand an expression to the 7-field form the `cron` crate expects
/// (seconds first, year last) with weekdays spelled out by name.
fn normalize_expression(expression: &str) -> Result<String, String> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    let mut fields: Vec<String> = match parts.len() {
        5 => std::iter::once("0")
            .chain(parts)
            .chain(std::iter::once("*"))
            .map(str::to_string)
            .collect(),
        6 => parts
            .into_iter()
            .chain(std::iter::once("*"))
            .map(str::to_string)
            .collect(),
        7 => parts.into_iter().map(str::to_string).collect(),
        count => return Err(format!("expected 5, 6 or 7 fields, found {count}")),
    };
    fields[5] = translate_weekdays(&fields[5])?;
    Ok(fields.join(" "))
}

/// Rewrite a day-of-week field from standard numbering (Sunday = 0 or 7)
/// into weekday names, which the `cron` crate numbers differently.
fn translate_weekdays(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }
    let mut days = [false; 7];
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| format!("invalid weekday step in `{item}`"))?;
                (range, Some(step))
            }
            None => (item, None),
        };
        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 7),
            Some((start, end)) => (weekday(start)?, weekday(end)?),
            None => {
                let day = weekday(range)?;
                (day, if step.is_some() { 7 } else { day })
            }
        };
        if start > end {
            return Err(format!("weekday range `{range}` is reversed"));
        }
        for day in (start..=end).step_by(step.unwrap_or(1)) {
            days[day % 7] = true;
        }
    }
    if days.iter().all(|selected| *selected) {
        return Ok("*".to_string());
    }
    let names: Vec<&str> = WEEKDAYS
        .iter()
        .zip(days)
        .filter_map(|(name, selected)| selected.then_some(*name))
        .collect();
    Ok(names.join(","))
}

fn weekday(token: &str) -> Result<usize, String> {
    if let Ok(day) = token.parse::<usize>() {
        return if day <= 7 {
            Ok(day)
        } else {
            Err(format!("weekday `{token}` is out of range 0-7"))
        };
    }
    WEEKDAYS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .ok_or_else(|| format!("unknown weekday `{token}`"))
}
