//! Per-owner dashboard metrics derived from automations and execution records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::automation::{Automation, Category};
use crate::execution::{ExecutionRecord, ExecutionStatus};
use crate::time::Timestamp;

/// Half-open `[start, end)` bounds of the UTC calendar day containing `as_of`.
#[must_use]
pub fn utc_day(as_of: Timestamp) -> (Timestamp, Timestamp) {
    let start = as_of.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

/// Tunables for [`Metrics::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsOptions {
    /// How many recent executions to include.
    pub recent_limit: usize,
    /// Minutes of manual work each successful execution is assumed to save.
    pub minutes_saved_per_success: u32,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            recent_limit: 10,
            minutes_saved_per_success: 5,
        }
    }
}

/// Outcome counters over an owner's whole execution history.
///
/// Storage adapters compute it with aggregate queries; [`Self::tally`] is the
/// in-memory equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub successes: u64,
    pub failures: u64,
    /// Successes started on the UTC day of `as_of`.
    pub successes_today: u64,
    /// Sum of `duration_ms` over successes that recorded one.
    pub success_duration_ms: u64,
    /// Number of successes that recorded a duration.
    pub timed_successes: u64,
}

impl ExecutionSummary {
    #[must_use]
    pub fn tally(records: &[ExecutionRecord], as_of: Timestamp) -> Self {
        let (day_start, day_end) = utc_day(as_of);
        records
            .iter()
            .fold(Self::default(), |mut summary, record| {
                match record.status {
                    ExecutionStatus::Success => {
                        summary.successes += 1;
                        if record.started_at >= day_start && record.started_at < day_end {
                            summary.successes_today += 1;
                        }
                        if let Some(duration) = record.duration_ms {
                            summary.success_duration_ms += duration;
                            summary.timed_successes += 1;
                        }
                    }
                    ExecutionStatus::Failure => summary.failures += 1,
                    ExecutionStatus::Pending | ExecutionStatus::Cancelled => {}
                }
                summary
            })
    }
}

/// Summary of one owner's automation activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_automations: u64,
    pub active_automations: u64,
    /// Successful executions started on the current UTC day.
    pub tasks_completed_today: u64,
    /// Successes over successes plus failures, as a percentage rounded to 2
    /// decimals. Pending and cancelled executions are not counted.
    pub success_rate: f64,
    /// Mean duration of successful executions.
    pub average_execution_time_ms: f64,
    pub estimated_time_saved_minutes: u64,
    /// Number of automations per category; every category is present.
    pub category_breakdown: BTreeMap<Category, u64>,
    /// Most recent executions first.
    pub recent_executions: Vec<ExecutionRecord>,
}

impl Metrics {
    /// Aggregate `automations` and `records`, all belonging to one owner.
    ///
    /// Pending records are excluded from rates and averages. With no
    /// successes or failures the rate and average are zero.
    #[must_use]
    pub fn compute(
        automations: &[Automation],
        records: &[ExecutionRecord],
        as_of: Timestamp,
        options: &MetricsOptions,
    ) -> Self {
        let mut recent_executions = records.to_vec();
        recent_executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        recent_executions.truncate(options.recent_limit);
        Self::from_summary(
            automations,
            ExecutionSummary::tally(records, as_of),
            recent_executions,
            options,
        )
    }

    /// Build the metrics from precomputed counters and the newest records.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_summary(
        automations: &[Automation],
        summary: ExecutionSummary,
        recent_executions: Vec<ExecutionRecord>,
        options: &MetricsOptions,
    ) -> Self {
        let mut category_breakdown: BTreeMap<Category, u64> =
            Category::ALL.into_iter().map(|c| (c, 0)).collect();
        for automation in automations {
            *category_breakdown.entry(automation.category).or_default() += 1;
        }

        let decided = summary.successes + summary.failures;
        let success_rate = if decided == 0 {
            0.0
        } else {
            round2(summary.successes as f64 / decided as f64 * 100.0)
        };
        let average_execution_time_ms = if summary.timed_successes == 0 {
            0.0
        } else {
            round2(summary.success_duration_ms as f64 / summary.timed_successes as f64)
        };

        Self {
            total_automations: automations.len() as u64,
            active_automations: automations.iter().filter(|a| a.is_active).count() as u64,
            tasks_completed_today: summary.successes_today,
            success_rate,
            average_execution_time_ms,
            estimated_time_saved_minutes: summary.successes
                * u64::from(options.minutes_saved_per_success),
            category_breakdown,
            recent_executions,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
