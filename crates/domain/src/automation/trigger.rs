//! Trigger — the condition that makes an automation eligible to fire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::payload::TriggerPayload;

/// The closed set of trigger kinds.
///
/// Inbound events carry a kind as a hint; schedule triggers are driven by the
/// planner and never arrive from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    NewLead,
    PaymentReceived,
    EmailOpened,
    CustomSchedule,
}

impl TriggerKind {
    pub const ALL: [Self; 4] = [
        Self::NewLead,
        Self::PaymentReceived,
        Self::EmailOpened,
        Self::CustomSchedule,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewLead => "new_lead",
            Self::PaymentReceived => "payment_received",
            Self::EmailOpened => "email_opened",
            Self::CustomSchedule => "custom_schedule",
        }
    }

    /// Whether the kind is fired by the schedule planner rather than by events.
    #[must_use]
    pub fn is_schedule(self) -> bool {
        matches!(self, Self::CustomSchedule)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Describes which events (or which schedule) activate an automation.
///
/// Every predicate field is optional; an unset field does not constrain the
/// match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// A new lead arrived from a lead source.
    NewLead {
        /// Only match leads coming from one of these sources.
        #[serde(default)]
        sources: Vec<String>,
        /// Only match leads whose value is at least this much.
        #[serde(default)]
        min_value: Option<f64>,
    },
    /// A payment was received.
    PaymentReceived {
        #[serde(default)]
        min_amount: Option<f64>,
        /// ISO currency code, compared case-insensitively.
        #[serde(default)]
        currency: Option<String>,
        #[serde(default)]
        product_ids: Vec<String>,
    },
    /// A campaign email was opened.
    EmailOpened {
        #[serde(default)]
        campaign_id: Option<String>,
        /// At least one keyword must appear in the subject (case-insensitive).
        #[serde(default)]
        subject_keywords: Vec<String>,
    },
    /// Fires on a cron schedule (e.g. `"*/5 * * * *"`).
    CustomSchedule {
        cron_expression: String,
        /// IANA timezone name; UTC when absent.
        #[serde(default)]
        timezone: Option<String>,
    },
}

impl Trigger {
    #[must_use]
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::NewLead { .. } => TriggerKind::NewLead,
            Self::PaymentReceived { .. } => TriggerKind::PaymentReceived,
            Self::EmailOpened { .. } => TriggerKind::EmailOpened,
            Self::CustomSchedule { .. } => TriggerKind::CustomSchedule,
        }
    }

    /// Check whether this trigger's predicate holds for a parsed payload.
    ///
    /// A payload of a different kind never matches. `CustomSchedule` never
    /// matches events; it is fired by the schedule planner.
    #[must_use]
    pub fn matches(&self, payload: &TriggerPayload) -> bool {
        match (self, payload) {
            (
                Self::NewLead {
                    sources,
                    min_value,
                },
                TriggerPayload::NewLead(lead),
            ) => {
                min_value.is_none_or(|min| lead.value >= min)
                    && (sources.is_empty()
                        || lead
                            .source
                            .as_deref()
                            .is_some_and(|source| contains_ignore_case(sources, source)))
            }
            (
                Self::PaymentReceived {
                    min_amount,
                    currency,
                    product_ids,
                },
                TriggerPayload::PaymentReceived(payment),
            ) => {
                min_amount.is_none_or(|min| payment.amount >= min)
                    && currency
                        .as_deref()
                        .is_none_or(|c| c.eq_ignore_ascii_case(&payment.currency))
                    && (product_ids.is_empty()
                        || payment
                            .product_id
                            .as_ref()
                            .is_some_and(|product| product_ids.contains(product)))
            }
            (
                Self::EmailOpened {
                    campaign_id,
                    subject_keywords,
                },
                TriggerPayload::EmailOpened(open),
            ) => {
                let subject = open.subject.to_lowercase();
                campaign_id
                    .as_ref()
                    .is_none_or(|expected| open.campaign_id.as_ref() == Some(expected))
                    && (subject_keywords.is_empty()
                        || subject_keywords
                            .iter()
                            .any(|keyword| subject.contains(&keyword.to_lowercase())))
            }
            _ => false,
        }
    }

    /// The cron expression and timezone of a schedule trigger.
    #[must_use]
    pub fn schedule(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::CustomSchedule {
                cron_expression,
                timezone,
            } => Some((cron_expression.as_str(), timezone.as_deref())),
            _ => None,
        }
    }
}

fn contains_ignore_case(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|item| item.eq_ignore_ascii_case(needle))
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomSchedule {
                cron_expression, ..
            } => write!(f, "custom_schedule({cron_expression})"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}
