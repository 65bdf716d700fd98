//! Typed trigger payloads parsed from inbound event bodies.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::trigger::TriggerKind;
use crate::error::ValidationError;
use crate::time::Timestamp;

/// Lead captured by a lead source (form, CRM import, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadPayload {
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub value: f64,
    #[serde(default)]
    pub email: Option<String>,
}

/// Payment notification from a payment provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    #[serde(default)]
    pub payment_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

/// Email engagement notification from a mailing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailOpenPayload {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub subject: String,
}

/// Synthetic payload produced by the schedule planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePayload {
    /// The `next_run` value that became due.
    pub scheduled_for: Timestamp,
    /// When the planner actually fired.
    pub fired_at: Timestamp,
}

/// A payload that was parsed against the shape of one trigger kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerPayload {
    NewLead(LeadPayload),
    PaymentReceived(PaymentPayload),
    EmailOpened(EmailOpenPayload),
    CustomSchedule(SchedulePayload),
}

impl TriggerPayload {
    /// Parse a raw JSON body against the shape expected for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedPayload`] when the body does not
    /// fit the shape, and [`ValidationError::NotAnEventTrigger`] when `kind`
    /// is a schedule kind (those never arrive as external events).
    pub fn parse(kind: TriggerKind, raw: &serde_json::Value) -> Result<Self, ValidationError> {
        match kind {
            TriggerKind::NewLead => {
                let lead: LeadPayload = decode(kind, raw)?;
                ensure_finite(kind, "value", lead.value)?;
                Ok(Self::NewLead(lead))
            }
            TriggerKind::PaymentReceived => {
                let payment: PaymentPayload = decode(kind, raw)?;
                ensure_finite(kind, "amount", payment.amount)?;
                Ok(Self::PaymentReceived(payment))
            }
            TriggerKind::EmailOpened => decode(kind, raw).map(Self::EmailOpened),
            TriggerKind::CustomSchedule => Err(ValidationError::NotAnEventTrigger { trigger: kind }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::NewLead(_) => TriggerKind::NewLead,
            Self::PaymentReceived(_) => TriggerKind::PaymentReceived,
            Self::EmailOpened(_) => TriggerKind::EmailOpened,
            Self::CustomSchedule(_) => TriggerKind::CustomSchedule,
        }
    }

    /// JSON form stored on execution records.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn decode<T: DeserializeOwned>(
    kind: TriggerKind,
    raw: &serde_json::Value,
) -> Result<T, ValidationError> {
    T::deserialize(raw).map_err(|err| ValidationError::MalformedPayload {
        trigger: kind,
        reason: err.to_string(),
    })
}

fn ensure_finite(kind: TriggerKind, field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::MalformedPayload {
            trigger: kind,
            reason: format!("`{field}` must be a finite number"),
        })
    }
}
