//! Simulated CRM — merges updated fields into an in-memory record store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value, json};
use taskflow_app::ports::{ActionCapability, CapabilityReceipt, IntegrationError, OwnerContext};
use taskflow_domain::automation::{Action, TriggerPayload};

use super::{Simulation, lock};

pub struct SimulatedCrm {
    simulation: Simulation,
    records: Mutex<HashMap<String, Map<String, Value>>>,
}

impl SimulatedCrm {
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self {
            simulation: Simulation::new(latency),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_next(&self, error: IntegrationError) {
        self.simulation.fail_next(error);
    }

    /// Current fields of a record, keyed as `<record_type>:<record_id>`.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<Map<String, Value>> {
        lock(&self.records).get(key).cloned()
    }
}

impl ActionCapability for SimulatedCrm {
    fn invoke(
        &self,
        action: &Action,
        _payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = Result<CapabilityReceipt, IntegrationError>> + Send {
        let receipt = match action {
            Action::UpdateCrm {
                record_type,
                record_id,
                fields,
            } => {
                let key = format!("{}:{record_id}", record_type.as_str());
                tracing::info!(owner_id = %context.owner_id, record = %key, "simulated CRM update");
                Ok((
                    key.clone(),
                    fields.clone(),
                    CapabilityReceipt::new(key).with_output(json!({
                        "record_type": record_type,
                        "record_id": record_id,
                        "updated_fields": fields.keys().collect::<Vec<_>>(),
                    })),
                ))
            }
            other => Err(IntegrationError::Permanent(format!(
                "CRM capability cannot run `{}`",
                other.kind()
            ))),
        };
        async move {
            let (key, fields, receipt) = match receipt {
                Ok(update) => update,
                Err(error) => return Err(error),
            };
            let receipt = self.simulation.settle(receipt).await;
            if receipt.is_ok() {
                lock(&self.records).entry(key).or_default().extend(fields);
            }
            receipt
        }
    }
}
