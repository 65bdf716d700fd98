//! Simulated task tracker.

use std::future::Future;
use std::time::Duration;

use serde_json::{Value, json};
use taskflow_app::ports::{ActionCapability, CapabilityReceipt, IntegrationError, OwnerContext};
use taskflow_domain::automation::{Action, TriggerPayload};

use super::{Simulation, reference};

pub struct SimulatedTasks {
    simulation: Simulation,
}

impl SimulatedTasks {
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self {
            simulation: Simulation::new(latency),
        }
    }

    pub fn fail_next(&self, error: IntegrationError) {
        self.simulation.fail_next(error);
    }

    #[must_use]
    pub fn created(&self) -> Vec<Value> {
        self.simulation.journal()
    }
}

impl ActionCapability for SimulatedTasks {
    fn invoke(
        &self,
        action: &Action,
        _payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = Result<CapabilityReceipt, IntegrationError>> + Send {
        let receipt = match action {
            Action::CreateTask {
                title,
                description,
                assignee_id,
                priority,
                due_date,
            } => {
                tracing::info!(
                    owner_id = %context.owner_id,
                    title = title.as_str(),
                    "simulated task created"
                );
                Ok(CapabilityReceipt::new(reference("task")).with_output(json!({
                    "title": title,
                    "description": description,
                    "assignee_id": assignee_id,
                    "priority": priority,
                    "due_date": due_date,
                    "status": "open",
                })))
            }
            other => Err(IntegrationError::Permanent(format!(
                "task capability cannot run `{}`",
                other.kind()
            ))),
        };
        async move {
            match receipt {
                Ok(receipt) => self.simulation.settle(receipt).await,
                Err(error) => Err(error),
            }
        }
    }
}
