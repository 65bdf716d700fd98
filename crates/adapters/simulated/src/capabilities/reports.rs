//! Simulated report generator.
//!
//! Report generation cannot be interrupted once started: a timed-out call
//! keeps running in the background.

use std::future::Future;
use std::time::Duration;

use serde_json::{Value, json};
use taskflow_app::ports::{ActionCapability, CapabilityReceipt, IntegrationError, OwnerContext};
use taskflow_domain::automation::{Action, TriggerPayload};

use super::{Simulation, reference};

const REPORT_BASE_URL: &str = "https://reports.taskflow.local";

pub struct SimulatedReports {
    simulation: Simulation,
}

impl SimulatedReports {
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
    pub fn generated(&self) -> Vec<Value> {
        self.simulation.journal()
    }
}

impl ActionCapability for SimulatedReports {
    fn supports_cancellation(&self) -> bool {
        false
    }

    fn invoke(
        &self,
        action: &Action,
        _payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = Result<CapabilityReceipt, IntegrationError>> + Send {
        let receipt = match action {
            Action::GenerateReport {
                report_type,
                parameters,
                recipients,
            } => {
                let report_id = reference("report");
                tracing::info!(
                    owner_id = %context.owner_id,
                    report_type = report_type.as_str(),
                    "simulated report generated"
                );
                Ok(CapabilityReceipt::new(report_id.clone()).with_output(json!({
                    "report_type": report_type,
                    "parameters": parameters,
                    "recipients": recipients,
                    "url": format!("{REPORT_BASE_URL}/{}/{report_id}.pdf", context.owner_id),
                })))
            }
            other => Err(IntegrationError::Permanent(format!(
                "report capability cannot run `{}`",
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
