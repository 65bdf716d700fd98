//! Simulated email sender — renders `{{variable}}` placeholders in the subject.

use std::future::Future;
use std::time::Duration;

use serde_json::{Map, Value, json};
use taskflow_app::ports::{ActionCapability, CapabilityReceipt, IntegrationError, OwnerContext};
use taskflow_domain::automation::{Action, TriggerPayload};

use super::{Simulation, reference};

pub struct SimulatedEmail {
    simulation: Simulation,
}

impl SimulatedEmail {
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self {
            simulation: Simulation::new(latency),
        }
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: IntegrationError) {
        self.simulation.fail_next(error);
    }

    /// Outputs of every email sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Value> {
        self.simulation.journal()
    }
}

/// Replace `{{key}}` with the matching variable, or with the trigger payload
/// field of that name.
fn render(template: &str, variables: &Map<String, Value>, payload: &Value) -> String {
    let mut rendered = template.to_string();
    let fields = payload.as_object().into_iter().flatten();
    for (key, value) in fields.chain(variables) {
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), &text);
    }
    rendered
}

impl ActionCapability for SimulatedEmail {
    fn invoke(
        &self,
        action: &Action,
        payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = Result<CapabilityReceipt, IntegrationError>> + Send {
        let receipt = match action {
            Action::SendEmail {
                template_id,
                recipients,
                subject,
                variables,
            } => {
                let subject = render(subject, variables, &payload.to_value());
                tracing::info!(
                    owner_id = %context.owner_id,
                    template_id = template_id.as_str(),
                    recipients = recipients.len(),
                    "simulated email sent"
                );
                Ok(CapabilityReceipt::new(reference("msg")).with_output(json!({
                    "template_id": template_id,
                    "recipients": recipients,
                    "subject": subject,
                })))
            }
            other => Err(IntegrationError::Permanent(format!(
                "email capability cannot run `{}`",
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
