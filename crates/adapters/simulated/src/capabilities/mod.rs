//! Simulated capabilities and the latency/failure behaviour they share.

mod crm;
mod email;
mod reports;
mod tasks;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use taskflow_app::ports::{CapabilityReceipt, IntegrationError};

pub use crm::SimulatedCrm;
pub use email::SimulatedEmail;
pub use reports::SimulatedReports;
pub use tasks::SimulatedTasks;

/// Number of successful calls each capability remembers.
const JOURNAL_CAPACITY: usize = 128;

/// Latency, scripted failures and a bounded journal of successful calls.
#[derive(Default)]
struct Simulation {
    latency: Duration,
    failures: Mutex<VecDeque<IntegrationError>>,
    journal: Mutex<VecDeque<serde_json::Value>>,
}

impl Simulation {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn fail_next(&self, error: IntegrationError) {
        lock(&self.failures).push_back(error);
    }

    /// Outputs of the most recent successful calls, oldest first.
    fn journal(&self) -> Vec<serde_json::Value> {
        lock(&self.journal).iter().cloned().collect()
    }

    fn remember(&self, output: serde_json::Value) {
        let mut journal = lock(&self.journal);
        if journal.len() == JOURNAL_CAPACITY {
            journal.pop_front();
        }
        journal.push_back(output);
    }

    /// Wait out the latency, then fail with the next scripted error or
    /// record `receipt`.
    async fn settle(
        &self,
        receipt: CapabilityReceipt,
    ) -> Result<CapabilityReceipt, IntegrationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        self.remember(receipt.output.clone());
        Ok(receipt)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn reference(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}
