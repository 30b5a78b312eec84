//! Multi-step commits without transactions
//!
//! Reservation writes an address and then an account; activation flips the
//! account status and then inserts labels. The store cannot make either pair
//! atomic, so each workflow records which steps landed and hands a
//! [`PartialCommit`] to the configured [`Reconciler`] when a later step fails.

use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    InsertAddress,
    InsertAccount,
    ActivateAccount,
    ProvisionLabels,
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SagaStep::InsertAddress => "insert-address",
            SagaStep::InsertAccount => "insert-account",
            SagaStep::ActivateAccount => "activate-account",
            SagaStep::ProvisionLabels => "provision-labels",
        };
        f.write_str(name)
    }
}

/// A saga that stopped halfway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialCommit {
    pub completed: Vec<SagaStep>,
    pub failed: SagaStep,
    pub account_id: String,
    pub address_id: Option<String>,
    pub error: String,
}

/// Receives partial commits for later repair
pub trait Reconciler: Send + Sync {
    fn partial_commit(&self, record: PartialCommit);
}

/// Logs partial commits and leaves repair to an operator
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReconciler;

impl Reconciler for LogReconciler {
    fn partial_commit(&self, record: PartialCommit) {
        let completed: Vec<String> = record.completed.iter().map(ToString::to_string).collect();
        warn!(
            account = %record.account_id,
            address = record.address_id.as_deref().unwrap_or("-"),
            completed = %completed.join(","),
            failed = %record.failed,
            error = %record.error,
            "partial commit needs reconciliation"
        );
    }
}

/// Tracks the steps of one saga run
pub(crate) struct Saga {
    account_id: String,
    address_id: Option<String>,
    completed: Vec<SagaStep>,
}

impl Saga {
    pub(crate) fn new(account_id: &str, address_id: Option<&str>) -> Self {
        Self {
            account_id: account_id.to_string(),
            address_id: address_id.map(str::to_string),
            completed: Vec::new(),
        }
    }

    pub(crate) fn done(&mut self, step: SagaStep) {
        self.completed.push(step);
    }

    /// Report `step` as failed. Nothing is reported when no earlier step
    /// landed, since there is nothing to reconcile.
    pub(crate) fn fail(&self, step: SagaStep, error: &dyn fmt::Display, reconciler: &dyn Reconciler) {
        if self.completed.is_empty() {
            return;
        }
        reconciler.partial_commit(PartialCommit {
            completed: self.completed.clone(),
            failed: step,
            account_id: self.account_id.clone(),
            address_id: self.address_id.clone(),
            error: error.to_string(),
        });
    }
}
