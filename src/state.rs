use crate::executor::ItemOutcome;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which bulk run a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Import,
    UrlImport,
    Hide,
    #[default]
    Unhide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Complete,
}

/// Live status of a bulk run. Every broadcast carries a full copy of it.
///
/// `errors` holds the most recent failure lines (all of them unless a
/// retention bound is set); `error_count` always counts every failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    pub is_processing: bool,
    pub processed_count: usize,
    pub total_count: usize,
    pub errors: VecDeque<String>,
    pub error_count: usize,
    pub operation: Operation,
    pub phase: Phase,
    #[serde(skip)]
    retain_errors: Option<usize>,
}

impl OperationState {
    pub fn idle(operation: Operation, retain_errors: Option<usize>) -> Self {
        OperationState { operation, retain_errors, ..Default::default() }
    }

    /// Fresh running state for a task list of `total` items.
    pub fn begin(&mut self, operation: Operation, total: usize) {
        *self = OperationState {
            is_processing: true,
            total_count: total,
            operation,
            phase: Phase::Running,
            retain_errors: self.retain_errors,
            ..Default::default()
        };
    }

    /// Account for one finished task, failed or not.
    pub fn record(&mut self, outcome: ItemOutcome) {
        if self.processed_count < self.total_count {
            self.processed_count += 1;
        }
        if let Err(line) = outcome {
            self.error_count += 1;
            // A cap of zero keeps the count only.
            let cap = self.retain_errors.unwrap_or(usize::MAX);
            if cap == 0 {
                return;
            }
            while self.errors.len() >= cap {
                self.errors.pop_front();
            }
            self.errors.push_back(line);
        }
    }

    pub fn finish(&mut self) {
        self.is_processing = false;
        self.processed_count = self.total_count;
        self.phase = Phase::Complete;
    }

    pub fn succeeded(&self) -> usize {
        self.total_count.saturating_sub(self.error_count)
    }

    pub fn completion_message(&self) -> String {
        let ok = self.succeeded();
        let failed = self.error_count;
        let total = self.total_count;
        match self.operation {
            Operation::Hide | Operation::Unhide => {
                let (verb, past) = if self.operation == Operation::Hide {
                    ("hide", "hidden")
                } else {
                    ("unhide", "unhidden")
                };
                if failed == 0 {
                    format!("Successfully {} {} items", past, total)
                } else if ok == 0 {
                    format!("Failed to {} all {} items", verb, total)
                } else {
                    format!("{} items {} with {} errors", ok, past, failed)
                }
            }
            Operation::Import | Operation::UrlImport => {
                if failed == 0 {
                    format!("Successfully added {} items to cart", total)
                } else if ok == 0 {
                    format!("Failed to add all {} items to cart", total)
                } else {
                    format!(
                        "Successfully added {} items to cart. {} items could not be added",
                        ok, failed
                    )
                }
            }
        }
    }

    /// Completion text for a run whose task list came out empty.
    pub fn empty_message(operation: Operation) -> &'static str {
        match operation {
            Operation::Hide => "No visible items found",
            Operation::Unhide => "No hidden items found",
            Operation::Import | Operation::UrlImport => "No items found to import",
        }
    }
}
