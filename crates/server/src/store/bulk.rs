// Per-item bookkeeping for multi-item operations (multi-upload, clear, move).
//
// One failing item never aborts the rest of the batch.

use std::fmt::Display;

use notypdf_common::types::BulkSummary;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem<T> {
    /// Identifier the caller used for the item (usually a filename).
    pub id: String,
    pub outcome: Result<T, String>,
}

/// Classification of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    Empty,
    AllSucceeded,
    Partial,
    AllFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkReport<T> {
    items: Vec<BulkItem<T>>,
}

impl<T> Default for BulkReport<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> BulkReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` for every id in order, recording each result.
    pub fn run<I, S, E, F>(ids: I, mut op: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        E: Display,
        F: FnMut(&str) -> Result<T, E>,
    {
        let mut report = Self::new();
        for id in ids {
            let id = id.into();
            let outcome = op(&id);
            report.record(id, outcome);
        }
        report
    }

    pub fn record<E: Display>(&mut self, id: impl Into<String>, outcome: Result<T, E>) {
        let id = id.into();
        let outcome = outcome.map_err(|error| {
            let message = error.to_string();
            warn!(item = %id, error = %message, "bulk item failed");
            message
        });
        self.items.push(BulkItem { id, outcome });
    }

    pub fn items(&self) -> &[BulkItem<T>] {
        &self.items
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.as_ref().ok().map(|value| (item.id.as_str(), value)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().filter_map(|item| {
            item.outcome.as_ref().err().map(|error| (item.id.as_str(), error.as_str()))
        })
    }

    pub fn summary(&self) -> BulkSummary {
        let successful = self.items.iter().filter(|item| item.outcome.is_ok()).count();
        BulkSummary { total: self.items.len(), successful, failed: self.items.len() - successful }
    }

    pub fn outcome(&self) -> BulkOutcome {
        let summary = self.summary();
        match (summary.successful, summary.failed) {
            (0, 0) => BulkOutcome::Empty,
            (_, 0) => BulkOutcome::AllSucceeded,
            (0, _) => BulkOutcome::AllFailed,
            _ => BulkOutcome::Partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let mut calls = Vec::new();
        let report = BulkReport::run(["a.pdf", "bad.exe", "c.txt"], |id| {
            calls.push(id.to_owned());
            if id.ends_with(".exe") {
                Err(format!("File type not allowed: {id}"))
            } else {
                Ok(id.len())
            }
        });

        assert_eq!(calls, vec!["a.pdf", "bad.exe", "c.txt"]);
        assert_eq!(report.summary(), BulkSummary { total: 3, successful: 2, failed: 1 });
        assert_eq!(report.outcome(), BulkOutcome::Partial);
        assert_eq!(report.failures().collect::<Vec<_>>(), vec![("bad.exe", "File type not allowed: bad.exe")]);
        assert_eq!(report.successes().map(|(id, _)| id).collect::<Vec<_>>(), vec!["a.pdf", "c.txt"]);
    }

    #[test]
    fn outcome_classification() {
        let empty: BulkReport<()> = BulkReport::new();
        assert_eq!(empty.outcome(), BulkOutcome::Empty);

        let ok = BulkReport::run(["x"], |_| Ok::<_, String>(()));
        assert_eq!(ok.outcome(), BulkOutcome::AllSucceeded);

        let failed = BulkReport::<()>::run(["x", "y"], |_| Err("nope"));
        assert_eq!(failed.outcome(), BulkOutcome::AllFailed);
        assert_eq!(failed.summary().failed, 2);
    }

    #[test]
    fn items_keep_submission_order() {
        let mut report = BulkReport::new();
        report.record("second", Ok::<_, String>(2));
        report.record("first", Err::<i32, _>("boom"));
        let ids: Vec<_> = report.items().iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }
}
