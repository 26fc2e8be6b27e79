use std::fmt::Display;

use tracing::warn;

use crate::error::{AccountError, AccountResult};

/// Outcome of one item in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome<T> {
    /// The item as the caller supplied it.
    pub input: String,
    pub result: AccountResult<T>,
}

/// Per-item results of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<T> {
    pub outcomes: Vec<ItemOutcome<T>>,
    /// The fatal error that stopped the batch, if any. Items after it were
    /// not processed.
    pub aborted_by: Option<AccountError>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
            aborted_by: None,
        }
    }
}

impl<T> BatchReport<T> {
    pub fn is_aborted(&self) -> bool {
        self.aborted_by.is_some()
    }

    /// True when the batch ran to the end and every item succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.is_aborted() && self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &AccountError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.input.as_str(), e)))
    }
}

/// Run `op` over `items` in order.
///
/// Non-fatal errors are recorded against their item and processing
/// continues. A fatal error is recorded, stops the batch and is kept in
/// [`BatchReport::aborted_by`].
pub fn run_batch<I, T, F>(items: I, mut op: F) -> BatchReport<T>
where
    I: IntoIterator,
    I::Item: Display,
    F: FnMut(&I::Item) -> AccountResult<T>,
{
    let mut report = BatchReport::default();
    for item in items {
        let input = item.to_string();
        let result = op(&item);
        let fatal = match &result {
            Err(e) if e.is_fatal() => Some(e.clone()),
            _ => None,
        };
        report.outcomes.push(ItemOutcome { input, result });

        if let Some(err) = fatal {
            warn!(item = %item, error = %err, "Batch aborted");
            report.aborted_by = Some(err);
            break;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_errors_continue() {
        let report = run_batch(["a", "missing", "c"], |item| {
            if *item == "missing" {
                Err(AccountError::not_found(*item))
            } else {
                Ok(item.to_uppercase())
            }
        });

        assert!(!report.is_aborted());
        assert!(!report.all_succeeded());
        assert_eq!(report.succeeded().cloned().collect::<Vec<_>>(), vec!["A", "C"]);
        let failed: Vec<_> = report.failed().map(|(input, _)| input).collect();
        assert_eq!(failed, vec!["missing"]);
    }

    #[test]
    fn test_fatal_error_stops_batch() {
        let mut seen = Vec::new();
        let report = run_batch(["a", "b", "c"], |item| {
            seen.push(item.to_string());
            if *item == "b" {
                Err(AccountError::AccessDenied {
                    detail: "save".into(),
                })
            } else {
                Ok(())
            }
        });

        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.is_aborted());
        assert!(matches!(
            report.aborted_by,
            Some(AccountError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_empty_batch() {
        let report = run_batch(Vec::<String>::new(), |_| Ok(()));
        assert!(report.all_succeeded());
        assert!(report.outcomes.is_empty());
    }
}
