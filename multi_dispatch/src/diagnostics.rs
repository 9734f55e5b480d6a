//! Ambiguity diagnostics.
//!
//! An ambiguous dispatch still resolves, so it must be made visible some
//! other way: every fresh ambiguous resolution is logged through `tracing`,
//! counted, kept in a bounded in-memory log and passed to an optional hook.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::types::{render_tuple, SigType};

/// One ambiguous resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguityReport {
    pub generic: String,
    /// Observed type names; absent arguments render as `MISSING`.
    pub observed: Vec<String>,
    /// Every signature sharing the lowest score, in tie-break order.
    pub candidates: Vec<Vec<SigType>>,
    /// The signature the tie-break picked.
    pub chosen: Vec<SigType>,
    pub score: u64,
}

impl std::fmt::Display for AmbiguityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let candidates: Vec<String> = self
            .candidates
            .iter()
            .map(|c| render_tuple(c.as_slice()))
            .collect();
        write!(
            f,
            "ambiguous dispatch of {}{}: candidates {} tie at score {}, chose {}",
            self.generic,
            render_tuple(&self.observed),
            candidates.join(" "),
            self.score,
            render_tuple(&self.chosen)
        )
    }
}

/// Callback invoked for every ambiguity report.
pub type AmbiguityHook = Arc<dyn Fn(&AmbiguityReport) + Send + Sync>;

pub(crate) struct DiagnosticsLog {
    reports: Mutex<VecDeque<AmbiguityReport>>,
    total: AtomicU64,
    limit: usize,
    hook: RwLock<Option<AmbiguityHook>>,
}

impl std::fmt::Debug for DiagnosticsLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsLog")
            .field("total", &self.total.load(Ordering::Relaxed))
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl DiagnosticsLog {
    pub fn new(limit: usize) -> Self {
        Self {
            reports: Mutex::new(VecDeque::new()),
            total: AtomicU64::new(0),
            limit,
            hook: RwLock::new(None),
        }
    }

    fn reports(&self) -> std::sync::MutexGuard<'_, VecDeque<AmbiguityReport>> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log, count, store and forward one report.
    ///
    /// Must be called without holding the registry lock: the hook is user
    /// code.
    pub fn record(&self, report: AmbiguityReport) {
        tracing::warn!(
            generic = %report.generic,
            observed = %render_tuple(&report.observed),
            candidates = report.candidates.len(),
            chosen = %render_tuple(&report.chosen),
            "ambiguous dispatch resolved by tie-break"
        );
        self.total.fetch_add(1, Ordering::Relaxed);

        let hook = self
            .hook
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(hook) = hook {
            hook(&report);
        }

        if self.limit == 0 {
            return;
        }
        let mut reports = self.reports();
        while reports.len() >= self.limit {
            reports.pop_front();
        }
        reports.push_back(report);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Drain the stored reports, oldest first.
    pub fn take(&self) -> Vec<AmbiguityReport> {
        self.reports().drain(..).collect()
    }

    pub fn set_hook(&self, hook: Option<AmbiguityHook>) {
        *self
            .hook
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = hook;
    }

    /// Clear stored reports and the counter. The hook stays installed.
    pub fn reset(&self) {
        self.reports().clear();
        self.total.store(0, Ordering::Relaxed);
    }
}
