//! Time-seeded branch names that never repeat within a process.
//!
//! Names are `contrib-<unix millis>`. When two runs start inside the same
//! millisecond (or the wall clock steps backwards) the generator hands out the
//! next unused millisecond instead, so every name issued by one process is unique.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::BranchName;

/// Prefix of every generated branch name.
pub const BRANCH_PREFIX: &str = "contrib-";

/// Lock-free generator of unique, time-based branch names.
#[derive(Debug)]
pub struct BranchNameGenerator {
    last_issued: AtomicI64,
}

static PROCESS_GENERATOR: BranchNameGenerator = BranchNameGenerator::new();

impl BranchNameGenerator {
    /// Creates an independent generator.
    pub const fn new() -> Self {
        Self {
            last_issued: AtomicI64::new(0),
        }
    }

    /// The generator shared by every run in this process.
    pub fn process() -> &'static BranchNameGenerator {
        &PROCESS_GENERATOR
    }

    /// Issues the next name using the current wall clock.
    pub fn next_name(&self) -> BranchName {
        self.next_name_at(Utc::now().timestamp_millis())
    }

    /// Issues the next name for a clock reading of `now_millis`.
    fn next_name_at(&self, now_millis: i64) -> BranchName {
        let mut last = self.last_issued.load(Ordering::Relaxed);
        let issued = loop {
            let candidate = now_millis.max(last + 1);
            match self.last_issued.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(actual) => last = actual,
            }
        };
        BranchName::new(format!("{BRANCH_PREFIX}{issued}"))
            .unwrap_or_else(|| unreachable!("generated branch names are never empty"))
    }
}

impl Default for BranchNameGenerator {
    fn default() -> Self {
        Self::new()
    }
}
