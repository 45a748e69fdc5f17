//! Short-notice cancellation allowance.
//!
//! Decides whether a student's next short-notice cancellation is free or
//! charged, from their tier and prior confirmed cancellations.

use chrono::{Datelike, NaiveDateTime};

use crate::model::{SncHistoryRecord, SncMode, Tier};

/// Billing outcome for the next short-notice cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SncOutcome {
    Free,
    Charged,
}

impl From<SncOutcome> for SncMode {
    fn from(outcome: SncOutcome) -> Self {
        match outcome {
            SncOutcome::Free => SncMode::Free,
            SncOutcome::Charged => SncMode::Charged,
        }
    }
}

/// Window over which the single free cancellation is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceScope {
    /// No free cancellation at all.
    None,
    /// One free cancellation per calendar month.
    CalendarMonth,
    /// One free cancellation, ever.
    Lifetime,
}

impl AllowanceScope {
    pub fn for_tier(tier: Option<Tier>) -> Self {
        match tier {
            Some(Tier::Basic) => AllowanceScope::None,
            Some(Tier::Premium) | Some(Tier::Elite) => AllowanceScope::CalendarMonth,
            None => AllowanceScope::Lifetime,
        }
    }

    fn contains(self, record: &SncHistoryRecord, now: NaiveDateTime) -> bool {
        match self {
            AllowanceScope::None => false,
            AllowanceScope::CalendarMonth => {
                record.occurred_at.year() == now.year()
                    && record.occurred_at.month() == now.month()
            }
            AllowanceScope::Lifetime => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SncDecision {
    pub mode: SncOutcome,
    pub scope: AllowanceScope,
}

/// Resolve the next short-notice cancellation for a student of `tier`.
///
/// `prior` must already be scoped to the student. Records dated after `now`
/// are not prior and are ignored.
pub fn resolve(tier: Option<Tier>, prior: &[SncHistoryRecord], now: NaiveDateTime) -> SncDecision {
    let scope = AllowanceScope::for_tier(tier);
    let mode = match scope {
        AllowanceScope::None => SncOutcome::Charged,
        _ => {
            let free_used = prior
                .iter()
                .filter(|r| r.occurred_at <= now)
                .any(|r| !r.is_charged && scope.contains(r, now));
            if free_used {
                SncOutcome::Charged
            } else {
                SncOutcome::Free
            }
        }
    };
    SncDecision { mode, scope }
}

/// Lifetime tally of a student's cancellations, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SncStatus {
    pub free_count: usize,
    pub charged_count: usize,
}

impl SncStatus {
    pub fn has_free_snc_used(&self) -> bool {
        self.free_count > 0
    }
}

pub fn compute_student_snc_status(records: &[SncHistoryRecord]) -> SncStatus {
    records
        .iter()
        .fold(SncStatus::default(), |mut status, record| {
            if record.is_charged {
                status.charged_count += 1;
            } else {
                status.free_count += 1;
            }
            status
        })
}
