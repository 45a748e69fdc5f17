use crate::Minutes;
use crate::hazard::Hazard;
use crate::model::{AllocationId, LessonId, LotId, SncMode};
use crate::planner::{AllocationPlan, AllocationStep};
use crate::snc::SncDecision;

/// A step of a plan after it was committed to the in-memory ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub id: AllocationId,
    pub lesson: LessonId,
    /// Backing lot. For an overdraft this is the synthesized overdraft lot.
    pub lot: LotId,
    pub overdraft: bool,
    pub from_remaining: Minutes,
    pub minutes: Minutes,
    pub to_remaining: Minutes,
    pub counter_delivery: bool,
    pub length_violation: bool,
}

impl Allocation {
    pub(crate) fn commit(
        id: AllocationId,
        lesson: LessonId,
        lot: LotId,
        step: &AllocationStep,
    ) -> Self {
        Self {
            id,
            lesson,
            lot,
            overdraft: step.is_overdraft(),
            from_remaining: step.from_remaining,
            minutes: step.allocate_minutes,
            to_remaining: step.to_remaining,
            counter_delivery: step.counter_delivery,
            length_violation: step.length_violation,
        }
    }
}

/// What committing one lesson did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonOutcome {
    pub lesson: LessonId,
    /// Billing mode after the allowance was applied.
    pub snc_mode: SncMode,
    pub allocations: Vec<Allocation>,
    /// Hazards of this lesson, in display order.
    pub hazards: Vec<Hazard>,
    pub negative_balance: bool,
}

impl LessonOutcome {
    pub fn total_allocated(&self) -> Minutes {
        self.allocations.iter().map(|a| a.minutes).sum()
    }
}

/// What committing a lesson would do, without touching the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub plan: AllocationPlan,
    pub hazards: Vec<Hazard>,
    pub snc: Option<SncDecision>,
}
