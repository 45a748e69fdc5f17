//! Hazard classification of allocations and lessons.
//!
//! Hazards are derived, never stored. The same rules apply to a preview plan
//! and to committed allocations.

use std::cmp::Ordering;
use std::fmt;

use crate::config::LengthStandards;
use crate::model::{AllocationId, CreditLot, Delivery, Lesson, LessonId, SncMode, SourceType};
use crate::planner::{AllocationPlan, OpenLots};
use crate::snc::SncOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardType {
    /// F2f lesson paid from an online-only lot.
    DeliveryF2fOnOnline,
    /// Online lesson paid from an f2f-only lot.
    DeliveryOnlineOnF2f,
    LengthRestrictionMismatch,
    LengthTooShort,
    OverdraftAllocation,
    SncOveruse,
}

impl HazardType {
    pub const ALL: [HazardType; 6] = [
        HazardType::OverdraftAllocation,
        HazardType::SncOveruse,
        HazardType::DeliveryF2fOnOnline,
        HazardType::DeliveryOnlineOnF2f,
        HazardType::LengthRestrictionMismatch,
        HazardType::LengthTooShort,
    ];

    pub fn severity(self) -> Severity {
        match self {
            HazardType::OverdraftAllocation | HazardType::SncOveruse => Severity::Error,
            HazardType::DeliveryF2fOnOnline
            | HazardType::DeliveryOnlineOnF2f
            | HazardType::LengthRestrictionMismatch => Severity::Warning,
            HazardType::LengthTooShort => Severity::Info,
        }
    }

    /// Display rank within a severity, lower first.
    pub fn priority(self) -> u8 {
        match self {
            HazardType::OverdraftAllocation => 0,
            HazardType::SncOveruse => 1,
            HazardType::DeliveryF2fOnOnline => 2,
            HazardType::DeliveryOnlineOnF2f => 3,
            HazardType::LengthRestrictionMismatch => 4,
            HazardType::LengthTooShort => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HazardType::DeliveryF2fOnOnline => "delivery_f2f_on_online",
            HazardType::DeliveryOnlineOnF2f => "delivery_online_on_f2f",
            HazardType::LengthRestrictionMismatch => "length_restriction_mismatch",
            HazardType::LengthTooShort => "length_too_short",
            HazardType::OverdraftAllocation => "overdraft_allocation",
            HazardType::SncOveruse => "snc_overuse",
        }
    }

    /// Delivery hazard for a lesson delivered as `lesson` from a lot
    /// restricted to the other mode.
    fn counter_delivery(lesson: Delivery) -> Self {
        match lesson {
            Delivery::F2f => HazardType::DeliveryF2fOnOnline,
            Delivery::Online => HazardType::DeliveryOnlineOnF2f,
        }
    }
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A business-rule violation of a lesson or one of its allocations.
///
/// Ordered for display: severity descending, then type priority, then type
/// name, then lesson and allocation ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hazard {
    pub hazard_type: HazardType,
    pub lesson_id: LessonId,
    /// `None` for lesson-level hazards and preview steps.
    pub allocation_id: Option<AllocationId>,
}

impl Hazard {
    pub fn new(
        hazard_type: HazardType,
        lesson_id: LessonId,
        allocation_id: Option<AllocationId>,
    ) -> Self {
        Self {
            hazard_type,
            lesson_id,
            allocation_id,
        }
    }

    pub fn severity(&self) -> Severity {
        self.hazard_type.severity()
    }
}

impl Ord for Hazard {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .severity()
            .cmp(&self.severity())
            .then_with(|| self.hazard_type.priority().cmp(&other.hazard_type.priority()))
            .then_with(|| self.hazard_type.as_str().cmp(other.hazard_type.as_str()))
            .then_with(|| self.lesson_id.cmp(&other.lesson_id))
            .then_with(|| self.allocation_id.cmp(&other.allocation_id))
    }
}

impl PartialOrd for Hazard {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] lesson {}", self.hazard_type, self.severity(), self.lesson_id)?;
        if let Some(allocation) = self.allocation_id {
            write!(f, " allocation {allocation}")?;
        }
        Ok(())
    }
}

/// Sort hazards into display order.
pub fn sort_hazards(hazards: &mut [Hazard]) {
    hazards.sort();
}

/// Hazards of one allocation. `lot == None` is an overdraft step with no
/// backing lot.
pub fn classify_allocation(
    lesson: &Lesson,
    lot: Option<&CreditLot>,
    allocation_id: Option<AllocationId>,
) -> Vec<Hazard> {
    let hazard = |t: HazardType| Hazard::new(t, lesson.id, allocation_id);
    let Some(lot) = lot else {
        return vec![hazard(HazardType::OverdraftAllocation)];
    };

    let mut hazards = Vec::new();
    if lot.delivery_conflict(lesson.delivery).is_some() {
        hazards.push(hazard(HazardType::counter_delivery(lesson.delivery)));
    }
    if lot.length_conflict(lesson.length_cat).is_some() {
        hazards.push(hazard(HazardType::LengthRestrictionMismatch));
    }
    if lot.source_type == SourceType::Overdraft {
        hazards.push(hazard(HazardType::OverdraftAllocation));
    }
    hazards
}

/// Lesson-level hazards.
///
/// `expected_snc` is the allowance decision for this lesson computed from the
/// history before it. A free cancellation granted where the allowance says
/// charged is an overuse.
pub fn classify_lesson(
    lesson: &Lesson,
    standards: &LengthStandards,
    expected_snc: Option<SncOutcome>,
) -> Vec<Hazard> {
    let mut hazards = Vec::new();

    if let Some(standard) = standards.standard_for(lesson.length_cat) {
        if lesson.duration_minutes < standard {
            hazards.push(Hazard::new(HazardType::LengthTooShort, lesson.id, None));
        }
    }

    if lesson.is_snc
        && lesson.snc_mode == SncMode::Free
        && expected_snc == Some(SncOutcome::Charged)
    {
        hazards.push(Hazard::new(HazardType::SncOveruse, lesson.id, None));
    }

    hazards
}

/// Hazards a preview plan would raise, in display order.
pub fn classify_plan(
    lesson: &Lesson,
    plan: &AllocationPlan,
    lots: &OpenLots<'_>,
    standards: &LengthStandards,
    expected_snc: Option<SncOutcome>,
) -> Vec<Hazard> {
    let mut hazards: Vec<Hazard> = plan
        .steps
        .iter()
        .flat_map(|step| match step.lot {
            None => classify_allocation(lesson, None, None),
            Some(id) => {
                // steps only name lots from the `OpenLots` they were planned on
                let lot = lots.get(id);
                debug_assert!(lot.is_some(), "planned lot {id} missing from open lots");
                lot.map(|lot| classify_allocation(lesson, Some(lot), None))
                    .unwrap_or_default()
            }
        })
        .collect();
    hazards.extend(classify_lesson(lesson, standards, expected_snc));
    sort_hazards(&mut hazards);
    hazards
}
