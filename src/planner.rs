//! Allocation planning: which lots pay for a lesson, and how much each gives.
//!
//! The planner is infallible. A shortfall becomes a trailing overdraft step
//! instead of an error, and the inputs are never mutated.

use std::collections::HashSet;

use crate::Minutes;
use crate::ledger::LotError;
use crate::matcher::FitPool;
use crate::model::{CreditLot, Lesson, LotId};

/// A validated, FIFO-ordered view over a student's open lots.
///
/// Holds only lots in the `open` state, with unique ids, sorted by
/// `start_date` ascending (ties keep caller order).
#[derive(Debug, Clone, Default)]
pub struct OpenLots<'a> {
    lots: Vec<&'a CreditLot>,
}

impl<'a> OpenLots<'a> {
    /// Check the planner preconditions. The lots are not re-sorted: an
    /// out-of-order input is rejected.
    pub fn new(lots: impl IntoIterator<Item = &'a CreditLot>) -> Result<Self, LotError> {
        let mut seen = HashSet::new();
        let mut ordered: Vec<&'a CreditLot> = Vec::new();

        for lot in lots {
            if !lot.is_open() {
                return Err(LotError::NotOpen(lot.id, lot.state));
            }
            if !seen.insert(lot.id) {
                return Err(LotError::DuplicateLot(lot.id));
            }
            if let Some(previous) = ordered.last() {
                if lot.start_date < previous.start_date {
                    return Err(LotError::OutOfOrder {
                        lot: lot.id,
                        previous: previous.id,
                    });
                }
            }
            ordered.push(lot);
        }

        Ok(Self { lots: ordered })
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a CreditLot> + '_ {
        self.lots.iter().copied()
    }

    pub fn get(&self, id: LotId) -> Option<&'a CreditLot> {
        self.iter().find(|lot| lot.id == id)
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}

/// One line of an allocation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationStep {
    /// Backing lot, `None` for the synthetic overdraft step.
    pub lot: Option<LotId>,
    pub from_remaining: Minutes,
    pub allocate_minutes: Minutes,
    pub to_remaining: Minutes,
    /// Lot is restricted to the other delivery mode.
    pub counter_delivery: bool,
    /// Lot is restricted to another length category.
    pub length_violation: bool,
}

impl AllocationStep {
    pub fn is_overdraft(&self) -> bool {
        self.lot.is_none()
    }
}

/// Result of planning one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllocationPlan {
    pub steps: Vec<AllocationStep>,
    pub counter_delivery: bool,
    pub length_violation: bool,
    pub negative_balance: bool,
}

impl AllocationPlan {
    pub fn total_allocated(&self) -> Minutes {
        self.steps.iter().map(|s| s.allocate_minutes).sum()
    }

    pub fn overdraft(&self) -> Option<&AllocationStep> {
        self.steps.last().filter(|s| s.is_overdraft())
    }
}

/// Order in which lots are offered to a lesson: `Exact`, then `LengthOnly`,
/// then `Any`, each pool in FIFO order, keeping only the first visit of a lot.
///
/// Pools are nested, so this is a stable sort by each lot's tightest pool.
pub fn consumption_order<'a>(lesson: &Lesson, lots: &OpenLots<'a>) -> Vec<&'a CreditLot> {
    let mut ordered: Vec<&'a CreditLot> = lots.iter().collect();
    ordered.sort_by_key(|lot| FitPool::best(lesson, lot));
    ordered
}

/// Plan which lots pay for `lesson`.
pub fn plan(lesson: &Lesson, lots: &OpenLots<'_>) -> AllocationPlan {
    let mut needed = lesson.duration_minutes;
    let mut plan = AllocationPlan::default();

    for lot in consumption_order(lesson, lots) {
        if !needed.is_positive() {
            break;
        }
        let remaining = lot.minutes_remaining();
        if !remaining.is_positive() {
            continue;
        }

        let take = remaining.min(needed);
        let step = AllocationStep {
            lot: Some(lot.id),
            from_remaining: remaining,
            allocate_minutes: take,
            to_remaining: remaining - take,
            counter_delivery: lot.delivery_conflict(lesson.delivery).is_some(),
            length_violation: lot.length_conflict(lesson.length_cat).is_some(),
        };
        plan.counter_delivery |= step.counter_delivery;
        plan.length_violation |= step.length_violation;
        plan.steps.push(step);
        needed -= take;
    }

    if needed.is_positive() {
        let from = plan
            .steps
            .last()
            .map(|s| s.to_remaining)
            .unwrap_or(Minutes::ZERO);
        plan.steps.push(AllocationStep {
            lot: None,
            from_remaining: from,
            allocate_minutes: needed,
            to_remaining: from - needed,
            counter_delivery: false,
            length_violation: false,
        });
        plan.negative_balance = true;
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Delivery, LengthCategory, LotState};
    use chrono::{NaiveDate, NaiveDateTime};

    // test utils

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn at() -> NaiveDateTime {
        day(20).and_hms_opt(15, 0, 0).unwrap()
    }

    fn lot(id: LotId, remaining: i64, start: u32) -> CreditLot {
        CreditLot::new(id, Minutes::new(remaining), day(start))
    }

    fn lesson(minutes: i64, delivery: Delivery) -> Lesson {
        Lesson::new(1, at(), Minutes::new(minutes), delivery)
    }

    fn step(lot: Option<LotId>, from: i64, take: i64) -> AllocationStep {
        AllocationStep {
            lot,
            from_remaining: Minutes::new(from),
            allocate_minutes: Minutes::new(take),
            to_remaining: Minutes::new(from - take),
            counter_delivery: false,
            length_violation: false,
        }
    }

    // OpenLots

    #[test]
    fn open_lots_accepts_sorted_open_lots() {
        let lots = [lot(1, 60, 1), lot(2, 60, 1), lot(3, 60, 2)];
        let open = OpenLots::new(&lots).unwrap();
        assert_eq!(open.len(), 3);
        assert_eq!(open.get(2).map(|l| l.id), Some(2));
    }

    #[test]
    fn open_lots_rejects_unsorted_input() {
        let lots = [lot(1, 60, 2), lot(2, 60, 1)];
        assert!(matches!(
            OpenLots::new(&lots),
            Err(LotError::OutOfOrder {
                lot: 2,
                previous: 1
            })
        ));
    }

    #[test]
    fn open_lots_rejects_closed_lot() {
        let lots = [lot(1, 60, 1).with_state(LotState::Expired)];
        assert!(matches!(
            OpenLots::new(&lots),
            Err(LotError::NotOpen(1, LotState::Expired))
        ));
    }

    #[test]
    fn open_lots_rejects_duplicate_ids() {
        let lots = [lot(1, 60, 1), lot(1, 30, 2)];
        assert!(matches!(
            OpenLots::new(&lots),
            Err(LotError::DuplicateLot(1))
        ));
    }

    // consumption order

    #[test]
    fn order_prefers_exact_then_length_only_then_any() {
        let lesson = lesson(60, Delivery::Online).with_length(LengthCategory::Min60);
        let lots = [
            lot(1, 60, 1).with_length(LengthCategory::Min90),
            lot(2, 60, 2).with_delivery(Delivery::F2f),
            lot(3, 60, 3),
        ];
        let open = OpenLots::new(&lots).unwrap();
        let ids: Vec<_> = consumption_order(&lesson, &open)
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn order_visits_each_lot_once() {
        let lesson = lesson(60, Delivery::Online);
        let lots = [lot(1, 60, 1), lot(2, 60, 2)];
        let open = OpenLots::new(&lots).unwrap();
        assert_eq!(consumption_order(&lesson, &open).len(), 2);
    }

    #[test]
    fn order_matches_pool_concatenation() {
        let lots = [
            lot(1, 60, 1).with_delivery(Delivery::F2f),
            lot(2, 60, 1).with_length(LengthCategory::Min120),
            lot(3, 60, 2),
            lot(4, 60, 3)
                .with_delivery(Delivery::F2f)
                .with_length(LengthCategory::Min60),
            lot(5, 60, 4).with_delivery(Delivery::Online),
            lot(6, 60, 4)
                .with_delivery(Delivery::Online)
                .with_length(LengthCategory::Min90),
        ];
        let open = OpenLots::new(&lots).unwrap();

        for delivery in [Delivery::Online, Delivery::F2f] {
            for length in [None, Some(LengthCategory::Min60), Some(LengthCategory::Min90)] {
                let mut lesson = lesson(60, delivery);
                lesson.length_cat = length;

                let mut expected = Vec::new();
                for pool in FitPool::ORDER {
                    for lot in open.iter().filter(|l| pool.admits(&lesson, l)) {
                        if !expected.contains(&lot.id) {
                            expected.push(lot.id);
                        }
                    }
                }
                let ids: Vec<_> = consumption_order(&lesson, &open)
                    .iter()
                    .map(|l| l.id)
                    .collect();
                assert_eq!(ids, expected, "{delivery:?} {length:?}");
            }
        }
    }

    // plan

    #[test]
    fn single_lot_covers_lesson() {
        let lots = [lot(1, 120, 1)];
        let plan = plan(&lesson(60, Delivery::Online), &OpenLots::new(&lots).unwrap());
        assert_eq!(plan.steps, vec![step(Some(1), 120, 60)]);
        assert!(!plan.negative_balance);
    }

    #[test]
    fn fifo_spills_into_next_lot() {
        let lots = [
            lot(1, 60, 1),
            lot(2, 60, 2).with_delivery(Delivery::Online),
        ];
        let plan = plan(&lesson(90, Delivery::Online), &OpenLots::new(&lots).unwrap());
        assert_eq!(plan.steps, vec![step(Some(1), 60, 60), step(Some(2), 60, 30)]);
        assert!(!plan.negative_balance);
        assert!(!plan.counter_delivery);
    }

    #[test]
    fn shortfall_becomes_overdraft_step() {
        let lots = [lot(1, 30, 1).with_delivery(Delivery::F2f)];
        let plan = plan(&lesson(60, Delivery::Online), &OpenLots::new(&lots).unwrap());

        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[0].counter_delivery);
        assert_eq!(plan.steps[0].allocate_minutes, Minutes::new(30));
        assert_eq!(plan.steps[1], step(None, 0, 30));
        assert!(plan.negative_balance);
        assert!(plan.counter_delivery);
        assert!(!plan.length_violation);
    }

    #[test]
    fn no_lots_is_single_overdraft() {
        let plan = plan(&lesson(90, Delivery::F2f), &OpenLots::default());
        assert_eq!(plan.steps, vec![step(None, 0, 90)]);
        assert_eq!(plan.overdraft().map(|s| s.to_remaining), Some(Minutes::new(-90)));
        assert!(plan.negative_balance);
    }

    #[test]
    fn exhausted_lots_are_skipped() {
        let lots = [
            lot(1, 60, 1).with_allocated(Minutes::new(60)),
            CreditLot::overdraft(2, Minutes::new(15), day(2)),
            lot(3, 60, 3),
        ];
        let plan = plan(&lesson(60, Delivery::Online), &OpenLots::new(&lots).unwrap());
        assert_eq!(plan.steps, vec![step(Some(3), 60, 60)]);
    }

    #[test]
    fn length_violation_is_flagged() {
        let lesson = lesson(60, Delivery::Online).with_length(LengthCategory::Min60);
        let lots = [lot(1, 120, 1).with_length(LengthCategory::Min120)];
        let plan = plan(&lesson, &OpenLots::new(&lots).unwrap());
        assert!(plan.steps[0].length_violation);
        assert!(plan.length_violation);
        assert!(!plan.counter_delivery);
    }

    #[test]
    fn exact_lot_is_consumed_before_older_loose_lot() {
        let lesson = lesson(60, Delivery::F2f);
        let lots = [
            lot(1, 100, 1).with_delivery(Delivery::Online),
            lot(2, 100, 2).with_delivery(Delivery::F2f),
        ];
        let plan = plan(&lesson, &OpenLots::new(&lots).unwrap());
        assert_eq!(plan.steps, vec![step(Some(2), 100, 60)]);
    }

    #[test]
    fn plan_does_not_mutate_inputs() {
        let lots = [lot(1, 30, 1)];
        let before = lots.clone();
        let lesson = lesson(60, Delivery::Online);
        let open = OpenLots::new(&lots).unwrap();
        let first = plan(&lesson, &open);
        let second = plan(&lesson, &open);
        assert_eq!(first, second);
        assert_eq!(lots, before);
    }
}
