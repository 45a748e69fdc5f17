//! Restriction matching between a lesson and a candidate credit lot.
//!
//! Lots are sorted into three nested pools. Every lot is in `Any`, every
//! `Exact` lot is also in `LengthOnly`. The tier restriction of a lot is not
//! consulted here.

use crate::model::{CreditLot, Lesson};

/// Fit pool of a lot for a lesson, from best to loosest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FitPool {
    /// Delivery and length both compatible.
    Exact,
    /// Length compatible, delivery ignored.
    LengthOnly,
    /// Any lot, unconditionally.
    Any,
}

impl FitPool {
    /// Pools in consumption order.
    pub const ORDER: [FitPool; 3] = [FitPool::Exact, FitPool::LengthOnly, FitPool::Any];

    /// Whether `lot` belongs to this pool for `lesson`.
    pub fn admits(self, lesson: &Lesson, lot: &CreditLot) -> bool {
        let length_ok = lot.length_conflict(lesson.length_cat).is_none();
        match self {
            FitPool::Exact => length_ok && lot.delivery_conflict(lesson.delivery).is_none(),
            FitPool::LengthOnly => length_ok,
            FitPool::Any => true,
        }
    }

    /// Tightest pool that admits `lot`.
    pub fn best(lesson: &Lesson, lot: &CreditLot) -> FitPool {
        Self::ORDER
            .into_iter()
            .find(|pool| pool.admits(lesson, lot))
            .unwrap_or(FitPool::Any)
    }
}
