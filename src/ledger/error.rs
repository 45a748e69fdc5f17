//! Contract violations rejected at the ledger boundary.

use thiserror::Error;

use crate::Minutes;
use crate::model::{LessonId, LotId, LotState};

/// Top-level error returned by [`Ledger::apply`](super::Ledger::apply).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("lesson rejected: {0}")]
    Lesson(#[from] LessonError),

    #[error("lot rejected: {0}")]
    Lot(#[from] LotError),
}

/// A lesson the engine must not plan.
#[derive(Debug, Error)]
pub enum LessonError {
    #[error("lesson {0} has non-positive duration {1}")]
    NonPositiveDuration(LessonId, Minutes),
    #[error("duplicate lesson id {0}")]
    DuplicateLesson(LessonId),
}

/// A lot list that breaks the planner input contract.
#[derive(Debug, Error)]
pub enum LotError {
    #[error("lot {0} is {1:?}, only open lots can be allocated")]
    NotOpen(LotId, LotState),
    #[error("duplicate lot id {0}")]
    DuplicateLot(LotId),
    #[error("lot {lot} starts before lot {previous}, lots must be sorted by start date")]
    OutOfOrder { lot: LotId, previous: LotId },
}
