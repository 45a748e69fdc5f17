//! In-memory replay of a student's credit ledger.
//!
//! The ledger commits plans into its own copy of the lots, the way the
//! authoritative store would, so hazards can be classified on committed
//! allocations. Nothing is persisted. Also supports an async stream of events.

use std::collections::HashSet;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Minutes;
use crate::config::Config;
use crate::hazard::{Hazard, classify_allocation, classify_lesson, classify_plan, sort_hazards};
use crate::model::{
    AllocationId, CreditLot, Lesson, LessonId, LotId, SncHistoryRecord, SncMode, Tier,
};
use crate::planner::{OpenLots, plan};
use crate::snc::{self, SncDecision, SncStatus};

mod state;
pub use state::{Allocation, LessonOutcome, Preview};

mod error;
pub use error::{LedgerError, LessonError, LotError};

/// Input of the ledger.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// A lot was imported or awarded.
    Lot(CreditLot),
    /// A lesson (or short-notice cancellation) to pay for.
    Lesson(Lesson),
}

/// A single student's ledger.
pub struct Ledger {
    tier: Option<Tier>,
    config: Config,
    /// Lots ordered by start date, ties in insertion order.
    lots: Vec<CreditLot>,
    snc_history: Vec<SncHistoryRecord>,
    lesson_ids: HashSet<LessonId>,
    allocations: Vec<Allocation>,
    hazards: Vec<Hazard>,
    next_allocation: AllocationId,
    /// Overdraft lots count down from `LotId::MAX`, away from imported ids.
    next_overdraft: LotId,
}

/// Public API
impl Ledger {
    pub fn new(tier: Option<Tier>, config: Config) -> Self {
        Self {
            tier,
            config,
            lots: Vec::new(),
            snc_history: Vec::new(),
            lesson_ids: HashSet::new(),
            allocations: Vec::new(),
            hazards: Vec::new(),
            next_allocation: 1,
            next_overdraft: LotId::MAX,
        }
    }

    /// Run the ledger over the given event stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = LedgerEvent> + Unpin) {
        while let Some(event) = stream.next().await {
            // a rejected event is logged and must not stop the replay
            let _ = self.apply(event);
        }
    }

    /// Apply a single event on top of the current ledger state.
    ///
    /// Returns the outcome of a lesson event, `None` for a lot event.
    pub fn apply(&mut self, event: LedgerEvent) -> Result<Option<LessonOutcome>, LedgerError> {
        match event {
            LedgerEvent::Lot(lot) => {
                let (id, minutes) = (lot.id, lot.minutes_remaining());
                let result = self.add_lot(lot);
                Self::log_result("lot", id, minutes, &result);
                result?;
                Ok(None)
            }
            LedgerEvent::Lesson(lesson) => {
                let (id, minutes) = (lesson.id, lesson.duration_minutes);
                let result = self.commit_lesson(lesson);
                Self::log_result("lesson", id, minutes, &result);
                result.map(Some)
            }
        }
    }

    /// Add a lot, keeping FIFO order.
    pub fn add_lot(&mut self, lot: CreditLot) -> Result<(), LedgerError> {
        if !lot.is_open() {
            return Err(LotError::NotOpen(lot.id, lot.state).into());
        }
        if self.lots.iter().any(|l| l.id == lot.id) {
            return Err(LotError::DuplicateLot(lot.id).into());
        }
        self.insert_lot(lot);
        Ok(())
    }

    /// Seed a prior confirmed short-notice cancellation.
    pub fn record_snc(&mut self, record: SncHistoryRecord) {
        self.snc_history.push(record);
    }

    /// Plan and classify a lesson without committing it.
    pub fn preview(&self, lesson: &Lesson) -> Result<Preview, LedgerError> {
        lesson.validate()?;
        let (lesson, snc) = self.resolve_snc(lesson.clone());
        let open = self.open_lots()?;

        let plan = if is_billable(&lesson) {
            plan(&lesson, &open)
        } else {
            Default::default()
        };
        let hazards = classify_plan(
            &lesson,
            &plan,
            &open,
            &self.config.length_standards,
            snc.map(|d| d.mode),
        );

        Ok(Preview { plan, hazards, snc })
    }

    /// Plan a lesson, commit the plan into the lots and classify it.
    pub fn commit_lesson(&mut self, lesson: Lesson) -> Result<LessonOutcome, LedgerError> {
        lesson.validate()?;
        if self.lesson_ids.contains(&lesson.id) {
            return Err(LessonError::DuplicateLesson(lesson.id).into());
        }

        let (lesson, snc) = self.resolve_snc(lesson);
        let plan = if is_billable(&lesson) {
            plan(&lesson, &self.open_lots()?)
        } else {
            Default::default()
        };

        let mut allocations = Vec::with_capacity(plan.steps.len());
        let mut hazards = Vec::new();

        for step in &plan.steps {
            let id = self.next_allocation;
            let (lot_id, lot_hazards) = match step.lot {
                Some(lot_id) => {
                    // plans are built from `self.lots`, so the lot is always present
                    let lot = self.lots.iter_mut().find(|l| l.id == lot_id);
                    debug_assert!(lot.is_some(), "planned lot {lot_id} missing from ledger");
                    let Some(lot) = lot else {
                        continue;
                    };
                    lot.minutes_allocated += step.allocate_minutes;
                    (lot_id, classify_allocation(&lesson, Some(&*lot), Some(id)))
                }
                None => {
                    let lot = CreditLot::overdraft(
                        self.take_overdraft_id(),
                        step.allocate_minutes,
                        lesson.occurred_at.date(),
                    );
                    warn!(
                        lesson = %lesson.id,
                        lot = %lot.id,
                        minutes = %step.allocate_minutes,
                        "credit exhausted, overdraft lot synthesized"
                    );
                    let lot_hazards = classify_allocation(&lesson, Some(&lot), Some(id));
                    let lot_id = lot.id;
                    self.insert_lot(lot);
                    (lot_id, lot_hazards)
                }
            };
            self.next_allocation += 1;
            allocations.push(Allocation::commit(id, lesson.id, lot_id, step));
            hazards.extend(lot_hazards);
        }

        hazards.extend(classify_lesson(
            &lesson,
            &self.config.length_standards,
            snc.map(|d| d.mode),
        ));
        sort_hazards(&mut hazards);
        for hazard in &hazards {
            warn!(
                lesson = %hazard.lesson_id,
                severity = %hazard.severity(),
                allocation = ?hazard.allocation_id,
                "{} raised",
                hazard.hazard_type
            );
        }

        if lesson.is_snc {
            self.snc_history.push(SncHistoryRecord {
                occurred_at: lesson.occurred_at,
                is_charged: lesson.snc_mode != SncMode::Free,
            });
        }
        self.lesson_ids.insert(lesson.id);
        self.allocations.extend(allocations.iter().copied());
        self.hazards.extend(hazards.iter().copied());

        Ok(LessonOutcome {
            lesson: lesson.id,
            snc_mode: lesson.snc_mode,
            allocations,
            hazards,
            negative_balance: plan.negative_balance,
        })
    }

    pub fn tier(&self) -> Option<Tier> {
        self.tier
    }

    /// Lots in FIFO order, including synthesized overdraft lots.
    pub fn lots(&self) -> &[CreditLot] {
        &self.lots
    }

    pub fn get_lot(&self, id: LotId) -> Option<&CreditLot> {
        self.lots.iter().find(|l| l.id == id)
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// All hazards raised so far, in display order.
    pub fn hazards(&self) -> Vec<Hazard> {
        let mut hazards = self.hazards.clone();
        sort_hazards(&mut hazards);
        hazards
    }

    /// Sum of remaining minutes over open lots. Negative when overdrawn.
    pub fn balance(&self) -> Minutes {
        self.lots
            .iter()
            .filter(|l| l.is_open())
            .map(CreditLot::minutes_remaining)
            .sum()
    }

    pub fn snc_history(&self) -> &[SncHistoryRecord] {
        &self.snc_history
    }

    pub fn snc_status(&self) -> SncStatus {
        snc::compute_student_snc_status(&self.snc_history)
    }
}

/// Private API
impl Ledger {
    /// Small helper to log `apply` results
    fn log_result<T, E: std::fmt::Display>(
        kind: &str,
        id: u32,
        minutes: Minutes,
        result: &Result<T, E>,
    ) {
        match result {
            Ok(_) => info!(id = %id, minutes = %minutes, "{kind} applied"),
            Err(e) => info!(id = %id, minutes = %minutes, reason = %e, "{kind} skipped"),
        }
    }

    fn open_lots(&self) -> Result<OpenLots<'_>, LotError> {
        OpenLots::new(self.lots.iter().filter(|l| l.is_open()))
    }

    fn insert_lot(&mut self, lot: CreditLot) {
        let at = self.lots.partition_point(|l| l.start_date <= lot.start_date);
        self.lots.insert(at, lot);
    }

    fn take_overdraft_id(&mut self) -> LotId {
        let id = self.next_overdraft;
        self.next_overdraft -= 1;
        id
    }

    /// Fill in the billing mode of a cancellation the caller left undecided.
    fn resolve_snc(&self, mut lesson: Lesson) -> (Lesson, Option<SncDecision>) {
        if !lesson.is_snc {
            return (lesson, None);
        }
        let decision = snc::resolve(self.tier, &self.snc_history, lesson.occurred_at);
        if lesson.snc_mode == SncMode::None {
            lesson.snc_mode = decision.mode.into();
        }
        (lesson, Some(decision))
    }
}

/// A free cancellation consumes no credit.
fn is_billable(lesson: &Lesson) -> bool {
    !(lesson.is_snc && lesson.snc_mode == SncMode::Free)
}
