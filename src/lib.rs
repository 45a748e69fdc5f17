pub mod config;
pub mod csv;
pub mod hazard;
pub mod ledger;
pub mod matcher;
pub mod minutes;
pub mod model;
pub mod planner;
pub mod snc;

pub use config::Config;
pub use hazard::{Hazard, HazardType, Severity};
pub use ledger::{Ledger, LedgerEvent};
pub use minutes::Minutes;
pub use model::{CreditLot, Lesson, LessonId, LotId, SncHistoryRecord, Tier};
pub use planner::{AllocationPlan, AllocationStep, OpenLots, plan};
