//! Core domain types for the credit allocation engine.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::Minutes;
use crate::ledger::LessonError;

/// Credit lot identifier.
pub type LotId = u32;

/// Lesson identifier.
pub type LessonId = u32;

/// Identifier of a committed allocation, assigned by the ledger.
pub type AllocationId = u32;

/// How a lesson is delivered, or which delivery a lot is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Online,
    F2f,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Online => write!(f, "online"),
            Delivery::F2f => write!(f, "f2f"),
        }
    }
}

/// Package tier of a student or a lot restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Premium,
    Elite,
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Tier::Basic),
            "premium" => Ok(Tier::Premium),
            "elite" => Ok(Tier::Elite),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// Standard lesson length bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthCategory {
    #[serde(rename = "60")]
    Min60,
    #[serde(rename = "90")]
    Min90,
    #[serde(rename = "120")]
    Min120,
}

impl fmt::Display for LengthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthCategory::Min60 => write!(f, "60"),
            LengthCategory::Min90 => write!(f, "90"),
            LengthCategory::Min120 => write!(f, "120"),
        }
    }
}

/// Where the minutes of a lot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Invoice,
    Award,
    Overdraft,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    #[default]
    None,
    Advisory,
    Mandatory,
}

/// Lifecycle state of a lot. Only `Open` lots are planner input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotState {
    #[default]
    Open,
    Closed,
    Expired,
    Cancelled,
}

/// Short-notice cancellation billing mode of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SncMode {
    #[default]
    None,
    Free,
    Charged,
}

/// A block of purchased or awarded minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLot {
    pub id: LotId,
    pub minutes_granted: Minutes,
    /// Sum of all allocations drawn from this lot. Never decreases.
    #[serde(default)]
    pub minutes_allocated: Minutes,
    #[serde(default)]
    pub delivery_restriction: Option<Delivery>,
    #[serde(default)]
    pub tier_restriction: Option<Tier>,
    #[serde(default, deserialize_with = "length_or_none")]
    pub length_restriction: Option<LengthCategory>,
    #[serde(default)]
    pub source_type: SourceType,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub expiry_policy: ExpiryPolicy,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub state: LotState,
}

impl CreditLot {
    /// Create an unrestricted, open invoice lot with nothing allocated.
    pub fn new(id: LotId, minutes_granted: Minutes, start_date: NaiveDate) -> Self {
        Self {
            id,
            minutes_granted,
            minutes_allocated: Minutes::ZERO,
            delivery_restriction: None,
            tier_restriction: None,
            length_restriction: None,
            source_type: SourceType::Invoice,
            start_date,
            expiry_policy: ExpiryPolicy::None,
            expiry_date: None,
            state: LotState::Open,
        }
    }

    /// Synthetic lot carrying a shortfall that real credit could not cover.
    pub fn overdraft(id: LotId, shortfall: Minutes, start_date: NaiveDate) -> Self {
        Self {
            minutes_allocated: shortfall,
            source_type: SourceType::Overdraft,
            ..Self::new(id, Minutes::ZERO, start_date)
        }
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery_restriction = Some(delivery);
        self
    }

    pub fn with_length(mut self, length: LengthCategory) -> Self {
        self.length_restriction = Some(length);
        self
    }

    pub fn with_source(mut self, source: SourceType) -> Self {
        self.source_type = source;
        self
    }

    pub fn with_allocated(mut self, allocated: Minutes) -> Self {
        self.minutes_allocated = allocated;
        self
    }

    pub fn with_state(mut self, state: LotState) -> Self {
        self.state = state;
        self
    }

    pub fn minutes_remaining(&self) -> Minutes {
        self.minutes_granted - self.minutes_allocated
    }

    pub fn is_open(&self) -> bool {
        self.state == LotState::Open
    }

    /// Lot delivery restriction, if it conflicts with the given delivery.
    pub fn delivery_conflict(&self, delivery: Delivery) -> Option<Delivery> {
        self.delivery_restriction.filter(|r| *r != delivery)
    }

    /// Lot length restriction, if it conflicts with the given category.
    pub fn length_conflict(&self, length: Option<LengthCategory>) -> Option<LengthCategory> {
        self.length_restriction.filter(|r| Some(*r) != length)
    }
}

/// A lesson to be paid for from a student's credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub occurred_at: NaiveDateTime,
    pub duration_minutes: Minutes,
    pub delivery: Delivery,
    #[serde(default, deserialize_with = "length_or_none")]
    pub length_cat: Option<LengthCategory>,
    #[serde(default)]
    pub is_snc: bool,
    #[serde(default)]
    pub snc_mode: SncMode,
}

impl Lesson {
    pub fn new(
        id: LessonId,
        occurred_at: NaiveDateTime,
        duration_minutes: Minutes,
        delivery: Delivery,
    ) -> Self {
        Self {
            id,
            occurred_at,
            duration_minutes,
            delivery,
            length_cat: None,
            is_snc: false,
            snc_mode: SncMode::None,
        }
    }

    pub fn with_length(mut self, length: LengthCategory) -> Self {
        self.length_cat = Some(length);
        self
    }

    /// Mark the lesson as a short-notice cancellation.
    pub fn snc(mut self, mode: SncMode) -> Self {
        self.is_snc = true;
        self.snc_mode = mode;
        self
    }

    /// Reject lessons the engine must never see.
    pub fn validate(&self) -> Result<(), LessonError> {
        if !self.duration_minutes.is_positive() {
            return Err(LessonError::NonPositiveDuration(
                self.id,
                self.duration_minutes,
            ));
        }
        Ok(())
    }
}

/// A confirmed short-notice cancellation in a student's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SncHistoryRecord {
    pub occurred_at: NaiveDateTime,
    pub is_charged: bool,
}

/// Length restrictions arrive as `60`/`90`/`120`, with `none` or an empty
/// field meaning unrestricted.
fn length_or_none<'de, D>(deserializer: D) -> Result<Option<LengthCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("none") => Ok(None),
        Some("60") => Ok(Some(LengthCategory::Min60)),
        Some("90") => Ok(Some(LengthCategory::Min90)),
        Some("120") => Ok(Some(LengthCategory::Min120)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unknown length category '{other}'"
        ))),
    }
}
