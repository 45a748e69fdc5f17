use serde::{Deserialize, Serialize};
use std::fmt;

/// A signed quantity of lesson minutes.
///
/// Balances are signed because an overdraft lot carries a negative remainder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Minutes(i64);

impl Minutes {
    pub const ZERO: Minutes = Minutes(0);

    pub const fn new(value: i64) -> Self {
        Minutes(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Minutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Minutes {
    fn from(value: i64) -> Self {
        Minutes(value)
    }
}

impl std::ops::Add for Minutes {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Minutes(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Minutes {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Minutes(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Minutes {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Minutes(-self.0)
    }
}

impl std::ops::AddAssign for Minutes {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Minutes {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Minutes {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Minutes::ZERO, |acc, m| acc + m)
    }
}
