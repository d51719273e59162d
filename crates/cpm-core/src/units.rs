//! Unit-safe quantities for market bids.
//!
//! Quantities (MW) and prices ($/MWh) travel side by side through every bid
//! table, which makes them easy to swap by accident. Both are wrapped in
//! `#[repr(transparent)]` newtypes so the compiler rejects `capacity + price`.
//!
//! ```
//! use cpm_core::units::{DollarsPerMwh, Megawatts};
//!
//! let block = Megawatts(40.0) + Megawatts(25.0);
//! let bid = DollarsPerMwh(80.0);
//!
//! assert_eq!(block.value(), 65.0);
//! assert_eq!(bid * Megawatts(10.0), 800.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.2} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl From<f64> for $type {
            fn from(value: f64) -> Self {
                Self(value)
            }
        }
    };
}

/// Energy quantity in megawatts, used for capacities, loads and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Price of energy in dollars per megawatt-hour.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct DollarsPerMwh(pub f64);

impl_unit_ops!(DollarsPerMwh, "$/MWh");

/// Price times quantity gives dollars for a one-hour period.
impl Mul<Megawatts> for DollarsPerMwh {
    type Output = f64;
    fn mul(self, rhs: Megawatts) -> Self::Output {
        self.0 * rhs.0
    }
}
