//! Q47.16 fixed-point numbers for the chamber physics
//!
//! All physics runs on `i64` so results are identical on every target.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Signed fixed-point value with 16 fractional bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed(i64);

impl Fixed {
    pub const FRAC_BITS: u32 = 16;
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << Self::FRAC_BITS);
    pub const HALF: Self = Self(1 << (Self::FRAC_BITS - 1));

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn from_int(value: i64) -> Self {
        Self(value << Self::FRAC_BITS)
    }

    /// `value / 1000`, truncated toward zero
    pub const fn from_milli(value: i64) -> Self {
        Self((value << Self::FRAC_BITS) / 1000)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        Self(self.0.clamp(lo.0, hi.0))
    }

    /// Squared distance between two points, in raw units (exact)
    pub fn dist_sq(ax: Self, ay: Self, bx: Self, by: Self) -> i128 {
        let dx = (ax.0 - bx.0) as i128;
        let dy = (ay.0 - by.0) as i128;
        dx * dx + dy * dy
    }

    /// Lossy conversion for display only
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1i64 << Self::FRAC_BITS) as f64
    }
}

impl Add for Fixed {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Fixed {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// Product, truncated toward negative infinity
impl Mul for Fixed {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(((self.0 as i128 * rhs.0 as i128) >> Self::FRAC_BITS) as i64)
    }
}

impl Neg for Fixed {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}
