//! Definitions of musical time.
//!
//! Every position on the chart timeline is a [`RationalTime`], an exact mixed fraction of beats.
//! Floating point is never used to order or compare positions, so coincident times stay
//! coincident however many subdivisions have been accumulated.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use num::rational::Ratio;
use num::{Integer, ToPrimitive, Zero};

use crate::error::TimeError;

/// An exact time in beats, `whole + numerator / denominator`.
///
/// Values are always normalized: `0 <= numerator < denominator`, the fraction is reduced, and a
/// zero numerator comes with a denominator of 1. Normalization also makes the derived
/// [`PartialEq`] and [`Hash`] agree with the numeric value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "[i64; 3]", into = "[i64; 3]")
)]
pub struct RationalTime {
    whole: i64,
    numerator: i64,
    denominator: i64,
}

impl RationalTime {
    /// Beat zero, the reference instant of every timeline.
    pub const ZERO: Self = Self {
        whole: 0,
        numerator: 0,
        denominator: 1,
    };

    /// Creates a normalized time from a mixed fraction.
    ///
    /// The inputs need not be normalized: `(0, 5, 2)` becomes `2 + 1/2` and `(0, -1, 2)` becomes
    /// `-1 + 1/2`.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::ZeroDenominator`] if `denominator` is zero, and
    /// [`TimeError::Overflow`] if the whole part leaves the `i64` range once the fraction is
    /// carried into it.
    pub fn new(whole: i64, numerator: i64, denominator: i64) -> Result<Self, TimeError> {
        if denominator == 0 {
            return Err(TimeError::ZeroDenominator { whole, numerator });
        }
        Self::try_from_parts(whole.into(), numerator.into(), denominator.into())
    }

    /// Creates a time of whole beats.
    #[must_use]
    pub const fn from_beats(whole: i64) -> Self {
        Self {
            whole,
            numerator: 0,
            denominator: 1,
        }
    }

    /// Creates a time from an exact ratio of beats.
    #[must_use]
    pub fn from_ratio(ratio: Ratio<i64>) -> Self {
        // `|numer / denom| <= |numer|`, so the whole part always fits.
        Self::from_parts(0, (*ratio.numer()).into(), (*ratio.denom()).into())
    }

    /// The closest time to `beats` whose fraction fits in `i64`. `None` if `beats` is not finite.
    #[must_use]
    pub fn from_scalar_beats(beats: f64) -> Option<Self> {
        Ratio::approximate_float(beats).map(Self::from_ratio)
    }

    fn try_from_parts(whole: i128, numerator: i128, denominator: i128) -> Result<Self, TimeError> {
        let (numerator, denominator) = if denominator < 0 {
            (-numerator, -denominator)
        } else {
            (numerator, denominator)
        };
        let whole = whole + numerator.div_euclid(denominator);
        let numerator = numerator.rem_euclid(denominator);
        let whole = i64::try_from(whole).map_err(|_| TimeError::Overflow)?;
        if numerator == 0 {
            return Ok(Self::from_beats(whole));
        }
        let divisor = numerator.gcd(&denominator);
        Ok(Self {
            whole,
            numerator: i64::try_from(numerator / divisor).map_err(|_| TimeError::Overflow)?,
            denominator: i64::try_from(denominator / divisor).map_err(|_| TimeError::Overflow)?,
        })
    }

    fn from_parts(whole: i128, numerator: i128, denominator: i128) -> Self {
        match Self::try_from_parts(whole, numerator, denominator) {
            Ok(time) => time,
            Err(err) => panic!("{err}"),
        }
    }

    /// The integer part, rounded toward negative infinity.
    #[must_use]
    pub const fn whole(self) -> i64 {
        self.whole
    }

    /// The numerator of the fractional part.
    #[must_use]
    pub const fn numerator(self) -> i64 {
        self.numerator
    }

    /// The denominator of the fractional part, always positive.
    #[must_use]
    pub const fn denominator(self) -> i64 {
        self.denominator
    }

    /// Whether this time is before beat zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.whole < 0
    }

    /// The value as an improper fraction `(numerator, denominator)`.
    fn improper(self) -> (i128, i128) {
        (
            self.whole as i128 * self.denominator as i128 + self.numerator as i128,
            self.denominator as i128,
        )
    }

    /// The value as an exact ratio, or `None` if the improper fraction does not fit in `i64`.
    #[must_use]
    pub fn to_ratio(self) -> Option<Ratio<i64>> {
        let (numer, denom) = self.improper();
        Some(Ratio::new(numer.to_i64()?, denom.to_i64()?))
    }

    /// Approximates this time as floating beats.
    ///
    /// Only for drawing and transcendental math. Structural decisions use exact comparisons.
    #[must_use]
    pub fn to_scalar_beats(self) -> f64 {
        self.whole as f64 + self.numerator as f64 / self.denominator as f64
    }

    /// Beats elapsed from `origin` to `self` as a float, exact when the difference is
    /// representable.
    #[must_use]
    pub fn scalar_beats_since(self, origin: Self) -> f64 {
        self.checked_sub(origin).map_or_else(
            |_| self.to_scalar_beats() - origin.to_scalar_beats(),
            Self::to_scalar_beats,
        )
    }

    /// Adds two times.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Overflow`] if the sum does not fit, typically because the two
    /// denominators are large and coprime.
    pub fn checked_add(self, rhs: Self) -> Result<Self, TimeError> {
        let lhs_denom = i128::from(self.denominator);
        let rhs_denom = i128::from(rhs.denominator);
        let lcm = lhs_denom.lcm(&rhs_denom);
        // Both terms are below `lcm <= 2^126`, so the sum cannot leave i128.
        Self::try_from_parts(
            i128::from(self.whole) + i128::from(rhs.whole),
            i128::from(self.numerator) * (lcm / lhs_denom)
                + i128::from(rhs.numerator) * (lcm / rhs_denom),
            lcm,
        )
    }

    /// Subtracts `rhs` from this time.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Overflow`] if the difference does not fit.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, TimeError> {
        self.checked_add(rhs.checked_neg()?)
    }

    /// Negates this time.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Overflow`] for the few times whose whole part is near `i64::MIN`.
    pub fn checked_neg(self) -> Result<Self, TimeError> {
        Self::try_from_parts(
            -i128::from(self.whole),
            -i128::from(self.numerator),
            self.denominator.into(),
        )
    }

    /// Multiplies this time by an exact ratio.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Overflow`] if the product does not fit.
    pub fn checked_scale(self, ratio: Ratio<i64>) -> Result<Self, TimeError> {
        let (numer, denom) = self.improper();
        let numer = numer
            .checked_mul((*ratio.numer()).into())
            .ok_or(TimeError::Overflow)?;
        let denom = denom
            .checked_mul((*ratio.denom()).into())
            .ok_or(TimeError::Overflow)?;
        Self::try_from_parts(0, numer, denom)
    }

    /// Multiplies this time by an exact ratio.
    ///
    /// # Panics
    ///
    /// Panics if the product does not fit. See [`Self::checked_scale`].
    #[must_use]
    pub fn scale(self, ratio: Ratio<i64>) -> Self {
        match self.checked_scale(ratio) {
            Ok(time) => time,
            Err(err) => panic!("{err}"),
        }
    }

    /// Divides this time by another, returning the exact ratio between the two.
    ///
    /// Returns `None` if `divisor` is zero or the ratio does not fit in `i64`.
    #[must_use]
    pub fn ratio_to(self, divisor: Self) -> Option<Ratio<i64>> {
        if divisor.is_zero() {
            return None;
        }
        let (numer, denom) = self.improper();
        let (divisor_numer, divisor_denom) = divisor.improper();
        let numer = numer.checked_mul(divisor_denom)?;
        let denom = denom.checked_mul(divisor_numer)?;
        let divisor = numer.gcd(&denom);
        let (numer, denom) = (numer / divisor, denom / divisor);
        Some(Ratio::new(numer.to_i64()?, denom.to_i64()?))
    }

    /// How far this time is through `[start, end]`, as a ratio.
    ///
    /// Exact whenever the ratio fits in `i64`, otherwise the closest fitting ratio to the float
    /// approximation. `None` if the interval is empty.
    #[must_use]
    pub fn progress_in(self, start: Self, end: Self) -> Option<Ratio<i64>> {
        if start == end {
            return None;
        }
        let exact = end
            .checked_sub(start)
            .ok()
            .zip(self.checked_sub(start).ok())
            .and_then(|(length, elapsed)| elapsed.ratio_to(length));
        exact.or_else(|| {
            Ratio::approximate_float(self.scalar_beats_since(start) / end.scalar_beats_since(start))
        })
    }

    /// Computes `floor(self * 2^exponent)` exactly, saturating at the bounds of `i64`.
    #[must_use]
    pub fn scaled_floor(self, exponent: i32) -> i64 {
        self.scaled(exponent, false)
    }

    /// Computes `ceil(self * 2^exponent)` exactly, saturating at the bounds of `i64`.
    #[must_use]
    pub fn scaled_ceil(self, exponent: i32) -> i64 {
        self.scaled(exponent, true)
    }

    fn scaled(self, exponent: i32, round_up: bool) -> i64 {
        let (numer, denom) = self.improper();
        let saturated = if numer < 0 { i64::MIN } else { i64::MAX };
        let power = 1_i128
            .checked_shl(exponent.unsigned_abs())
            .filter(|power| *power > 0);
        let fraction = if exponent >= 0 {
            power
                .and_then(|power| numer.checked_mul(power))
                .map(|numer| (numer, denom))
        } else {
            power
                .and_then(|power| denom.checked_mul(power))
                .map(|denom| (numer, denom))
        };
        let Some((numer, denom)) = fraction else {
            if exponent >= 0 {
                return if numer == 0 { 0 } else { saturated };
            }
            // The divisor exceeds 2^64 > |self|, so the quotient lies strictly inside (-1, 1).
            return match numer.signum() {
                -1 if !round_up => -1,
                1 if round_up => 1,
                _ => 0,
            };
        };
        let floor = numer.div_euclid(denom);
        let rounded = if round_up && numer.rem_euclid(denom) != 0 {
            floor + 1
        } else {
            floor
        };
        i64::try_from(rounded).unwrap_or(saturated)
    }

    /// The time `index * 2^-exponent`.
    ///
    /// # Panics
    ///
    /// Panics if the result does not fit, which needs an `index` beyond `2^63 >> -exponent`.
    #[must_use]
    pub fn from_scaled(index: i64, exponent: i32) -> Self {
        if exponent >= 0 {
            Self::from_parts(0, index.into(), 1_i128 << exponent)
        } else {
            Self::from_parts(0, i128::from(index) << -exponent, 1)
        }
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Zero for RationalTime {
    fn zero() -> Self {
        Self::ZERO
    }

    fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RationalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.whole.cmp(&other.whole).then_with(|| {
            let lhs = self.numerator as i128 * other.denominator as i128;
            let rhs = other.numerator as i128 * self.denominator as i128;
            lhs.cmp(&rhs)
        })
    }
}

/// Adds two times.
///
/// # Panics
///
/// Panics if the sum does not fit, like the arithmetic of [`Ratio`]. Use
/// [`RationalTime::checked_add`] where times come from outside.
impl Add for RationalTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        match self.checked_add(rhs) {
            Ok(time) => time,
            Err(err) => panic!("{err}: {self} + {rhs}"),
        }
    }
}

/// Subtracts two times.
///
/// # Panics
///
/// Panics if the difference does not fit. See [`RationalTime::checked_sub`].
impl Sub for RationalTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        match self.checked_sub(rhs) {
            Ok(time) => time,
            Err(err) => panic!("{err}: {self} - {rhs}"),
        }
    }
}

impl Neg for RationalTime {
    type Output = Self;

    fn neg(self) -> Self {
        match self.checked_neg() {
            Ok(time) => time,
            Err(err) => panic!("{err}: -({self})"),
        }
    }
}

impl AddAssign for RationalTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for RationalTime {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl From<i64> for RationalTime {
    fn from(value: i64) -> Self {
        Self::from_beats(value)
    }
}

impl TryFrom<[i64; 3]> for RationalTime {
    type Error = TimeError;

    fn try_from([whole, numerator, denominator]: [i64; 3]) -> Result<Self, Self::Error> {
        Self::new(whole, numerator, denominator)
    }
}

impl From<RationalTime> for [i64; 3] {
    fn from(value: RationalTime) -> Self {
        [value.whole, value.numerator, value.denominator]
    }
}

impl TryFrom<RationalTime> for Ratio<i64> {
    type Error = TimeError;

    fn try_from(value: RationalTime) -> Result<Self, Self::Error> {
        value.to_ratio().ok_or(TimeError::Overflow)
    }
}

impl fmt::Debug for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RationalTime({}:{}/{})",
            self.whole, self.numerator, self.denominator
        )
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.numerator == 0 {
            write!(f, "{}", self.whole)
        } else {
            write!(f, "{}+{}/{}", self.whole, self.numerator, self.denominator)
        }
    }
}

/// Shorthand for [`RationalTime::new`] in places where the denominator is a known constant.
///
/// # Panics
///
/// Panics if `denominator` is zero.
#[must_use]
pub fn beats(whole: i64, numerator: i64, denominator: i64) -> RationalTime {
    match RationalTime::new(whole, numerator, denominator) {
        Ok(time) => time,
        Err(err) => panic!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let time = beats(0, 5, 2);
        assert_eq!(
            (time.whole(), time.numerator(), time.denominator()),
            (2, 1, 2)
        );

        let time = beats(1, 4, 8);
        assert_eq!(
            (time.whole(), time.numerator(), time.denominator()),
            (1, 1, 2)
        );

        let time = beats(3, 0, 7);
        assert_eq!(
            (time.whole(), time.numerator(), time.denominator()),
            (3, 0, 1)
        );

        let time = beats(0, -1, 2);
        assert_eq!(
            (time.whole(), time.numerator(), time.denominator()),
            (-1, 1, 2)
        );

        let time = beats(2, 1, -3);
        assert_eq!(
            (time.whole(), time.numerator(), time.denominator()),
            (1, 2, 3)
        );
    }

    #[test]
    fn test_zero_denominator() {
        assert_eq!(
            RationalTime::new(1, 2, 0),
            Err(TimeError::ZeroDenominator {
                whole: 1,
                numerator: 2
            })
        );
    }

    #[test]
    fn test_ordering_is_exact() {
        let third = beats(0, 1, 3);
        let almost = beats(0, 333_333, 1_000_000);
        assert!(almost < third);
        assert!(beats(1, 2, 4) == beats(1, 1, 2));
        assert!(beats(-1, 1, 2) < RationalTime::ZERO);
        assert!(beats(2, 0, 1) > beats(1, 99, 100));
    }

    #[test]
    fn test_add_sub() {
        let a = beats(1, 1, 3);
        let b = beats(0, 3, 4);
        assert_eq!(a + b, beats(2, 1, 12));
        assert_eq!((a + b) - b, a);
        assert_eq!(a - a, RationalTime::ZERO);
        assert_eq!(b - a, beats(0, -7, 12));
    }

    #[test]
    fn test_scale_and_ratio() {
        let dur = beats(3, 0, 1);
        assert_eq!(dur.scale(Ratio::new(1, 2)), beats(1, 1, 2));
        assert_eq!(beats(1, 1, 2).ratio_to(beats(3, 0, 1)), Some(Ratio::new(1, 2)));
        assert_eq!(dur.ratio_to(RationalTime::ZERO), None);
    }

    #[test]
    fn test_scaled_floor_ceil() {
        let time = beats(2, 1, 3);
        // 7/3 * 4 = 28/3 = 9.33
        assert_eq!(time.scaled_floor(2), 9);
        assert_eq!(time.scaled_ceil(2), 10);
        // 7/3 / 2 = 1.16
        assert_eq!(time.scaled_floor(-1), 1);
        assert_eq!(time.scaled_ceil(-1), 2);
        assert_eq!(beats(-1, 1, 2).scaled_floor(0), -1);
        assert_eq!(beats(4, 0, 1).scaled_ceil(-2), 1);
        assert_eq!(RationalTime::from_scaled(3, 2), beats(0, 3, 4));
        assert_eq!(RationalTime::from_scaled(3, -2), beats(12, 0, 1));
    }

    #[test]
    fn test_coprime_denominators_overflow() {
        let a = beats(0, 1, 4_000_000_007);
        let b = beats(0, 1, 4_000_000_009);
        assert_eq!(a.checked_add(b), Err(TimeError::Overflow));
        assert_eq!(a.checked_sub(b), Err(TimeError::Overflow));
        assert_eq!(a.checked_scale(Ratio::new(1, 4_000_000_009)), Err(TimeError::Overflow));
        assert_eq!(RationalTime::new(i64::MAX, 3, 2), Err(TimeError::Overflow));
        assert_eq!(
            Ratio::<i64>::try_from(beats(i64::MAX, 1, 2)),
            Err(TimeError::Overflow)
        );

        // Small inputs go through the same path as the operators.
        assert_eq!(beats(1, 1, 3).checked_add(beats(0, 3, 4)), Ok(beats(2, 1, 12)));
        assert_eq!(beats(0, 3, 4).checked_sub(beats(1, 1, 3)), Ok(beats(0, -7, 12)));
        assert_eq!(beats(3, 0, 1).checked_scale(Ratio::new(1, 2)), Ok(beats(1, 1, 2)));
    }

    #[test]
    #[should_panic(expected = "overflowed")]
    fn test_add_operator_panics_on_overflow() {
        let _ = beats(0, 1, 4_000_000_007) + beats(0, 1, 4_000_000_009);
    }

    #[test]
    fn test_unmeasurable_progress_is_approximated() {
        let start = beats(0, 1, 4_000_000_007);
        let end = beats(1, 1, 4_000_000_009);
        let middle = beats(0, 1, 2);
        let progress = middle.progress_in(start, end).unwrap();
        assert!((progress.to_f64().unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(middle.progress_in(end, end), None);
        assert_eq!(
            beats(1, 0, 1).progress_in(beats(0, 0, 1), beats(4, 0, 1)),
            Some(Ratio::new(1, 4))
        );
    }

    #[test]
    fn test_scaled_saturates() {
        let huge = beats(i64::MAX, 0, 1);
        assert_eq!(huge.scaled_floor(4), i64::MAX);
        assert_eq!((-huge).scaled_ceil(4), i64::MIN);
        assert_eq!(huge.scaled_floor(200), i64::MAX);
        assert_eq!(beats(0, 1, 3).scaled_floor(-200), 0);
        assert_eq!(beats(0, 1, 3).scaled_ceil(-200), 1);
        assert_eq!(beats(0, -1, 3).scaled_floor(-200), -1);
        assert_eq!(RationalTime::ZERO.scaled_ceil(200), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(beats(1, 1, 2).to_string(), "1+1/2");
        assert_eq!(beats(4, 0, 1).to_string(), "4");
    }
}
