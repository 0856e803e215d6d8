//! Easings, the shapes interpolating between the two values of a segment.
//!
//! An easing maps progress through a segment, `[0, 1]`, to the fraction of the value change
//! applied so far. There are five kinds:
//!
//! - [`NormalEasing`], the classic named curves (numbered as in RPE charts),
//! - [`BezierEasing`], a CSS-style cubic Bézier,
//! - [`TemplateEasing`], a whole event sequence reused as a normalized shape,
//! - [`ParametricEasing`], an expression in `x`,
//! - [`SegmentedEasing`], a sub-range of another easing stretched over `[0, 1]`.

pub mod expr;
pub mod template;

use std::f64::consts::PI;
use std::rc::Rc;

use num::ToPrimitive;
use num::rational::Ratio;

use crate::error::EasingError;

pub use self::template::{TemplateEasing, TemplateEasingLib};

/// Number of Simpson intervals used to integrate easings without a closed form.
const SIMPSON_STEPS: u32 = 32;

/// The named easing curves.
///
/// The discriminants are the easing ids of RPE charts. [`NormalEasing::Fixed`] has id 0: it
/// keeps the start value for the whole segment and switches to the end value only when progress
/// reaches 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum NormalEasing {
    Fixed = 0,
    Linear = 1,
    SineOut = 2,
    SineIn = 3,
    QuadOut = 4,
    QuadIn = 5,
    SineInOut = 6,
    QuadInOut = 7,
    CubicOut = 8,
    CubicIn = 9,
    QuartOut = 10,
    QuartIn = 11,
    CubicInOut = 12,
    QuartInOut = 13,
    QuintOut = 14,
    QuintIn = 15,
    ExpoOut = 16,
    ExpoIn = 17,
    CircOut = 18,
    CircIn = 19,
    BackOut = 20,
    BackIn = 21,
    CircInOut = 22,
    BackInOut = 23,
    ElasticOut = 24,
    ElasticIn = 25,
    BounceOut = 26,
    BounceIn = 27,
    BounceInOut = 28,
    ElasticInOut = 29,
}

impl NormalEasing {
    /// Every normal easing, ordered by id.
    pub const ALL: [Self; 30] = [
        Self::Fixed,
        Self::Linear,
        Self::SineOut,
        Self::SineIn,
        Self::QuadOut,
        Self::QuadIn,
        Self::SineInOut,
        Self::QuadInOut,
        Self::CubicOut,
        Self::CubicIn,
        Self::QuartOut,
        Self::QuartIn,
        Self::CubicInOut,
        Self::QuartInOut,
        Self::QuintOut,
        Self::QuintIn,
        Self::ExpoOut,
        Self::ExpoIn,
        Self::CircOut,
        Self::CircIn,
        Self::BackOut,
        Self::BackIn,
        Self::CircInOut,
        Self::BackInOut,
        Self::ElasticOut,
        Self::ElasticIn,
        Self::BounceOut,
        Self::BounceIn,
        Self::BounceInOut,
        Self::ElasticInOut,
    ];

    /// The RPE id of this easing.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Evaluates the curve at `x` in `[0, 1]`.
    #[must_use]
    pub fn ease(self, x: f64) -> f64 {
        const C1: f64 = 1.70158;
        const C2: f64 = C1 * 1.525;
        const C3: f64 = C1 + 1.0;
        const C4: f64 = 2.0 * PI / 3.0;
        const C5: f64 = 2.0 * PI / 4.5;
        match self {
            Self::Fixed => {
                if x >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Linear => x,
            Self::SineOut => (x * PI / 2.0).sin(),
            Self::SineIn => 1.0 - (x * PI / 2.0).cos(),
            Self::SineInOut => -((PI * x).cos() - 1.0) / 2.0,
            Self::QuadIn => x * x,
            Self::QuadOut => 1.0 - (1.0 - x).powi(2),
            Self::QuadInOut => in_out(x, 2.0, 2),
            Self::CubicIn => x.powi(3),
            Self::CubicOut => 1.0 - (1.0 - x).powi(3),
            Self::CubicInOut => in_out(x, 4.0, 3),
            Self::QuartIn => x.powi(4),
            Self::QuartOut => 1.0 - (1.0 - x).powi(4),
            Self::QuartInOut => in_out(x, 8.0, 4),
            Self::QuintIn => x.powi(5),
            Self::QuintOut => 1.0 - (1.0 - x).powi(5),
            Self::ExpoIn => {
                if x <= 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * x - 10.0)
                }
            }
            Self::ExpoOut => {
                if x >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * x)
                }
            }
            Self::CircIn => 1.0 - (1.0 - x * x).max(0.0).sqrt(),
            Self::CircOut => (1.0 - (x - 1.0).powi(2)).max(0.0).sqrt(),
            Self::CircInOut => {
                if x < 0.5 {
                    (1.0 - (1.0 - (2.0 * x).powi(2)).max(0.0).sqrt()) / 2.0
                } else {
                    ((1.0 - (-2.0 * x + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
                }
            }
            Self::BackIn => C3 * x.powi(3) - C1 * x * x,
            Self::BackOut => 1.0 + C3 * (x - 1.0).powi(3) + C1 * (x - 1.0).powi(2),
            Self::BackInOut => {
                if x < 0.5 {
                    (2.0 * x).powi(2) * ((C2 + 1.0) * 2.0 * x - C2) / 2.0
                } else {
                    ((2.0 * x - 2.0).powi(2) * ((C2 + 1.0) * (x * 2.0 - 2.0) + C2) + 2.0) / 2.0
                }
            }
            Self::ElasticIn => match x {
                x if x <= 0.0 => 0.0,
                x if x >= 1.0 => 1.0,
                x => -(2f64.powf(10.0 * x - 10.0)) * ((x * 10.0 - 10.75) * C4).sin(),
            },
            Self::ElasticOut => match x {
                x if x <= 0.0 => 0.0,
                x if x >= 1.0 => 1.0,
                x => 2f64.powf(-10.0 * x) * ((x * 10.0 - 0.75) * C4).sin() + 1.0,
            },
            Self::ElasticInOut => match x {
                x if x <= 0.0 => 0.0,
                x if x >= 1.0 => 1.0,
                x if x < 0.5 => -(2f64.powf(20.0 * x - 10.0) * ((20.0 * x - 11.125) * C5).sin()) / 2.0,
                x => 2f64.powf(-20.0 * x + 10.0) * ((20.0 * x - 11.125) * C5).sin() / 2.0 + 1.0,
            },
            Self::BounceOut => bounce_out(x),
            Self::BounceIn => 1.0 - bounce_out(1.0 - x),
            Self::BounceInOut => {
                if x < 0.5 {
                    (1.0 - bounce_out(1.0 - 2.0 * x)) / 2.0
                } else {
                    (1.0 + bounce_out(2.0 * x - 1.0)) / 2.0
                }
            }
        }
    }

    /// `∫₀ˣ ease`, in closed form where one is at hand.
    fn closed_area(self, x: f64) -> Option<f64> {
        match self {
            Self::Fixed => Some(0.0),
            Self::Linear => Some(x * x / 2.0),
            Self::QuadIn => Some(x.powi(3) / 3.0),
            Self::CubicIn => Some(x.powi(4) / 4.0),
            Self::QuartIn => Some(x.powi(5) / 5.0),
            Self::QuintIn => Some(x.powi(6) / 6.0),
            Self::SineOut => Some((1.0 - (x * PI / 2.0).cos()) * 2.0 / PI),
            Self::SineIn => Some(x - (x * PI / 2.0).sin() * 2.0 / PI),
            _ => None,
        }
    }
}

impl TryFrom<u8> for NormalEasing {
    type Error = EasingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(EasingError::UnknownNormal(value))
    }
}

fn in_out(x: f64, factor: f64, power: i32) -> f64 {
    if x < 0.5 {
        factor * x.powi(power)
    } else {
        1.0 - (-2.0 * x + 2.0).powi(power) / 2.0
    }
}

fn bounce_out(x: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;
    if x < 1.0 / D1 {
        N1 * x * x
    } else if x < 2.0 / D1 {
        let x = x - 1.5 / D1;
        N1 * x * x + 0.75
    } else if x < 2.5 / D1 {
        let x = x - 2.25 / D1;
        N1 * x * x + 0.9375
    } else {
        let x = x - 2.625 / D1;
        N1 * x * x + 0.984375
    }
}

/// A cubic Bézier easing through `(0, 0)`, two control points and `(1, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BezierEasing {
    /// First control point.
    pub control_1: (f64, f64),
    /// Second control point.
    pub control_2: (f64, f64),
}

impl BezierEasing {
    /// Creates a Bézier easing from its control points.
    #[must_use]
    pub const fn new(control_1: (f64, f64), control_2: (f64, f64)) -> Self {
        Self {
            control_1,
            control_2,
        }
    }

    fn coordinate(t: f64, p1: f64, p2: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
    }

    fn slope(t: f64, p1: f64, p2: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * p1 + 6.0 * u * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
    }

    /// Solves the curve parameter whose x coordinate is `x`.
    fn solve_t(&self, x: f64) -> f64 {
        let (x1, x2) = (self.control_1.0, self.control_2.0);
        let mut t = x;
        for _ in 0..8 {
            let error = Self::coordinate(t, x1, x2) - x;
            if error.abs() < 1e-9 {
                return t;
            }
            let slope = Self::slope(t, x1, x2);
            if slope.abs() < 1e-6 {
                break;
            }
            t -= error / slope;
        }
        // Newton stalled, fall back to bisection.
        let (mut low, mut high) = (0.0, 1.0);
        t = x;
        for _ in 0..64 {
            let value = Self::coordinate(t, x1, x2);
            if (value - x).abs() < 1e-9 {
                break;
            }
            if value < x {
                low = t;
            } else {
                high = t;
            }
            t = (low + high) / 2.0;
        }
        t
    }

    /// Evaluates the curve at `x` in `[0, 1]`.
    #[must_use]
    pub fn ease(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        let t = self.solve_t(x);
        Self::coordinate(t, self.control_1.1, self.control_2.1)
    }
}

/// An easing given as an expression in `x`, such as `x^2` or `1 - cos(x * pi / 2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParametricEasing {
    source: String,
    expr: expr::Expr,
}

impl ParametricEasing {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns [`EasingError::Expression`] if `source` is not a valid expression.
    pub fn parse(source: &str) -> Result<Self, EasingError> {
        let expr = expr::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// The source text of the expression.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression at `x`.
    #[must_use]
    pub fn ease(&self, x: f64) -> f64 {
        self.expr.eval(x)
    }
}

/// The part `[left, right]` of another easing, stretched and normalized over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedEasing {
    inner: Box<Easing>,
    left: f64,
    right: f64,
}

impl SegmentedEasing {
    /// Wraps `inner`, keeping only its `[left, right]` part.
    ///
    /// # Errors
    ///
    /// Returns [`EasingError::SegmentRange`] unless `0 <= left < right <= 1`.
    pub fn new(inner: Easing, left: f64, right: f64) -> Result<Self, EasingError> {
        if !(0.0..1.0).contains(&left) || !(left < right && right <= 1.0) {
            return Err(EasingError::SegmentRange {
                left: left.to_string(),
                right: right.to_string(),
            });
        }
        Ok(Self {
            inner: Box::new(inner),
            left,
            right,
        })
    }

    /// The wrapped easing.
    #[must_use]
    pub fn inner(&self) -> &Easing {
        &self.inner
    }

    /// The kept range.
    #[must_use]
    pub const fn range(&self) -> (f64, f64) {
        (self.left, self.right)
    }

    /// Evaluates the remapped easing at `x`.
    #[must_use]
    pub fn ease(&self, x: f64) -> f64 {
        let low = self.inner.ease_scalar(self.left);
        let high = self.inner.ease_scalar(self.right);
        let delta = high - low;
        if delta.abs() < f64::EPSILON {
            return x;
        }
        let value = self
            .inner
            .ease_scalar(self.left + x * (self.right - self.left));
        (value - low) / delta
    }
}

/// Any easing.
#[derive(Debug, Clone, PartialEq)]
pub enum Easing {
    /// A named curve.
    Normal(NormalEasing),
    /// A cubic Bézier curve.
    Bezier(BezierEasing),
    /// A reusable event sequence.
    Template(Rc<TemplateEasing>),
    /// An expression in `x`.
    Parametric(ParametricEasing),
    /// A sub-range of another easing.
    Segmented(SegmentedEasing),
}

impl Default for Easing {
    fn default() -> Self {
        Self::LINEAR
    }
}

impl From<NormalEasing> for Easing {
    fn from(value: NormalEasing) -> Self {
        Self::Normal(value)
    }
}

impl Easing {
    /// Straight interpolation.
    pub const LINEAR: Self = Self::Normal(NormalEasing::Linear);

    /// Keeps the start value until the very end of the segment.
    pub const FIXED: Self = Self::Normal(NormalEasing::Fixed);

    /// Whether this is the fixed easing.
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        matches!(self, Self::Normal(NormalEasing::Fixed))
    }

    /// Evaluates at an exact progress through the segment.
    ///
    /// Template easings look their sub-sequence up at an exact time, other kinds evaluate in
    /// floating point.
    #[must_use]
    pub fn ease(&self, progress: Ratio<i64>) -> f64 {
        match self {
            Self::Template(template) => template.ease(progress),
            other => other.ease_scalar(progress.to_f64().unwrap_or(0.0)),
        }
    }

    /// Evaluates at a floating progress through the segment.
    #[must_use]
    pub fn ease_scalar(&self, x: f64) -> f64 {
        match self {
            Self::Normal(normal) => normal.ease(x),
            Self::Bezier(bezier) => bezier.ease(x),
            Self::Template(template) => template.ease_scalar(x),
            Self::Parametric(parametric) => parametric.ease(x),
            Self::Segmented(segmented) => segmented.ease(x),
        }
    }

    /// `∫₀ˣ ease`, the area under the easing up to progress `x`.
    #[must_use]
    pub fn area(&self, x: f64) -> f64 {
        if let Self::Normal(normal) = self {
            if let Some(area) = normal.closed_area(x) {
                return area;
            }
        }
        if x == 0.0 {
            return 0.0;
        }
        let steps = SIMPSON_STEPS;
        let h = x / steps as f64;
        let sum: f64 = (0..=steps)
            .map(|i| {
                let weight = match i {
                    0 => 1.0,
                    i if i == steps => 1.0,
                    i if i % 2 == 1 => 4.0,
                    _ => 2.0,
                };
                weight * self.ease_scalar(h * i as f64)
            })
            .sum();
        sum * h / 3.0
    }
}

/// The persisted form of an [`Easing`]. Templates are referenced by name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum EasingRecord {
    /// A named curve, by RPE id.
    Normal {
        /// The RPE id.
        id: u8,
    },
    /// A cubic Bézier curve, `[x1, y1, x2, y2]`.
    Bezier {
        /// The control points.
        control: [f64; 4],
    },
    /// A template easing.
    Template {
        /// The template's name in the library.
        name: String,
    },
    /// An expression in `x`.
    Parametric {
        /// The expression source.
        expression: String,
    },
    /// A sub-range of another easing.
    Segmented {
        /// The wrapped easing.
        inner: Box<EasingRecord>,
        /// Left edge of the kept range.
        left: f64,
        /// Right edge of the kept range.
        right: f64,
    },
}

impl Default for EasingRecord {
    fn default() -> Self {
        Self::Normal {
            id: NormalEasing::Linear.id(),
        }
    }
}

impl Easing {
    /// Converts to the persisted form.
    #[must_use]
    pub fn to_record(&self) -> EasingRecord {
        match self {
            Self::Normal(normal) => EasingRecord::Normal { id: normal.id() },
            Self::Bezier(bezier) => EasingRecord::Bezier {
                control: [
                    bezier.control_1.0,
                    bezier.control_1.1,
                    bezier.control_2.0,
                    bezier.control_2.1,
                ],
            },
            Self::Template(template) => EasingRecord::Template {
                name: template.name().to_string(),
            },
            Self::Parametric(parametric) => EasingRecord::Parametric {
                expression: parametric.source().to_string(),
            },
            Self::Segmented(segmented) => EasingRecord::Segmented {
                inner: Box::new(segmented.inner.to_record()),
                left: segmented.left,
                right: segmented.right,
            },
        }
    }

    /// Resolves a persisted easing, looking templates up in `library`.
    ///
    /// # Errors
    ///
    /// Returns an [`EasingError`] for unknown ids or templates, unparsable expressions and
    /// invalid segment ranges.
    pub fn from_record(
        record: &EasingRecord,
        library: &TemplateEasingLib,
    ) -> Result<Self, EasingError> {
        Ok(match record {
            EasingRecord::Normal { id } => Self::Normal(NormalEasing::try_from(*id)?),
            EasingRecord::Bezier {
                control: [x1, y1, x2, y2],
            } => Self::Bezier(BezierEasing::new((*x1, *y1), (*x2, *y2))),
            EasingRecord::Template { name } => Self::Template(
                library
                    .get(name)
                    .ok_or_else(|| EasingError::UnknownTemplate(name.clone()))?,
            ),
            EasingRecord::Parametric { expression } => {
                Self::Parametric(ParametricEasing::parse(expression)?)
            }
            EasingRecord::Segmented { inner, left, right } => Self::Segmented(
                SegmentedEasing::new(Self::from_record(inner, library)?, *left, *right)?,
            ),
        })
    }
}

impl EasingRecord {
    /// Names of the templates this record refers to, directly or through segments.
    pub(crate) fn template_names(&self) -> Vec<&str> {
        match self {
            Self::Template { name } => vec![name.as_str()],
            Self::Segmented { inner, .. } => inner.template_names(),
            Self::Normal { .. } | Self::Bezier { .. } | Self::Parametric { .. } => Vec::new(),
        }
    }
}
