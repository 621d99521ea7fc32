//! # Primitives
//!
//! Integer score arithmetic and the hard bounds of the pipeline.
//!
//! Every quantity the pipeline reports in `[0, 1]` is carried as basis
//! points (1/10_000) so that scoring stays deterministic and free of
//! floating-point arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// BOUNDS
// =============================================================================

/// Maximum number of hops any traversal may take from its seed set.
pub const MAX_HOPS: u8 = 3;

/// Default cap on the number of nodes admitted into one `GraphContext`.
pub const DEFAULT_MAX_NODES: usize = 40;

/// Default number of keyword hits kept per unresolved entity.
pub const DEFAULT_KEYWORD_HITS: usize = 5;

/// One whole in basis points.
pub const BASIS_POINTS: u16 = 10_000;

// =============================================================================
// SCORE
// =============================================================================

/// A value in `[0, 1]`, stored as basis points.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct Score(u16);

impl Score {
    /// 0.00
    pub const ZERO: Self = Self(0);
    /// 1.00
    pub const MAX: Self = Self(BASIS_POINTS);
    /// 0.50, used wherever a signal is absent.
    pub const NEUTRAL: Self = Self(5_000);

    /// Create a score, clamping anything above one whole.
    #[must_use]
    pub const fn new(basis_points: u16) -> Self {
        if basis_points > BASIS_POINTS {
            Self(BASIS_POINTS)
        } else {
            Self(basis_points)
        }
    }

    /// Create a score from a whole percentage (0-100).
    #[must_use]
    pub const fn from_percent(percent: u8) -> Self {
        Self::new((percent as u16).saturating_mul(100))
    }

    /// `numerator / denominator`, clamped to `[0, 1]`.
    ///
    /// A zero denominator yields `Score::ZERO`.
    #[must_use]
    pub fn from_ratio(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let scaled = numerator.saturating_mul(u64::from(BASIS_POINTS)) / denominator;
        Self::new(scaled.min(u64::from(BASIS_POINTS)) as u16)
    }

    /// Raw basis points.
    #[must_use]
    pub const fn basis_points(self) -> u16 {
        self.0
    }

    /// Whole percentage, rounded down.
    #[must_use]
    pub const fn percent(self) -> u8 {
        (self.0 / 100) as u8
    }

    /// `1 - self`.
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(BASIS_POINTS.saturating_sub(self.0))
    }

    /// Halve the score (rounding down).
    #[must_use]
    pub const fn halved(self) -> Self {
        Self(self.0 / 2)
    }

    /// Contribution of this score under `weight`, in basis points.
    #[must_use]
    pub fn weighted(self, weight: Score) -> u32 {
        u32::from(self.0).saturating_mul(u32::from(weight.0)) / u32::from(BASIS_POINTS)
    }

    /// Apply a signed adjustment, saturating at both ends.
    #[must_use]
    pub fn adjusted(self, delta: ScoreDelta) -> Self {
        let value = i32::from(self.0).saturating_add(delta.0);
        Self::new(value.clamp(0, i32::from(BASIS_POINTS)) as u16)
    }

    /// Average of the given scores. Empty input yields `None`.
    #[must_use]
    pub fn mean(scores: &[Score]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let total: u64 = scores.iter().map(|s| u64::from(s.0)).sum();
        Some(Self::new((total / scores.len() as u64) as u16))
    }
}

impl TryFrom<u16> for Score {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value > BASIS_POINTS {
            Err(format!("score {value} exceeds {BASIS_POINTS} basis points"))
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Score> for u16 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / BASIS_POINTS, (self.0 % BASIS_POINTS) / 100)
    }
}

// =============================================================================
// SCORE DELTA
// =============================================================================

/// Signed adjustment to a `Score`, in basis points.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScoreDelta(pub i32);

impl ScoreDelta {
    /// No adjustment.
    pub const NONE: Self = Self(0);

    /// A penalty of `basis_points` (stored negative).
    #[must_use]
    pub const fn penalty(basis_points: u32) -> Self {
        Self(0i32.saturating_sub(basis_points as i32))
    }

    /// Sum two adjustments, never going below minus one whole.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self(
            self.0
                .saturating_add(other.0)
                .max(-i32::from(BASIS_POINTS)),
        )
    }
}

impl fmt::Display for ScoreDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "+" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 10_000, (magnitude % 10_000) / 100)
    }
}

// =============================================================================
// TESTS
// =============================================================================
