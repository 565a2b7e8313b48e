use crate::config::SearchOpt;

pub const DEFAULT_MAX_DRIFT: i64 = 500;
pub const DEFAULT_MAX_SKEW: f64 = 0.25;

/// Decides whether a match `(q, s)` sits on the same approximate diagonal as
/// a seed `(q0, s0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collinearity {
    /// Largest tolerated `|dq - ds|`.
    pub max_drift: i64,
    /// Largest tolerated `|dq / ds - 1|` (exclusive).
    pub max_skew: f64,
}

impl Default for Collinearity {
    fn default() -> Self {
        Self { max_drift: DEFAULT_MAX_DRIFT, max_skew: DEFAULT_MAX_SKEW }
    }
}

impl Collinearity {
    pub fn from_opt(opt: &SearchOpt) -> Self {
        Self { max_drift: opt.max_drift, max_skew: opt.max_skew }
    }

    #[inline]
    pub fn is_related(&self, q: i64, s: i64, q0: i64, s0: i64) -> bool {
        if q == q0 && s == s0 {
            return true;
        }
        let before = q < q0 && s < s0;
        let after = q > q0 && s > s0;
        if !(before || after) {
            return false;
        }
        let dq = q0 - q;
        let ds = s0 - s;
        if (dq - ds).abs() > self.max_drift {
            return false;
        }
        let skew = (dq as f64 / ds as f64 - 1.0).abs();
        skew < self.max_skew
    }
}

/// [`Collinearity::is_related`] with the default tolerances.
#[inline]
pub fn is_related(q: i64, s: i64, q0: i64, s0: i64) -> bool {
    Collinearity::default().is_related(q, s, q0, s0)
}
