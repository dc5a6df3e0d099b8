/// Monotonic percentage clamp shared by the streaming phases.
///
/// Raw progress heuristics can regress when a malformed partial shrinks the
/// observed chapter count; the stream contract says the percentage never
/// decreases, so [`advance`](ProgressGauge::advance) clamps each reading to
/// the running peak and to the [0, 100] range.
///
/// # Examples
///
/// ```
/// use courseforge::events::ProgressGauge;
///
/// let mut gauge = ProgressGauge::new();
/// assert_eq!(gauge.advance(40.0), 40.0);
/// assert_eq!(gauge.advance(65.0), 65.0);
/// // A regressing reading is held at the previous peak.
/// assert_eq!(gauge.advance(50.0), 65.0);
/// // Readings are bounded to 100.
/// assert_eq!(gauge.advance(150.0), 100.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgressGauge {
    peak: f64,
}

impl ProgressGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw reading; returns the clamped, non-decreasing percentage.
    pub fn advance(&mut self, raw: f64) -> f64 {
        let clamped = if raw.is_finite() {
            raw.clamp(0.0, 100.0)
        } else {
            0.0
        };
        if clamped > self.peak {
            self.peak = clamped;
        }
        self.peak
    }

    /// Highest percentage observed so far.
    pub fn peak(&self) -> f64 {
        self.peak
    }
}
