use serde::{Deserialize, Serialize};

use crate::scheduler::Millis;
use crate::staircase::Level;

/// Level after a trial, stamped with the session-relative time it was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyPoint {
    pub trial: usize,
    pub elapsed_ms: Millis,
    pub level: Level,
}

impl DifficultyPoint {
    pub fn new(trial: usize, elapsed_ms: Millis, level: Level) -> Self {
        Self {
            trial,
            elapsed_ms,
            level,
        }
    }
}

impl From<DifficultyPoint> for (f64, f64) {
    /// `(seconds, level)`, ready for a chart
    fn from(p: DifficultyPoint) -> Self {
        (p.elapsed_ms as f64 / 1_000.0, f64::from(p.level))
    }
}

/// Peak level along a trace
pub fn peak_level(trace: &[DifficultyPoint]) -> Option<Level> {
    trace.iter().map(|p| p.level).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_coordinates() {
        let point = DifficultyPoint::new(3, 4_500, 2);
        let (x, y): (f64, f64) = point.into();
        assert_eq!((x, y), (4.5, 2.0));
    }

    #[test]
    fn test_peak_level() {
        let trace = [
            DifficultyPoint::new(0, 1_000, 1),
            DifficultyPoint::new(1, 2_000, 3),
            DifficultyPoint::new(2, 3_000, 2),
        ];
        assert_eq!(peak_level(&trace), Some(3));
        assert_eq!(peak_level(&[]), None);
    }
}
