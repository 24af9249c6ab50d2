/// X (seconds) and Y (level) bounds for the difficulty chart
pub fn compute_chart_params(points: &[(f64, f64)], elapsed_secs: f64) -> (f64, f64) {
    let highest = points.iter().map(|&(_, level)| level).fold(1.0, f64::max);
    let duration = points
        .last()
        .map_or(elapsed_secs, |&(t, _)| t.max(elapsed_secs))
        .max(1.0);
    (duration, highest.round())
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
