//! Plateau detection shared by the GA and PSO runners.

/// True when the best fitness over the last `window` records spans less
/// than `threshold`. A zero window never converges.
pub(crate) fn has_converged<T>(
    history: &[T],
    window: usize,
    threshold: f64,
    best: impl Fn(&T) -> f64,
) -> bool {
    if window == 0 || history.len() < window {
        return false;
    }
    let (min, max) = history[history.len() - window..]
        .iter()
        .map(best)
        .fold((f64::MAX, f64::MIN), |(lo, hi), f| (lo.min(f), hi.max(f)));
    max - min < threshold
}
