//! Score arithmetic shared by the session and its tests.
//!
//! All scores are percentages in [0, 100].

use crate::util::clamp_percent;

/// `round(100 * correct / total)`; 0 for an empty set.
pub fn mcq_score(correct: usize, total: usize) -> f64 {
  if total == 0 {
    return 0.0;
  }
  (100.0 * correct as f64 / total as f64).round()
}

/// Mean of the finite scores, 0 when there are none.
pub fn mean_score(scores: &[f64]) -> f64 {
  let valid: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
  if valid.is_empty() {
    return 0.0;
  }
  clamp_percent(valid.iter().sum::<f64>() / valid.len() as f64)
}
