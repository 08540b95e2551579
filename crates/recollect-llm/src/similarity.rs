/// Cosine similarity between two embeddings, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty or mismatched-length inputs rather than panicking
/// — callers hold vectors read back from the store, whose dimension is
/// already validated at write time, so a mismatch here signals store
/// corruption rather than a condition worth propagating as an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.is_empty() || b.is_empty() || a.len() != b.len() {
    return 0.0;
  }

  let mut dot = 0.0_f64;
  let mut norm_a = 0.0_f64;
  let mut norm_b = 0.0_f64;

  for (&x, &y) in a.iter().zip(b.iter()) {
    let x = x as f64;
    let y = y as f64;
    dot = x.mul_add(y, dot);
    norm_a = x.mul_add(x, norm_a);
    norm_b = y.mul_add(y, norm_b);
  }

  let denom = norm_a.sqrt() * norm_b.sqrt();
  if denom < 1e-12 {
    return 0.0;
  }

  (dot / denom) as f32
}

/// Cosine distance, `1.0 - cosine_similarity`, the quantity `Filter::distance`
/// bounds (§4.5).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
  1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identical_vectors_have_zero_distance() {
    let v = vec![0.1, 0.2, 0.3, 0.4];
    assert!(cosine_distance(&v, &v) < 1e-6);
  }

  #[test]
  fn orthogonal_vectors_have_unit_distance() {
    let a = vec![1.0, 0.0];
    let b = vec![0.0, 1.0];
    assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn mismatched_lengths_fall_back_to_zero_similarity() {
    let a = vec![1.0, 0.0];
    let b = vec![1.0, 0.0, 0.0];
    assert_eq!(cosine_similarity(&a, &b), 0.0);
  }
}
