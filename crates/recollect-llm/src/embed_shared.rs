use recollect_shared::AppError;

/// Target dimension every stored embedding is normalized to, regardless of
/// what the configured embeddings model natively returns (§4.3, §4.5).
pub const TARGET_DIM: usize = 1024;

const L2_NORM_TOLERANCE: f32 = 1e-6;

/// Normalize a raw embedding to exactly [`TARGET_DIM`] L2-normalized floats.
///
/// - `dim > TARGET_DIM`: truncate, then L2 normalize.
/// - `dim == TARGET_DIM`: normalize only if not already unit length.
/// - `dim < TARGET_DIM`: the model's native dimension is too small to trust; error.
pub fn process_embedding(mut vec: Vec<f32>) -> Result<Vec<f32>, AppError> {
  match vec.len() {
    d if d > TARGET_DIM => {
      vec.truncate(TARGET_DIM);
      l2_normalize(&mut vec);
      Ok(vec)
    }
    d if d == TARGET_DIM => {
      let norm_sq: f32 = vec.iter().map(|x| x * x).sum();
      if (norm_sq - 1.0).abs() > L2_NORM_TOLERANCE {
        l2_normalize(&mut vec);
      }
      Ok(vec)
    }
    d => Err(AppError::new(anyhow::anyhow!(
      "embedding dimension {d} is less than required {TARGET_DIM}"
    ))),
  }
}

fn l2_normalize(vec: &mut [f32]) {
  let norm_sq: f32 = vec.iter().map(|x| x * x).sum();
  let norm = norm_sq.sqrt();
  if norm > 1e-12 {
    for x in vec.iter_mut() {
      *x /= norm;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncates_and_renormalizes_oversized_vectors() {
    let raw = vec![1.0_f32; TARGET_DIM + 500];
    let processed = process_embedding(raw).unwrap();
    assert_eq!(processed.len(), TARGET_DIM);
    let norm_sq: f32 = processed.iter().map(|x| x * x).sum();
    assert!((norm_sq - 1.0).abs() < 1e-4);
  }

  #[test]
  fn rejects_undersized_vectors() {
    let raw = vec![1.0_f32; TARGET_DIM - 1];
    assert!(process_embedding(raw).is_err());
  }
}
