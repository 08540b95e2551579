use recollect_model::Filter;

use crate::object::StoredObject;

/// Whether `object` satisfies every constraint `filter` sets (§4.5). An unset
/// field never excludes a candidate.
#[must_use]
pub fn matches_filter(object: &StoredObject, filter: &Filter) -> bool {
  if let Some(source) = filter.source {
    if object.source() != source {
      return false;
    }
  }
  if let Some(category) = filter.fact_category {
    if object.category() != category {
      return false;
    }
  }
  if let Some(subject) = &filter.fact_subject {
    if object.subject() != subject {
      return false;
    }
  }
  if let Some(attribute) = &filter.fact_attribute {
    if object.attribute() != attribute {
      return false;
    }
  }
  if let Some(value) = &filter.fact_value {
    if !object.value().to_lowercase().contains(&value.to_lowercase()) {
      return false;
    }
  }
  if let Some(sensitivity) = filter.fact_sensitivity {
    if object.sensitivity() != sensitivity {
      return false;
    }
  }
  if let Some(temporal_context) = &filter.fact_temporal_context {
    let matches = object
      .temporal_context()
      .is_some_and(|tc| tc.to_lowercase().contains(&temporal_context.to_lowercase()));
    if !matches {
      return false;
    }
  }
  if let Some(importance) = filter.fact_importance {
    if object.importance() != importance {
      return false;
    }
  }
  if let Some(min) = filter.fact_importance_min {
    if object.importance() < min {
      return false;
    }
  }
  if let Some(max) = filter.fact_importance_max {
    if object.importance() > max {
      return false;
    }
  }
  if let Some(after) = filter.timestamp_after {
    if object.timestamp() < after {
      return false;
    }
  }
  if let Some(before) = filter.timestamp_before {
    if object.timestamp() > before {
      return false;
    }
  }
  true
}
