//! Field-level patches against cached records.
//!
//! A patch is a JSON object whose top-level keys name fields of the record. Each key replaces
//! the field wholesale: arrays and nested objects are not merged, and `null` clears an
//! optional field. The id cannot be changed and unknown keys are rejected.

use super::{CoordinatorError, CoordinatorResult};
use crate::model::Entity;
use serde_json::{Map, Value};

pub fn apply_patch<T: Entity>(current: &T, fields: &Map<String, Value>) -> CoordinatorResult<T> {
    let mut value =
        serde_json::to_value(current).map_err(|e| CoordinatorError::Serialization(e.to_string()))?;
    let Value::Object(object) = &mut value else {
        return Err(CoordinatorError::Serialization(format!(
            "{} does not serialize to an object",
            T::KIND
        )));
    };

    for (key, new_value) in fields {
        if key == "id" {
            if new_value.as_str() != Some(current.id()) {
                return Err(CoordinatorError::InvalidPatch(format!(
                    "cannot change the id of {} {}",
                    T::KIND,
                    current.id()
                )));
            }
            continue;
        }
        match object.get_mut(key) {
            Some(slot) => *slot = new_value.clone(),
            None => {
                return Err(CoordinatorError::InvalidPatch(format!(
                    "{} has no field `{key}`",
                    T::KIND
                )));
            }
        }
    }

    serde_json::from_value(value).map_err(|e| CoordinatorError::InvalidPatch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonPlan, LessonQuestion};
    use serde_json::json;

    fn question() -> LessonQuestion {
        let mut plan = LessonPlan::new("t@example.com", "Plan");
        plan.set_id("p1".to_string());
        let mut question = LessonQuestion::new(&plan, "Original");
        question.set_id("q1".to_string());
        question.categorization_guidance = Some("by shape".to_string());
        question.media_content_urls = vec!["a.png".to_string(), "b.png".to_string()];
        question
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_patch_replaces_top_level_fields() {
        let patched = apply_patch(
            &question(),
            &fields(json!({
                "body_text": "Updated",
                "media_content_urls": ["c.png"],
                "categorization_guidance": null
            })),
        )
        .unwrap();

        assert_eq!(patched.body_text, "Updated");
        assert_eq!(patched.media_content_urls, vec!["c.png".to_string()]);
        assert_eq!(patched.categorization_guidance, None);
        assert_eq!(patched.lesson_plan_id, "p1");
    }

    #[test]
    fn test_patch_rejects_id_change() {
        let err = apply_patch(&question(), &fields(json!({ "id": "q2" }))).unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidPatch(_)));
        assert!(apply_patch(&question(), &fields(json!({ "id": "q1" }))).is_ok());
    }

    #[test]
    fn test_patch_rejects_unknown_and_mistyped_fields() {
        let unknown = apply_patch(&question(), &fields(json!({ "bodyText": "x" })));
        assert!(matches!(unknown, Err(CoordinatorError::InvalidPatch(_))));

        let mistyped = apply_patch(&question(), &fields(json!({ "body_text": 42 })));
        assert!(matches!(mistyped, Err(CoordinatorError::InvalidPatch(_))));
    }
}
