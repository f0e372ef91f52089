//! Editable entities persisted through the gateway.
//!
//! Every record is identified by a client-assigned id that never changes, is owned by a
//! teacher, and carries creation/update timestamps. The "with children" shapes returned by
//! some gateway endpoints are modelled as separate hydrated types rather than optional fields
//! on the base records; the coordinator only ever accepts base records.

mod class;
mod lesson;
mod lesson_plan;
mod teacher;

pub use class::{Class, ClassWithStudents, Student};
pub use lesson::{
    LESSON_CODE_LEN, Lesson, LessonQuestionAnalysis, LessonResponse, LessonResponseAnalysis,
    LessonWithResponses,
};
pub use lesson_plan::{LessonPlan, LessonPlanWithQuestions, LessonQuestion};
pub use teacher::{Teacher, TeacherData, TeacherRecords};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::fmt::Debug;
use uuid::Uuid;

/// Timestamps are UTC and serialize as RFC 3339.
pub type Timestamp = DateTime<Utc>;

/// How an entity is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Drop from the cache and call the delete endpoint.
    Hard,
    /// Set the `deleted` flag and persist it; the record stays resolvable by id.
    Tombstone,
}

/// A record subject to optimistic local-then-remote mutation.
pub trait Entity: Clone + PartialEq + Debug + Serialize + DeserializeOwned + 'static {
    /// Human-readable kind, used in logs and errors.
    const KIND: &'static str;
    /// Endpoint that creates or replaces a record.
    const PUT_ENDPOINT: &'static str;
    /// Endpoint that removes a record (hard-delete entities only).
    const DELETE_ENDPOINT: &'static str;
    /// Endpoint that returns every record visible to the signed-in teacher.
    const LIST_ENDPOINT: &'static str;
    const DELETE_POLICY: DeletePolicy = DeletePolicy::Hard;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    /// Fresh collision-resistant identifier.
    fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn created_at(&self) -> Timestamp;
    fn set_created_at(&mut self, at: Timestamp);
    fn updated_at(&self) -> Timestamp;
    fn set_updated_at(&mut self, at: Timestamp);

    fn is_deleted(&self) -> bool {
        false
    }

    /// Set the tombstone flag. No-op for hard-delete entities.
    fn mark_deleted(&mut self) {}

    /// Request body for the delete endpoint.
    fn delete_payload(&self) -> Value {
        json!({ "id": self.id() })
    }
}

/// Whether two records are equal apart from their timestamps.
pub fn same_content<T: Entity>(a: &T, b: &T) -> bool {
    let mut a = a.clone();
    a.set_created_at(b.created_at());
    a.set_updated_at(b.updated_at());
    a == *b
}

/// Sort newest first by creation time.
pub fn sort_newest_first<T: Entity>(records: &mut [T]) {
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

/// Implements the id/timestamp plumbing of [`Entity`] for a struct with `id`, `created_at`
/// and `updated_at` fields. Extra trait items can follow the endpoint list.
macro_rules! impl_entity {
    (
        $ty:ident {
            kind: $kind:literal,
            put: $put:literal,
            delete: $delete:literal,
            list: $list:literal $(,)?
        }
        $($extra:tt)*
    ) => {
        impl $crate::model::Entity for $ty {
            const KIND: &'static str = $kind;
            const PUT_ENDPOINT: &'static str = $put;
            const DELETE_ENDPOINT: &'static str = $delete;
            const LIST_ENDPOINT: &'static str = $list;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn created_at(&self) -> $crate::model::Timestamp {
                self.created_at
            }

            fn set_created_at(&mut self, at: $crate::model::Timestamp) {
                self.created_at = at;
            }

            fn updated_at(&self) -> $crate::model::Timestamp {
                self.updated_at
            }

            fn set_updated_at(&mut self, at: $crate::model::Timestamp) {
                self.updated_at = at;
            }

            $($extra)*
        }
    };
}

pub(crate) use impl_entity;
