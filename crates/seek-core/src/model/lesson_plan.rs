use super::{Timestamp, impl_entity};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// An ordered set of questions a teacher can run as lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub id: String,
    pub teacher_email: String,
    pub title: String,
    #[serde(default)]
    pub published: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LessonPlan {
    pub fn new(teacher_email: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            teacher_email: teacher_email.into(),
            title: title.into(),
            published: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl_entity!(LessonPlan {
    kind: "lesson plan",
    put: "putLessonPlan",
    delete: "deleteLessonPlan",
    list: "getLessonPlans",
});

/// A single prompt within a lesson plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonQuestion {
    pub id: String,
    pub lesson_plan_id: String,
    pub teacher_email: String,
    pub body_text: String,
    /// Hints for grouping student responses.
    #[serde(default)]
    pub categorization_guidance: Option<String>,
    #[serde(default)]
    pub media_content_urls: Vec<String>,
    #[serde(default)]
    pub context_material_urls: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LessonQuestion {
    pub fn new(plan: &LessonPlan, body_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            lesson_plan_id: plan.id.clone(),
            teacher_email: plan.teacher_email.clone(),
            body_text: body_text.into(),
            categorization_guidance: None,
            media_content_urls: Vec::new(),
            context_material_urls: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl_entity!(LessonQuestion {
    kind: "lesson question",
    put: "putLessonQuestion",
    delete: "deleteLessonQuestion",
    list: "getLessonQuestions",
}
    // Questions are stored under their plan, so the parent id travels with the delete.
    fn delete_payload(&self) -> Value {
        json!({ "id": self.id, "lesson_plan_id": self.lesson_plan_id })
    }
);

/// A lesson plan with its questions, as returned by `getLessonPlans`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPlanWithQuestions {
    #[serde(flatten)]
    pub plan: LessonPlan,
    #[serde(default)]
    pub questions: Vec<LessonQuestion>,
}

impl LessonPlanWithQuestions {
    pub fn hydrate<'a>(plan: LessonPlan, questions: impl IntoIterator<Item = &'a LessonQuestion>) -> Self {
        let questions = questions
            .into_iter()
            .filter(|q| q.lesson_plan_id == plan.id)
            .cloned()
            .collect();
        Self { plan, questions }
    }

    pub fn into_parts(self) -> (LessonPlan, Vec<LessonQuestion>) {
        (self.plan, self.questions)
    }

    pub fn question(&self, id: &str) -> Option<&LessonQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Position of a question within the plan, starting at zero.
    pub fn question_index(&self, id: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.id == id)
    }
}
