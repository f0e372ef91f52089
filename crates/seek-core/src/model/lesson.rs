use super::{DeletePolicy, Timestamp, impl_entity};
use super::{Class, LessonPlan, LessonQuestion, Student};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Length of the join code students type to enter a lesson.
pub const LESSON_CODE_LEN: usize = 6;

/// A run of a lesson plan with one class.
///
/// Unlike the other records its id is a short uppercase join code rather than a UUID, and it is
/// never hard-deleted: the `deleted` flag hides it from listings while responses stay attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub lesson_name: String,
    pub lesson_plan_id: String,
    pub lesson_plan_name: String,
    pub class_id: String,
    pub class_name: String,
    pub teacher_name: String,
    pub teacher_email: String,
    #[serde(default)]
    pub responses_locked: bool,
    /// Question ids that no longer accept responses.
    #[serde(default)]
    pub questions_locked: Vec<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub student_names_started: Vec<String>,
    #[serde(default)]
    pub analysis_by_question_id: BTreeMap<String, LessonQuestionAnalysis>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Lesson {
    /// A new lesson running `plan` with `class`, named after both.
    pub fn for_plan(plan: &LessonPlan, class: &Class, teacher_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            lesson_name: format!("{} (for {})", plan.title, class.name),
            lesson_plan_id: plan.id.clone(),
            lesson_plan_name: plan.title.clone(),
            class_id: class.id.clone(),
            class_name: class.name.clone(),
            teacher_name: teacher_name.into(),
            teacher_email: plan.teacher_email.clone(),
            responses_locked: false,
            questions_locked: Vec::new(),
            deleted: false,
            student_names_started: Vec::new(),
            analysis_by_question_id: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a student may still answer `question_id`.
    pub fn accepts_responses_to(&self, question_id: &str) -> bool {
        !self.responses_locked && !self.questions_locked.iter().any(|q| q == question_id)
    }

    /// Lock or unlock a single question. Returns whether anything changed.
    pub fn set_question_locked(&mut self, question_id: &str, locked: bool) -> bool {
        let position = self.questions_locked.iter().position(|q| q == question_id);
        match (locked, position) {
            (true, None) => {
                self.questions_locked.push(question_id.to_string());
                true
            }
            (false, Some(i)) => {
                self.questions_locked.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Record that a student joined. Returns false when the name was already present.
    pub fn mark_student_started(&mut self, student_name: &str) -> bool {
        if self.student_names_started.iter().any(|n| n == student_name) {
            return false;
        }
        self.student_names_started.push(student_name.to_string());
        true
    }
}

impl_entity!(Lesson {
    kind: "lesson",
    put: "putLesson",
    delete: "deleteLesson",
    list: "getLessons",
}
    const DELETE_POLICY: DeletePolicy = DeletePolicy::Tombstone;

    fn generate_id() -> String {
        Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(LESSON_CODE_LEN)
            .collect::<String>()
            .to_uppercase()
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn mark_deleted(&mut self) {
        self.deleted = true;
    }
);

/// Responses to one question grouped into teacher-visible categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonQuestionAnalysis {
    pub question_id: String,
    #[serde(default)]
    pub responses_by_category: BTreeMap<String, Vec<LessonResponse>>,
}

impl LessonQuestionAnalysis {
    /// Category currently holding the response from `student_name`.
    pub fn category_of(&self, student_name: &str) -> Option<&str> {
        self.responses_by_category
            .iter()
            .find(|(_, responses)| responses.iter().any(|r| r.student_name == student_name))
            .map(|(category, _)| category.as_str())
    }

    /// Move a student's response into another category, creating it if needed.
    ///
    /// Returns false when the student has no categorized response or is already there.
    pub fn move_response(&mut self, student_name: &str, to_category: &str) -> bool {
        let Some(from) = self.category_of(student_name).map(str::to_string) else {
            return false;
        };
        if from == to_category {
            return false;
        }
        let Some(source) = self.responses_by_category.get_mut(&from) else {
            return false;
        };
        let Some(index) = source.iter().position(|r| r.student_name == student_name) else {
            return false;
        };
        let response = source.remove(index);
        self.responses_by_category
            .entry(to_category.to_string())
            .or_default()
            .push(response);
        true
    }
}

/// Short summary produced when a response is analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonResponseAnalysis {
    pub response_summary: String,
}

/// One student's answer to one question in a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonResponse {
    pub id: String,
    pub teacher_email: String,
    pub question_id: String,
    pub lesson_id: String,
    pub student_id: String,
    pub student_name: String,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub response_image_url: Option<String>,
    #[serde(default)]
    pub response_image_base64: Option<String>,
    #[serde(default)]
    pub response_has_drawing: bool,
    #[serde(default)]
    pub analysis: Option<LessonResponseAnalysis>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LessonResponse {
    pub fn new(lesson: &Lesson, question: &LessonQuestion, student: &Student) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            teacher_email: question.teacher_email.clone(),
            question_id: question.id.clone(),
            lesson_id: lesson.id.clone(),
            student_id: student.id.clone(),
            student_name: student.nickname.clone(),
            response_text: None,
            response_image_url: None,
            response_image_base64: None,
            response_has_drawing: false,
            analysis: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl_entity!(LessonResponse {
    kind: "lesson response",
    put: "putLessonResponse",
    delete: "deleteLessonResponse",
    list: "getLessonResponses",
});

/// A lesson with every response submitted to it, as returned by `getLessons`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonWithResponses {
    #[serde(flatten)]
    pub lesson: Lesson,
    #[serde(default)]
    pub responses: Vec<LessonResponse>,
}

impl LessonWithResponses {
    pub fn hydrate<'a>(lesson: Lesson, responses: impl IntoIterator<Item = &'a LessonResponse>) -> Self {
        let responses = responses
            .into_iter()
            .filter(|r| r.lesson_id == lesson.id)
            .cloned()
            .collect();
        Self { lesson, responses }
    }

    pub fn into_parts(self) -> (Lesson, Vec<LessonResponse>) {
        (self.lesson, self.responses)
    }

    /// The response a student already submitted for a question, if any.
    pub fn response_for(&self, question_id: &str, student_name: &str) -> Option<&LessonResponse> {
        self.responses
            .iter()
            .find(|r| r.question_id == question_id && r.student_name == student_name)
    }

    pub fn responses_to<'a>(&'a self, question_id: &'a str) -> impl Iterator<Item = &'a LessonResponse> + 'a {
        self.responses.iter().filter(move |r| r.question_id == question_id)
    }

    /// Students who joined but have not submitted anything yet.
    pub fn students_waiting(&self) -> Vec<&str> {
        self.lesson
            .student_names_started
            .iter()
            .filter(|name| !self.responses.iter().any(|r| &r.student_name == *name))
            .map(String::as_str)
            .collect()
    }
}
