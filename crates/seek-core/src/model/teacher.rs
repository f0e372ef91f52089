use super::{Class, ClassWithStudents, Lesson, LessonPlan, LessonPlanWithQuestions, LessonQuestion};
use super::{LessonResponse, LessonWithResponses, Student, Timestamp, impl_entity};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A teacher profile, linked to an authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub user_id: String,
    pub nickname: String,
    pub email_address: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Teacher {
    pub fn new(user_id: impl Into<String>, email_address: impl Into<String>) -> Self {
        let now = Utc::now();
        let email_address = email_address.into();
        // Until a nickname is chosen, show the mailbox name.
        let nickname = email_address
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            nickname,
            email_address,
            created_at: now,
            updated_at: now,
        }
    }
}

impl_entity!(Teacher {
    kind: "teacher",
    put: "putTeacher",
    delete: "deleteTeacher",
    list: "getTeachers",
});

/// Everything the teacher home screen needs, fetched with `getTeacherData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherData {
    #[serde(flatten)]
    pub teacher: Teacher,
    #[serde(default)]
    pub classes: Vec<ClassWithStudents>,
    #[serde(default)]
    pub lesson_plans: Vec<LessonPlanWithQuestions>,
    #[serde(default)]
    pub lessons: Vec<LessonWithResponses>,
}

/// Base records split out of a [`TeacherData`] snapshot, ready to seed coordinators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeacherRecords {
    pub classes: Vec<Class>,
    pub students: Vec<Student>,
    pub lesson_plans: Vec<LessonPlan>,
    pub questions: Vec<LessonQuestion>,
    pub lessons: Vec<Lesson>,
    pub responses: Vec<LessonResponse>,
}

impl TeacherData {
    /// Build a snapshot from flat collections.
    pub fn hydrate(teacher: Teacher, records: &TeacherRecords) -> Self {
        Self {
            classes: records
                .classes
                .iter()
                .map(|c| ClassWithStudents::hydrate(c.clone(), &records.students))
                .collect(),
            lesson_plans: records
                .lesson_plans
                .iter()
                .map(|p| LessonPlanWithQuestions::hydrate(p.clone(), &records.questions))
                .collect(),
            lessons: records
                .lessons
                .iter()
                .map(|l| LessonWithResponses::hydrate(l.clone(), &records.responses))
                .collect(),
            teacher,
        }
    }

    pub fn into_parts(self) -> (Teacher, TeacherRecords) {
        let mut records = TeacherRecords::default();
        for class in self.classes {
            let (class, students) = class.into_parts();
            records.classes.push(class);
            records.students.extend(students);
        }
        for plan in self.lesson_plans {
            let (plan, questions) = plan.into_parts();
            records.lesson_plans.push(plan);
            records.questions.extend(questions);
        }
        for lesson in self.lessons {
            let (lesson, responses) = lesson.into_parts();
            records.lessons.push(lesson);
            records.responses.extend(responses);
        }
        (self.teacher, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;
    use serde_json::json;

    #[test]
    fn test_default_nickname_from_email() {
        let teacher = Teacher::new("uid-1", "frizzle@school.org");
        assert_eq!(teacher.nickname, "frizzle");
        assert_eq!(Teacher::PUT_ENDPOINT, "putTeacher");
    }

    #[test]
    fn test_snapshot_splits_into_records() {
        let wire = json!({
            "id": "t1",
            "user_id": "uid-1",
            "nickname": "Ms. Frizzle",
            "email_address": "frizzle@school.org",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z",
            "classes": [{
                "id": "c1",
                "teacher_email": "frizzle@school.org",
                "name": "Period 3",
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-01T10:00:00Z",
                "students": [{
                    "id": "s1",
                    "class_id": "c1",
                    "teacher_email": "frizzle@school.org",
                    "nickname": "Ada",
                    "notes": "",
                    "created_at": "2024-03-01T10:00:00Z",
                    "updated_at": "2024-03-01T10:00:00Z"
                }]
            }],
            "lesson_plans": [{
                "id": "p1",
                "teacher_email": "frizzle@school.org",
                "title": "Cells",
                "published": true,
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-01T10:00:00Z"
            }]
        });

        let data: TeacherData = serde_json::from_value(wire).unwrap();
        let (teacher, records) = data.clone().into_parts();
        assert_eq!(teacher.id(), "t1");
        assert_eq!(records.classes.len(), 1);
        assert_eq!(records.students[0].nickname, "Ada");
        assert_eq!(records.lesson_plans[0].title, "Cells");
        assert!(records.questions.is_empty());
        assert!(records.lessons.is_empty());

        assert_eq!(TeacherData::hydrate(teacher, &records), data);
    }
}
