use super::{Timestamp, impl_entity};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A group of students taught by one teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub teacher_email: String,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Class {
    /// A new class with no id yet; the coordinator assigns one on create.
    pub fn new(teacher_email: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            teacher_email: teacher_email.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl_entity!(Class {
    kind: "class",
    put: "putClass",
    delete: "deleteClass",
    list: "getClasses",
});

/// A student enrolled in a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub class_id: String,
    pub teacher_email: String,
    pub nickname: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Student {
    pub fn new(class: &Class, nickname: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            class_id: class.id.clone(),
            teacher_email: class.teacher_email.clone(),
            nickname: nickname.into(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl_entity!(Student {
    kind: "student",
    put: "putStudent",
    delete: "deleteStudent",
    list: "getStudents",
});

/// A class together with its roster, as returned by the class listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWithStudents {
    #[serde(flatten)]
    pub class: Class,
    #[serde(default)]
    pub students: Vec<Student>,
}

impl ClassWithStudents {
    /// Attach the students belonging to `class`, in the given order.
    pub fn hydrate<'a>(class: Class, students: impl IntoIterator<Item = &'a Student>) -> Self {
        let students = students
            .into_iter()
            .filter(|s| s.class_id == class.id)
            .cloned()
            .collect();
        Self { class, students }
    }

    pub fn into_parts(self) -> (Class, Vec<Student>) {
        (self.class, self.students)
    }

    /// Roster nicknames, used to pick a name when joining a lesson.
    pub fn nicknames(&self) -> Vec<&str> {
        self.students.iter().map(|s| s.nickname.as_str()).collect()
    }

    pub fn find_student(&self, nickname: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.nickname == nickname)
    }
}
