//! Student response submission: capture the drawing, upload it, persist the response.

use crate::capture::{CaptureEngine, CaptureError, DrawingSurface};
use crate::coordinator::{Coordinator, CoordinatorError, MutationOutcome};
use crate::model::{Lesson, LessonQuestion, LessonResponse, Student};
use crate::remote::{FileUploader, RemoteCallError, UploadFile};
use chrono::Utc;
use thiserror::Error;

/// Folder under a teacher's upload space that holds student drawings.
pub const RESPONSE_FOLDER: &str = "student-responses";

/// Submission errors.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("upload failed: {0}")]
    Upload(RemoteCallError),
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error("unknown lesson: {0}")]
    UnknownLesson(String),
    #[error("lesson {lesson_id} no longer accepts responses to question {question_id}")]
    Locked { lesson_id: String, question_id: String },
}

/// Result type for submission operations.
pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// What a student is answering, and any typed text alongside the drawing.
#[derive(Debug, Clone, Copy)]
pub struct ResponseDraft<'a> {
    pub lesson_id: &'a str,
    pub question: &'a LessonQuestion,
    pub student: &'a Student,
    pub response_text: Option<&'a str>,
}

/// Upload folder for a teacher's student drawings.
pub fn response_folder(teacher_email: &str) -> String {
    format!("{teacher_email}/{RESPONSE_FOLDER}")
}

/// Snapshot the engine, upload the image and persist the student's response.
///
/// Re-submitting replaces the student's earlier response to the same question. The lesson is
/// resolved even if it has been deleted, so students mid-lesson can still hand in.
pub async fn submit_drawn_response<S: DrawingSurface>(
    engine: &CaptureEngine<S>,
    uploader: &dyn FileUploader,
    lessons: &Coordinator<Lesson>,
    responses: &Coordinator<LessonResponse>,
    draft: ResponseDraft<'_>,
) -> SubmissionResult<LessonResponse> {
    let lesson = open_lesson(lessons, &draft)?;
    let artifact = engine.snapshot()?;
    let file = UploadFile {
        name: format!("drawing-{}.png", Utc::now().timestamp_millis()),
        content_type: artifact.content_type().to_string(),
        bytes: artifact.into_bytes(),
    };
    let url = upload(uploader, &lesson, file).await?;
    persist_response(responses, &lesson, draft, url, engine.is_dirty()).await
}

/// Upload an image the student picked instead of drawing, and persist the response.
///
/// The uploaded image counts as the student's drawing.
pub async fn submit_uploaded_response(
    uploader: &dyn FileUploader,
    lessons: &Coordinator<Lesson>,
    responses: &Coordinator<LessonResponse>,
    draft: ResponseDraft<'_>,
    file: UploadFile,
) -> SubmissionResult<LessonResponse> {
    let lesson = open_lesson(lessons, &draft)?;
    let url = upload(uploader, &lesson, file).await?;
    persist_response(responses, &lesson, draft, url, true).await
}

fn open_lesson(lessons: &Coordinator<Lesson>, draft: &ResponseDraft<'_>) -> SubmissionResult<Lesson> {
    let lesson = lessons
        .get(draft.lesson_id)
        .ok_or_else(|| SubmissionError::UnknownLesson(draft.lesson_id.to_string()))?;
    if !lesson.accepts_responses_to(&draft.question.id) {
        return Err(SubmissionError::Locked {
            lesson_id: lesson.id,
            question_id: draft.question.id.clone(),
        });
    }
    Ok(lesson)
}

async fn upload(uploader: &dyn FileUploader, lesson: &Lesson, file: UploadFile) -> SubmissionResult<String> {
    let name = file.name.clone();
    let url = uploader
        .upload(file, &response_folder(&lesson.teacher_email))
        .await
        .map_err(SubmissionError::Upload)?;
    log::debug!("uploaded {name} for lesson {} to {url}", lesson.id);
    Ok(url)
}

async fn persist_response(
    responses: &Coordinator<LessonResponse>,
    lesson: &Lesson,
    draft: ResponseDraft<'_>,
    image_url: String,
    has_drawing: bool,
) -> SubmissionResult<LessonResponse> {
    let existing = responses.list_all().into_iter().find(|r| {
        r.lesson_id == lesson.id
            && r.question_id == draft.question.id
            && r.student_id == draft.student.id
    });
    let is_new = existing.is_none();
    let mut response =
        existing.unwrap_or_else(|| LessonResponse::new(lesson, draft.question, draft.student));
    response.response_text = draft.response_text.map(str::to_string);
    response.response_image_url = Some(image_url);
    response.response_has_drawing = has_drawing;

    let pending = if is_new {
        responses.create(response)
    } else {
        responses.update(response)
    };
    let id = pending.id().to_string();
    let outcome = pending.await?;
    log::info!(
        "response {id} from {} submitted ({outcome:?})",
        draft.student.nickname
    );

    responses.get(&id).ok_or_else(|| {
        CoordinatorError::UnknownEntity(format!("lesson response {id}")).into()
    })
}

/// Record that a student opened a lesson so the teacher sees them as started.
pub async fn record_student_started(
    lessons: &Coordinator<Lesson>,
    lesson_id: &str,
    student_name: &str,
) -> SubmissionResult<MutationOutcome> {
    let mut lesson = lessons
        .get(lesson_id)
        .ok_or_else(|| SubmissionError::UnknownLesson(lesson_id.to_string()))?;
    if !lesson.mark_student_started(student_name) {
        return Ok(MutationOutcome::Unchanged);
    }
    Ok(lessons.update(lesson).await?)
}
