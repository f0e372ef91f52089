//! SEEK Ink Core Library
//!
//! Freehand answer capture and optimistic record editing for the SEEK classroom tool.

pub mod capture;
pub mod coordinator;
pub mod input;
pub mod model;
pub mod remote;
pub mod submission;

pub use capture::{
    CaptureConfig, CaptureEngine, CaptureError, ClearConfirmation, DrawingSurface, PaletteColor,
    RasterSurface, RasterizedArtifact, Rgb, StrokeWidth,
};
pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorError, MutationOutcome, MutationState,
    PendingMutation, WritePolicy,
};
pub use input::{PointerEvent, TimedPointerEvent};
pub use model::{DeletePolicy, Entity};
pub use remote::{
    AuthSession, FileUploader, RemoteCallError, RpcClient, RpcResult, SessionUser, UploadFile,
};
pub use submission::{ResponseDraft, SubmissionError, submit_drawn_response, submit_uploaded_response};
