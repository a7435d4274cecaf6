//! Lead thread handlers: notes, internal messages, emails and files.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use common::AppResult;
use domain::{Email, FileAttachment, InternalMessage, Note, StaffContext};
use lead_service_lib::service::{EmailDraft, NewFile, NewMessage, Thread};

use crate::extractors::ValidatedJson;
use crate::handlers::confirmed;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NoteRequest {
    #[validate(length(min = 1, max = 10000, message = "Note body cannot be empty"))]
    #[schema(example = "Called back, waiting for the site plan")]
    pub body: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PinRequest {
    pub pinned: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MessageRequest {
    #[validate(length(max = 200))]
    #[serde(default)]
    pub subject: String,
    #[validate(length(min = 1, message = "Message body cannot be empty"))]
    pub body_plain: String,
    pub body_rich: Option<String>,
    #[serde(default)]
    pub important: bool,
}

/// Outbound email. `{{first_name}}`, `{{reference}}`, `{{payment_link}}` and
/// the other lead placeholders are substituted before sending.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(length(min = 1, max = 200, message = "Subject cannot be empty"))]
    #[schema(example = "Dossier {{reference}}")]
    pub subject: String,
    #[validate(length(min = 1, message = "Email body cannot be empty"))]
    #[schema(example = "Bonjour {{first_name}},")]
    pub body: String,
}

/// Metadata of a file already uploaded to storage.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FileRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(range(min = 0))]
    pub size_bytes: i64,
    #[validate(length(min = 1))]
    #[schema(example = "application/pdf")]
    pub content_type: String,
    #[validate(length(min = 1))]
    pub storage_key: String,
    pub description: Option<String>,
}

/// Create routes nested under `/leads/:id`
pub fn thread_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/thread", get(get_thread))
        .route("/:id/notes", post(add_note))
        .route("/:id/messages", post(post_message))
        .route("/:id/emails", post(compose_email))
        .route("/:id/files", post(attach_file))
}

/// Create note routes
pub fn note_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", put(edit_note).delete(delete_note))
        .route("/:id/pin", put(pin_note))
}

/// Merged history of a lead, oldest first
#[utoipa::path(
    get,
    path = "/leads/{id}/thread",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Thread items; `unavailable` lists channels that could not be read", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn get_thread(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Thread>> {
    let thread = state.services.threads().thread_for(&ctx, id).await?;
    Ok(Json(thread))
}

/// Add a note
#[utoipa::path(
    post,
    path = "/leads/{id}/notes",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = NoteRequest,
    responses(
        (status = 201, description = "Note created", body = Object),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn add_note(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<NoteRequest>,
) -> AppResult<(StatusCode, Json<Note>)> {
    let threads = state.services.threads();
    let note = confirmed(&state, &ctx, threads.add_note(&ctx, id, payload.body)).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// Edit a note body
#[utoipa::path(
    put,
    path = "/notes/{id}",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Note ID")),
    request_body = NoteRequest,
    responses(
        (status = 200, description = "Note updated", body = Object),
        (status = 403, description = "Not the author, or a system note"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn edit_note(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<NoteRequest>,
) -> AppResult<Json<Note>> {
    let threads = state.services.threads();
    let note = confirmed(&state, &ctx, threads.edit_note(&ctx, id, payload.body)).await?;
    Ok(Json(note))
}

/// Pin or unpin a note
#[utoipa::path(
    put,
    path = "/notes/{id}/pin",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Note ID")),
    request_body = PinRequest,
    responses(
        (status = 200, description = "Note updated", body = Object),
        (status = 404, description = "Note not found")
    )
)]
pub async fn pin_note(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PinRequest>,
) -> AppResult<Json<Note>> {
    let threads = state.services.threads();
    let note = confirmed(&state, &ctx, threads.pin_note(&ctx, id, payload.pinned)).await?;
    Ok(Json(note))
}

/// Delete a note
#[utoipa::path(
    delete,
    path = "/notes/{id}",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 403, description = "Deleting notes not allowed"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn delete_note(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let threads = state.services.threads();
    confirmed(&state, &ctx, threads.delete_note(&ctx, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Post an internal message
#[utoipa::path(
    post,
    path = "/leads/{id}/messages",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = MessageRequest,
    responses(
        (status = 201, description = "Message posted", body = Object),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn post_message(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<MessageRequest>,
) -> AppResult<(StatusCode, Json<InternalMessage>)> {
    let message = NewMessage {
        subject: payload.subject,
        body_plain: payload.body_plain,
        body_rich: payload.body_rich,
        important: payload.important,
    };
    let threads = state.services.threads();
    let message = confirmed(&state, &ctx, threads.post_message(&ctx, id, message)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Send an email to the lead
#[utoipa::path(
    post,
    path = "/leads/{id}/emails",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = EmailRequest,
    responses(
        (status = 201, description = "Email recorded; `delivery_status` is `failed` when it could not be queued", body = Object),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn compose_email(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<(StatusCode, Json<Email>)> {
    let draft = EmailDraft {
        subject: payload.subject,
        body: payload.body,
    };
    let threads = state.services.threads();
    let email = confirmed(&state, &ctx, threads.compose_email(&ctx, id, draft)).await?;
    Ok((StatusCode::CREATED, Json(email)))
}

/// Record an uploaded file on the thread
#[utoipa::path(
    post,
    path = "/leads/{id}/files",
    tag = "Thread",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = FileRequest,
    responses(
        (status = 201, description = "File recorded", body = Object),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn attach_file(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<FileRequest>,
) -> AppResult<(StatusCode, Json<FileAttachment>)> {
    let file = NewFile {
        file_name: payload.file_name,
        size_bytes: payload.size_bytes,
        content_type: payload.content_type,
        storage_key: payload.storage_key,
        description: payload.description,
    };
    let threads = state.services.threads();
    let file = confirmed(&state, &ctx, threads.attach_file(&ctx, id, file)).await?;
    Ok((StatusCode::CREATED, Json(file)))
}
