use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use trattoria_auth::permissions as perm;
use trattoria_contact::{
    ContactMessage, DeleteMessage, MarkMessageRead, MessageCommand, MessageId, SubmitMessage, message,
};
use trattoria_infra::projections::MessageView;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(admin_list_messages))
        .route("/:id/read", post(admin_mark_read))
        .route("/:id", delete(admin_delete_message))
}

pub async fn submit_message(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ContactRequest>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    let message_id = MessageId::generate();
    let cmd = MessageCommand::Submit(SubmitMessage {
        message_id,
        name: body.name,
        email: body.email,
        subject: body.subject,
        body: body.body,
        occurred_at: Utc::now(),
    });
    dispatch(&services, message_id, cmd)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": message_id,
            "message": "Thanks! We will get back to you soon.",
        })),
    ))
}

pub async fn admin_list_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::MessagesQuery>,
) -> ApiResult<Json<Vec<MessageView>>> {
    authz::require(&principal, perm::MESSAGES_MANAGE)?;
    Ok(Json(services.read_models.messages.list(q.unread)))
}

pub async fn admin_mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageView>> {
    authz::require(&principal, perm::MESSAGES_MANAGE)?;
    let message_id: MessageId = parse_id(&id, "message")?;

    let cmd = MessageCommand::MarkRead(MarkMessageRead {
        message_id,
        occurred_at: Utc::now(),
    });
    dispatch(&services, message_id, cmd)?;
    services
        .read_models
        .messages
        .get(&message_id)
        .map(Json)
        .ok_or(ApiError::NotFound("message"))
}

pub async fn admin_delete_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, perm::MESSAGES_MANAGE)?;
    let message_id: MessageId = parse_id(&id, "message")?;

    let cmd = MessageCommand::Delete(DeleteMessage {
        message_id,
        occurred_at: Utc::now(),
    });
    dispatch(&services, message_id, cmd)?;
    Ok(StatusCode::NO_CONTENT)
}

fn dispatch(services: &AppServices, message_id: MessageId, cmd: MessageCommand) -> ApiResult<()> {
    services.dispatch(message_id.aggregate_id(), message::AGGREGATE_TYPE, cmd, |id| {
        ContactMessage::empty(MessageId::new(id))
    })?;
    Ok(())
}
