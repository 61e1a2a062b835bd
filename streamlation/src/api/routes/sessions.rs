//! Session registration, lookup, and listing.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tracing::{error, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::ListSessionsQuery;
use crate::api::routes::events;
use crate::api::server::AppState;
use crate::broker::StatusBroker;
use crate::database::repositories::LIST_MAX_LIMIT;
use crate::domain::{IngestionJob, SessionStatusEvent, Stage, TranslationSession, state};

/// Create the sessions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions).post(register_session))
        .route("/{id}", get(get_session))
        .route("/{id}/events", get(events::subscribe_events))
}

/// Register a session: validate, persist, announce, enqueue.
///
/// An enqueue failure must not leave an orphan session record: the
/// just-created row is deleted (best-effort, idempotent) before the
/// failure is surfaced, so a concurrent retry observes either the final
/// state or a clean slate.
async fn register_session(
    State(app): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<TranslationSession>)> {
    // Deserialized by hand so shape errors (unknown fields, bad enum
    // values, missing fields) surface as 400 rather than the extractor's
    // 422.
    let session: TranslationSession = serde_json::from_value(payload)
        .map_err(|e| ApiError::validation(format!("invalid session payload: {e}")))?;
    session.validate()?;

    app.store.create(&session).await?;
    info!(session_id = session.id, "Session registered");
    publish_best_effort(
        app.broker.as_ref(),
        SessionStatusEvent::new(&session.id, Stage::Session, state::REGISTERED),
    )
    .await;

    let job = IngestionJob::new(&session.id);
    if let Err(enqueue_err) = app.queue.enqueue(&job).await {
        error!(
            session_id = session.id,
            error = %enqueue_err,
            "Enqueue failed, rolling back session"
        );
        if let Err(delete_err) = app.store.delete(&session.id).await {
            // Logged, never surfaced: the client already gets the enqueue
            // failure.
            error!(
                session_id = session.id,
                error = %delete_err,
                "Rollback delete failed"
            );
        }
        publish_best_effort(
            app.broker.as_ref(),
            SessionStatusEvent::new(&session.id, Stage::Ingestion, state::ERROR)
                .with_detail(format!("failed to enqueue ingestion job: {enqueue_err}")),
        )
        .await;
        return Err(ApiError::internal("failed to enqueue ingestion job"));
    }

    publish_best_effort(
        app.broker.as_ref(),
        SessionStatusEvent::new(&session.id, Stage::Ingestion, state::QUEUED),
    )
    .await;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Get a single session by id.
async fn get_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TranslationSession>> {
    Ok(Json(app.store.get(&id).await?))
}

/// List sessions, most recent first.
async fn list_sessions(
    State(app): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<TranslationSession>>> {
    if let Some(limit) = query.limit {
        if limit == 0 || limit > LIST_MAX_LIMIT {
            return Err(ApiError::validation(format!(
                "limit must be within [1, {LIST_MAX_LIMIT}]"
            )));
        }
    }
    Ok(Json(app.store.list(query.limit).await?))
}

/// Publish a control-surface event; failures never fail the request.
async fn publish_best_effort(broker: &dyn StatusBroker, event: SessionStatusEvent) {
    if let Err(e) = broker.publish(event).await {
        warn!(error = %e, "Failed to publish control-surface event");
    }
}
