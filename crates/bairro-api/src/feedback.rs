use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
};
use chrono::Utc;
use tracing::debug;

use bairro_db::Database;
use bairro_types::api::{FeedbackRequest, FeedbackResponse};
use bairro_types::error::FieldError;
use bairro_types::models::{Session, VoteDirection};

use crate::auth::{AppState, blocking};
use crate::error::ApiError;

/// Record the user's vote on a report, replacing any earlier vote, and
/// return the report's new total. Voting the same way twice is not a toggle.
pub fn vote(
    db: &Database,
    session: &Session,
    report_id: i64,
    direction: VoteDirection,
) -> Result<i64, ApiError> {
    let user = session
        .user
        .as_ref()
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if db.get_report(report_id)?.is_none() {
        return Err(ApiError::not_found("Report not found"));
    }

    db.replace_feedback(report_id, user.id, direction.as_str(), Utc::now())?;
    debug!("User {} voted {} on report {}", user.id, direction.as_str(), report_id);

    db.get_report_votes(report_id)?
        .ok_or_else(|| ApiError::not_found("Report not found"))
}

/// POST /reports/{id}/feedback
pub async fn vote_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let report_id: i64 = id
        .parse()
        .map_err(|_| ApiError::not_found("Report not found"))?;
    let Json(req) = payload?;

    let direction = VoteDirection::parse(req.vote.trim()).ok_or_else(|| {
        ApiError::validation(
            "Invalid vote",
            vec![FieldError::new("vote", "Vote must be UP or DOWN")],
        )
    })?;

    let votes = blocking(&state, move |s| vote(&s.db, &session, report_id, direction)).await?;
    Ok(Json(FeedbackResponse { votes }))
}
