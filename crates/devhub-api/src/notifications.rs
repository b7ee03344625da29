use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use devhub_types::api::{Claims, NotificationList};

use crate::convert;
use crate::error::ApiResult;
use crate::state::{AppState, run_db};

const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// "true" or "false"; anything else means no filter.
    pub read: Option<String>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<NotificationList>> {
    let read = match query.read.as_deref() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    };

    let (rows, unread_count) = run_db(&state, move |db| {
        let rows = db.list_notifications(&claims.sub, read, PAGE_SIZE)?;
        let unread = db.unread_count(&claims.sub)?;
        Ok((rows, unread))
    })
    .await?;

    Ok(Json(NotificationList {
        notifications: rows.into_iter().filter_map(convert::notification).collect(),
        unread_count,
    }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    run_db(&state, move |db| db.mark_all_read(&claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
