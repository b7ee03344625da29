use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use devhub_db::models::CommentTarget;
use devhub_types::api::{
    BookmarkResponse, Claims, CommentRequest, CreatePostRequest, FeedPage, LikeResponse,
};
use devhub_types::models::{NotificationKind, Post};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::notify::notify;
use crate::state::{AppState, require_profile, run_db};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    5
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Post content is required"));
    }
    require_profile(&state, &claims.sub).await?;

    let row = run_db(&state, move |db| {
        db.create_post(&claims.sub, &req.content, req.image_url.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(convert::post(row))))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Post>> {
    let row = run_db(&state, move |db| db.get_post(&claims.sub, &post_id))
        .await?
        .ok_or(ApiError::NotFound("Post not found"))?;
    Ok(Json(convert::post(row)))
}

/// The caller's posts and those of people they follow, newest first.
/// `nextPage` is set only when this page came back full.
pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<FeedPage>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 50);
    let offset = (page - 1).saturating_mul(limit);

    let rows = run_db(&state, move |db| db.post_feed(&claims.sub, offset, limit)).await?;
    let full = rows.len() == limit as usize;

    Ok(Json(FeedPage {
        posts: rows.into_iter().map(convert::post).collect(),
        next_page: if full { page.checked_add(1) } else { None },
    }))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<LikeResponse>> {
    let user_id = claims.sub;
    require_profile(&state, &user_id).await?;
    let (uid, pid) = (user_id.clone(), post_id.clone());

    let (liked, author_id) = run_db(&state, move |db| {
        let Some(author_id) = db.post_author(&pid)? else {
            return Ok(Err(ApiError::NotFound("Post not found")));
        };
        let liked = db.toggle_like(&uid, &pid)?;
        Ok(Ok((liked, author_id)))
    })
    .await??;

    if liked {
        notify(&state, NotificationKind::Like, &author_id, &user_id, Some(&post_id)).await;
    }

    Ok(Json(LikeResponse { like: liked }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty"));
    }

    let author_id = claims.sub;
    require_profile(&state, &author_id).await?;
    let (aid, pid) = (author_id.clone(), post_id.clone());

    let (row, post_author) = run_db(&state, move |db| {
        let Some(post_author) = db.post_author(&pid)? else {
            return Ok(Err(ApiError::NotFound("Post not found")));
        };
        let row = db.insert_comment(&aid, CommentTarget::Post(&pid), &req.content)?;
        Ok(Ok((row, post_author)))
    })
    .await??;

    notify(&state, NotificationKind::Comment, &post_author, &author_id, Some(&post_id)).await;

    Ok((StatusCode::CREATED, Json(convert::comment(row))))
}

pub async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<BookmarkResponse>> {
    require_profile(&state, &claims.sub).await?;
    let bookmarked = run_db(&state, move |db| {
        if db.post_author(&post_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("Post not found")));
        }
        db.toggle_bookmark(&claims.sub, &post_id).map(Ok)
    })
    .await??;

    Ok(Json(BookmarkResponse { bookmarked }))
}

pub async fn bookmarks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Post>>> {
    let rows = run_db(&state, move |db| db.bookmarked_posts(&claims.sub)).await?;
    Ok(Json(rows.into_iter().map(convert::post).collect()))
}
