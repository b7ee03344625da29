use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use devhub_db::models::ProfileFields;
use devhub_db::queries::ProfileWrite;
use devhub_types::api::{Claims, FollowResponse, OnboardingStatus, ProfileRequest, ProfileResponse};
use devhub_types::models::{NotificationKind, User};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::notify::notify;
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

fn default_search_limit() -> u32 {
    5
}

fn profile_fields(req: ProfileRequest) -> ProfileFields {
    // Blank strings from forms mean "not provided".
    let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    ProfileFields {
        name: keep(req.name),
        username: keep(req.username),
        email: keep(req.email),
        description: keep(req.description),
        github_link: keep(req.github_link),
        role: keep(req.role),
        profile_pic: keep(req.profile_pic),
    }
}

fn saved(written: ProfileWrite) -> ApiResult<Json<User>> {
    match written {
        ProfileWrite::Saved(row) => Ok(Json(convert::user(row))),
        ProfileWrite::UsernameTaken => Err(ApiError::BadRequest("Username is taken")),
    }
}

/// Profile completion. Creates the caller's row on first call.
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> ApiResult<Json<User>> {
    let fields = profile_fields(req);
    let written = run_db(&state, move |db| db.upsert_profile(&claims.sub, &fields)).await?;
    saved(written)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ProfileResponse>> {
    let found = run_db(&state, move |db| {
        let Some(row) = db.get_user(&user_id)? else {
            return Ok(None);
        };
        let (followers, following) = db.follow_counts(&user_id)?;
        Ok(Some((row, followers, following)))
    })
    .await?;

    let (row, follower_count, following_count) = found.ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(ProfileResponse {
        user: convert::user(row),
        follower_count,
        following_count,
    }))
}

/// Cheap check used by the client right after sign-in.
pub async fn onboarding_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<OnboardingStatus>> {
    let row = run_db(&state, move |db| db.get_user(&user_id)).await?;
    Ok(Json(OnboardingStatus {
        onboarded: row.is_some_and(|u| u.onboarded),
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> ApiResult<Json<User>> {
    if user_id != claims.sub {
        return Err(ApiError::Forbidden("You can only update your own profile"));
    }

    let fields = profile_fields(req);
    let written = run_db(&state, move |db| db.update_profile(&user_id, &fields))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    saved(written)
}

/// Follow suggestions: onboarded users matching the query, excluding the
/// caller and people they already follow.
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<User>>> {
    let limit = query.limit.clamp(1, 50);
    let rows = run_db(&state, move |db| db.search_users(&claims.sub, query.query.trim(), limit)).await?;
    Ok(Json(rows.into_iter().map(convert::user).collect()))
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<FollowResponse>> {
    let follower_id = claims.sub;
    if target_id == follower_id {
        return Err(ApiError::BadRequest("Cannot follow yourself"));
    }

    let (fid, tid) = (follower_id.clone(), target_id.clone());
    let following = run_db(&state, move |db| {
        if !db.user_exists(&fid)? {
            return Ok(Err(ApiError::NotFound("Complete your profile first")));
        }
        if !db.user_exists(&tid)? {
            return Ok(Err(ApiError::NotFound("User not found")));
        }
        db.toggle_follow(&fid, &tid).map(Ok)
    })
    .await??;

    if following {
        notify(&state, NotificationKind::Follow, &target_id, &follower_id, None).await;
    }

    Ok(Json(FollowResponse { following }))
}

/// Users following the caller.
pub async fn followers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<User>>> {
    let rows = run_db(&state, move |db| db.followers(&claims.sub)).await?;
    Ok(Json(rows.into_iter().map(convert::user).collect()))
}

/// Users the caller follows.
pub async fn following(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<User>>> {
    let rows = run_db(&state, move |db| db.following(&claims.sub)).await?;
    Ok(Json(rows.into_iter().map(convert::user).collect()))
}
