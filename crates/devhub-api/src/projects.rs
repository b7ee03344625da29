use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use devhub_db::models::{CommentTarget, ProjectFields};
use devhub_types::api::{Claims, CommentRequest, ProjectRequest};
use devhub_types::models::{NotificationKind, Project};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::notify::notify;
use crate::state::{AppState, require_profile, run_db};

/// Cap on the "from developers you follow" feed.
const FEED_LIMIT: u32 = 50;

fn validate(req: ProjectRequest) -> ApiResult<ProjectFields> {
    let technologies: Vec<String> = req
        .technologies
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if req.title.trim().is_empty()
        || req.description.trim().is_empty()
        || req.github_url.trim().is_empty()
        || technologies.is_empty()
    {
        return Err(ApiError::BadRequest(
            "A project needs a title, description, githubUrl and technologies",
        ));
    }

    Ok(ProjectFields {
        title: req.title,
        description: req.description,
        github_url: req.github_url,
        live_url: req.live_url,
        thumbnail: req.thumbnail,
        technologies,
    })
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let fields = validate(req)?;
    require_profile(&state, &claims.sub).await?;
    let row = run_db(&state, move |db| db.create_project(&claims.sub, &fields)).await?;
    Ok((StatusCode::CREATED, Json(convert::project(row))))
}

pub async fn projects_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Project>>> {
    let rows = run_db(&state, move |db| db.projects_by_owner(&user_id)).await?;
    Ok(Json(rows.into_iter().map(convert::project).collect()))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Project>> {
    let row = run_db(&state, move |db| db.get_project(&project_id))
        .await?
        .ok_or(ApiError::NotFound("Project not found"))?;
    Ok(Json(convert::project(row)))
}

/// Ownership is checked on every call; a non-owner gets 403 and nothing changes.
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    let row = run_db(&state, move |db| {
        let Some(existing) = db.get_project(&id)? else {
            return Ok(Err(ApiError::NotFound("Project not found")));
        };
        if existing.owner.id != claims.sub {
            return Ok(Err(ApiError::Forbidden("You are not authorized to edit this project")));
        }
        let fields = match validate(req) {
            Ok(fields) => fields,
            Err(e) => return Ok(Err(e)),
        };
        if !db.update_project(&id, &claims.sub, &fields)? {
            return Ok(Err(ApiError::NotFound("Project not found")));
        }
        Ok(db.get_project(&id)?.ok_or(ApiError::NotFound("Project not found")))
    })
    .await??;

    Ok(Json(convert::project(row)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    run_db(&state, move |db| {
        let Some(existing) = db.get_project(&id)? else {
            return Ok(Err(ApiError::NotFound("Project not found")));
        };
        if existing.owner.id != claims.sub {
            return Ok(Err(ApiError::Forbidden("You are not authorized to delete this project")));
        }
        db.delete_project(&id, &claims.sub)?;
        Ok(Ok(()))
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty"));
    }

    let author_id = claims.sub;
    require_profile(&state, &author_id).await?;
    let aid = author_id.clone();
    let (row, owner_id) = run_db(&state, move |db| {
        let Some(project) = db.get_project(&id)? else {
            return Ok(Err(ApiError::NotFound("Project not found")));
        };
        let row = db.insert_comment(&aid, CommentTarget::Project(&id), &req.content)?;
        Ok(Ok((row, project.owner.id)))
    })
    .await??;

    notify(&state, NotificationKind::Comment, &owner_id, &author_id, None).await;

    Ok((StatusCode::CREATED, Json(convert::comment(row))))
}

/// Projects from developers the caller follows.
pub async fn dashboard_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Project>>> {
    let rows = run_db(&state, move |db| db.project_feed(&claims.sub, FEED_LIMIT)).await?;
    Ok(Json(rows.into_iter().map(convert::project).collect()))
}
