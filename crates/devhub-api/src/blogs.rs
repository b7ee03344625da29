use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use devhub_db::models::BlogFields;
use devhub_types::api::{BlogRequest, Claims};
use devhub_types::models::Blog;

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::{AppState, require_profile, run_db};

fn validate(req: BlogRequest) -> ApiResult<BlogFields> {
    let technologies: Vec<String> = req
        .technologies
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if req.title.trim().is_empty()
        || req.description.trim().is_empty()
        || req.content.trim().is_empty()
        || technologies.is_empty()
    {
        return Err(ApiError::BadRequest(
            "A blog needs a title, description, content and technologies",
        ));
    }

    Ok(BlogFields {
        title: req.title,
        description: req.description,
        content: req.content,
        thumbnail: req.thumbnail.filter(|t| !t.trim().is_empty()),
        technologies,
    })
}

pub async fn create_blog(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<BlogRequest>,
) -> ApiResult<impl IntoResponse> {
    let fields = validate(req)?;
    require_profile(&state, &claims.sub).await?;
    let row = run_db(&state, move |db| db.create_blog(&claims.sub, &fields)).await?;
    Ok((StatusCode::CREATED, Json(convert::blog(row))))
}

pub async fn blogs_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Blog>>> {
    let rows = run_db(&state, move |db| db.blogs_by_author(&user_id)).await?;
    Ok(Json(rows.into_iter().map(convert::blog).collect()))
}

pub async fn get_blog(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Blog>> {
    let row = run_db(&state, move |db| db.get_blog(&id))
        .await?
        .ok_or(ApiError::NotFound("Blog not found"))?;
    Ok(Json(convert::blog(row)))
}

pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<BlogRequest>,
) -> ApiResult<Json<Blog>> {
    let row = run_db(&state, move |db| {
        let Some(existing) = db.get_blog(&id)? else {
            return Ok(Err(ApiError::NotFound("Blog not found")));
        };
        if existing.author.id != claims.sub {
            return Ok(Err(ApiError::Forbidden("You are not authorized to edit this blog")));
        }
        let fields = match validate(req) {
            Ok(fields) => fields,
            Err(e) => return Ok(Err(e)),
        };
        if !db.update_blog(&id, &claims.sub, &fields)? {
            return Ok(Err(ApiError::NotFound("Blog not found")));
        }
        Ok(db.get_blog(&id)?.ok_or(ApiError::NotFound("Blog not found")))
    })
    .await??;

    Ok(Json(convert::blog(row)))
}

pub async fn delete_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    run_db(&state, move |db| {
        let Some(existing) = db.get_blog(&id)? else {
            return Ok(Err(ApiError::NotFound("Blog not found")));
        };
        if existing.author.id != claims.sub {
            return Ok(Err(ApiError::Forbidden("You are not authorized to delete this blog")));
        }
        db.delete_blog(&id, &claims.sub)?;
        Ok(Ok(()))
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_required_and_blank_thumbnail_dropped() {
        let req = BlogRequest {
            title: "Lifetimes".into(),
            description: "a primer".into(),
            content: "  ".into(),
            thumbnail: Some("".into()),
            technologies: vec!["rust".into()],
        };
        assert!(matches!(validate(req), Err(ApiError::BadRequest(_))));

        let req = BlogRequest {
            title: "Lifetimes".into(),
            description: "a primer".into(),
            content: "'a outlives 'b".into(),
            thumbnail: Some(" ".into()),
            technologies: vec!["rust".into()],
        };
        let fields = validate(req).unwrap();
        assert_eq!(fields.thumbnail, None);
    }
}
