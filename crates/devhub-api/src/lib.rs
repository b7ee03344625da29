pub mod auth;
pub mod blogs;
pub mod convert;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod notify;
pub mod posts;
pub mod projects;
pub mod state;
pub mod users;

use axum::{
    Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

use devhub_types::api::Health;

use crate::state::AppState;

/// Every HTTP and WebSocket route. Everything under `/api` requires a bearer
/// token; `/health` and `/gateway` authenticate on their own terms.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/gateway", get(gateway::ws_upgrade));

    let protected_routes = Router::new()
        // Messages
        .route("/api/messages/send/{receiver_id}", post(messages::send_message))
        .route("/api/messages/conversations", get(messages::list_conversations))
        .route("/api/messages/conversations/{user_id}", get(messages::get_history))
        .route("/api/messages/mark-read", post(messages::mark_read))
        // Notifications
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/mark-read", post(notifications::mark_all_read))
        // Users
        .route("/api/users/profile", post(users::upsert_profile))
        .route("/api/users/search", get(users::search_users))
        .route("/api/users/followers", get(users::followers))
        .route("/api/users/following", get(users::following))
        .route("/api/users/{id}/profile", get(users::get_profile))
        .route("/api/users/{id}/onboarded", get(users::onboarding_status))
        .route("/api/users/{id}/update", put(users::update_profile))
        .route("/api/users/{id}/follow", post(users::toggle_follow))
        // Posts
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/feed", get(posts::feed))
        .route("/api/posts/bookmarks", get(posts::bookmarks))
        .route("/api/posts/{id}", get(posts::get_post))
        .route("/api/posts/{id}/like", post(posts::toggle_like))
        .route("/api/posts/{id}/comment", post(posts::add_comment))
        .route("/api/posts/{id}/bookmark", post(posts::toggle_bookmark))
        // Projects
        .route("/api/projects", post(projects::create_project))
        .route("/api/projects/user/{id}", get(projects::projects_by_user))
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/api/projects/{id}/comment", post(projects::add_comment))
        .route("/api/dashboard/feed", get(projects::dashboard_feed))
        // Blogs
        .route("/api/blogs", post(blogs::create_blog))
        .route("/api/blogs/user/{id}", get(blogs::blogs_by_user))
        .route(
            "/api/blogs/{id}",
            get(blogs::get_blog)
                .put(blogs::update_blog)
                .delete(blogs::delete_blog),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        ok: true,
        online: state.dispatcher.online_count(),
    })
}
