use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;

use devhub_gateway::connection;

use crate::auth::verify_token;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayQuery {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

/// The handshake is authenticated before the upgrade so a bad token gets a
/// plain 401 instead of a socket that closes immediately.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<impl IntoResponse> {
    let token = query.token.ok_or(ApiError::Unauthorized)?;
    let claims = verify_token(&state.jwt_secret, &token).ok_or(ApiError::Unauthorized)?;

    if let Some(user_id) = query.user_id {
        if user_id != claims.sub {
            warn!("Gateway handshake for {} presented a token for {}", user_id, claims.sub);
            return Err(ApiError::Unauthorized);
        }
    }

    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, claims.sub)))
}
