use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use devhub_types::api::Claims;

/// Mint a bearer token for `user_id`. The identity provider does this in
/// production; the server uses it for local tooling and tests.
pub fn create_token(secret: &str, user_id: &str, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// `None` for anything that is not a valid, unexpired token signed with `secret`.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
    .filter(|claims| !claims.sub.is_empty())
}
