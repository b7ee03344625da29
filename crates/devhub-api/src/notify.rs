use tracing::{debug, warn};

use devhub_types::models::NotificationKind;

use crate::state::AppState;

/// What happened to a best-effort notification. Callers never turn this into
/// an error; the action that triggered it has already succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Created(String),
    /// Actor and recipient are the same user.
    SuppressedSelf,
    Failed,
}

/// Record that `actor` did `kind` to `recipient`. Self-notifications are
/// dropped for every kind. Failures are logged and swallowed.
pub async fn notify(
    state: &AppState,
    kind: NotificationKind,
    recipient: &str,
    actor: &str,
    post_id: Option<&str>,
) -> NotifyOutcome {
    if recipient == actor {
        debug!("Suppressed self {} notification for {}", kind, actor);
        return NotifyOutcome::SuppressedSelf;
    }

    let db = state.clone();
    let (recipient_owned, actor_owned) = (recipient.to_string(), actor.to_string());
    let post_owned = post_id.map(str::to_string);
    let result = tokio::task::spawn_blocking(move || {
        db.db
            .insert_notification(kind, &recipient_owned, &actor_owned, post_owned.as_deref())
    })
    .await;

    match result {
        Ok(Ok(id)) => NotifyOutcome::Created(id),
        Ok(Err(e)) => {
            warn!("Failed to create {} notification for {} (actor {}): {:#}", kind, recipient, actor, e);
            NotifyOutcome::Failed
        }
        Err(e) => {
            warn!("Notification task for {} panicked: {}", recipient, e);
            NotifyOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devhub_db::Database;
    use devhub_db::models::ProfileFields;
    use devhub_gateway::dispatcher::Dispatcher;

    use crate::state::AppStateInner;

    fn state_with(users: &[&str]) -> AppState {
        let db = Database::open_in_memory().unwrap();
        for id in users {
            db.upsert_profile(id, &ProfileFields::default()).unwrap();
        }
        AppStateInner::new(db, "test-secret".into(), Dispatcher::new())
    }

    #[tokio::test]
    async fn creates_for_other_users() {
        let state = state_with(&["u1", "u2"]);
        let outcome = notify(&state, NotificationKind::Follow, "u2", "u1", None).await;
        assert!(matches!(outcome, NotifyOutcome::Created(_)));
        assert_eq!(state.db.unread_count("u2").unwrap(), 1);
    }

    #[tokio::test]
    async fn self_notifications_are_suppressed_for_every_kind() {
        let state = state_with(&["u1"]);
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::Follow,
            NotificationKind::Message,
        ] {
            assert_eq!(notify(&state, kind, "u1", "u1", None).await, NotifyOutcome::SuppressedSelf);
        }
        assert_eq!(state.db.unread_count("u1").unwrap(), 0);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_not_raised() {
        // actor does not exist, so the foreign key rejects the insert
        let state = state_with(&["u2"]);
        let outcome = notify(&state, NotificationKind::Like, "u2", "ghost", None).await;
        assert_eq!(outcome, NotifyOutcome::Failed);
        assert_eq!(state.db.unread_count("u2").unwrap(), 0);
    }
}
