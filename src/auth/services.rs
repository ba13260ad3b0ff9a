use axum::extract::FromRef;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    dto::{normalize_email, FieldErrors, RegisterForm},
    jwt::SessionKeys,
    password::{hash_password, verify_dummy, verify_password},
    repo::{StoreError, UniqueField},
    repo_types::User,
};
use crate::state::AppState;

/// Authenticated principal attached to gated requests.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Uuid,
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("registration rejected")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("password hashing failed: {0}")]
    Hash(anyhow::Error),
}

fn duplicate_message(errors: &mut FieldErrors, field: UniqueField) {
    match field {
        UniqueField::Username => errors.push("username", "This username is already taken."),
        UniqueField::Email => errors.push("email", "This email is already registered."),
    }
}

/// Creates a user from an already validated form.
pub async fn register(state: &AppState, form: &RegisterForm) -> Result<User, RegisterError> {
    let mut taken = FieldErrors::default();
    if state.users.find_by_username(&form.username).await?.is_some() {
        duplicate_message(&mut taken, UniqueField::Username);
    }
    if state.users.find_by_email(&form.email).await?.is_some() {
        duplicate_message(&mut taken, UniqueField::Email);
    }
    if !taken.is_empty() {
        warn!(username = %form.username, "registration with taken username or email");
        return Err(RegisterError::Invalid(taken));
    }

    let hash = hash_password(&form.password).map_err(RegisterError::Hash)?;

    // A concurrent registration can still win the race; the constraint catches it.
    match state.users.create(&form.username, &form.email, &hash).await {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "user registered");
            Ok(user)
        }
        Err(StoreError::Duplicate(field)) => {
            let mut errors = FieldErrors::default();
            duplicate_message(&mut errors, field);
            Err(RegisterError::Invalid(errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the user only when the email exists and the password matches.
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<User>, StoreError> {
    let email = normalize_email(email);
    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_dummy(password);
        debug!("login for unknown email");
        return Ok(None);
    };

    match verify_password(password, &user.password_hash) {
        Ok(true) => Ok(Some(user)),
        Ok(false) => {
            debug!(user_id = user.id, "login with wrong password");
            Ok(None)
        }
        Err(e) => {
            error!(error = %e, user_id = user.id, "stored password hash is unreadable");
            Ok(None)
        }
    }
}

/// Persists a session row and returns the signed token for the cookie.
pub async fn start_session(state: &AppState, user: &User) -> anyhow::Result<String> {
    let keys = SessionKeys::from_ref(state);
    let now = OffsetDateTime::now_utc();
    let purged = state.sessions.purge_expired(now).await?;
    if purged > 0 {
        debug!(purged, "expired sessions removed");
    }
    let expires_at = keys.expires_at(now);
    let session = state.sessions.create(user.id, expires_at).await?;
    let token = keys.sign(user.id, session.id, session.expires_at)?;
    info!(user_id = user.id, session_id = %session.id, "session started");
    Ok(token)
}

/// Maps a session token to its user. Any mismatch yields `None`.
pub async fn resolve_session(
    state: &AppState,
    token: &str,
) -> Result<Option<CurrentUser>, StoreError> {
    let keys = SessionKeys::from_ref(state);
    let claims = match keys.verify(token) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "session token rejected");
            return Ok(None);
        }
    };

    let Some(session) = state.sessions.find(claims.sid).await? else {
        return Ok(None);
    };
    if session.is_expired(OffsetDateTime::now_utc()) {
        state.sessions.delete(session.id).await?;
        debug!(session_id = %session.id, "expired session removed");
        return Ok(None);
    }
    if session.user_id != claims.sub {
        return Ok(None);
    }

    let user = state.users.find_by_id(session.user_id).await?;
    Ok(user.map(|user| CurrentUser {
        user,
        session_id: session.id,
    }))
}

pub async fn end_session(state: &AppState, current: &CurrentUser) -> Result<(), StoreError> {
    state.sessions.delete(current.session_id).await?;
    info!(user_id = current.user.id, session_id = %current.session_id, "session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_state, StubDisk};

    fn form(username: &str, email: &str, password: &str) -> RegisterForm {
        let mut f = RegisterForm {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: password.into(),
        };
        assert!(f.validate().is_empty());
        f
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_second_row() {
        let (state, mem) = test_state(StubDisk::ok(serde_json::json!({})));
        register(&state, &form("alice", "alice@example.com", "secret1"))
            .await
            .expect("first registration");

        let err = register(&state, &form("alice2", "ALICE@example.com", "secret2"))
            .await
            .unwrap_err();
        match err {
            RegisterError::Invalid(errors) => assert!(errors.has("email")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mem.users.count(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (state, mem) = test_state(StubDisk::ok(serde_json::json!({})));
        register(&state, &form("alice", "a@example.com", "secret1")).await.unwrap();
        let err = register(&state, &form("alice", "b@example.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::Invalid(ref e) if e.has("username")));
        assert_eq!(mem.users.count(), 1);
    }

    #[tokio::test]
    async fn stored_user_has_no_plaintext_password() {
        let (state, _) = test_state(StubDisk::ok(serde_json::json!({})));
        let user = register(&state, &form("carol", "carol@example.com", "hunter22"))
            .await
            .unwrap();
        assert!(!user.password_hash.contains("hunter22"));
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("hunter22"));
    }

    #[tokio::test]
    async fn authenticate_accepts_only_the_right_password() {
        let (state, _) = test_state(StubDisk::ok(serde_json::json!({})));
        register(&state, &form("dave", "dave@example.com", "right-pass")).await.unwrap();

        let ok = authenticate(&state, "Dave@Example.com", "right-pass").await.unwrap();
        assert_eq!(ok.map(|u| u.username), Some("dave".to_string()));

        for wrong in ["", "right-pas", "right-pass ", "RIGHT-PASS"] {
            assert!(authenticate(&state, "dave@example.com", wrong).await.unwrap().is_none());
        }
        assert!(authenticate(&state, "nobody@example.com", "right-pass")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn session_roundtrip_and_revocation() {
        let (state, mem) = test_state(StubDisk::ok(serde_json::json!({})));
        let user = register(&state, &form("erin", "erin@example.com", "secret1")).await.unwrap();

        let token = start_session(&state, &user).await.unwrap();
        let current = resolve_session(&state, &token).await.unwrap().expect("live session");
        assert_eq!(current.user.id, user.id);

        assert_eq!(mem.sessions.count(), 1);
        end_session(&state, &current).await.unwrap();
        assert_eq!(mem.sessions.count(), 0);
        assert!(resolve_session(&state, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_row_is_removed_on_lookup() {
        let (state, mem) = test_state(StubDisk::ok(serde_json::json!({})));
        let user = register(&state, &form("frank", "frank@example.com", "secret1")).await.unwrap();
        let keys = SessionKeys::from_ref(&state);
        let now = OffsetDateTime::now_utc();

        let stale = state
            .sessions
            .create(user.id, now - time::Duration::minutes(1))
            .await
            .unwrap();
        let token = keys.sign(user.id, stale.id, keys.expires_at(now)).unwrap();
        assert_eq!(mem.sessions.count(), 1);

        assert!(resolve_session(&state, &token).await.unwrap().is_none());
        assert_eq!(mem.sessions.count(), 0);
    }

    #[tokio::test]
    async fn starting_a_session_purges_expired_rows() {
        let (state, mem) = test_state(StubDisk::ok(serde_json::json!({})));
        let user = register(&state, &form("gina", "gina@example.com", "secret1")).await.unwrap();
        let past = OffsetDateTime::now_utc() - time::Duration::hours(1);
        for _ in 0..3 {
            state.sessions.create(user.id, past).await.unwrap();
        }
        assert_eq!(mem.sessions.count(), 3);

        let token = start_session(&state, &user).await.unwrap();
        assert_eq!(mem.sessions.count(), 1);
        assert!(resolve_session(&state, &token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn garbage_token_resolves_to_none() {
        let (state, _) = test_state(StubDisk::ok(serde_json::json!({})));
        assert!(resolve_session(&state, "not.a.token").await.unwrap().is_none());
    }
}
