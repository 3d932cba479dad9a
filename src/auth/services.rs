use tracing::{info, warn};

use crate::auth::{
    dto::{ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest},
    errors::AuthError,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::{StoreError, UserStore},
    repo_types::User,
};

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

pub async fn register(store: &dyn UserStore, req: RegisterRequest) -> Result<User, AuthError> {
    let (username, email, password) = match (
        required(&req.username),
        required(&req.email),
        required(&req.password),
    ) {
        (Some(u), Some(e), Some(p)) => (u, e, p),
        _ => return Err(AuthError::MissingFields),
    };

    let hash = hash_password(password)?;
    let user = store
        .create_user(username, email, &hash, req.phone.as_deref())
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => AuthError::DuplicateAccount,
            other => AuthError::Store(other),
        })?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Check credentials and issue a token. Unknown email and wrong password
/// stay distinct here for logging; the HTTP layer conflates them.
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<String, AuthError> {
    let (email, password) = match (required(&req.email), required(&req.password)) {
        (Some(e), Some(p)) => (e, p),
        _ => return Err(AuthError::MissingFields),
    };

    let user = match store.find_by_email(email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login for unknown email");
            return Err(AuthError::NotFound);
        }
    };

    if !verify_password(password, &user.password_hash) {
        warn!(user_id = user.id, "login with wrong password");
        return Err(AuthError::BadCredentials);
    }

    let token = keys.sign(user.id, &user.username)?;
    info!(user_id = user.id, "user logged in");
    Ok(token)
}

pub async fn get_profile(store: &dyn UserStore, user_id: i64) -> Result<User, AuthError> {
    store
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::NotFound)
}

pub async fn update_profile(
    store: &dyn UserStore,
    user_id: i64,
    req: UpdateProfileRequest,
) -> Result<(), AuthError> {
    store
        .update_profile(user_id, &req.username, &req.email, req.phone.as_deref())
        .await?;
    info!(user_id, "profile updated");
    Ok(())
}

pub async fn change_password(
    store: &dyn UserStore,
    user_id: i64,
    req: ChangePasswordRequest,
) -> Result<(), AuthError> {
    let (old_password, new_password) = match (
        required(&req.old_password),
        required(&req.new_password),
    ) {
        (Some(o), Some(n)) => (o, n),
        _ => return Err(AuthError::MissingFields),
    };

    let user = store
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::NotFound)?;

    if !verify_password(old_password, &user.password_hash) {
        warn!(user_id, "password change with wrong old password");
        return Err(AuthError::BadOldPassword);
    }

    let hash = hash_password(new_password)?;
    store.update_password(user_id, &hash).await?;
    info!(user_id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jsonwebtoken::{DecodingKey, EncodingKey};

    use super::*;
    use crate::auth::repo::memory::InMemoryStore;

    fn make_keys() -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(b"test-secret"),
            decoding: DecodingKey::from_secret(b"test-secret"),
            ttl: Duration::from_secs(3600),
        }
    }

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            phone: None,
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn register_rejects_missing_fields() {
        let store = InMemoryStore::default();
        let req = RegisterRequest {
            username: Some("alice".into()),
            email: None,
            password: Some("pw1".into()),
            phone: None,
        };
        let err = register(&store, req).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingFields));

        // empty strings count as missing too
        let req = RegisterRequest {
            username: Some("".into()),
            email: Some("a@x.com".into()),
            password: Some("pw1".into()),
            phone: None,
        };
        let err = register(&store, req).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingFields));
    }

    #[tokio::test]
    async fn register_stores_a_hash_not_the_password() {
        let store = InMemoryStore::default();
        let user = register(&store, register_req("alice", "a@x.com", "pw1"))
            .await
            .expect("register");
        assert_ne!(user.password_hash, "pw1");
        assert!(verify_password("pw1", &user.password_hash));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryStore::default();
        register(&store, register_req("alice", "a@x.com", "pw1"))
            .await
            .expect("first register");
        let err = register(&store, register_req("alice2", "a@x.com", "pw2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount));
    }

    #[tokio::test]
    async fn concurrent_registrations_one_wins() {
        let store = InMemoryStore::default();
        let (a, b) = tokio::join!(
            register(&store, register_req("alice", "a@x.com", "pw1")),
            register(&store, register_req("bob", "a@x.com", "pw2")),
        );
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn login_missing_fields() {
        let store = InMemoryStore::default();
        let keys = make_keys();
        let req = LoginRequest {
            email: Some("a@x.com".into()),
            password: None,
        };
        let err = login(&store, &keys, req).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingFields));
    }

    #[tokio::test]
    async fn login_unknown_email_vs_wrong_password() {
        let store = InMemoryStore::default();
        let keys = make_keys();
        register(&store, register_req("alice", "a@x.com", "pw1"))
            .await
            .expect("register");

        let err = login(&store, &keys, login_req("nobody@x.com", "pw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));

        let err = login(&store, &keys, login_req("a@x.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
    }

    #[tokio::test]
    async fn login_issues_a_verifiable_token() {
        let store = InMemoryStore::default();
        let keys = make_keys();
        let user = register(&store, register_req("alice", "a@x.com", "pw1"))
            .await
            .expect("register");

        let token = login(&store, &keys, login_req("a@x.com", "pw1"))
            .await
            .expect("login");
        let identity = keys.verify(&token).expect("token verifies");
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn get_profile_unknown_id() {
        let store = InMemoryStore::default();
        let err = get_profile(&store, 999).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn update_profile_overwrites_fields() {
        let store = InMemoryStore::default();
        let user = register(&store, register_req("alice", "a@x.com", "pw1"))
            .await
            .expect("register");

        update_profile(
            &store,
            user.id,
            UpdateProfileRequest {
                username: "alicia".into(),
                email: "alicia@x.com".into(),
                phone: Some("555-0100".into()),
            },
        )
        .await
        .expect("update");

        let updated = get_profile(&store, user.id).await.expect("profile");
        assert_eq!(updated.username, "alicia");
        assert_eq!(updated.email, "alicia@x.com");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn change_password_requires_matching_old_password() {
        let store = InMemoryStore::default();
        let user = register(&store, register_req("alice", "a@x.com", "pw1"))
            .await
            .expect("register");

        let err = change_password(
            &store,
            user.id,
            ChangePasswordRequest {
                old_password: Some("nope".into()),
                new_password: Some("pw2".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::BadOldPassword));

        let err = change_password(
            &store,
            user.id,
            ChangePasswordRequest {
                old_password: Some("pw1".into()),
                new_password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::MissingFields));
    }

    #[tokio::test]
    async fn change_password_for_vanished_user() {
        let store = InMemoryStore::default();
        let err = change_password(
            &store,
            42,
            ChangePasswordRequest {
                old_password: Some("pw1".into()),
                new_password: Some("pw2".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn full_account_lifecycle() {
        let store = InMemoryStore::default();
        let keys = make_keys();

        register(&store, register_req("alice", "a@x.com", "pw1"))
            .await
            .expect("register");

        let token = login(&store, &keys, login_req("a@x.com", "pw1"))
            .await
            .expect("login with original password");
        let identity = keys.verify(&token).expect("token verifies");

        let profile = get_profile(&store, identity.id).await.expect("profile");
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.email, "a@x.com");
        assert_eq!(profile.phone, None);

        change_password(
            &store,
            identity.id,
            ChangePasswordRequest {
                old_password: Some("pw1".into()),
                new_password: Some("pw2".into()),
            },
        )
        .await
        .expect("change password");

        let err = login(&store, &keys, login_req("a@x.com", "pw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));

        let token = login(&store, &keys, login_req("a@x.com", "pw2"))
            .await
            .expect("login with new password");
        assert_eq!(keys.verify(&token).expect("verifies").id, identity.id);
    }
}
