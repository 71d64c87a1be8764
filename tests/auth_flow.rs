mod common;

use campus_stationery_api::{
    dto::auth::{LoginRequest, RegisterRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::Role,
    services::auth_service,
};

fn register(email: &str, password: &str, role: Option<Role>) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: password.to_string(),
        role,
        phone_number: Some("+919876543210".into()),
    }
}

#[tokio::test]
async fn register_then_login_issues_a_bearer_token() -> anyhow::Result<()> {
    // Every test in this binary uses the same secret.
    unsafe { std::env::set_var("JWT_SECRET", "campus-test-secret") };
    let (state, _) = common::setup_state().await?;

    let user = auth_service::register_user(
        &state,
        register("  Asha@Campus.Test ", "pencil42", None),
    )
    .await?;
    assert_eq!(user.email, "asha@campus.test");
    assert_eq!(user.role, Role::Student);

    let token = auth_service::login_user(
        &state,
        LoginRequest {
            email: "ASHA@campus.test".into(),
            password: "pencil42".into(),
        },
    )
    .await?;
    assert!(token.token.starts_with("Bearer "));

    let err = auth_service::login_user(
        &state,
        LoginRequest {
            email: "asha@campus.test".into(),
            password: "wrong-password".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    let me = auth_service::current_user(
        &state,
        &AuthUser {
            user_id: user.id,
            role: Role::Student,
        },
    )
    .await?;
    assert_eq!(me.phone_number.as_deref(), Some("+919876543210"));
    Ok(())
}

#[tokio::test]
async fn registration_rejects_bad_input() -> anyhow::Result<()> {
    let (state, _) = common::setup_state().await?;

    let err = auth_service::register_user(&state, register("short@campus.test", "123", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    let err = auth_service::register_user(
        &state,
        register("boss@campus.test", "secret99", Some(Role::Staff)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    auth_service::register_user(
        &state,
        register("shop@campus.test", "secret99", Some(Role::Shopkeeper)),
    )
    .await?;
    let err = auth_service::register_user(&state, register("SHOP@campus.test", "secret99", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");
    Ok(())
}
