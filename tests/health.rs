mod common;

use axum::{extract::State, http::StatusCode};
use campus_stationery_api::routes::health::health_check;

#[tokio::test]
async fn health_check_reports_database_up() -> anyhow::Result<()> {
    let (state, _) = common::setup_state().await?;

    let (status, response) = health_check(State(state)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.0.success);

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.database, "up");
    Ok(())
}
