use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::slots::{CreateSlotRequest, SlotList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::PickupSlot,
    response::{ApiResponse, Meta},
    services::slot_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_slot))
        .route("/available", get(available_slots))
}

#[utoipa::path(
    get,
    path = "/api/time-slots/available",
    responses(
        (status = 200, description = "Future pickup slots that still have capacity", body = ApiResponse<SlotList>)
    ),
    tag = "Pickup Slots"
)]
pub async fn available_slots(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<SlotList>>> {
    let slots = slot_service::list_available(&state).await?;
    Ok(Json(ApiResponse::success("OK", slots, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/time-slots",
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Pickup slot created", body = ApiResponse<PickupSlot>),
        (status = 400, description = "Invalid window or capacity"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pickup Slots"
)]
pub async fn create_slot(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSlotRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PickupSlot>>)> {
    let slot = slot_service::create_slot(&state, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Pickup slot created", slot, Some(Meta::empty()))),
    ))
}
