use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::slots::{CreateSlotRequest, SlotList},
    entity::pickup_slots::{ActiveModel as SlotActive, Column as SlotCol, Entity as PickupSlots},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_store_role},
    models::PickupSlot,
    state::AppState,
};

const DEFAULT_MAX_ORDERS: i32 = 10;

/// Future, enabled slots that still have capacity, earliest first.
pub async fn list_available(state: &AppState) -> AppResult<SlotList> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let items = PickupSlots::find()
        .filter(SlotCol::IsAvailable.eq(true))
        .filter(SlotCol::StartTime.gte(now))
        .filter(Expr::col(SlotCol::CurrentOrders).lt(Expr::col(SlotCol::MaxOrders)))
        .order_by_asc(SlotCol::StartTime)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(PickupSlot::from)
        .collect();

    Ok(SlotList { items })
}

pub async fn create_slot(
    state: &AppState,
    user: &AuthUser,
    payload: CreateSlotRequest,
) -> AppResult<PickupSlot> {
    ensure_store_role(user)?;
    if payload.end_time <= payload.start_time {
        return Err(AppError::Validation(
            "end_time must be after start_time".into(),
        ));
    }
    let max_orders = payload.max_orders.unwrap_or(DEFAULT_MAX_ORDERS);
    if max_orders < 1 {
        return Err(AppError::Validation("max_orders must be at least 1".into()));
    }

    let slot = SlotActive {
        id: Set(Uuid::new_v4()),
        start_time: Set(payload.start_time.into()),
        end_time: Set(payload.end_time.into()),
        max_orders: Set(max_orders),
        current_orders: Set(0),
        is_available: Set(true),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        user.user_id,
        "slot_create",
        "pickup_slots",
        json!({ "slot_id": slot.id, "max_orders": max_orders }),
    )
    .await;

    Ok(slot.into())
}
