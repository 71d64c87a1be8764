use std::collections::HashMap;

use chrono::Utc;
use password_hash::rand_core::{OsRng, RngCore};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CheckoutRequest, CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems,
        StatusUpdated, UpdateStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems, Model as CartItemModel},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        pickup_slots::{Column as SlotCol, Entity as PickupSlots, Model as SlotModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    gateway::{GatewayOrder, GatewayOrderRequest, OrderNotice, PaymentIntent, PaymentIntentRequest},
    middleware::auth::{AuthUser, ensure_store_role},
    models::{Order, OrderItem, OrderStatus},
    response::Meta,
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service,
    state::AppState,
};

pub async fn create_order(
    state: &AppState,
    student: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<OrderWithItems> {
    validate_lines(&payload.items)?;

    let txn = state.orm.begin().await?;
    let slot = match payload.pickup_slot {
        Some(slot_id) => Some(lock_open_slot(&txn, slot_id).await?),
        None => None,
    };

    let mut lines = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let product = Products::find_by_id(line.product)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("Product"))?;
        lines.push((product, line.quantity));
    }

    let placed = place_order(&txn, student.user_id, slot.as_ref(), lines).await?;
    txn.commit().await?;

    after_placed(state, student, &placed, "order_create").await;
    Ok(placed)
}

/// Turns the caller's cart into an order. Cart lines already hold their stock,
/// so checkout only moves them into order items and clears the cart.
pub async fn checkout(
    state: &AppState,
    student: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<OrderWithItems> {
    let txn = state.orm.begin().await?;

    let cart = cart_service::find_cart(&txn, student.user_id)
        .await?
        .ok_or_else(|| AppError::Validation("Cart is empty".into()))?;

    // Cart lines are only written under their product's lock. Lock every
    // product the cart references, re-reading until a read turns up no new
    // product, so the lines used below cannot change underneath us.
    let mut products: HashMap<Uuid, ProductModel> = HashMap::new();
    let cart_lines = loop {
        let cart_lines = CartItems::find()
            .filter(CartCol::CartId.eq(cart.id))
            .order_by_asc(CartCol::CreatedAt)
            .all(&txn)
            .await?;
        let missing = unlocked_products(&cart_lines, &products);
        if missing.is_empty() {
            break cart_lines;
        }
        let wanted = missing.len();
        let locked = Products::find()
            .filter(ProdCol::Id.is_in(missing))
            .order_by_asc(ProdCol::Id)
            .lock(LockType::Update)
            .all(&txn)
            .await?;
        if locked.len() != wanted {
            return Err(AppError::NotFound("Product"));
        }
        products.extend(locked.into_iter().map(|product| (product.id, product)));
    };
    if cart_lines.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }

    let slot = match payload.pickup_slot {
        Some(slot_id) => Some(lock_open_slot(&txn, slot_id).await?),
        None => None,
    };

    let line_ids: Vec<Uuid> = cart_lines.iter().map(|line| line.id).collect();
    let lines = cart_lines
        .into_iter()
        .filter_map(|line| {
            products
                .get(&line.product_id)
                .cloned()
                .map(|product| (product, line.quantity))
        })
        .collect();

    let placed = place_order(&txn, student.user_id, slot.as_ref(), lines).await?;

    // Only the lines that went into the order; a line for a product added
    // after the final read keeps its reservation in the cart.
    CartItems::delete_many()
        .filter(CartCol::Id.is_in(line_ids))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    after_placed(state, student, &placed, "checkout").await;
    Ok(placed)
}

pub async fn update_status(
    state: &AppState,
    acting: &AuthUser,
    order_id: Uuid,
    payload: UpdateStatusRequest,
) -> AppResult<StatusUpdated> {
    ensure_store_role(acting)?;
    let next: OrderStatus = payload
        .status
        .parse()
        .map_err(|_| AppError::Validation("Invalid status".into()))?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let order = transition(&txn, order, next).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, status = %next, "order status updated");
    audit::record(
        &state.orm,
        acting.user_id,
        "order_status_update",
        "orders",
        json!({ "order_id": order.id, "status": next.as_str() }),
    )
    .await;

    if next.notifies_student() {
        notify_status(state, order, next).await;
    }

    Ok(StatusUpdated {
        message: format!("Order status updated to {}", next.display_name()),
        status: next,
    })
}

/// Students may withdraw their own order while it is still pending.
pub async fn cancel_order(state: &AppState, student: &AuthUser, order_id: Uuid) -> AppResult<Order> {
    let txn = state.orm.begin().await?;
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(order_id))
                .add(OrderCol::StudentId.eq(student.user_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if order.status != OrderStatus::Pending.as_str() {
        return Err(AppError::Conflict(
            "Only pending orders can be cancelled".into(),
        ));
    }

    let order = transition(&txn, order, OrderStatus::Cancelled).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        student.user_id,
        "order_cancel",
        "orders",
        json!({ "order_id": order.id }),
    )
    .await;

    Ok(order.into())
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<(OrderList, Meta)> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if !user.role.can_manage_store() {
        condition = condition.add(OrderCol::StudentId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status
            .parse()
            .map_err(|_| AppError::Validation("Invalid status".into()))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find();
    if let Some(search) = query
        .search
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && user.role.can_manage_store())
    {
        let email_fragment = search.to_lowercase();
        finder = finder.join(sea_orm::JoinType::InnerJoin, orders::Relation::Users.def());
        condition = condition.add(
            Condition::any()
                .add(UserCol::Email.contains(&email_fragment))
                .add(OrderCol::PickupCode.eq(search)),
        );
    }

    let mut finder = finder.filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok((OrderList { items }, Meta::new(page, limit, total)))
}

pub async fn get_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderWithItems> {
    let order = find_visible_order(state, user, id).await?;
    let items = load_items(&state.orm, order.id).await?;
    Ok(OrderWithItems {
        order: order.into(),
        items,
    })
}

pub async fn create_payment_intent(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<PaymentIntent> {
    let order = find_payable_order(state, user, id).await?;

    let request = PaymentIntentRequest {
        amount: order.total_amount,
        currency: state.payment_currency.clone(),
        metadata: json!({ "order_id": order.id, "user_id": user.user_id }),
    };
    let intent = state.payments.create_intent(request).await.map_err(|err| {
        tracing::warn!(order_id = %order.id, error = %err, "payment intent failed");
        AppError::Internal(anyhow::anyhow!("Failed to create payment intent"))
    })?;

    audit::record(
        &state.orm,
        user.user_id,
        "payment_intent_create",
        "orders",
        json!({ "order_id": order.id, "intent_id": intent.id }),
    )
    .await;

    Ok(intent)
}

/// Registers the order with the payment provider so the client can collect
/// the amount against `receipt`.
pub async fn create_gateway_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<GatewayOrder> {
    let order = find_payable_order(state, user, id).await?;

    let request = GatewayOrderRequest {
        amount: order.total_amount,
        currency: state.payment_currency.to_uppercase(),
        receipt: format!("order_{}", order.id),
        notes: json!({ "order_id": order.id, "user_id": user.user_id }),
    };
    let gateway_order = state.payments.create_order(request).await.map_err(|err| {
        tracing::warn!(order_id = %order.id, error = %err, "payment gateway order failed");
        AppError::Internal(anyhow::anyhow!("Failed to create Razorpay order"))
    })?;

    audit::record(
        &state.orm,
        user.user_id,
        "payment_order_create",
        "orders",
        json!({ "order_id": order.id, "gateway_order_id": gateway_order.id }),
    )
    .await;

    Ok(gateway_order)
}

async fn find_payable_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    if order.student_id != user.user_id && !user.role.can_manage_store() {
        return Err(AppError::Forbidden);
    }
    Ok(order)
}

/// Six-digit code the student shows at the counter. Collisions are tolerated.
pub fn generate_pickup_code() -> String {
    (100_000 + OsRng.next_u32() % 900_000).to_string()
}

/// Distinct products referenced by `lines` that are not locked yet, in id order.
fn unlocked_products(lines: &[CartItemModel], locked: &HashMap<Uuid, ProductModel>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = lines
        .iter()
        .map(|line| line.product_id)
        .filter(|id| !locked.contains_key(id))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

fn validate_lines(items: &[OrderLineRequest]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::Validation("Order must contain at least one item".into()));
    }
    if items.iter().any(|line| line.quantity < 1) {
        return Err(AppError::Validation("Quantity must be at least 1".into()));
    }
    Ok(())
}

/// Locks the slot row for the rest of the transaction and rejects slots that cannot take an order.
async fn lock_open_slot(txn: &DatabaseTransaction, slot_id: Uuid) -> AppResult<SlotModel> {
    let slot = PickupSlots::find_by_id(slot_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("Pickup slot"))?;
    if !slot.is_available {
        return Err(AppError::Unavailable(
            "This time slot is not available".into(),
        ));
    }
    if slot.is_full() {
        return Err(AppError::SlotFull);
    }
    Ok(slot)
}

/// Writes the order, its price-snapshotted items and the recomputed total,
/// then claims one unit of slot capacity.
async fn place_order(
    txn: &DatabaseTransaction,
    student_id: Uuid,
    slot: Option<&SlotModel>,
    lines: Vec<(ProductModel, i32)>,
) -> AppResult<OrderWithItems> {
    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        student_id: Set(student_id),
        pickup_slot_id: Set(slot.map(|s| s.id)),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        pickup_code: Set(generate_pickup_code()),
        total_amount: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for (product, quantity) in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(quantity),
            price_at_order_time: Set(product.price),
        }
        .insert(txn)
        .await?;
        items.push(OrderItem::from_entity(item, Some(product.name)));
    }

    let total_amount = persisted_total(txn, order.id).await?;
    let mut active: OrderActive = order.into();
    active.total_amount = Set(total_amount);
    let order = active.update(txn).await?;

    if let Some(slot) = slot {
        let claimed = PickupSlots::update_many()
            .col_expr(SlotCol::CurrentOrders, Expr::col(SlotCol::CurrentOrders).add(1))
            .filter(SlotCol::Id.eq(slot.id))
            .filter(Expr::col(SlotCol::CurrentOrders).lt(Expr::col(SlotCol::MaxOrders)))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(AppError::SlotFull);
        }
    }

    Ok(OrderWithItems {
        order: order.into(),
        items,
    })
}

/// Sum of the stored item subtotals; the order total is always derived from these rows.
async fn persisted_total<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<i64> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?
        .iter()
        .map(|item| item.subtotal())
        .sum())
}

async fn transition(
    txn: &DatabaseTransaction,
    order: OrderModel,
    next: OrderStatus,
) -> AppResult<OrderModel> {
    let current: OrderStatus = order.status.parse().map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "order {} has unknown status {}",
            order.id,
            order.status
        ))
    })?;
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Cannot move order from {} to {}",
            current.display_name(),
            next.display_name()
        )));
    }

    if next == OrderStatus::Cancelled {
        if let Some(slot_id) = order.pickup_slot_id {
            release_slot(txn, slot_id).await?;
        }
    }

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(txn).await?)
}

async fn release_slot(txn: &DatabaseTransaction, slot_id: Uuid) -> AppResult<()> {
    let released = PickupSlots::update_many()
        .col_expr(SlotCol::CurrentOrders, Expr::col(SlotCol::CurrentOrders).sub(1))
        .filter(SlotCol::Id.eq(slot_id))
        .filter(SlotCol::CurrentOrders.gt(0))
        .exec(txn)
        .await?;
    if released.rows_affected == 0 {
        tracing::warn!(slot_id = %slot_id, "no slot capacity to release");
    }
    Ok(())
}

async fn find_visible_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderModel> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if !user.role.can_manage_store() {
        condition = condition.add(OrderCol::StudentId.eq(user.user_id));
    }
    Orders::find()
        .filter(condition)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))
}

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .find_also_related(Products)
        .all(conn)
        .await?
        .into_iter()
        .map(|(item, product)| OrderItem::from_entity(item, product.map(|p| p.name)))
        .collect())
}

async fn order_notice(state: &AppState, order: Order, items: Vec<OrderItem>) -> Option<OrderNotice> {
    match Users::find_by_id(order.student_id).one(&state.orm).await {
        Ok(Some(student)) => Some(OrderNotice {
            order,
            items,
            email: student.email,
            phone_number: student.phone_number,
        }),
        Ok(None) => {
            tracing::warn!(order_id = %order.id, "order has no student to notify");
            None
        }
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "could not load student for notification");
            None
        }
    }
}

async fn after_placed(state: &AppState, student: &AuthUser, placed: &OrderWithItems, action: &str) {
    tracing::info!(
        order_id = %placed.order.id,
        total_amount = placed.order.total_amount,
        pickup_slot = ?placed.order.pickup_slot_id,
        "order placed"
    );
    audit::record(
        &state.orm,
        student.user_id,
        action,
        "orders",
        json!({ "order_id": placed.order.id, "total_amount": placed.order.total_amount }),
    )
    .await;

    let Some(notice) = order_notice(state, placed.order.clone(), placed.items.clone()).await else {
        return;
    };
    if let Err(err) = state.notifier.send_order_confirmation(&notice).await {
        tracing::warn!(order_id = %placed.order.id, error = %err, "order confirmation email failed");
    }
    if notice.sms_recipient().is_some() {
        if let Err(err) = state.notifier.send_order_sms(&notice).await {
            tracing::warn!(order_id = %placed.order.id, error = %err, "order confirmation sms failed");
        }
    }
}

async fn notify_status(state: &AppState, order: OrderModel, status: OrderStatus) {
    let items = match load_items(&state.orm, order.id).await {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "could not load items for notification");
            return;
        }
    };
    let Some(notice) = order_notice(state, order.into(), items).await else {
        return;
    };
    if let Err(err) = state.notifier.send_status_update(&notice, status).await {
        tracing::warn!(order_id = %notice.order.id, error = %err, "status notification failed");
    }
}
