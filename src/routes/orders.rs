use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CheckoutRequest, CreateOrderRequest, OrderList, OrderWithItems, StatusUpdated,
        UpdateStatusRequest,
    },
    error::AppResult,
    gateway::{GatewayOrder, PaymentIntent},
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/checkout", post(checkout))
        .route("/{id}", get(get_order))
        .route("/{id}/update_status", post(update_status))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/payment_intent", post(create_payment_intent))
        .route("/{id}/razorpay_order", post(create_gateway_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("search" = Option<String>, Query, description = "Student email or pickup code (shopkeepers)"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Own orders, or every order for shopkeepers", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let (orders, meta) = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(ApiResponse::success("Ok", orders, Some(meta))))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Invalid items or slot full"),
        (status = 404, description = "Product or slot not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderWithItems>>)> {
    let order = order_service::create_order(&state, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Order placed", order, Some(Meta::empty()))),
    ))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Cart converted into an order", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Cart empty or slot full"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderWithItems>>)> {
    let order = order_service::checkout(&state, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Checkout success", order, Some(Meta::empty()))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let order = order_service::get_order(&state, &user, id).await?;
    Ok(Json(ApiResponse::success("OK", order, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/update_status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<StatusUpdated>),
        (status = 400, description = "Invalid status"),
        (status = 403, description = "Caller is not a shopkeeper or staff"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transition not allowed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<StatusUpdated>>> {
    let updated = order_service::update_status(&state, &user, id, payload).await?;
    let message = updated.message.clone();
    Ok(Json(ApiResponse::success(message, updated, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<Order>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order is no longer pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_service::cancel_order(&state, &user, id).await?;
    Ok(Json(ApiResponse::success("Order cancelled", order, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment_intent",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Payment intent created", body = ApiResponse<PaymentIntent>),
        (status = 403, description = "Not the order owner"),
        (status = 404, description = "Not Found"),
        (status = 500, description = "Payment gateway failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentIntent>>> {
    let intent = order_service::create_payment_intent(&state, &user, id).await?;
    Ok(Json(ApiResponse::success("Payment intent created", intent, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/razorpay_order",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Provider order created with receipt order_{id}", body = ApiResponse<GatewayOrder>),
        (status = 403, description = "Not the order owner"),
        (status = 404, description = "Not Found"),
        (status = 500, description = "Payment gateway failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_gateway_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<GatewayOrder>>> {
    let gateway_order = order_service::create_gateway_order(&state, &user, id).await?;
    Ok(Json(ApiResponse::success("Payment order created", gateway_order, Some(Meta::empty()))))
}
