use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{CartMutation, CartTotals, CartView, UpdateCartItemRequest},
    error::AppResult,
    middleware::auth::{AuthUser, MaybeAuthUser},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(view_cart))
        .route("/add/{product_id}", post(add_to_cart))
        .route("/update/{item_id}", post(update_cart_item))
        .route("/remove/{item_id}", post(remove_from_cart))
        .route("/summary", get(cart_summary))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current user's cart", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn view_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let cart = cart_service::view_cart(&state, &user).await?;
    Ok(Json(ApiResponse::success("OK", cart, None)))
}

#[utoipa::path(
    post,
    path = "/api/cart/add/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "One unit reserved into the cart", body = ApiResponse<CartMutation>),
        (status = 400, description = "Out of stock or unavailable"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartMutation>>> {
    let result = cart_service::add_item(&state, &user, product_id).await?;
    Ok(Json(ApiResponse::success("Added to cart", result, None)))
}

#[utoipa::path(
    post,
    path = "/api/cart/update/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Cart item ID")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Cart line quantity changed", body = ApiResponse<CartMutation>),
        (status = 400, description = "Invalid quantity or out of stock"),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartMutation>>> {
    let result = cart_service::update_item(&state, &user, item_id, payload.quantity).await?;
    Ok(Json(ApiResponse::success("Cart updated", result, None)))
}

#[utoipa::path(
    post,
    path = "/api/cart/remove/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Line removed and stock restored", body = ApiResponse<CartMutation>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartMutation>>> {
    let result = cart_service::remove_item(&state, &user, item_id).await?;
    Ok(Json(ApiResponse::success("Removed from cart", result, None)))
}

#[utoipa::path(
    get,
    path = "/api/cart/summary",
    responses(
        (status = 200, description = "Item count and subtotal; zeros for anonymous callers", body = ApiResponse<CartTotals>)
    ),
    tag = "Cart"
)]
pub async fn cart_summary(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> AppResult<Json<ApiResponse<CartTotals>>> {
    let totals = cart_service::summary(&state, user.as_ref()).await?;
    Ok(Json(ApiResponse::success("OK", totals, None)))
}
