//! Cart mutations against catalog stock.
//!
//! Adding an item to a cart reserves it: the product's `stock` drops as the
//! line grows and rises again when the line shrinks or is removed. Every
//! mutation runs in one transaction holding the product row lock, and every
//! cart-line write happens under that lock, so `line.quantity + stock` is
//! conserved across add/update/remove.

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{CartLine, CartMutation, CartTotals, CartView},
    entity::{
        cart_items::{self, ActiveModel as CartItemActive, Column as CartCol, Entity as CartItems},
        carts::{ActiveModel as CartActive, Column as CartsCol, Entity as Carts, Model as CartModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    state::AppState,
};

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<CartMutation> {
    let txn = state.orm.begin().await?;

    let product = lock_product(&txn, product_id).await?;
    if !product.is_available {
        return Err(AppError::Unavailable(
            "This product is currently unavailable".into(),
        ));
    }
    if product.stock <= 0 {
        return Err(AppError::out_of_stock(0));
    }

    let cart = get_or_create_cart(&txn, user.user_id).await?;
    let existing = CartItems::find()
        .filter(CartCol::CartId.eq(cart.id))
        .filter(CartCol::ProductId.eq(product.id))
        .one(&txn)
        .await?;

    let quantity = match existing {
        Some(line) => {
            if line.quantity >= product.stock {
                return Err(AppError::out_of_stock(product.stock));
            }
            let quantity = line.quantity + 1;
            let mut active: CartItemActive = line.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
            quantity
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(1),
                created_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?;
            1
        }
    };

    let available_quantity = shift_stock(&txn, &product, 1).await?;
    let totals = cart_totals(&txn, cart.id).await?;
    txn.commit().await?;

    tracing::debug!(
        user_id = %user.user_id,
        product_id = %product.id,
        quantity,
        available_quantity,
        "cart item added"
    );
    audit::record(
        &state.orm,
        user.user_id,
        "cart_add",
        "cart_items",
        json!({ "product_id": product.id, "quantity": quantity }),
    )
    .await;

    Ok(CartMutation {
        totals,
        item_total: None,
        available_quantity: Some(available_quantity),
    })
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    quantity: i32,
) -> AppResult<CartMutation> {
    if quantity < 1 {
        return Err(AppError::Validation("Quantity must be at least 1".into()));
    }

    let txn = state.orm.begin().await?;
    let peek = find_owned_line(&txn, user.user_id, item_id).await?;
    let product = lock_product(&txn, peek.product_id).await?;
    let line = find_owned_line(&txn, user.user_id, item_id).await?;

    let delta = quantity - line.quantity;
    if delta > 0 && product.stock < delta {
        return Err(AppError::out_of_stock(product.stock));
    }

    let available_quantity = if delta == 0 {
        product.stock
    } else {
        shift_stock(&txn, &product, delta).await?
    };

    let cart_id = line.cart_id;
    let mut active: CartItemActive = line.into();
    active.quantity = Set(quantity);
    active.update(&txn).await?;

    let totals = cart_totals(&txn, cart_id).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_update",
        "cart_items",
        json!({ "item_id": item_id, "product_id": product.id, "quantity": quantity }),
    )
    .await;

    Ok(CartMutation {
        totals,
        item_total: Some(product.price * i64::from(quantity)),
        available_quantity: Some(available_quantity),
    })
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<CartMutation> {
    let txn = state.orm.begin().await?;
    let peek = find_owned_line(&txn, user.user_id, item_id).await?;
    let product = lock_product(&txn, peek.product_id).await?;
    let line = find_owned_line(&txn, user.user_id, item_id).await?;

    let available_quantity = shift_stock(&txn, &product, -line.quantity).await?;
    CartItems::delete_by_id(line.id).exec(&txn).await?;

    let totals = cart_totals(&txn, line.cart_id).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_remove",
        "cart_items",
        json!({ "item_id": item_id, "product_id": product.id, "restored": line.quantity }),
    )
    .await;

    Ok(CartMutation {
        totals,
        item_total: None,
        available_quantity: Some(available_quantity),
    })
}

/// Totals for the caller's cart; anonymous callers and callers without a cart get zeros.
pub async fn summary(state: &AppState, user: Option<&AuthUser>) -> AppResult<CartTotals> {
    let Some(user) = user else {
        return Ok(CartTotals::default());
    };
    match find_cart(&state.orm, user.user_id).await? {
        Some(cart) => cart_totals(&state.orm, cart.id).await,
        None => Ok(CartTotals::default()),
    }
}

pub async fn view_cart(state: &AppState, user: &AuthUser) -> AppResult<CartView> {
    let Some(cart) = find_cart(&state.orm, user.user_id).await? else {
        return Ok(CartView {
            id: None,
            items: Vec::new(),
            totals: CartTotals::default(),
        });
    };

    let rows = CartItems::find()
        .filter(CartCol::CartId.eq(cart.id))
        .order_by_asc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut totals = CartTotals::default();
    let mut items = Vec::with_capacity(rows.len());
    for (line, product) in rows {
        let Some(product) = product else { continue };
        let line_total = product.price * i64::from(line.quantity);
        totals.total_items += i64::from(line.quantity);
        totals.subtotal += line_total;
        items.push(CartLine {
            id: line.id,
            product: product.into(),
            quantity: line.quantity,
            line_total,
        });
    }

    Ok(CartView {
        id: Some(cart.id),
        items,
        totals,
    })
}

pub(crate) async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Option<CartModel>> {
    Ok(Carts::find()
        .filter(CartsCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

/// Item count and subtotal at current catalog prices.
pub(crate) async fn cart_totals<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> AppResult<CartTotals> {
    let rows = CartItems::find()
        .filter(CartCol::CartId.eq(cart_id))
        .find_also_related(Products)
        .all(conn)
        .await?;

    Ok(rows
        .iter()
        .fold(CartTotals::default(), |mut totals, (line, product)| {
            totals.total_items += i64::from(line.quantity);
            if let Some(product) = product {
                totals.subtotal += product.price * i64::from(line.quantity);
            }
            totals
        }))
}

async fn get_or_create_cart(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<CartModel> {
    if let Some(cart) = find_cart(txn, user_id).await? {
        return Ok(cart);
    }

    Carts::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(Utc::now().into()),
    })
    .on_conflict(OnConflict::column(CartsCol::UserId).do_nothing().to_owned())
    .exec_without_returning(txn)
    .await?;

    find_cart(txn, user_id).await?.ok_or(AppError::NotFound("Cart"))
}

async fn lock_product(txn: &DatabaseTransaction, product_id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

async fn find_owned_line(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    item_id: Uuid,
) -> AppResult<cart_items::Model> {
    CartItems::find_by_id(item_id)
        .join(sea_orm::JoinType::InnerJoin, cart_items::Relation::Carts.def())
        .filter(CartsCol::UserId.eq(user_id))
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("Cart item"))
}

/// Moves `reserve` units from stock into a cart (negative values give them back)
/// and returns the remaining stock. The caller holds the product row lock; the
/// `stock >= reserve` guard keeps the column non-negative regardless.
async fn shift_stock(
    txn: &DatabaseTransaction,
    product: &ProductModel,
    reserve: i32,
) -> AppResult<i32> {
    let mut update = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(reserve))
        .col_expr(
            ProdCol::UpdatedAt,
            Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
        )
        .filter(ProdCol::Id.eq(product.id));
    if reserve > 0 {
        update = update.filter(ProdCol::Stock.gte(reserve));
    }

    let result = update.exec(txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::out_of_stock(product.stock.max(0)));
    }
    Ok(product.stock - reserve)
}
