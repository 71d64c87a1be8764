mod common;

use campus_stationery_api::{
    entity::CartItems,
    error::AppError,
    services::{cart_service, product_service},
    dto::products::UpdateProductRequest,
};
use sea_orm::EntityTrait;

use common::{create_product, setup_state, shopkeeper, stock_of, student};

#[tokio::test]
async fn adding_items_moves_stock_into_the_cart() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let user = student(&state).await?;
    let pen = create_product(&state, "Gel Pen", 2000, 3).await?;

    let first = cart_service::add_item(&state, &user, pen).await?;
    assert_eq!(first.available_quantity, Some(2));
    assert_eq!(first.totals.total_items, 1);
    assert_eq!(first.totals.subtotal, 2000);

    let second = cart_service::add_item(&state, &user, pen).await?;
    assert_eq!(second.available_quantity, Some(1));
    assert_eq!(second.totals.total_items, 2);
    assert_eq!(second.totals.subtotal, 4000);

    let cart = cart_service::view_cart(&state, &user).await?;
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity + stock_of(&state, pen).await?, 3);
    Ok(())
}

#[tokio::test]
async fn adding_at_zero_stock_is_rejected_without_writes() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let user = student(&state).await?;
    let ruler = create_product(&state, "Steel Ruler", 3000, 0).await?;

    let err = cart_service::add_item(&state, &user, ruler).await.unwrap_err();
    match err {
        AppError::OutOfStock {
            available_quantity, ..
        } => assert_eq!(available_quantity, 0),
        other => panic!("expected OutOfStock, got {other:?}"),
    }

    assert_eq!(stock_of(&state, ruler).await?, 0);
    assert!(CartItems::find().all(&state.orm).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn unavailable_products_cannot_be_added() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let owner = shopkeeper(&state).await?;
    let user = student(&state).await?;
    let chart = create_product(&state, "Chart Paper", 1000, 10).await?;

    product_service::update_product(
        &state,
        &owner,
        chart,
        UpdateProductRequest {
            is_available: Some(false),
            ..Default::default()
        },
    )
    .await?;

    let err = cart_service::add_item(&state, &user, chart).await.unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)), "{err:?}");
    assert_eq!(stock_of(&state, chart).await?, 10);
    Ok(())
}

#[tokio::test]
async fn update_beyond_stock_leaves_line_and_stock_unchanged() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let user = student(&state).await?;
    let notebook = create_product(&state, "A4 Notebook", 5500, 3).await?;

    cart_service::add_item(&state, &user, notebook).await?;
    cart_service::add_item(&state, &user, notebook).await?;
    assert_eq!(stock_of(&state, notebook).await?, 1);

    let line_id = cart_service::view_cart(&state, &user).await?.items[0].id;
    let err = cart_service::update_item(&state, &user, line_id, 5)
        .await
        .unwrap_err();
    match err {
        AppError::OutOfStock {
            available_quantity, ..
        } => assert_eq!(available_quantity, 1),
        other => panic!("expected OutOfStock, got {other:?}"),
    }

    let cart = cart_service::view_cart(&state, &user).await?;
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(stock_of(&state, notebook).await?, 1);
    Ok(())
}

#[tokio::test]
async fn update_adjusts_stock_by_the_difference() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let user = student(&state).await?;
    let eraser = create_product(&state, "Eraser", 500, 10).await?;

    cart_service::add_item(&state, &user, eraser).await?;
    let line_id = cart_service::view_cart(&state, &user).await?.items[0].id;

    let grown = cart_service::update_item(&state, &user, line_id, 4).await?;
    assert_eq!(grown.available_quantity, Some(6));
    assert_eq!(grown.item_total, Some(2000));
    assert_eq!(grown.totals.total_items, 4);

    let shrunk = cart_service::update_item(&state, &user, line_id, 2).await?;
    assert_eq!(shrunk.available_quantity, Some(8));
    assert_eq!(stock_of(&state, eraser).await?, 8);

    let err = cart_service::update_item(&state, &user, line_id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");
    assert_eq!(stock_of(&state, eraser).await?, 8);
    Ok(())
}

#[tokio::test]
async fn removing_a_line_restores_its_quantity() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let user = student(&state).await?;
    let marker = create_product(&state, "Marker", 4000, 10).await?;

    cart_service::add_item(&state, &user, marker).await?;
    let line_id = cart_service::view_cart(&state, &user).await?.items[0].id;
    cart_service::update_item(&state, &user, line_id, 3).await?;
    assert_eq!(stock_of(&state, marker).await?, 7);

    let removed = cart_service::remove_item(&state, &user, line_id).await?;
    assert_eq!(removed.available_quantity, Some(10));
    assert_eq!(removed.totals.total_items, 0);
    assert_eq!(removed.totals.subtotal, 0);
    assert_eq!(stock_of(&state, marker).await?, 10);
    assert!(cart_service::view_cart(&state, &user).await?.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn lines_of_another_student_are_not_found() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let owner = student(&state).await?;
    let intruder = student(&state).await?;
    let stapler = create_product(&state, "Stapler", 12000, 5).await?;

    cart_service::add_item(&state, &owner, stapler).await?;
    let line_id = cart_service::view_cart(&state, &owner).await?.items[0].id;

    let err = cart_service::update_item(&state, &intruder, line_id, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
    let err = cart_service::remove_item(&state, &intruder, line_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "{err:?}");

    assert_eq!(stock_of(&state, stapler).await?, 4);
    Ok(())
}

#[tokio::test]
async fn summary_is_zero_for_anonymous_and_new_students() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let user = student(&state).await?;

    let anonymous = cart_service::summary(&state, None).await?;
    assert_eq!((anonymous.total_items, anonymous.subtotal), (0, 0));

    let empty = cart_service::summary(&state, Some(&user)).await?;
    assert_eq!((empty.total_items, empty.subtotal), (0, 0));

    let glue = create_product(&state, "Glue Stick", 1500, 4).await?;
    cart_service::add_item(&state, &user, glue).await?;
    cart_service::add_item(&state, &user, glue).await?;
    let filled = cart_service::summary(&state, Some(&user)).await?;
    assert_eq!((filled.total_items, filled.subtotal), (2, 3000));
    Ok(())
}

#[tokio::test]
async fn mixed_cart_operations_conserve_stock_at_every_step() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let user = student(&state).await?;
    let initial = 5;
    let folder = create_product(&state, "Clear Folder", 2500, initial).await?;

    async fn reserved(state: &campus_stationery_api::state::AppState) -> anyhow::Result<i32> {
        Ok(CartItems::find()
            .all(&state.orm)
            .await?
            .iter()
            .map(|line| line.quantity)
            .sum())
    }

    cart_service::add_item(&state, &user, folder).await?;
    assert_eq!(reserved(&state).await? + stock_of(&state, folder).await?, initial);
    let line_id = cart_service::view_cart(&state, &user).await?.items[0].id;

    for quantity in [4, 1, 5] {
        cart_service::update_item(&state, &user, line_id, quantity).await?;
        assert_eq!(reserved(&state).await?, quantity);
        assert_eq!(reserved(&state).await? + stock_of(&state, folder).await?, initial);
    }

    let err = cart_service::add_item(&state, &user, folder).await.unwrap_err();
    assert!(matches!(err, AppError::OutOfStock { .. }), "{err:?}");
    assert_eq!(reserved(&state).await? + stock_of(&state, folder).await?, initial);

    cart_service::remove_item(&state, &user, line_id).await?;
    assert_eq!(reserved(&state).await?, 0);
    assert_eq!(stock_of(&state, folder).await?, initial);
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_never_oversell_the_last_unit() -> anyhow::Result<()> {
    let (state, _) = setup_state().await?;
    let first = student(&state).await?;
    let second = student(&state).await?;
    let calculator = create_product(&state, "Scientific Calculator", 95000, 1).await?;

    let (a, b) = tokio::join!(
        cart_service::add_item(&state, &first, calculator),
        cart_service::add_item(&state, &second, calculator),
    );

    let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    let failure = if a.is_err() { a } else { b };
    assert!(matches!(failure, Err(AppError::OutOfStock { .. })));

    assert_eq!(stock_of(&state, calculator).await?, 0);
    let reserved: i32 = CartItems::find()
        .all(&state.orm)
        .await?
        .iter()
        .map(|line| line.quantity)
        .sum();
    assert_eq!(reserved, 1);
    Ok(())
}
