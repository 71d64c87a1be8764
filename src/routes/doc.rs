use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{CartLine, CartMutation, CartTotals, CartView, UpdateCartItemRequest},
        orders::{
            CheckoutRequest, CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems,
            StatusUpdated, UpdateStatusRequest,
        },
        products::{CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest},
        slots::{CreateSlotRequest, SlotList},
    },
    gateway::{GatewayOrder, PaymentIntent},
    models::{Order, OrderItem, OrderStatus, PickupSlot, Product, ProductCategory, Role, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, params, products, slots},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::adjust_inventory,
        products::list_low_stock,
        cart::view_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::cart_summary,
        orders::list_orders,
        orders::create_order,
        orders::checkout,
        orders::get_order,
        orders::update_status,
        orders::cancel_order,
        orders::create_payment_intent,
        orders::create_gateway_order,
        slots::available_slots,
        slots::create_slot
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            ProductCategory,
            PickupSlot,
            Order,
            OrderItem,
            OrderStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            InventoryAdjustRequest,
            ProductList,
            UpdateCartItemRequest,
            CartTotals,
            CartMutation,
            CartLine,
            CartView,
            OrderLineRequest,
            CreateOrderRequest,
            CheckoutRequest,
            UpdateStatusRequest,
            StatusUpdated,
            OrderWithItems,
            OrderList,
            CreateSlotRequest,
            SlotList,
            PaymentIntent,
            GatewayOrder,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartMutation>,
            ApiResponse<CartTotals>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<SlotList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Products", description = "Catalog and inventory endpoints"),
        (name = "Cart", description = "Cart endpoints; adding an item reserves its stock"),
        (name = "Orders", description = "Order placement, status and payment"),
        (name = "Pickup Slots", description = "Pickup time windows"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
