#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use campus_stationery_api::{
    entity::{
        AuditLogs, CartItems, Carts, OrderItems, Orders, PickupSlots, Products, Users,
        pickup_slots::ActiveModel as SlotActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    gateway::{
        GatewayError, GatewayOrder, GatewayOrderRequest, NotificationGateway, OrderNotice,
        PaymentGateway, PaymentIntent, PaymentIntentRequest, UnconfiguredPayments,
    },
    middleware::auth::AuthUser,
    models::{OrderStatus, Role},
    state::AppState,
};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityName,
    EntityTrait, Schema, Set,
};
use uuid::Uuid;

/// Fresh in-memory database with the full schema. A single pooled connection
/// keeps every query on the same database and serializes transactions.
pub async fn setup_state() -> anyhow::Result<(AppState, Arc<RecordingNotifier>)> {
    let notifier = Arc::new(RecordingNotifier::default());
    let state = setup_state_with(notifier.clone(), Arc::new(UnconfiguredPayments)).await?;
    Ok((state, notifier))
}

pub async fn setup_state_with(
    notifier: Arc<dyn NotificationGateway>,
    payments: Arc<dyn PaymentGateway>,
) -> anyhow::Result<AppState> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(options).await?;
    create_schema(&orm).await?;
    Ok(AppState::new(orm, notifier, payments))
}

async fn create_schema(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = orm.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create {
        ($($entity:expr),*) => {
            $(
                orm.execute(backend.build(&schema.create_table_from_entity($entity)))
                    .await
                    .map_err(|e| anyhow::anyhow!("{}: {e}", $entity.table_name()))?;
            )*
        };
    }

    create!(
        Users,
        Products,
        PickupSlots,
        Carts,
        CartItems,
        Orders,
        OrderItems,
        AuditLogs
    );
    Ok(())
}

pub async fn create_user(state: &AppState, role: Role, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role.as_str().to_string()),
        phone_number: Set(Some("+910000000000".into())),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role,
    })
}

pub async fn student(state: &AppState) -> anyhow::Result<AuthUser> {
    let email = format!("student-{}@campus.test", Uuid::new_v4().simple());
    create_user(state, Role::Student, &email).await
}

pub async fn shopkeeper(state: &AppState) -> anyhow::Result<AuthUser> {
    let email = format!("shop-{}@campus.test", Uuid::new_v4().simple());
    create_user(state, Role::Shopkeeper, &email).await
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        category: Set("stationery".into()),
        stock: Set(stock),
        is_available: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn create_slot(
    state: &AppState,
    max_orders: i32,
    current_orders: i32,
) -> anyhow::Result<Uuid> {
    let start = Utc::now() + Duration::days(1);
    let slot = SlotActive {
        id: Set(Uuid::new_v4()),
        start_time: Set(start.into()),
        end_time: Set((start + Duration::hours(1)).into()),
        max_orders: Set(max_orders),
        current_orders: Set(current_orders),
        is_available: Set(true),
    }
    .insert(&state.orm)
    .await?;
    Ok(slot.id)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .map(|p| p.stock)
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))
}

pub async fn slot_orders(state: &AppState, slot_id: Uuid) -> anyhow::Result<i32> {
    PickupSlots::find_by_id(slot_id)
        .one(&state.orm)
        .await?
        .map(|s| s.current_orders)
        .ok_or_else(|| anyhow::anyhow!("slot {slot_id} missing"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Confirmation { order_id: Uuid, email: String },
    Sms { order_id: Uuid, to: String },
    StatusUpdate { order_id: Uuid, status: OrderStatus },
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    email_down: bool,
}

impl RecordingNotifier {
    /// Records SMS and status updates but rejects every confirmation email.
    pub fn with_email_down() -> Self {
        Self {
            email_down: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn send_order_confirmation(&self, notice: &OrderNotice) -> Result<(), GatewayError> {
        if self.email_down {
            return Err(GatewayError::Rejected("smtp unreachable".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Sent::Confirmation {
                order_id: notice.order.id,
                email: notice.email.clone(),
            });
        }
        Ok(())
    }

    async fn send_order_sms(&self, notice: &OrderNotice) -> Result<(), GatewayError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Sent::Sms {
                order_id: notice.order.id,
                to: notice.sms_recipient().unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }

    async fn send_status_update(
        &self,
        notice: &OrderNotice,
        status: OrderStatus,
    ) -> Result<(), GatewayError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Sent::StatusUpdate {
                order_id: notice.order.id,
                status,
            });
        }
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl NotificationGateway for FailingNotifier {
    async fn send_order_confirmation(&self, _notice: &OrderNotice) -> Result<(), GatewayError> {
        Err(GatewayError::Rejected("smtp unreachable".into()))
    }

    async fn send_order_sms(&self, _notice: &OrderNotice) -> Result<(), GatewayError> {
        Err(GatewayError::Rejected("sms provider unreachable".into()))
    }

    async fn send_status_update(
        &self,
        _notice: &OrderNotice,
        _status: OrderStatus,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::Rejected("smtp unreachable".into()))
    }
}

pub struct FixedPayments;

#[async_trait]
impl PaymentGateway for FixedPayments {
    async fn create_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        Ok(PaymentIntent {
            id: format!("pi_{}_{}", request.amount, request.currency),
            client_secret: "secret".into(),
        })
    }

    async fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        let order_id = request.notes["order_id"]
            .as_str()
            .ok_or_else(|| GatewayError::Rejected("notes.order_id missing".into()))?;
        Ok(GatewayOrder {
            id: format!("order_rzp_{order_id}"),
            amount: request.amount,
            currency: request.currency,
            receipt: request.receipt,
        })
    }
}
