use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    order_items::Model as OrderItemModel, orders::Model as OrderModel,
    pickup_slots::Model as SlotModel, products::Model as ProductModel, users::Model as UserModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Shopkeeper,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Shopkeeper => "shopkeeper",
            Role::Staff => "staff",
        }
    }

    /// Shopkeepers and staff run the counter: inventory, slots and order fulfilment.
    pub fn can_manage_store(&self) -> bool {
        matches!(self, Role::Shopkeeper | Role::Staff)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "shopkeeper" => Ok(Role::Shopkeeper),
            "staff" => Ok(Role::Staff),
            other => Err(format!("unknown role {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Stationery,
    Xerox,
    Books,
    Other,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Stationery => "stationery",
            ProductCategory::Xerox => "xerox",
            ProductCategory::Books => "books",
            ProductCategory::Other => "other",
        }
    }
}

impl FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stationery" => Ok(ProductCategory::Stationery),
            "xerox" => Ok(ProductCategory::Xerox),
            "books" => Ok(ProductCategory::Books),
            "other" => Ok(ProductCategory::Other),
            other => Err(format!("unknown category {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    ReadyForPickup,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::ReadyForPickup,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::ReadyForPickup => "Ready for Pickup",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Processing => 1,
            OrderStatus::ReadyForPickup => 2,
            OrderStatus::Completed => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses only move forward along the fulfilment line; any open order may be cancelled.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }

    /// Statuses the student is told about.
    pub fn notifies_student(&self) -> bool {
        matches!(self, OrderStatus::ReadyForPickup | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status {s}"))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub category: ProductCategory,
    pub available_quantity: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PickupSlot {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_orders: i32,
    pub current_orders: i32,
    pub is_available: bool,
    pub is_full: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub student_id: Uuid,
    pub pickup_slot_id: Option<Uuid>,
    pub status: OrderStatus,
    pub status_display: String,
    pub pickup_code: String,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub price_at_order_time: i64,
    pub subtotal: i64,
}

// Rows written by this service always hold a known value; anything else is
// treated as the column default rather than failing the read.

impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            email: model.email,
            role: model.role.parse().unwrap_or(Role::Student),
            phone_number: model.phone_number,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            category: model.category.parse().unwrap_or(ProductCategory::Other),
            available_quantity: model.stock,
            is_available: model.is_available,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<SlotModel> for PickupSlot {
    fn from(model: SlotModel) -> Self {
        Self {
            is_full: model.is_full(),
            id: model.id,
            start_time: model.start_time.with_timezone(&Utc),
            end_time: model.end_time.with_timezone(&Utc),
            max_orders: model.max_orders,
            current_orders: model.current_orders,
            is_available: model.is_available,
        }
    }
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        let status = model.status.parse().unwrap_or(OrderStatus::Pending);
        Self {
            id: model.id,
            student_id: model.student_id,
            pickup_slot_id: model.pickup_slot_id,
            status,
            status_display: status.display_name().to_string(),
            pickup_code: model.pickup_code,
            total_amount: model.total_amount,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl OrderItem {
    pub fn from_entity(model: OrderItemModel, product_name: Option<String>) -> Self {
        Self {
            subtotal: model.subtotal(),
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name,
            quantity: model.quantity,
            price_at_order_time: model.price_at_order_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_every_wire_name() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn statuses_only_move_forward() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(ReadyForPickup));
        assert!(ReadyForPickup.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!ReadyForPickup.can_transition_to(ReadyForPickup));
    }

    #[test]
    fn terminal_statuses_are_final() {
        use OrderStatus::*;
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn only_store_roles_manage_store() {
        assert!(Role::Shopkeeper.can_manage_store());
        assert!(Role::Staff.can_manage_store());
        assert!(!Role::Student.can_manage_store());
    }
}
