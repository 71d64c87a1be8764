use std::sync::Arc;

use crate::{
    db::OrmConn,
    gateway::{NotificationGateway, PaymentGateway},
};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub notifier: Arc<dyn NotificationGateway>,
    pub payments: Arc<dyn PaymentGateway>,
    pub payment_currency: String,
    pub low_stock_threshold: i32,
}

impl AppState {
    pub fn new(
        orm: OrmConn,
        notifier: Arc<dyn NotificationGateway>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orm,
            notifier,
            payments,
            payment_currency: "inr".to_string(),
            low_stock_threshold: 5,
        }
    }
}
