//! Outbound collaborators invoked by the order flow.
//!
//! Both gateways are called only after the owning transaction has committed
//! and never while a row lock is held. Notification failures are swallowed by
//! the caller; payment failures surface as a 500 on the payment-intent route.

mod notification;
mod payment;

pub use notification::{
    EmailMessage, LogNotifier, NotificationGateway, OrderNotice, SmsMessage, format_amount,
};
pub use payment::{
    GatewayOrder, GatewayOrderRequest, PaymentGateway, PaymentIntent, PaymentIntentRequest,
    UnconfiguredPayments,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} gateway is not configured")]
    NotConfigured(&'static str),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}
