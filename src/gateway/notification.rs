use async_trait::async_trait;

use super::GatewayError;
use crate::models::{Order, OrderItem, OrderStatus};

/// Everything a notifier needs to tell a student about their order.
#[derive(Debug, Clone)]
pub struct OrderNotice {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub email: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Confirmation email for a freshly placed order.
    async fn send_order_confirmation(&self, notice: &OrderNotice) -> Result<(), GatewayError>;

    /// Confirmation SMS; only called when the student has a phone number.
    async fn send_order_sms(&self, notice: &OrderNotice) -> Result<(), GatewayError>;

    async fn send_status_update(
        &self,
        notice: &OrderNotice,
        status: OrderStatus,
    ) -> Result<(), GatewayError>;
}

/// Minor units to a two-decimal rupee string.
pub fn format_amount(amount: i64) -> String {
    format!("{}.{:02}", amount / 100, (amount % 100).abs())
}

impl OrderNotice {
    pub fn confirmation_email(&self) -> EmailMessage {
        let mut body = format!(
            "Thank you for your order #{}.\nPickup code: {}\n",
            self.order.id, self.order.pickup_code
        );
        push_item_lines(&mut body, &self.items);
        body.push_str(&format!("Total: ₹{}\n", format_amount(self.order.total_amount)));
        EmailMessage {
            to: self.email.clone(),
            subject: format!("Order Confirmation #{}", self.order.id),
            body,
        }
    }

    pub fn sms_recipient(&self) -> Option<&str> {
        self.phone_number
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn confirmation_sms(&self) -> Option<SmsMessage> {
        let to = self.sms_recipient()?;
        Some(SmsMessage {
            to: to.to_string(),
            body: format!(
                "Your order #{} has been received. Total: ₹{}. Pickup code: {}",
                self.order.id,
                format_amount(self.order.total_amount),
                self.order.pickup_code
            ),
        })
    }

    pub fn status_email(&self, status: OrderStatus) -> EmailMessage {
        let mut body = format!(
            "Your order #{} is now {}.\nPickup code: {}\n",
            self.order.id,
            status.display_name(),
            self.order.pickup_code
        );
        push_item_lines(&mut body, &self.items);
        EmailMessage {
            to: self.email.clone(),
            subject: format!("Order #{} is now {}", self.order.id, status.display_name()),
            body,
        }
    }
}

fn push_item_lines(body: &mut String, items: &[OrderItem]) {
    for item in items {
        let name = item.product_name.as_deref().unwrap_or("item");
        body.push_str(&format!(
            "  {} x {} @ ₹{} = ₹{}\n",
            item.quantity,
            name,
            format_amount(item.price_at_order_time),
            format_amount(item.subtotal)
        ));
    }
}

/// Default notifier: renders the messages and writes them to the log. Email and
/// SMS providers plug in by implementing [`NotificationGateway`].
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl NotificationGateway for LogNotifier {
    async fn send_order_confirmation(&self, notice: &OrderNotice) -> Result<(), GatewayError> {
        let email = notice.confirmation_email();
        tracing::info!(to = %email.to, subject = %email.subject, "order confirmation email");
        Ok(())
    }

    async fn send_order_sms(&self, notice: &OrderNotice) -> Result<(), GatewayError> {
        if let Some(sms) = notice.confirmation_sms() {
            tracing::info!(to = %sms.to, body = %sms.body, "order confirmation sms");
        }
        Ok(())
    }

    async fn send_status_update(
        &self,
        notice: &OrderNotice,
        status: OrderStatus,
    ) -> Result<(), GatewayError> {
        let email = notice.status_email(status);
        tracing::info!(to = %email.to, subject = %email.subject, "order status email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn notice(phone_number: Option<&str>) -> OrderNotice {
        let order_id = Uuid::new_v4();
        OrderNotice {
            order: Order {
                id: order_id,
                student_id: Uuid::new_v4(),
                pickup_slot_id: None,
                status: OrderStatus::Pending,
                status_display: "Pending".into(),
                pickup_code: "123456".into(),
                total_amount: 11050,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            items: vec![OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                product_name: Some("A4 Notebook".into()),
                quantity: 2,
                price_at_order_time: 5525,
                subtotal: 11050,
            }],
            email: "student@campus.test".into(),
            phone_number: phone_number.map(str::to_string),
        }
    }

    #[test]
    fn amounts_render_with_two_decimals() {
        assert_eq!(format_amount(11050), "110.50");
        assert_eq!(format_amount(7), "0.07");
    }

    #[test]
    fn sms_needs_a_phone_number() {
        assert!(notice(None).confirmation_sms().is_none());
        assert!(notice(Some("  ")).confirmation_sms().is_none());

        let sms = notice(Some("+911234567890")).confirmation_sms().unwrap();
        assert!(sms.body.contains("Pickup code: 123456"));
        assert!(sms.body.contains("₹110.50"));
    }

    #[test]
    fn status_email_names_the_new_status() {
        let email = notice(None).status_email(OrderStatus::ReadyForPickup);
        assert!(email.subject.ends_with("is now Ready for Pickup"));
        assert!(email.body.contains("2 x A4 Notebook"));
    }
}
