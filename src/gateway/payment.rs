use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::GatewayError;

#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Provider-side order the client checkout widget pays against.
#[derive(Debug, Clone)]
pub struct GatewayOrderRequest {
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: Value,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError>;
}

/// Used when no payment provider has been wired in.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredPayments;

#[async_trait]
impl PaymentGateway for UnconfiguredPayments {
    async fn create_intent(
        &self,
        _request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        Err(GatewayError::NotConfigured("payment"))
    }

    async fn create_order(
        &self,
        _request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        Err(GatewayError::NotConfigured("payment"))
    }
}
