//! Marketplace cart. Orders are placed by having the agent swarm verify
//! and pay for the first item in the cart.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use shared::{
    domain::{FarmerId, Product, VendorId},
    protocol::LoanRequest,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Gateway, GatewayError};

const ORDER_QUANTITY: u32 = 50;
const ORDER_VENDOR: &str = "V-9988";
const ORDER_FARMER: &str = "F-1024";

pub fn catalog() -> Vec<Product> {
    [
        (1, "Urea Fertilizer", 600.0),
        (2, "DAP Fertilizer", 1350.0),
        (3, "Hybrid Seeds", 400.0),
        (4, "Pesticide X", 850.0),
    ]
    .into_iter()
    .map(|(id, name, price)| Product {
        id,
        name: name.to_string(),
        price,
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: String,
    pub items: Vec<Product>,
    pub status: String,
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("no product named '{0}' in the catalogue")]
    UnknownProduct(String),
    #[error("Order verification failed. Please try again. ({0})")]
    VerificationFailed(String),
    #[error("System busy. Agents are re-calibrating. ({0})")]
    Unavailable(#[source] GatewayError),
}

#[derive(Debug)]
pub struct Marketplace {
    catalog: Vec<Product>,
    cart: Vec<Product>,
    orders: Vec<Order>,
}

impl Default for Marketplace {
    fn default() -> Self {
        Self {
            catalog: catalog(),
            cart: Vec::new(),
            orders: Vec::new(),
        }
    }
}

impl Marketplace {
    pub fn catalog(&self) -> &[Product] {
        &self.catalog
    }

    pub fn cart(&self) -> &[Product] {
        &self.cart
    }

    /// Newest first.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn add_to_cart(&mut self, name: &str) -> Result<&Product, OrderError> {
        let product = self
            .catalog
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| OrderError::UnknownProduct(name.to_string()))?;
        self.cart.push(product);
        Ok(&self.cart[self.cart.len() - 1])
    }

    pub fn cart_total(&self) -> f64 {
        self.cart.iter().map(|p| p.price).sum()
    }

    /// The cart is left untouched when the order does not go through.
    pub async fn place_order<G>(&mut self, gateway: &G) -> Result<&Order, OrderError>
    where
        G: Gateway + ?Sized,
    {
        let first = self.cart.first().ok_or(OrderError::EmptyCart)?;
        let request = LoanRequest {
            item: first.name.clone(),
            quantity: ORDER_QUANTITY,
            vendor_id: VendorId::new(ORDER_VENDOR),
            farmer_id: FarmerId::new(ORDER_FARMER),
        };

        match gateway.run_agents(&request).await {
            Ok(_) => {}
            Err(GatewayError::Rejected { message, .. })
            | Err(GatewayError::Status {
                detail: message, ..
            }) => {
                warn!(%message, "order verification failed");
                return Err(OrderError::VerificationFailed(message));
            }
            Err(err) => {
                warn!(error = %err, "order placement could not reach agents");
                return Err(OrderError::Unavailable(err));
            }
        }

        let order = Order {
            id: format!("ORD-{}", Uuid::new_v4().as_u128() % 10_000),
            total: self.cart_total(),
            items: std::mem::take(&mut self.cart),
            status: "Approved & Paid".into(),
            date: Utc::now().date_naive(),
        };
        info!(order = %order.id, total = order.total, "order placed");
        self.orders.insert(0, order);
        Ok(&self.orders[0])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use shared::{
        domain::{EscrowReceipt, RiskAssessment, UserId, Vendor},
        protocol::{AgentRunResult, RUN_AGENTS_PATH},
    };

    use super::*;

    struct RecordingGateway {
        outcome: Result<AgentRunResult, GatewayError>,
        requests: Mutex<Vec<LoanRequest>>,
    }

    impl RecordingGateway {
        fn new(outcome: Result<AgentRunResult, GatewayError>) -> Self {
            Self {
                outcome,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Gateway for RecordingGateway {
        async fn assess_risk(&self, _: &UserId, _: u32) -> Result<RiskAssessment, GatewayError> {
            unreachable!("not used by the marketplace")
        }

        async fn find_vendors(&self, _: &str) -> Result<Vec<Vendor>, GatewayError> {
            unreachable!("not used by the marketplace")
        }

        async fn execute_escrow(&self, _: &VendorId, _: f64) -> Result<EscrowReceipt, GatewayError> {
            unreachable!("not used by the marketplace")
        }

        async fn run_agents(&self, request: &LoanRequest) -> Result<AgentRunResult, GatewayError> {
            self.requests.lock().expect("requests").push(request.clone());
            self.outcome.clone()
        }
    }

    fn ok() -> Result<AgentRunResult, GatewayError> {
        Ok(AgentRunResult {
            result: "verified".into(),
            logs: Vec::new(),
        })
    }

    #[tokio::test]
    async fn placing_order_moves_cart_into_orders() {
        let gateway = RecordingGateway::new(ok());
        let mut market = Marketplace::default();
        market.add_to_cart("DAP Fertilizer").expect("add");
        market.add_to_cart("hybrid seeds").expect("add");

        let order = market.place_order(&gateway).await.expect("order").clone();
        assert!(order.id.starts_with("ORD-"));
        assert_eq!(order.status, "Approved & Paid");
        assert_eq!(order.total, 1750.0);
        assert_eq!(order.items.len(), 2);
        assert!(market.cart().is_empty());
        assert_eq!(market.orders().len(), 1);

        let requests = gateway.requests.lock().expect("requests");
        assert_eq!(requests[0].item, "DAP Fertilizer");
        assert_eq!(requests[0].quantity, 50);
    }

    #[tokio::test]
    async fn newest_order_comes_first() {
        let gateway = RecordingGateway::new(ok());
        let mut market = Marketplace::default();
        market.add_to_cart("Urea Fertilizer").expect("add");
        market.place_order(&gateway).await.expect("first");
        market.add_to_cart("Pesticide X").expect("add");
        market.place_order(&gateway).await.expect("second");

        assert_eq!(market.orders()[0].items[0].name, "Pesticide X");
    }

    #[tokio::test]
    async fn failed_verification_keeps_cart() {
        let gateway = RecordingGateway::new(Err(GatewayError::Rejected {
            endpoint: RUN_AGENTS_PATH,
            message: "price mismatch".into(),
        }));
        let mut market = Marketplace::default();
        market.add_to_cart("Urea Fertilizer").expect("add");

        let err = market.place_order(&gateway).await.expect_err("should fail");
        assert!(matches!(err, OrderError::VerificationFailed(ref m) if m == "price mismatch"));
        assert_eq!(market.cart().len(), 1);
        assert!(market.orders().is_empty());
    }

    #[tokio::test]
    async fn error_status_from_agents_is_a_verification_failure() {
        let gateway = RecordingGateway::new(Err(GatewayError::Status {
            endpoint: RUN_AGENTS_PATH,
            status: 500,
            detail: "crew kickoff failed".into(),
        }));
        let mut market = Marketplace::default();
        market.add_to_cart("Hybrid Seeds").expect("add");

        let err = market.place_order(&gateway).await.expect_err("should fail");
        assert!(matches!(err, OrderError::VerificationFailed(ref m) if m == "crew kickoff failed"));
        assert_eq!(market.cart().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_agents_report_system_busy() {
        let gateway = RecordingGateway::new(Err(GatewayError::Transport {
            endpoint: RUN_AGENTS_PATH,
            reason: "connection refused".into(),
        }));
        let mut market = Marketplace::default();
        market.add_to_cart("Urea Fertilizer").expect("add");

        let err = market.place_order(&gateway).await.expect_err("should fail");
        assert!(matches!(err, OrderError::Unavailable(_)));
        assert!(err.to_string().starts_with("System busy."));
    }

    #[tokio::test]
    async fn empty_cart_is_refused_without_calling_agents() {
        let gateway = RecordingGateway::new(ok());
        let mut market = Marketplace::default();
        assert!(matches!(
            market.place_order(&gateway).await,
            Err(OrderError::EmptyCart)
        ));
        assert!(gateway.requests.lock().expect("requests").is_empty());
    }

    #[test]
    fn unknown_product_is_rejected() {
        let mut market = Marketplace::default();
        assert!(matches!(
            market.add_to_cart("Tractor"),
            Err(OrderError::UnknownProduct(_))
        ));
    }
}
