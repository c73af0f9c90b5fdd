use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErpError {
    #[error("failed to connect to the ERP server: {0}")]
    Connection(String),
    #[error("ERP authentication failed")]
    Authentication,
    #[error("ERP call `{operation}` failed: {message}")]
    Rpc { operation: String, message: String },
    #[error("unexpected ERP response: {0}")]
    Decode(String),
    #[error("invalid ERP request: {0}")]
    InvalidRequest(String),
    #[error("{0} not found")]
    NotFound(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category: Option<String>,
    pub reference: Option<String>,
    pub in_stock: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerQuery {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PartnerQuery {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineRequest {
    pub product_id: i64,
    pub quantity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub partner_id: i64,
    pub delivery_address: Option<String>,
    pub lines: Vec<InvoiceLineRequest>,
}

impl InvoiceRequest {
    /// Pairs parallel product/quantity lists; the lists must be non-empty and of equal length.
    pub fn from_parallel(
        partner_id: i64,
        delivery_address: Option<String>,
        product_ids: &[i64],
        quantities: &[f64],
    ) -> Result<Self, ErpError> {
        if product_ids.is_empty() {
            return Err(ErpError::InvalidRequest("an invoice needs at least one product".into()));
        }
        if product_ids.len() != quantities.len() {
            return Err(ErpError::InvalidRequest(format!(
                "product_ids has {} entries but quantities has {}",
                product_ids.len(),
                quantities.len()
            )));
        }
        if let Some(quantity) = quantities.iter().find(|quantity| !quantity.is_finite() || **quantity <= 0.0) {
            return Err(ErpError::InvalidRequest(format!(
                "quantities must be positive finite numbers, got {quantity}"
            )));
        }

        let lines = product_ids
            .iter()
            .zip(quantities)
            .map(|(product_id, quantity)| InvoiceLineRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect();
        Ok(Self { partner_id, delivery_address, lines })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedInvoice {
    pub id: i64,
    pub detail: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartner {
    pub name: String,
    pub street: String,
    pub city: String,
    pub email: String,
    pub phone: Option<String>,
    pub zip: Option<String>,
}

#[async_trait]
pub trait ErpBackend: Send + Sync {
    async fn search_products(&self, query: &ProductQuery) -> Result<Vec<Value>, ErpError>;
    async fn search_partners(&self, query: &PartnerQuery) -> Result<Vec<Value>, ErpError>;
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<CreatedInvoice, ErpError>;
    async fn create_partner(&self, partner: &NewPartner) -> Result<i64, ErpError>;
}
