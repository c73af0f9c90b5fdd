use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use concierge_core::config::ErpConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::{
    CreatedInvoice, ErpBackend, ErpError, InvoiceRequest, NewPartner, PartnerQuery, ProductQuery,
};

const PRODUCT_FIELDS: &[&str] = &[
    "name",
    "list_price",
    "description",
    "description_sale",
    "description_purchase",
    "categ_id",
    "default_code",
    "code",
    "uom_id",
    "qty_available",
];

const PARTNER_FIELDS: &[&str] =
    &["name", "email", "phone", "street", "city", "zip", "country_id"];

const INVOICE_FIELDS: &[&str] =
    &["name", "partner_id", "invoice_date", "amount_total", "state", "move_type"];

/// Odoo client speaking JSON-RPC against `{url}/jsonrpc`.
///
/// Every public operation authenticates first, so a rotated password is
/// picked up without a restart.
pub struct OdooClient {
    http: reqwest::Client,
    endpoint: String,
    database: String,
    username: String,
    password: SecretString,
    search_limit: u32,
    next_id: AtomicU64,
}

impl OdooClient {
    pub fn new(config: &ErpConfig) -> Result<Self, ErpError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ErpError::Connection(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/jsonrpc", config.url.trim_end_matches('/')),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            search_limit: config.search_limit,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value, ErpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": id,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|error| ErpError::Connection(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ErpError::Connection(format!("HTTP {status} from {}", self.endpoint)));
        }

        let mut envelope: Value =
            response.json().await.map_err(|error| ErpError::Decode(error.to_string()))?;

        if let Some(error) = envelope.get("error").filter(|error| !error.is_null()) {
            let message = error
                .pointer("/data/message")
                .or_else(|| error.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ErpError::Rpc { operation: method.to_string(), message });
        }

        envelope
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ErpError::Decode("JSON-RPC response has no result".into()))
    }

    async fn authenticate(&self) -> Result<i64, ErpError> {
        let result = self
            .call(
                "common",
                "authenticate",
                json!([self.database, self.username, self.password.expose_secret(), {}]),
            )
            .await?;

        match result.as_i64() {
            Some(uid) if uid > 0 => Ok(uid),
            _ => {
                warn!(
                    event_name = "erp.authentication.failed",
                    database = %self.database,
                    username = %self.username,
                    "odoo rejected the configured credentials"
                );
                Err(ErpError::Authentication)
            }
        }
    }

    async fn execute_kw(
        &self,
        uid: i64,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, ErpError> {
        debug!(event_name = "erp.execute_kw", model, method, "calling odoo model");
        self.call(
            "object",
            "execute_kw",
            json!([self.database, uid, self.password.expose_secret(), model, method, args, kwargs]),
        )
        .await
    }

    async fn search_read(
        &self,
        uid: i64,
        model: &str,
        domain: Vec<Value>,
        fields: &[&str],
    ) -> Result<Vec<Value>, ErpError> {
        let result = self
            .execute_kw(
                uid,
                model,
                "search_read",
                json!([domain]),
                json!({ "fields": fields, "limit": self.search_limit }),
            )
            .await?;
        into_records(result, model)
    }

    async fn list_price(&self, uid: i64, product_id: i64) -> Result<f64, ErpError> {
        let result = self
            .execute_kw(
                uid,
                "product.product",
                "read",
                json!([[product_id]]),
                json!({ "fields": ["list_price"] }),
            )
            .await?;

        into_records(result, "product.product")?
            .first()
            .and_then(|record| record.get("list_price"))
            .and_then(Value::as_f64)
            .ok_or_else(|| ErpError::NotFound(format!("product {product_id}")))
    }
}

fn into_records(result: Value, model: &str) -> Result<Vec<Value>, ErpError> {
    match result {
        Value::Array(records) => Ok(records),
        other => Err(ErpError::Decode(format!("expected a list of {model} records, got {other}"))),
    }
}

fn product_domain(query: &ProductQuery) -> Vec<Value> {
    let mut domain = Vec::new();
    if let Some(id) = query.id {
        domain.push(json!(["id", "=", id]));
    }
    if let Some(name) = &query.name {
        domain.push(json!(["name", "ilike", name]));
    }
    if let Some(min_price) = query.min_price {
        domain.push(json!(["list_price", ">=", min_price]));
    }
    if let Some(max_price) = query.max_price {
        domain.push(json!(["list_price", "<=", max_price]));
    }
    if let Some(category) = &query.category {
        domain.push(json!(["categ_id", "ilike", category]));
    }
    if let Some(reference) = &query.reference {
        domain.push(json!(["default_code", "=", reference]));
    }
    // Either value of the flag narrows to stocked products.
    if query.in_stock.is_some() {
        domain.push(json!(["qty_available", ">", 0]));
    }
    domain
}

fn partner_domain(query: &PartnerQuery) -> Vec<Value> {
    let mut domain = Vec::new();
    if let Some(id) = query.id {
        domain.push(json!(["id", "=", id]));
    }
    if let Some(name) = &query.name {
        domain.push(json!(["name", "ilike", name]));
    }
    if let Some(email) = &query.email {
        domain.push(json!(["email", "ilike", email]));
    }
    if let Some(phone) = &query.phone {
        domain.push(json!(["phone", "ilike", phone]));
    }
    domain
}

#[async_trait]
impl ErpBackend for OdooClient {
    async fn search_products(&self, query: &ProductQuery) -> Result<Vec<Value>, ErpError> {
        let uid = self.authenticate().await?;
        self.search_read(uid, "product.product", product_domain(query), PRODUCT_FIELDS).await
    }

    async fn search_partners(&self, query: &PartnerQuery) -> Result<Vec<Value>, ErpError> {
        let uid = self.authenticate().await?;
        self.search_read(uid, "res.partner", partner_domain(query), PARTNER_FIELDS).await
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<CreatedInvoice, ErpError> {
        if request.lines.is_empty() {
            return Err(ErpError::InvalidRequest("an invoice needs at least one product".into()));
        }

        let uid = self.authenticate().await?;

        let mut invoice_lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let price_unit = self.list_price(uid, line.product_id).await?;
            invoice_lines.push(json!([0, 0, {
                "product_id": line.product_id,
                "quantity": line.quantity,
                "price_unit": price_unit,
            }]));
        }

        let mut values = json!({
            "partner_id": request.partner_id,
            "invoice_date": Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            "move_type": "out_invoice",
            "invoice_line_ids": invoice_lines,
        });
        if let Some(address) = &request.delivery_address {
            values["narration"] = json!(format!("Delivery address: {address}"));
        }

        let created =
            self.execute_kw(uid, "account.move", "create", json!([values]), json!({})).await?;
        let id = created
            .as_i64()
            .ok_or_else(|| ErpError::Decode(format!("expected an invoice id, got {created}")))?;

        let detail = self
            .execute_kw(
                uid,
                "account.move",
                "read",
                json!([[id]]),
                json!({ "fields": INVOICE_FIELDS }),
            )
            .await
            .and_then(|result| into_records(result, "account.move"))
            .map(|records| records.into_iter().next().unwrap_or(Value::Null))
            .unwrap_or_else(|error| {
                warn!(
                    event_name = "erp.invoice.detail_unavailable",
                    invoice_id = id,
                    error = %error,
                    "invoice created but its detail could not be read back"
                );
                Value::Null
            });

        Ok(CreatedInvoice { id, detail })
    }

    async fn create_partner(&self, partner: &NewPartner) -> Result<i64, ErpError> {
        for (field, value) in [
            ("name", &partner.name),
            ("street", &partner.street),
            ("city", &partner.city),
            ("email", &partner.email),
        ] {
            if value.trim().is_empty() {
                return Err(ErpError::InvalidRequest(format!("partner {field} is required")));
            }
        }

        let uid = self.authenticate().await?;
        let mut values = json!({
            "name": partner.name,
            "street": partner.street,
            "city": partner.city,
            "email": partner.email,
        });
        if let Some(phone) = &partner.phone {
            values["phone"] = json!(phone);
        }
        if let Some(zip) = &partner.zip {
            values["zip"] = json!(zip);
        }

        let created =
            self.execute_kw(uid, "res.partner", "create", json!([values]), json!({})).await?;
        created
            .as_i64()
            .ok_or_else(|| ErpError::Decode(format!("expected a partner id, got {created}")))
    }
}
