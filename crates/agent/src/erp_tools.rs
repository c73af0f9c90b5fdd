use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::domain::tool::{ToolArguments, ToolValue};
use concierge_erp::{ErpBackend, InvoiceRequest, NewPartner, PartnerQuery, ProductQuery};
use serde_json::Value;

use crate::tools::{Tool, ToolDispatchError, ToolReply, ToolRouter};

pub const NO_PRODUCTS: &str = "No products found with the given criteria.";
pub const NO_PARTNERS: &str = "No partners found with the given criteria.";

pub fn register_erp_tools(router: &mut ToolRouter, backend: Arc<dyn ErpBackend>) {
    router.register(ProductLookupTool { backend: backend.clone() });
    router.register(CreateInvoiceTool { backend: backend.clone() });
    router.register(PartnerLookupTool { backend: backend.clone() });
    router.register(CreatePartnerTool { backend });
}

fn typed<T>(
    arguments: &ToolArguments,
    name: &'static str,
    expected: &'static str,
    convert: impl Fn(&ToolValue) -> Option<T>,
) -> Result<Option<T>, ToolDispatchError> {
    match arguments.get(name) {
        None => Ok(None),
        Some(value) => convert(value)
            .map(Some)
            .ok_or_else(|| ToolDispatchError::InvalidArgument { name: name.to_string(), expected }),
    }
}

fn optional_text(
    arguments: &ToolArguments,
    name: &'static str,
) -> Result<Option<String>, ToolDispatchError> {
    let value = typed(arguments, name, "a string", |value| value.as_str().map(str::to_string))?;
    Ok(value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty()))
}

fn required_text(
    arguments: &ToolArguments,
    name: &'static str,
) -> Result<String, ToolDispatchError> {
    optional_text(arguments, name)?.ok_or(ToolDispatchError::MissingArgument(name))
}

fn optional_i64(
    arguments: &ToolArguments,
    name: &'static str,
) -> Result<Option<i64>, ToolDispatchError> {
    typed(arguments, name, "an integer", ToolValue::as_i64)
}

fn optional_f64(
    arguments: &ToolArguments,
    name: &'static str,
) -> Result<Option<f64>, ToolDispatchError> {
    typed(arguments, name, "a number", ToolValue::as_f64)
}

fn optional_bool(
    arguments: &ToolArguments,
    name: &'static str,
) -> Result<Option<bool>, ToolDispatchError> {
    typed(arguments, name, "a boolean", ToolValue::as_bool)
}

fn required_list<T>(
    arguments: &ToolArguments,
    name: &'static str,
    expected: &'static str,
    item: fn(&ToolValue) -> Option<T>,
) -> Result<Vec<T>, ToolDispatchError> {
    typed(arguments, name, expected, |value| value.as_list()?.iter().map(item).collect())?
        .ok_or(ToolDispatchError::MissingArgument(name))
}

fn records_reply(records: Vec<Value>, empty: &str) -> ToolReply {
    if records.is_empty() {
        ToolReply::Text(empty.to_string())
    } else {
        ToolReply::Json { summary: None, body: Value::Array(records) }
    }
}

pub struct ProductLookupTool {
    backend: Arc<dyn ErpBackend>,
}

#[async_trait]
impl Tool for ProductLookupTool {
    fn name(&self) -> &'static str {
        "get_product_info_by_criteria"
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolReply, ToolDispatchError> {
        let query = ProductQuery {
            id: optional_i64(arguments, "product_id")?,
            name: optional_text(arguments, "product_name")?,
            min_price: optional_f64(arguments, "min_price")?,
            max_price: optional_f64(arguments, "max_price")?,
            category: optional_text(arguments, "category")?,
            reference: optional_text(arguments, "reference")?,
            in_stock: optional_bool(arguments, "in_stock")?,
        };
        let products = self.backend.search_products(&query).await?;
        Ok(records_reply(products, NO_PRODUCTS))
    }
}

pub struct CreateInvoiceTool {
    backend: Arc<dyn ErpBackend>,
}

#[async_trait]
impl Tool for CreateInvoiceTool {
    fn name(&self) -> &'static str {
        "create_invoice"
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolReply, ToolDispatchError> {
        let partner_id = optional_i64(arguments, "partner_id")?
            .ok_or(ToolDispatchError::MissingArgument("partner_id"))?;
        let delivery_address = optional_text(arguments, "delivery_address")?;
        let product_ids =
            required_list(arguments, "product_ids", "a list of integers", ToolValue::as_i64)?;
        let quantities =
            required_list(arguments, "quantities", "a list of numbers", ToolValue::as_f64)?;

        let request =
            InvoiceRequest::from_parallel(partner_id, delivery_address, &product_ids, &quantities)?;
        let invoice = self.backend.create_invoice(&request).await?;

        let summary = format!("Invoice {} created successfully.", invoice.id);
        if invoice.detail.is_null() {
            return Ok(ToolReply::Text(summary));
        }
        Ok(ToolReply::Json { summary: Some(summary), body: invoice.detail })
    }
}

pub struct PartnerLookupTool {
    backend: Arc<dyn ErpBackend>,
}

#[async_trait]
impl Tool for PartnerLookupTool {
    fn name(&self) -> &'static str {
        "get_partner_info"
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolReply, ToolDispatchError> {
        let query = PartnerQuery {
            id: optional_i64(arguments, "partner_id")?,
            name: optional_text(arguments, "name")?,
            email: optional_text(arguments, "email")?,
            phone: optional_text(arguments, "phone")?,
        };
        if query.is_empty() {
            return Err(ToolDispatchError::MissingArgument("partner_id, name, email or phone"));
        }
        let partners = self.backend.search_partners(&query).await?;
        Ok(records_reply(partners, NO_PARTNERS))
    }
}

pub struct CreatePartnerTool {
    backend: Arc<dyn ErpBackend>,
}

#[async_trait]
impl Tool for CreatePartnerTool {
    fn name(&self) -> &'static str {
        "create_partner"
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolReply, ToolDispatchError> {
        let partner = NewPartner {
            name: required_text(arguments, "name")?,
            street: required_text(arguments, "street")?,
            city: required_text(arguments, "city")?,
            email: required_text(arguments, "email")?,
            phone: optional_text(arguments, "phone")?,
            zip: optional_text(arguments, "zip")?,
        };
        let id = self.backend.create_partner(&partner).await?;
        Ok(ToolReply::Text(format!("Partner {id} created successfully.")))
    }
}
