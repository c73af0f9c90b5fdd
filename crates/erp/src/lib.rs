//! ERP backend used by the assistant's business tools.
//!
//! - **Backend contract** (`ErpBackend`) - product/partner search, invoice and partner creation
//! - **Odoo** (`odoo`) - JSON-RPC client that authenticates on every call
//!
//! Results are plain `serde_json::Value` documents so tools can render them
//! back to the assistant without a second mapping layer.

pub mod backend;
pub mod odoo;

pub use backend::{
    CreatedInvoice, ErpBackend, ErpError, InvoiceLineRequest, InvoiceRequest, NewPartner,
    PartnerQuery, ProductQuery,
};
pub use odoo::OdooClient;
