pub mod odoo;
pub mod auth_service;
pub mod sync_service;
pub mod report_service;
pub mod quotation_service;

pub use auth_service::AuthService;
pub use sync_service::{SyncService, SyncSummary};
pub use report_service::ReportService;
pub use quotation_service::QuotationService;
