pub mod client;
pub mod inventory_service;
pub mod price_service;
pub mod attribute_service;

pub use client::{many2one, OdooClient, OdooError};
pub use inventory_service::{
    aggregate_stock, extract_zone, InventoryService, InventorySnapshot, ProductAggregate,
    StockQuant, ZoneAggregate, CONSIGNA_CATEGORY_IDS, STOCK_PAGE_SIZE,
};
pub use price_service::{parse_price, parse_pricelist_html, PriceService};
pub use attribute_service::{map_by_position, AttributeLine, AttributeService, TireAttributes, ATTRIBUTE_SLOTS};
