pub mod auth;
pub mod users;
pub mod admin;
pub mod inventory;
pub mod prices;
pub mod plant_stock;
pub mod denied_tires;
pub mod quotations;
