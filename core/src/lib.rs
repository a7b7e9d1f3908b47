pub mod catalog;
pub mod models;

pub use catalog::{Catalog, CatalogError, DexInfo};
pub use models::*;
