pub mod catalog;

pub use catalog::CatalogConfig;
