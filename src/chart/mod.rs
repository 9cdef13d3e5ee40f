pub mod data;
pub mod image;
pub mod page;

pub use data::aggregate_facets;
