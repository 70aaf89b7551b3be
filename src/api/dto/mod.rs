//! Data Transfer Objects for REST request/response serialization.
//!
//! All prices are serialized as JSON strings so decimal amounts survive
//! clients that parse numbers as floats.

pub mod price_dto;
pub mod run_dto;
pub mod store_dto;

pub use price_dto::*;
pub use run_dto::*;
pub use store_dto::*;
