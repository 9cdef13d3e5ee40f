pub mod params;
pub mod routes;

pub use routes::{router, ApiState};
