pub mod config;
pub mod domain;
pub mod error;
pub mod ids;
pub mod types;

pub use domain::{normalize_domain, parse_domain_strict, SpecialistDomain};
pub use error::{GatewayError, Result};
pub use ids::*;
pub use types::*;
