pub mod context;
pub mod coordinator;
pub mod decision;
pub mod dedup;
pub mod migrations;
pub mod projector;
pub mod schema;
pub mod writers;

pub use coordinator::{OnFailure, StatePipelineCoordinator, StatePipelineResult};
pub use projector::{FileProjector, ProjectionMode};
pub use schema::{StateStore, StateStoreStatus};
