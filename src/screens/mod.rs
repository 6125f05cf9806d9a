pub mod dashboard;
pub mod metrics;
pub mod schema;

// Screen 1: Metrics (performance metrics table, refreshed in the background)
// Screen 2: Schema (databases, tables and columns of the local server)

pub use dashboard::{Dashboard, FrameState};
pub use metrics::MetricsTable;
pub use schema::{SchemaFocus, SchemaView};
