pub mod actors;
pub mod alerts;
pub mod analytics;
pub mod bus;
pub mod config;
pub mod devices;
pub mod simulation;
pub mod storage;
pub mod util;

pub use actors::messages::UpdateEvent;
pub use analytics::{AnalyticsAccumulator, AnalyticsSummary};
pub use simulation::{RunReport, Simulation};
