//! Actor-based fleet simulation
//!
//! Every device and every consumer runs as an independent async task. Devices
//! publish updates on the [`UpdateBus`](crate::bus::UpdateBus); each consumer
//! owns its own queue and its own state, so no state is shared between tasks.
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────┐
//!                    │   Simulation    │
//!                    └────────┬────────┘
//!                             │ spawns
//!                ┌────────────┼────────────┐
//!                │            │            │
//!        ┌───────▼───────┐    │    ┌───────▼───────┐
//!        │ DeviceActor-1 │    │    │ DeviceActor-N │
//!        │ (bulb)        │    │    │ (camera)      │
//!        └───────┬───────┘    │    └───────┬───────┘
//!                │            │            │
//!                └────────────┼────────────┘
//!                             │
//!                   ┌─────────▼──────────┐
//!                   │     UpdateBus      │ (one queue per consumer)
//!                   └──────────┬─────────┘
//!              ┌───────────────┼───────────────┐
//!              │               │               │
//!      ┌───────▼──────┐  ┌─────▼──────┐  ┌─────▼──────────┐
//!      │ AlertActor   │  │StorageActor│  │ AnalyticsActor │
//!      └──────────────┘  └────────────┘  └────────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **DeviceActor**: Connects, then emits a state update at random intervals
//! - **AlertActor**: Evaluates updates against the alert rules
//! - **StorageActor**: Appends every update to the history store
//! - **AnalyticsActor**: Folds updates into running statistics
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Updates**: Devices publish to the bus, which fans out to consumer queues
//! 3. **Request/Response**: oneshot channels for queries
//! 4. **Results**: Each actor returns its final state through its `JoinHandle`

pub mod alert;
pub mod analytics;
pub mod device;
pub mod messages;
pub mod storage;
