//! Collective-communication schedules for a message-passing group.
//!
//! Each collective call is reduced to an [`OperationKey`]; the first call
//! with a given key generates a per-rank [`Schedule`] (a DAG of sends,
//! receives and local steps) and caches it on the [`Communicator`]. Every
//! call, cached or not, runs as a fresh execution under its own tag and is
//! driven by a non-blocking progress engine over any [`Transport`].

pub mod args;
pub mod cache;
pub mod comm;
pub mod config;
pub mod device;
pub mod error;
pub mod generate;
pub mod progress;
mod reduce;
pub mod schedule;
pub mod transport;
pub mod types;

pub use args::{OperationArgs, OperationKey, OperationKind};
pub use cache::{Checkout, ScheduleCache};
pub use comm::{CollectiveGroup, CollectiveHandle, Communicator, Element};
pub use config::CollConfig;
pub use device::{CpuAdapter, DeviceAdapter};
pub use error::{CollError, ErrorClass, Result};
pub use generate::{GroupShape, generate};
pub use progress::{Execution, Progress, StepState};
pub use schedule::{Buffer, Schedule, Slice, Step, StepKind};
pub use transport::{Completion, LocalEndpoint, LocalFabric, RequestId, Transport};
pub use types::{DataType, Rank, ReduceOp, Tag};
