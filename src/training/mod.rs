//! Tree training.
//!
//! One boosting round grows one regression tree:
//!
//! - [`TreeParams`]: every knob a build reads, plus the regularized
//!   weight/gain functions
//! - [`ColumnScratch`]: reusable column-major reprojection of a node's rows
//! - [`SplitSelector`]: best-candidate accumulation during enumeration
//! - [`TreeGrower`]: the task-driven expansion loop with in-place id-set
//!   partitioning and bottom-up pruning
//! - [`TreeTrainer`]: facade binding one tree to one round, with dense and
//!   sparse prediction

mod grower;
mod logger;
mod params;
mod scratch;
mod selector;
mod trainer;

pub use grower::{BoostReport, TreeGrower};
pub use logger::{TrainingLogger, Verbosity};
pub use params::{DefaultDirection, ParamError, TreeParams};
pub use scratch::{ColumnEntry, ColumnScratch};
pub use selector::{SplitCandidate, SplitSelector};
pub use trainer::TreeTrainer;
