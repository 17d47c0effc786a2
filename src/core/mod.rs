pub mod aggregate;
pub mod engine;
pub mod exec_data;
pub mod filter;
pub mod gate;
pub mod glob;
pub mod pipeline;
pub mod summary;
pub mod units;
pub mod writer;

pub use crate::domain::model::{AggregatedReport, VerificationResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, TransformResult};
pub use crate::utils::error::Result;
