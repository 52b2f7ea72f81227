//! Progressive approximation pipeline
//!
//! [`PipelineDriver`] applies each stage's approximations, retrains through a
//! [`crate::train::Trainer`] and hands the stage's best checkpoint to the next
//! stage. The first failure halts the run; [`PipelineReport`] carries the
//! results of every stage that started plus the cause.

mod driver;
mod report;


pub use driver::PipelineDriver;
pub use report::{PipelineReport, ReportSummary};
