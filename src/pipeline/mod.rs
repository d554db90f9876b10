// Pipeline orchestration — one entry point that drives every topic stage.

pub mod error;
pub mod topic_run;

pub use error::PipelineError;
pub use topic_run::{PipelineSettings, RunOutcome, RunStage, TopicPipeline, TopicRun};
