pub mod analyzer;
pub mod context;
pub mod forecast;
pub mod parse;
pub mod pipeline;
pub mod report;
pub mod run_log;
pub mod run_record;
pub mod step;
pub mod steps;

pub use analyzer::MarketAnalyzer;
pub use context::{keys, Context, ContextSnapshot, Writes};
pub use forecast::{ForecastBundle, Forecaster};
pub use pipeline::{validate_subject, Pipeline};
pub use report::TextReportSink;
pub use run_log::RunLogger;
pub use run_record::{RunEntry, RunRecord};
pub use step::{run_isolated, Ports, Step, StepOutput};
pub use steps::default_steps;
