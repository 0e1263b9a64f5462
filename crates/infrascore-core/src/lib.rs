//! infrascore core library
//!
//! Metric orchestration for cloud posture scoring: a registry of metric
//! definitions, dependency planning, input resolution, concurrent execution
//! against a pluggable evaluator, and weighted aggregation into a run report.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod input;
pub mod metric;
pub mod obs;
pub mod persist;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod rules;
pub mod sample;
pub mod telemetry;

pub use aggregate::{Aggregator, Summary, WeightedScore};
pub use catalog::{builtin_definitions, builtin_registry, sample_file_for};
pub use config::{default_category_weights, EngineConfig, WeightingScheme};
pub use context::{MetricOverride, RunConfig, RunContext, RunId};
pub use document::Document;
pub use error::{
    ConfigError, ConfigResult, EngineError, EngineResult, EvaluationError, EvaluationResult,
    FailureKind, InputError, InputResult, MetricFailure,
};
pub use evaluator::{Evaluation, Evaluator, Score};
pub use executor::ExecutionEngine;
pub use input::{InputResolver, InputSource, ResolvedInput};
pub use metric::{Category, InputDescriptor, MetricDefinition, MetricId};
pub use persist::{default_report_path, JsonFileSink, ReportSink, DEFAULT_SAVE_DIR};
pub use registry::MetricRegistry;
pub use report::{MetricResult, MetricStatus, ReportAssembler, RunReport};
pub use resolver::{DependencyResolver, ExecutionPlan, MetricSelection};
pub use rules::RubricEvaluator;
pub use sample::{FsSampleStore, MemorySampleStore, SampleStore};
pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
