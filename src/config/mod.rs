// src/config/mod.rs
pub mod ai;
pub mod pipeline;
pub mod sources;

pub use ai::AiConfig;
pub use pipeline::PipelineConfig;
pub use sources::{load_seed_sources, load_seed_sources_from, SourceSeed};
