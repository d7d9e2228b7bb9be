//! FrameWin Media - working-zone frame caching over pluggable decoders
//!
//! This crate handles:
//! - The decode backend contract and the procedural test-pattern backend
//! - The bounded frame cache and its import pipeline
//! - Working-zone reconciliation and navigation in `VideoReader`
//! - Reader registration by file extension

pub mod backend;
pub mod cache;
pub mod config;
pub mod generator;
pub mod import;
pub mod reader;
pub mod registry;
pub mod zone;

pub use backend::{
    share, share_boxed, BackendFactory, DecodeBackend, NextFrame, ReaderFlags, SharedBackend,
    VideoInfo, VideoSummary,
};
pub use cache::FrameCache;
pub use config::{CacheBudget, ImageAspectRatio, ReaderConfig, VideoOptions};
pub use generator::{FrameGenerator, GeneratorConfig, GENERATOR_EXTENSION};
pub use import::{
    CancelToken, ImportJob, ImportOutcome, ImportProgress, ImportSink, InlineScheduler,
    Scheduler, ThreadScheduler,
};
pub use reader::VideoReader;
pub use registry::ReaderRegistry;
pub use zone::{ZoneDecision, ZoneRequest};

/// Build the default reader registry (call once at startup).
pub fn init() -> ReaderRegistry {
    let mut registry = ReaderRegistry::new();
    registry.register(GENERATOR_EXTENSION, FrameGenerator::create);
    tracing::info!(
        "FrameWin Media initialized ({} reader types)",
        registry.len()
    );
    registry
}
