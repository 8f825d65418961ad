//! StaX Core - asset ingestion for a managed media and geometry library.
//!
//! The core classifies each source, folds numbered frames into sequences,
//! applies the copy policy, and renders previews by driving external tools:
//!
//! ```text
//! path → SequenceDetector → MetadataExtractor → copy → GLB / thumbnail / GIF / mp4 → Catalog
//! ```
//!
//! Persistence and hooks are collaborators behind the [`Catalog`],
//! [`PreIngestHook`] and [`PostIngestHook`] traits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stax_core::{Config, InMemoryCatalog, IngestOptions, IngestionCore};
//!
//! #[tokio::main]
//! async fn main() -> stax_core::Result<()> {
//!     let catalog = Arc::new(InMemoryCatalog::new());
//!     let stack = catalog.add_stack("plates", "/mnt/library/plates");
//!     let list = catalog.add_list(stack.id, "shot010", None);
//!
//!     let core = IngestionCore::new(Config::load()?, catalog.clone())?;
//!     let element = core
//!         .ingest("/renders/shot010.1001.exr".as_ref(), list.id, &IngestOptions::default())
//!         .await?;
//!     println!("{} -> element {}", element.name, element.id);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hooks;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod process;

#[cfg(test)]
mod testutil;

pub use catalog::{
    Catalog, Element, ElementList, InMemoryCatalog, IngestionLogEntry, IngestionStatus,
    NewElement, Stack,
};
pub use config::{Config, CopyPolicy};
pub use error::{ConfigError, IngestError, IngestResult, Result, StaxError, TimeoutKind, ToolError};
pub use geometry::{ConversionAttempt, ConversionReport, GeometryConverter, HeadlessTool};
pub use hooks::{CommandHook, HookContext, HookDecision, PostIngestHook, PreIngestHook};
pub use ingest::{BatchItem, BatchOptions, BatchReport, IngestOptions, IngestionCore};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{
    AssetType, GifOptions, MediaInfo, MetadataExtractor, PreviewEvent, PreviewMedia, PreviewPool,
    PreviewTask, SequenceDetector, SequenceInfo, SequencePattern, Transcoder,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
