//! Media pipeline components.
//!
//! - **sequence**: group numbered frame files into one logical asset
//! - **metadata**: classify assets and total their sizes
//! - **transcoder**: drive ffmpeg/ffprobe/ffplay for previews and probes
//! - **pool**: background workers that render previews off the caller's task

pub mod metadata;
pub mod pool;
pub mod sequence;
pub mod transcoder;

pub use metadata::{AssetType, ImageInfo, MetadataExtractor};
pub use pool::{PoolProgress, PreviewEvent, PreviewMedia, PreviewPool, PreviewTask};
pub use sequence::{detect_sequence, SequenceDetector, SequenceInfo, SequencePattern};
pub use transcoder::{GifOptions, MediaInfo, Transcoder};
