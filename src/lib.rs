//! Tankobon - Comic Page Tree to Fixed-Layout Ebook Packaging
//!
//! This crate turns directories of comic page images into fixed-layout EPUB
//! or CBZ archives. A run parses each comic into an in-memory
//! [`Comic`](comic::Comic) tree, splits it into volumes, filters and
//! deduplicates it, re-encodes every page through an image pipeline and
//! finally streams the pages into one archive per volume.
//!
//! # Getting Started
//!
//! Configure a run with [`TankobonConfig::builder`] and execute it with
//! [`TankobonConfig::convert_from_source`] or, for comics built in memory,
//! [`TankobonConfig::pack`].
//!
//! ```rust,no_run
//! use tankobon::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> tankobon::error::Result<()> {
//!     let config = TankobonConfig::builder()
//!         .source_path(PathBuf::from("./raw"))
//!         .output_path(PathBuf::from("./epubs"))
//!         .source_format(SourceFormat::Tachiyomi)
//!         .output_format(FileFormat::Epub)
//!         .reading_direction(Direction::Rtl)
//!         .enable_dedup(true)
//!         .enable_image_pipeline(true)
//!         .enable_downsample(true)
//!         .build()?;
//!
//!     let report = config.convert_from_source().await?;
//!     println!("{}", report);
//!     for (title, warning) in report.warnings() {
//!         println!("{}: {}", title, warning);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The library logs through the `log` facade and never installs a logger.

pub mod comic;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod generator;
pub mod image_pipeline;
pub mod log_scope;
pub mod parser;
pub mod path_utils;
pub mod source;
pub mod split;
pub mod tankobon;
pub mod types;

// Publicly expose the main `TankobonConfig` struct and its builder
pub use tankobon::{ManualSplit, TankobonConfig, TankobonConfigBuilder};

pub use types::{
    ComicReport, DedupFailurePolicy, Direction, EbookMetadata, FileFormat, HashAlgorithm,
    ImageKind, PackOutcome, PageWarning, ResizeKernel, RunReport, SourceFormat,
};

/// Prelude module for convenient imports.
///
/// Re-exports the most commonly used types and traits so that
/// `use tankobon::prelude::*;` is enough for typical runs.
pub mod prelude {
    pub use super::{
        ComicReport, DedupFailurePolicy, Direction, EbookMetadata, FileFormat, HashAlgorithm,
        ImageKind, ManualSplit, PackOutcome, PageWarning, ResizeKernel, RunReport, SourceFormat,
        TankobonConfig, TankobonConfigBuilder, error, generator, types,
    };
    pub use crate::comic::{Chapter, Comic, ImageHash, Page};
    pub use crate::filter::{Filter, FilterPipeline, Handler, ProcessPipeline};
    pub use crate::generator::Generator;
    pub use crate::log_scope::LogScope;
    pub use crate::parser::{
        BcdownParser, ComicParser, DmzjBackupParser, GeneralParser, TachiyomiParser, ZmhBackupParser,
    };
    pub use crate::split::SplitPolicy;
    pub use std::path::{Path, PathBuf};
}
