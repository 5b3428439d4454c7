// Playbill Archive - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod config;
pub mod year;           // Year Extractor
pub mod parser;         // Payload Parser - extraction envelope → SourceDocument
pub mod normalize;      // Row Flattener, Year Bucketer, Summary Aggregator
pub mod sink;           // Sink Writer - CSV / Excel
pub mod ingest;         // Batch Ingester
pub mod archive;        // processed/ bookkeeping
pub mod pipeline;       // ingest → write → archive
pub mod extraction;     // Document-understanding service collaborator

// Re-export commonly used types
pub use error::{PlaybillError, Result};
pub use config::{
    ExtractionSettings, InputConfig, OutputFormat, SinkConfig, SinkMode,
};
pub use year::{extract_year, YearLabel};
pub use parser::{
    RoleEntry, SourceDocument,
    load_documents, parse_payload, parse_value,
};
pub use normalize::{
    FlatRow, SummaryRecord, YearBuckets,
    bucket, flatten, summarize, total_rows,
    FLAT_COLUMNS, SUMMARY_COLUMNS,
};
pub use sink::{write, write_flat, write_year_workbook, WriteOutcome};
pub use ingest::{discover_inputs, ingest, ingest_files, BatchResult, SkippedItem};
pub use archive::{ArchiveReport, Archiver};
pub use pipeline::{convert, format_preview, ConversionReport};
pub use extraction::{extract_images, DocumentExtractor, ExtractionReport};
#[cfg(feature = "extract")]
pub use extraction::ContentUnderstandingClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
