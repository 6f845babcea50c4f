//! TableTalk table crate - dataset fetching, parsing and memoized loading.
//!
//! Turns a configured locator (URL or path) into an immutable, shared
//! [`Table`](tabletalk_core::Table). Delimited text is read with `csv`,
//! workbooks with `calamine`.

pub mod dataset;
pub mod error;
pub mod fetch;
pub mod format;
pub mod parse;
pub mod store;

pub use dataset::Dataset;
pub use error::LoadError;
pub use fetch::{DatasetFetcher, FileFetcher, HttpFetcher, SourceFetcher, SourceLocator};
pub use format::SourceFormat;
pub use parse::parse_table;
pub use store::TableStore;
