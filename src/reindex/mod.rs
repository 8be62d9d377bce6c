//! Reindex pipeline / 重建索引
//!
//! [`runner`] drives a scoped run against three narrow seams ([`Catalog`],
//! [`IndexWriter`], [`JobControl`]); [`sql`] implements the first two on
//! top of the host database and [`job`] ties a run to the job manager.

pub mod job;
pub mod runner;
pub mod sql;

pub use runner::{
    Catalog, CatalogPage, IndexWriter, JobControl, ReindexReport, ReindexRunner, ReindexScope,
};
pub use sql::{SqlCatalog, SqlIndexWriter};
