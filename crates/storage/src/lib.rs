//! Storage access for the reference builder.
//!
//! - [`RemoteArchive`]: read-only object access (anonymous S3, HTTP, memory)
//! - [`UrlBuilder`]: slot to object key and reference URL mapping

pub mod archive;
pub mod layout;

pub use archive::{ArchiveConfig, RemoteArchive};
pub use layout::{ReforecastLayout, UrlBuilder};
