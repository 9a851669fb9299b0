//! Shared test utilities for the reference builder workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic reforecast inventories (`.idx` text)
//! - Small kerchunk templates with the structure of a real GRIB scan
//! - Workspace path helpers and a skip macro for optional files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{reforecast_inventory, small_template_json};
//! ```

pub mod fixtures;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use paths::*;

/// Macro to skip a test if a file under the workspace `config/` directory is
/// missing.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_config_file;
///
/// #[test]
/// fn test_shipped_template() {
///     let path = require_config_file!("templates/pres_msl.json");
///     // Test code using path...
/// }
/// ```
#[macro_export]
macro_rules! require_config_file {
    ($name:expr) => {{
        match $crate::find_config_file($name) {
            Some(path) => path,
            None => {
                eprintln!("SKIPPED: Config file '{}' not found.", $name);
                return;
            }
        }
    }};
}
