//! Command implementations for subrepo-cli

pub mod completions;
pub mod delete;
pub mod import;
pub mod reimport;
pub mod tree;

pub use completions::run_completions;
pub use delete::run_delete;
pub use import::run_import;
pub use reimport::run_reimport;
pub use tree::run_tree;
