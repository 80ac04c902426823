pub mod collections;
pub mod config;
pub mod import;
pub mod search;
pub mod status;

pub use collections::list_collections;
pub use import::run_import;
pub use search::run_search;
pub use status::show_status;
