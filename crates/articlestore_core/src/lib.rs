pub mod config;
pub mod conflict;
pub mod filename;
pub mod logging;
pub mod maintenance;
pub mod record;
pub mod runtime;
pub mod store;
