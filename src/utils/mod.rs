pub mod config;
pub mod errors;
pub mod logging;
pub mod record;
pub mod types;
pub mod vitals;
