pub mod api;
pub mod backend;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod request;
pub mod runner;
pub mod script;
pub mod util;
