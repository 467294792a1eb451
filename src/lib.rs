pub mod api;
pub mod config;
pub mod cookie_store;
pub mod flow;
pub mod macros;
pub mod profile_parser;
pub mod qr;
pub mod relay;
pub mod schema;
