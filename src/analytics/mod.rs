pub mod aggregate;
pub mod logger;
pub mod reporter;
