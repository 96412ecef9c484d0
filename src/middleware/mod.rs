// Request middleware: CORS and the authenticated-user extractor

pub mod auth;
pub mod cors;

pub use auth::*;
pub use cors::*;
