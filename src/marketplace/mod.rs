//! Open marketplace where farmers post asks and investors post offers.

pub mod handlers;
pub mod matching;

pub use handlers::configure;
