pub mod config;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod startup;

/// URL prefix generated images are served under.
pub const IMAGES_ROUTE: &str = "/images";
