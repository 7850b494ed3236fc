//! Shared foundations for PlantMama.
//!
//! - [`settings`]: environment-driven configuration
//! - [`config`]: filesystem locations
//! - [`logging`]: tracing subscriber setup
//! - [`validators`]: user input checks
//! - [`season`] and [`knowledge`]: built-in care reference
//! - [`image`]: photo normalization and plausibility checks

pub mod config;
pub mod image;
pub mod knowledge;
pub mod logging;
pub mod season;
pub mod settings;
pub mod validators;

pub use crate::image::{ImageError, ImageFeatures, ImageMetadata, ImageProcessor, ProcessedImage};
pub use logging::init_logging;
pub use season::Season;
pub use settings::{ConfigError, LogLevel, Settings};
pub use validators::ValidationError;
