pub mod config;
pub mod debentures;
pub mod detail;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod render;
pub mod sections;
pub mod sink;
pub mod upload;

pub use config::{RunDate, Settings};
pub use error::{RenderError, ScrapeError};
pub use extract::{Extraction, Table};
