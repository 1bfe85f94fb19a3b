pub mod fetchers;
pub mod notifiers;
pub mod traits;

pub use traits::{Notifier, PageFetcher};
