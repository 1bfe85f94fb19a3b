pub mod fetcher;
pub mod notifier;

pub use fetcher::{FetchedPage, PageFetcher};
pub use notifier::{Notification, NotificationResult, Notifier};
