// Page fetch strategies
pub mod browser;
pub mod fallback;
pub mod http;

pub use browser::BrowserFetcher;
pub use fallback::FallbackFetcher;
pub use http::HttpFetcher;
