// Notifier implementations
pub mod serverchan;

pub use serverchan::ServerChanNotifier;
