//! In-process live-update plumbing: the per-game subscription registry and
//! the feed loop that drains one subscriber's channel.

pub mod connection;
pub mod dispatcher;

pub use connection::{FeedError, run_feed};
pub use dispatcher::{Dispatcher, Feed};
