//! Publish/subscribe core: channels, subscribers, view filters, and the
//! retention sweeper, tied together by the [`Broker`].

mod broker;
mod channel;
mod filter;
mod search;
mod subscriber;
mod sweeper;

pub use broker::Broker;
pub use channel::{Channel, ChannelInfo, ChannelKind};
pub use filter::FilterMatcher;
pub use search::{Alternative, Clause, SearchError, SearchExpr};
pub use subscriber::{filter_key, Subscriber, ViewFilter};
pub use sweeper::{sweep_task, SweepGuard, SweepResult, Sweeper};
