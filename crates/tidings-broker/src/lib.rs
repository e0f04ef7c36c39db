//! Tidings broker library.
//!
//! Session-scoped change notification: publishers append payloads to named
//! channels, and each client session polls for the payloads it has not seen
//! yet, narrowed to the rows its open views would show.
//!
//! # Example
//!
//! ```
//! use tidings_broker::{AffinityKey, Broker, BrokerConfig};
//! use tidings_proto::{Message, Origin, Payload};
//!
//! let broker = Broker::new(BrokerConfig::default()).unwrap();
//! let worker = AffinityKey::new("conversation-1");
//!
//! broker.subscribe("news", &worker);
//! broker.publish("news", Payload::new(Origin::system()).with_message(Message::info("hello")));
//!
//! let pending = broker.poll(&worker);
//! assert_eq!(pending.len(), 1);
//! assert!(broker.poll(&worker).is_empty());
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pubsub;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BrokerArgs, BrokerConfig};
pub use error::{Error, Result};
pub use metrics::{BrokerMetrics, MetricsSnapshot};
pub use pubsub::{
    sweep_task, Broker, ChannelInfo, ChannelKind, FilterMatcher, SearchError, SearchExpr,
    Subscriber, SweepResult, ViewFilter,
};
pub use session::{AffinityKey, SessionContext, SessionRegistry, UserIdentity};
