//! Tidings notification types.
//!
//! This crate defines the data that flows through the tidings change
//! broker: payloads published to channels, the entity manipulations they
//! carry, and the view parameters a client registers to narrow what it
//! receives.
//!
//! # Modules
//!
//! - [`value`] - Runtime scalar values found in record snapshots
//! - [`record`] - Record and row snapshots attached to manipulations
//! - [`manipulation`] - Insert/update/delete descriptions of a single row
//! - [`payload`] - The notification unit published to a channel
//! - [`view`] - Client view parameters (`@viewId`, `@viewType`, `@search`)
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! All types derive `serde::Serialize` and `serde::Deserialize`. The
//! transport layer picks the encoding:
//!
//! ```ignore
//! use tidings_proto::{Origin, Payload};
//!
//! let payload = Payload::new(Origin::system()).with_function("refresh");
//! let json = serde_json::to_string(&payload).unwrap();
//! let decoded: Payload = serde_json::from_str(&json).unwrap();
//! ```

pub mod error;
pub mod manipulation;
pub mod payload;
pub mod record;
pub mod value;
pub mod view;

pub use error::Error;

pub use manipulation::{Manipulation, ManipulationType};
pub use payload::{Message, MessageLevel, Origin, OriginKind, Payload};
pub use record::{FieldValue, Record};
pub use value::Value;
pub use view::{ViewParams, ViewType};
