//! Logical sessions bound to units of work.
//!
//! The transport runs each request on its own worker thread. The
//! [`SessionRegistry`] lets a recycled worker pick up the logical session
//! of the conversation it is serving, keyed by an [`AffinityKey`] that the
//! transport passes explicitly with every call.

mod context;
mod registry;

pub use context::{AffinityKey, SessionContext, UserIdentity};
pub use registry::{IdentityChange, SessionInfo, SessionRegistry};
