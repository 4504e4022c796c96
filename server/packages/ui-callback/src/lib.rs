//! Server-initiated UI callbacks over a request/response transport.
//!
//! A client keeps one callback poll open per session. The server holds that
//! poll until it has work for the client, the connection dies, or the session
//! ends, and then answers it so the client can fetch the work.

pub mod activation;
pub mod config;
pub mod coordinator;
pub mod probe;
pub mod registry;
pub mod scope;
pub mod session;
pub mod snapshot;
pub mod tracker;

pub use activation::ActivationRegistry;
pub use config::{CallbackConfig, DEFAULT_CHECK_INTERVAL};
pub use coordinator::{CallbackCoordinator, PollOutcome, FORCE_CALLBACK_ATTRIBUTE};
pub use probe::{ConnectionFlag, ConnectionProbe, WriteProbe};
pub use registry::{SessionContext, SessionRegistry};
pub use scope::RequestScope;
pub use session::{DestroyListener, ListenerId, SessionLifecycle, SessionStore, SessionWatch};
pub use snapshot::{CoordinatorSnapshot, SnapshotError};
pub use tracker::{RequestHandle, RequestTracker};
