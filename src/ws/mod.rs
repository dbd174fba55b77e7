//! Session connection pool and broadcast protocol.
//!
//! Tracks live transport connections, groups them by session (mix) id, and
//! routes typed messages with defined fan-out semantics: progress events go
//! to the requester only, results to the whole session, chat to everyone but
//! the sender.

pub mod connection;
pub mod message;
pub mod pool;
pub mod transport;

pub use connection::{serve, IdentityState, MAX_MESSAGE_BYTES};
pub use message::{Envelope, Inbound};
pub use pool::{ConnectionHandle, ConnectionPool};
pub use transport::{Frame, MixTransport, TransportError, TransportReader, TransportWriter};
