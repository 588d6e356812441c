//! Ponto - a rendezvous server that relays directed text messages and file
//! transfers between simultaneously connected clients.
//!
//! The server maps a client-chosen display name to a live TCP connection,
//! serializes access to that mapping behind one lock, and multiplexes
//! control commands, text, and file payloads over a single length-prefixed
//! byte stream per client. Nothing is persisted: the server is a pure relay.

pub mod client;
pub mod error;
pub mod logging;
pub mod net;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
