//! Command protocol between workers and the coordinator
//!
//! Workers never touch the store. They describe the operation as a
//! [`Command`], tag it with a fresh request id and send it to the
//! coordinator, which answers with the matching [`IpcResponse`].
//!
//! ```text
//!  Worker                                   Coordinator
//!    │  {"requestId": r, "command": …}  ──▶    │
//!    │                                         │ UserStore::execute
//!    │  ◀──  {"requestId": r, "response": …}   │
//! ```
//!
//! The coordinator also sends a single `{"port": n}` assignment to each
//! worker right after spawning it.

pub mod command;
pub mod message;
pub mod pending;

pub use command::{Command, Outcome, Payload, StoreFault, StoreResponse};
pub use message::{
    decode_line, encode_line, CoordinatorMessage, IpcRequest, IpcResponse, PortAssignment,
    RequestId,
};
pub use pending::PendingRequests;
