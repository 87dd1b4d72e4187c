//! Authoritative in-memory user table
//!
//! The store is a plain owned value. It is instantiated once inside the
//! coordinator's dispatcher (or once per standalone worker) and mutated
//! only through [`UserStore::execute`], so it carries no locking of its own.
//!
//! ```text
//!   Command ──▶ UserStore::execute ──▶ StoreResponse
//!                  │
//!                  └─ Vec<User> (insertion order)
//! ```

pub mod memory;
pub mod user;

pub use memory::UserStore;
pub use user::{generate_user_id, is_valid_user_id, User, UserData, UserId};
