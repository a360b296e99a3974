//! Client/project management core: an entity tree (clients → meetings →
//! deliverables → tasks), date- and bucket-indexed projections over it,
//! a copy-then-replace mutation protocol, and a JSON-file store behind a
//! small HTTP API.

pub mod aggregate;
pub mod error;
pub mod mutation;
pub mod palette;
pub mod quick_add;
pub mod server;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

pub use error::{ApiError, MutationError, StoreError};
pub use session::{Session, SessionError};
pub use state::{AppState, Config};
pub use store::{FileStore, StateStore};
pub use types::{Client, ClientMap, Deliverable, Meeting, Task};
