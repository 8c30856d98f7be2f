//!  Persistence is organized through [state_store::StateStoreImpl].
//!  The basic idea is:
//!   - The whole counter state lives in one json document inside the application directory.
//!   - The document holds today's running count, the per-day history and the date marker the
//!     running count belongs to.
//!   - Every engine mutation rewrites the document, so the store never lags the in-memory state
//!     by more than a single increment.

pub mod entities;
pub mod state_store;
