//! Session state and the turn loop.
//!
//! - [`session`]: [`Session`] owns the message log, its budget, and the
//!   model selection.
//! - [`turn`]: [`TurnRunner`] runs one user turn with bounded tool rounds
//!   and cancellation, reporting progress to a [`TurnObserver`].

pub mod session;
pub mod turn;

pub use session::{ModelSelection, Session};
pub use turn::{MAX_TOOL_ROUNDS, NoopObserver, RequestParams, TurnObserver, TurnOutcome, TurnRunner};
