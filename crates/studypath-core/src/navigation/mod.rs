//! Moving through a roadmap one resource at a time.
//!
//! [`Cursor`] is the pure state machine over the depth-first sequence.
//! [`LearningSession`] wraps it with persistence and on-demand resource
//! fetching.

mod cursor;
mod session;

pub use cursor::{Cursor, CursorState, NavigationError, Transition};
pub use session::{FetchOutcome, LearningSession, SessionError, Step};
