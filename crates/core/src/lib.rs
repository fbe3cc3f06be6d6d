#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod session;
pub mod stats;
pub mod time;

pub use error::Error;
pub use session::{
    Advance, CurrentQuestion, QuizSession, SessionError, SessionPhase, SessionProgress,
    SubmitOutcome,
};
pub use stats::SessionStats;
pub use time::Clock;
