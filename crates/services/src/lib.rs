#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use quiz_core::Clock;

pub use error::QuizError;
pub use sessions::{
    GlobalStats, LeaderboardEntry, QuizAnswerResult, QuizLoopService, ResultId, ResultListItem,
    ResultService,
};
