mod plan;
mod view;
mod workflow;

// Public API of the quiz session subsystem.
pub use crate::error::QuizError;
pub use view::{GlobalStats, LeaderboardEntry, ResultId, ResultListItem, ResultService};
pub use workflow::{QuizAnswerResult, QuizLoopService};
