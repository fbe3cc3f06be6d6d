mod attempt;
mod catalog;
mod ids;
mod question;
mod result;

pub use ids::{AnswerId, ParseIdError, PlayerId, QuestionId};

pub use attempt::AttemptRecord;
pub use catalog::{Catalog, CatalogError};
pub use question::{Answer, Question, QuestionError};
pub use result::{Player, ResultRecord, ResultRecordError};
