mod answers;
mod ids;
mod progress;
mod topic;

pub use answers::AnswerMap;
pub use ids::{QuestionId, TopicId};
pub use progress::{DayProgress, DayStep, FORMAT_VERSION, ProgressRecord, RecordShapeError};
pub use topic::{Catalog, CatalogError, Question, QuestionDraft, Topic, TopicDraft};
