pub mod form_data;
pub mod problem;
pub mod responses;

pub use form_data::{FieldValue, FormData, SubmissionSnapshot};
pub use problem::{reported_problem_id, GradeEntry, LoadOptions, Problem, RenderedSurface};
pub use responses::{StudentGrade, SubmissionResult};
