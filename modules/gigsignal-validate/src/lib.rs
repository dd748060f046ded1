pub mod raw;
pub mod sanitize;

pub use raw::RawEvent;
pub use sanitize::{BatchValidation, InvalidRecord, Issue, IssueKind, Sanitizer};
