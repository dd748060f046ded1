pub mod error;
pub mod hash;
pub mod text;
pub mod types;

pub use error::{Error, Result, Severity};
pub use hash::{composite_key, content_hash, fuzzy_key, stable_id, stable_id_for, FuzzyKey};
pub use text::{normalize_currency, normalize_text, NormalizeMode};
pub use types::*;
