//! Phrase search: verse normalization, term matching and the rhyme/radif
//! predicates the matcher delegates to.

pub mod matcher;
pub mod normalize;
pub mod prosody;

pub use matcher::{PhraseMatcher, VerseSource};
pub use normalize::{clean_text, normalize_verse};
