//! Phrase matcher: classifies search terms once and evaluates them against a
//! normalized, space-padded verse.
//!
//! Term precedence, highest first:
//! 1. `term==` rhyme, checked against the poem's verse list
//! 2. `term=` radif, checked against the poem's verse list
//! 3. no `%`: plain case-sensitive substring, or a tolerant pattern when the
//!    term contains He followed by a space (the Ye-as-Kasre spelling)
//! 4. `%`: wildcard pattern, `%%` is any text and `%` any non-space run
//!
//! Excluded terms are checked before any of the above.

use regex::{Regex, RegexBuilder};

use super::prosody::{is_radif, is_rhyme};
use crate::models::Verse;

pub const RHYME_MARKER: &str = "==";
pub const RADIF_MARKER: &str = "=";
pub const WILDCARD: char = '%';

/// He followed by a space, written where a Kasre-Ye may or may not be spelled out.
const YE_AS_KASRE: &str = "\u{0647} ";
const YE_AS_KASRE_PATTERN: &str = "\u{0647}\\s*\u{06CC}{0,2}\\s+";

/// Whether `term` is evaluated as a plain substring test.
pub fn is_plain_substring(term: &str) -> bool {
    !term.ends_with(RADIF_MARKER) && !term.contains(WILDCARD) && !term.contains(YE_AS_KASRE)
}

/// Lazily supplies the verse list of the poem currently being evaluated.
///
/// Implementations own the per-poem cache; the matcher only asks for the
/// verses when a rhyme or radif term is reached.
pub trait VerseSource {
    type Error;

    fn poem_verses(&mut self) -> Result<&[Verse], Self::Error>;
}

#[derive(Debug, Clone)]
enum Term {
    Rhyme(String),
    Radif(String),
    Substring(String),
    Pattern(Regex),
    /// A term that could not be compiled; it never matches.
    Never,
}

impl Term {
    fn classify(raw: &str) -> Term {
        if raw.ends_with(RHYME_MARKER) {
            return Term::Rhyme(raw.replace(RHYME_MARKER, ""));
        }
        if raw.ends_with(RADIF_MARKER) {
            return Term::Radif(raw.replace(RADIF_MARKER, ""));
        }
        if !raw.contains(WILDCARD) {
            if raw.contains(YE_AS_KASRE) {
                let pattern = raw
                    .split(YE_AS_KASRE)
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(YE_AS_KASRE_PATTERN);
                return Term::compile(raw, &pattern);
            }
            return Term::Substring(raw.to_string());
        }

        let pattern = raw
            .split("%%")
            .map(|piece| {
                piece
                    .split(WILDCARD)
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join("\\S*")
            })
            .collect::<Vec<_>>()
            .join(".*");
        Term::compile(raw, &pattern)
    }

    fn compile(raw: &str, pattern: &str) -> Term {
        match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        {
            Ok(regex) => Term::Pattern(regex),
            Err(err) => {
                tracing::warn!(term = raw, error = %err, "search term could not be compiled");
                Term::Never
            }
        }
    }

    fn needs_verses(&self) -> bool {
        matches!(self, Term::Rhyme(_) | Term::Radif(_))
    }
}

/// Compiled AND-ed and excluded terms of one search.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    terms: Vec<Term>,
    excluded: Vec<String>,
}

impl PhraseMatcher {
    pub fn new(phrases: &[String], excluded: &[String]) -> Self {
        Self {
            terms: phrases.iter().map(|p| Term::classify(p)).collect(),
            excluded: excluded.iter().filter(|e| !e.is_empty()).cloned().collect(),
        }
    }

    /// Whether any term needs the poem's verse list.
    pub fn needs_poem_verses(&self) -> bool {
        self.terms.iter().any(Term::needs_verses)
    }

    /// True when `verse` contains any excluded term.
    pub fn is_excluded(&self, verse: &str) -> bool {
        self.excluded.iter().any(|e| verse.contains(e.as_str()))
    }

    /// Decide whether `verse` (normalized and padded) is a match.
    ///
    /// `order` is the verse ordinal used by rhyme and radif terms. The verse
    /// source is consulted at most once per rhyme or radif term, and only
    /// after the exclusion list has passed; its error aborts evaluation.
    pub fn accepts<S: VerseSource>(
        &self,
        verse: &str,
        order: i64,
        source: &mut S,
    ) -> Result<bool, S::Error> {
        if self.is_excluded(verse) {
            return Ok(false);
        }

        for term in &self.terms {
            let passed = match term {
                Term::Rhyme(phrase) => is_rhyme(source.poem_verses()?, phrase, order),
                Term::Radif(phrase) => is_radif(source.poem_verses()?, phrase, order),
                Term::Substring(phrase) => verse.contains(phrase.as_str()),
                Term::Pattern(regex) => regex.is_match(verse),
                Term::Never => false,
            };
            if !passed {
                tracing::trace!(?term, "verse rejected");
                return Ok(false);
            }
        }

        Ok(true)
    }
}
