//! Domain models that mirror the ganjoor-style SQLite schema and get passed
//! between the verse store and the background tasks. These types stay light
//! data holders so the search engine can focus on matching and the task layer
//! on scheduling.

use std::collections::BTreeMap;
use std::fmt;

/// Read-only projection of a persisted verse (one mesra, or the title row in
/// title-only mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    /// Poem the verse belongs to.
    pub poem_id: i64,
    /// Ordinal position inside the poem. Real verses start at 1; ordinal 0 is
    /// reserved for title-only matching.
    pub order: i64,
    /// Raw text as stored.
    pub text: String,
}

/// A single row yielded by the search query cursor. Unlike [`Verse`] it keeps
/// the column order of the query, `(poem_id, text, order)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseRow {
    /// Poem the row belongs to; a change from the previous row means the
    /// cursor moved on to another poem.
    pub poem_id: i64,
    /// Verse text, or the poem title in title-only mode. NULL is read as empty.
    pub text: String,
    /// Ordinal of the verse; always 0 for title rows.
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Poem record as far as the search engine needs it.
pub struct Poem {
    /// Primary key from the `poem` table.
    pub id: i64,
    /// Title shown next to every match from this poem.
    pub title: String,
    /// Category the poem lives in; used to resolve the poet.
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Poet owning a category tree. Only the name travels into search results.
pub struct Poet {
    /// Primary key from the `poet` table.
    pub id: i64,
    /// Display name; empty when the column is NULL.
    pub name: String,
}

impl fmt::Display for Poet {
    /// Write the poet name, so result lists can format poets directly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One accepted verse, formatted with the context a result list shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Verse text as stored, before stripping and whitespace cleanup.
    pub verse_text: String,
    /// Title of the poem the verse belongs to; empty when the poem row is missing.
    pub poem_title: String,
    /// Poet resolved through the poem's category; empty when unknown.
    pub poet_name: String,
}

impl fmt::Display for SearchMatch {
    /// `verse | title | poet`, omitting empty trailing parts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verse_text)?;
        if !self.poem_title.trim().is_empty() {
            write!(f, " | {}", self.poem_title)?;
        }
        if !self.poet_name.trim().is_empty() {
            write!(f, " | {}", self.poet_name)?;
        }
        Ok(())
    }
}

/// Multi-valued mapping from poem id to its accepted verses.
///
/// Poem ids iterate in ascending order; matches under one poem id keep the
/// order they were inserted in, which for a search task is row-fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    by_poem: BTreeMap<i64, Vec<SearchMatch>>,
    total: usize,
}

impl SearchResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a match under `poem_id`.
    pub fn insert(&mut self, poem_id: i64, found: SearchMatch) {
        self.by_poem.entry(poem_id).or_default().push(found);
        self.total += 1;
    }

    /// Matches recorded for one poem, in insertion order.
    pub fn get(&self, poem_id: i64) -> &[SearchMatch] {
        self.by_poem
            .get(&poem_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_poem(&self, poem_id: i64) -> bool {
        self.by_poem.contains_key(&poem_id)
    }

    /// Total number of matches across all poems.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn poem_count(&self) -> usize {
        self.by_poem.len()
    }

    pub fn poem_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.by_poem.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &SearchMatch)> + '_ {
        self.by_poem
            .iter()
            .flat_map(|(id, matches)| matches.iter().map(move |found| (*id, found)))
    }
}
