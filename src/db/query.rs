//! Builds the row query a search task streams through the phrase matcher.
//!
//! The SQL only narrows the candidate rows; the authoritative decision stays
//! with the matcher, so every pre-filter here must be a necessary condition
//! for a match.

use crate::search::matcher::is_plain_substring;

/// Reserved poet id meaning "match poem titles instead of verses".
pub const TITLE_SENTINEL: i64 = -1000;

/// Which rows a search walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Every verse of every poet.
    All,
    /// Verses written by one poet.
    Poet(i64),
    /// Poem titles only; rows carry ordinal 0.
    Titles,
}

impl SearchScope {
    /// Map a numeric poet id filter: `0` is everything, the sentinel is titles.
    pub fn from_poet_id(poet_id: i64) -> Self {
        match poet_id {
            0 => SearchScope::All,
            TITLE_SENTINEL => SearchScope::Titles,
            id => SearchScope::Poet(id),
        }
    }

    pub fn is_titles(self) -> bool {
        matches!(self, SearchScope::Titles)
    }
}

/// Compose the `(poem_id, text, order)` query for `scope`.
///
/// Each word of a plain substring term becomes a `LIKE` filter, unless
/// characters are stripped before matching: stripping can join text the raw
/// column keeps apart. Words are filtered one by one because the matcher sees
/// whitespace runs collapsed to a single space.
pub fn build_search_query(scope: SearchScope, phrases: &[String], strip: &[String]) -> String {
    let text_column = if scope.is_titles() {
        "poem.title"
    } else {
        "verse.text"
    };

    let mut conditions = Vec::new();
    if let SearchScope::Poet(poet_id) = scope {
        conditions.push(format!("cat.poet_id = {poet_id}"));
    }
    if strip.is_empty() {
        let words = phrases
            .iter()
            .filter(|p| is_plain_substring(p))
            .flat_map(|p| p.split_whitespace());
        for word in words {
            conditions.push(format!(
                "{text_column} LIKE '%{}%' ESCAPE '\\'",
                escape_like(word)
            ));
        }
    }

    let mut query = match scope {
        SearchScope::All => "SELECT verse.poem_id, verse.text, verse.vorder FROM verse".to_string(),
        SearchScope::Poet(_) => "SELECT verse.poem_id, verse.text, verse.vorder FROM verse \
             INNER JOIN poem ON poem.id = verse.poem_id \
             INNER JOIN cat ON cat.id = poem.cat_id"
            .to_string(),
        SearchScope::Titles => "SELECT poem.id, poem.title, 0 FROM poem".to_string(),
    };

    if !conditions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
    }

    query.push_str(if scope.is_titles() {
        " ORDER BY poem.id"
    } else {
        " ORDER BY verse.poem_id, verse.vorder"
    });
    query
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        match c {
            '\'' => escaped.push_str("''"),
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
