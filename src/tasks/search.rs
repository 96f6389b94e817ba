//! Search task body: streams query rows through the phrase matcher on the
//! worker thread and accumulates accepted verses per poem.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::thread;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use super::events::EventSink;
use crate::db::{
    build_search_query, connection_handle_for, execute_query, fetch_poem,
    fetch_poet_for_category, fetch_verses, ConnectionHandle, SearchScope,
};
use crate::models::{SearchMatch, SearchResults, Verse};
use crate::search::{normalize_verse, PhraseMatcher, VerseSource};

/// Input bundle of one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParameters {
    /// Database file the search runs against; each worker opens its own
    /// connection to it.
    pub database: PathBuf,
    pub scope: SearchScope,
    /// AND-ed terms.
    pub phrases: Vec<String>,
    pub excluded: Vec<String>,
    /// Fragments removed from verse text before matching.
    pub strip: Vec<String>,
    /// Row query; built from the other fields when not set explicitly.
    pub query: Option<String>,
}

impl SearchParameters {
    pub fn new(database: impl Into<PathBuf>, scope: SearchScope, phrases: Vec<String>) -> Self {
        Self {
            database: database.into(),
            scope,
            phrases,
            excluded: Vec::new(),
            strip: Vec::new(),
            query: None,
        }
    }

    pub fn with_excluded(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_strip(mut self, strip: Vec<String>) -> Self {
        self.strip = strip;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn effective_query(&self) -> String {
        self.query
            .clone()
            .unwrap_or_else(|| build_search_query(self.scope, &self.phrases, &self.strip))
    }
}

#[derive(Debug)]
pub(crate) enum SearchRun {
    Finished(SearchResults),
    Canceled,
}

enum Abort {
    Canceled,
    Store(anyhow::Error),
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), Abort> {
    if cancel.is_cancelled() {
        Err(Abort::Canceled)
    } else {
        Ok(())
    }
}

/// Verse list of the poem under evaluation, fetched on first demand and
/// dropped as soon as a row from another poem arrives.
struct PoemVerses<'a> {
    conn: &'a ConnectionHandle,
    cancel: &'a CancellationToken,
    poem_id: Option<i64>,
    loaded: Option<Vec<Verse>>,
}

impl<'a> PoemVerses<'a> {
    fn new(conn: &'a ConnectionHandle, cancel: &'a CancellationToken) -> Self {
        Self {
            conn,
            cancel,
            poem_id: None,
            loaded: None,
        }
    }

    fn select(&mut self, poem_id: i64) {
        if self.poem_id != Some(poem_id) {
            self.poem_id = Some(poem_id);
            self.loaded = None;
        }
    }

    fn release(&mut self) {
        self.poem_id = None;
        self.loaded = None;
    }
}

impl VerseSource for PoemVerses<'_> {
    type Error = Abort;

    fn poem_verses(&mut self) -> Result<&[Verse], Abort> {
        if self.loaded.is_none() {
            checkpoint(self.cancel)?;
            let Some(poem_id) = self.poem_id else {
                return Ok(&[]);
            };
            let verses = fetch_verses(self.conn, poem_id).map_err(Abort::Store)?;
            tracing::trace!(poem_id, verses = verses.len(), "loaded poem verses");
            self.loaded = Some(verses);
        }
        checkpoint(self.cancel)?;
        Ok(self.loaded.as_deref().unwrap_or(&[]))
    }
}

/// Title and poet name of the most recently described poem.
#[derive(Default)]
struct PoemLabel {
    poem_id: Option<i64>,
    title: String,
    poet: String,
}

impl PoemLabel {
    fn describe(&mut self, conn: &ConnectionHandle, poem_id: i64) -> Result<(String, String)> {
        if self.poem_id != Some(poem_id) {
            let (title, poet) = match fetch_poem(conn, poem_id)? {
                Some(poem) => {
                    let poet = fetch_poet_for_category(conn, poem.category_id)?
                        .map(|poet| poet.name)
                        .unwrap_or_default();
                    (poem.title, poet)
                }
                None => (String::new(), String::new()),
            };
            *self = PoemLabel {
                poem_id: Some(poem_id),
                title,
                poet,
            };
        }
        Ok((self.title.clone(), self.poet.clone()))
    }
}

/// Execute a search on the current thread.
///
/// `progress_batch` enables status events: one whenever the match count
/// passes the next batch boundary and one final total. A store failure ends
/// the search with an empty result.
pub(crate) fn run(
    params: &SearchParameters,
    cancel: &CancellationToken,
    sink: &EventSink,
    progress_batch: Option<usize>,
) -> SearchRun {
    if cancel.is_cancelled() {
        return SearchRun::Canceled;
    }

    let thread = thread::current().id();
    let conn = match connection_handle_for(&params.database, thread) {
        Ok(conn) => conn,
        Err(err) => {
            tracing::error!(
                database = %params.database.display(),
                ?thread,
                error = %format!("{err:#}"),
                "no database connection for this thread"
            );
            return SearchRun::Finished(SearchResults::new());
        }
    };

    let matcher = PhraseMatcher::new(&params.phrases, &params.excluded);
    let query = params.effective_query();
    let title_mode = params.scope.is_titles();
    tracing::debug!(%query, "search started");

    if cancel.is_cancelled() {
        return SearchRun::Canceled;
    }

    let mut verses = PoemVerses::new(&conn, cancel);
    let mut label = PoemLabel::default();
    let mut results = SearchResults::new();
    let mut found = 0usize;
    let mut next_step = 0usize;

    let stopped = execute_query(&conn, &query, |row| {
        if cancel.is_cancelled() {
            return ControlFlow::Break(Abort::Canceled);
        }

        let order = if title_mode { 0 } else { row.order };
        let text = normalize_verse(&row.text, &params.strip);
        verses.select(row.poem_id);

        match matcher.accepts(&text, order, &mut verses) {
            Ok(true) => {}
            Ok(false) => return ControlFlow::Continue(()),
            Err(abort) => return ControlFlow::Break(abort),
        }

        if cancel.is_cancelled() {
            return ControlFlow::Break(Abort::Canceled);
        }

        found += 1;
        if let Some(batch) = progress_batch {
            if found > next_step {
                next_step += batch;
                sink.status(format!("Search Result(s): {found}"));
            }
        }

        let (poem_title, poet_name) = match label.describe(&conn, row.poem_id) {
            Ok(described) => described,
            Err(err) => return ControlFlow::Break(Abort::Store(err)),
        };
        results.insert(
            row.poem_id,
            SearchMatch {
                verse_text: row.text,
                poem_title,
                poet_name,
            },
        );
        ControlFlow::Continue(())
    });

    let failure = match stopped {
        Ok(None) => None,
        Ok(Some(Abort::Canceled)) => {
            verses.release();
            tracing::debug!(found, "search canceled");
            return SearchRun::Canceled;
        }
        Ok(Some(Abort::Store(err))) | Err(err) => Some(err),
    };
    verses.release();

    if let Some(err) = failure {
        tracing::error!(error = %format!("{err:#}"), "search aborted by a store failure");
        return SearchRun::Finished(SearchResults::new());
    }

    if progress_batch.is_some() {
        sink.status(format!("Last-Search Result(s): {found}"));
    }

    if cancel.is_cancelled() {
        return SearchRun::Canceled;
    }

    tracing::debug!(found, poems = results.poem_count(), "search finished");
    SearchRun::Finished(results)
}
