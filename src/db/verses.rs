use std::ops::ControlFlow;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Poem, Poet, Verse, VerseRow};

/// Run a search query and stream its rows one at a time into `visit`.
///
/// The query must yield `(poem_id, text, order)`; a missing third column is
/// read as ordinal 0. Iteration stops early when `visit` breaks, and the break
/// value is handed back to the caller.
pub fn execute_query<B>(
    conn: &Connection,
    query: &str,
    mut visit: impl FnMut(VerseRow) -> ControlFlow<B>,
) -> Result<Option<B>> {
    let mut stmt = conn
        .prepare(query)
        .context("failed to prepare search query")?;
    let has_order = stmt.column_count() > 2;

    let mut rows = stmt.query([]).context("failed to execute search query")?;
    while let Some(row) = rows.next().context("failed to fetch search row")? {
        let poem_id: i64 = row.get(0).context("failed to read poem id")?;
        let text: Option<String> = row.get(1).context("failed to read verse text")?;
        let order: i64 = if has_order {
            row.get::<_, Option<i64>>(2)
                .context("failed to read verse order")?
                .unwrap_or_default()
        } else {
            0
        };

        let verse_row = VerseRow {
            poem_id,
            text: text.unwrap_or_default(),
            order,
        };
        if let ControlFlow::Break(value) = visit(verse_row) {
            return Ok(Some(value));
        }
    }

    Ok(None)
}

/// Every verse of a poem, ordered by ordinal. Rhyme and radif checks read the
/// opening couplet from the front of this list.
pub fn fetch_verses(conn: &Connection, poem_id: i64) -> Result<Vec<Verse>> {
    let mut stmt = conn
        .prepare(
            "SELECT poem_id, vorder, text FROM verse
             WHERE poem_id = ?1
             ORDER BY vorder",
        )
        .context("failed to prepare verses query")?;

    let verses = stmt
        .query_map([poem_id], |row| {
            Ok(Verse {
                poem_id: row.get(0)?,
                order: row.get(1)?,
                text: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })
        .context("failed to iterate verses")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect verses")?;

    Ok(verses)
}

/// Look up the poem record behind a result row. `None` when the verse table
/// references a poem that no longer exists, which search results tolerate by
/// showing an empty title.
pub fn fetch_poem(conn: &Connection, poem_id: i64) -> Result<Option<Poem>> {
    conn.query_row(
        "SELECT id, title, cat_id FROM poem WHERE id = ?1",
        params![poem_id],
        |row| {
            Ok(Poem {
                id: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                category_id: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
            })
        },
    )
    .optional()
    .context("failed to load poem")
}

/// Resolve the poet owning a category through `cat.poet_id`. `None` when the
/// category or its poet is missing.
pub fn fetch_poet_for_category(conn: &Connection, category_id: i64) -> Result<Option<Poet>> {
    conn.query_row(
        "SELECT poet.id, poet.name FROM poet
         INNER JOIN cat ON cat.poet_id = poet.id
         WHERE cat.id = ?1",
        params![category_id],
        |row| {
            Ok(Poet {
                id: row.get(0)?,
                name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        },
    )
    .optional()
    .context("failed to load poet for category")
}
