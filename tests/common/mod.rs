#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::params;
use tempfile::TempDir;

use divan_search::db::ensure_schema;

/// A verse database on disk, removed with the directory.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ganjoor.s3db");
        ensure_schema(&path).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn poet(&self, id: i64, name: &str) -> &Self {
        let conn = ensure_schema(&self.path).unwrap();
        conn.execute(
            "INSERT INTO poet (id, name, cat_id) VALUES (?1, ?2, ?1)",
            params![id, name],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cat (id, poet_id, text, parent_id) VALUES (?1, ?1, ?2, 0)",
            params![id, name],
        )
        .unwrap();
        self
    }

    /// Poem `id` under the category of `poet_id`, verse orders starting at 1.
    pub fn poem(&self, id: i64, poet_id: i64, title: &str, verses: &[&str]) -> &Self {
        let mut conn = ensure_schema(&self.path).unwrap();
        let tx = conn.transaction().unwrap();
        tx.execute(
            "INSERT INTO poem (id, cat_id, title) VALUES (?1, ?2, ?3)",
            params![id, poet_id, title],
        )
        .unwrap();
        for (index, text) in verses.iter().enumerate() {
            tx.execute(
                "INSERT INTO verse (poem_id, vorder, position, text) VALUES (?1, ?2, 0, ?3)",
                params![id, index as i64 + 1, text],
            )
            .unwrap();
        }
        tx.commit().unwrap();
        self
    }

    /// Raw verse rows, inserted in the given order.
    pub fn rows(&self, rows: &[(i64, i64, &str)]) -> &Self {
        let mut conn = ensure_schema(&self.path).unwrap();
        let tx = conn.transaction().unwrap();
        for (poem_id, order, text) in rows {
            tx.execute(
                "INSERT INTO verse (poem_id, vorder, position, text) VALUES (?1, ?2, 0, ?3)",
                params![poem_id, order, text],
            )
            .unwrap();
        }
        tx.commit().unwrap();
        self
    }

    /// One poem of `count` verses that all contain `word`.
    pub fn long_poem(&self, id: i64, word: &str, count: usize) -> &Self {
        let mut conn = ensure_schema(&self.path).unwrap();
        let tx = conn.transaction().unwrap();
        tx.execute(
            "INSERT INTO poem (id, cat_id, title) VALUES (?1, 0, 'long')",
            params![id],
        )
        .unwrap();
        {
            let mut insert = tx
                .prepare("INSERT INTO verse (poem_id, vorder, position, text) VALUES (?1, ?2, 0, ?3)")
                .unwrap();
            for order in 1..=count {
                insert
                    .execute(params![id, order as i64, format!("{word} {order}")])
                    .unwrap();
            }
        }
        tx.commit().unwrap();
        self
    }
}

pub fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
