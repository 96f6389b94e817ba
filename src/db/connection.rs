use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread::{self, ThreadId};

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use rusqlite::{Connection, OpenFlags};

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".divan-search";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "ganjoor.s3db";

thread_local! {
    /// Read-only connections opened by this thread, keyed by database file.
    static THREAD_CONNECTIONS: RefCell<HashMap<PathBuf, Rc<Connection>>> =
        RefCell::new(HashMap::new());
}

/// A per-thread connection to one verse database.
///
/// The handle is neither `Send` nor `Sync`: it can only be used on the thread
/// that obtained it, so a live connection never crosses threads.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    database: PathBuf,
    thread: ThreadId,
    conn: Rc<Connection>,
}

impl ConnectionHandle {
    pub fn database(&self) -> &Path {
        &self.database
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

impl Deref for ConnectionHandle {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

/// Return the connection `thread` holds for `database`, opening it on first
/// use. Only the calling thread may ask for its own handle.
pub fn connection_handle_for(database: &Path, thread: ThreadId) -> Result<ConnectionHandle> {
    if thread != thread::current().id() {
        bail!("connection for {thread:?} requested from {:?}", thread::current().id());
    }

    let database = database.to_path_buf();
    let cached = THREAD_CONNECTIONS.with(|cache| cache.borrow().get(&database).cloned());
    let conn = match cached {
        Some(conn) => conn,
        None => {
            let conn = Rc::new(open_read_only(&database)?);
            THREAD_CONNECTIONS.with(|cache| {
                cache.borrow_mut().insert(database.clone(), Rc::clone(&conn));
            });
            tracing::debug!(database = %database.display(), ?thread, "opened thread connection");
            conn
        }
    };

    Ok(ConnectionHandle {
        database,
        thread,
        conn,
    })
}

/// Drop every connection cached by the calling thread.
pub fn release_thread_connections() {
    THREAD_CONNECTIONS.with(|cache| cache.borrow_mut().clear());
}

fn open_read_only(database: &Path) -> Result<Connection> {
    if !database.is_file() {
        bail!("database file {} does not exist", database.display());
    }
    let conn = Connection::open_with_flags(
        database,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open {}", database.display()))?;
    Ok(conn)
}

/// Open (creating if needed) a writable database and make sure the verse
/// schema exists. Used when bootstrapping a fresh collection and by tests.
pub fn ensure_schema(database: &Path) -> Result<Connection> {
    if let Some(parent) = database.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(database).context("failed to open SQLite database")?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Create the `poet`, `cat`, `poem` and `verse` tables if they are missing.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS poet (
            id INTEGER PRIMARY KEY,
            name NVARCHAR(20),
            cat_id INTEGER,
            description TEXT
        )",
        [],
    )
    .context("failed to create poet table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cat (
            id INTEGER PRIMARY KEY,
            poet_id INTEGER,
            text NVARCHAR(100),
            parent_id INTEGER,
            url NVARCHAR(255)
        )",
        [],
    )
    .context("failed to create cat table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS poem (
            id INTEGER PRIMARY KEY,
            cat_id INTEGER,
            title NVARCHAR(255),
            url NVARCHAR(255)
        )",
        [],
    )
    .context("failed to create poem table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS verse (
            poem_id INTEGER,
            vorder INTEGER,
            position INTEGER,
            text TEXT
        )",
        [],
    )
    .context("failed to create verse table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS poem_id_index ON verse (poem_id)",
        [],
    )
    .context("failed to create verse index")?;

    Ok(())
}

/// Resolve the default database location inside the user's home.
pub fn default_db_path() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME).join(DB_FILE_NAME))
}
