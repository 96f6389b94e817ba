//! Verse store gateway split across logical submodules.

mod connection;
pub mod query;
mod verses;

pub use connection::{
    connection_handle_for, create_schema, default_db_path, ensure_schema,
    release_thread_connections, ConnectionHandle,
};
pub use query::{build_search_query, SearchScope, TITLE_SENTINEL};
pub use verses::{execute_query, fetch_poem, fetch_poet_for_category, fetch_verses};
