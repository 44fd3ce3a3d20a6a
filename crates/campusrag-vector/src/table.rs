//! LanceDB connection and housekeeping helpers.
//!
//! One table per collection; the table name is the normalised collection
//! name. Table listing is the discovery mechanism, so stores that appear or
//! disappear between restarts need no code change.

use anyhow::Result;
use lancedb::{connect, Connection};

use campusrag_core::types::normalize_name;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

/// Collection tables in lexical order. Names that do not survive
/// normalisation unchanged (upper case, spaces) are not ours and are skipped.
pub async fn list_collection_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut names: Vec<String> = conn
        .table_names()
        .execute()
        .await?
        .into_iter()
        .filter(|n| !n.is_empty() && normalize_name(n) == *n)
        .collect();
    names.sort();
    Ok(names)
}
