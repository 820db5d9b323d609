use std::time::Duration;

use anyhow::{Context, Result};
use diesel::{
    Connection, PgConnection,
    connection::CacheSize,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

// Transaction-mode poolers (pgbouncer) cannot hold server-side prepared statements.
#[derive(Debug, Default)]
struct NoStatementCache;

impl CustomizeConnection<PgConnection, R2d2Error> for NoStatementCache {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), R2d2Error> {
        conn.set_prepared_statement_cache_size(CacheSize::Disabled);
        Ok(())
    }
}

/// Builds the shared pool once at startup; handlers receive it behind an `Arc`.
pub fn establish_connection(database_url: &str, max_connections: u32) -> Result<PgPoolSquad> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    Pool::builder()
        .max_size(max_connections)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(NoStatementCache))
        .build(manager)
        .context("failed to build postgres connection pool")
}
