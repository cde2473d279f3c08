//! Liveness probe for the store.

use engine_core::Result;
use sqlx::Row;

use crate::client::{map_sqlx, EventStore};

impl EventStore {
    /// Round-trips a trivial query through the pool.
    pub async fn ping(&self) -> Result<()> {
        let row = sqlx::query("SELECT 1 AS one")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx)?;
        let one: i64 = row.get("one");
        debug_assert_eq!(one, 1);
        Ok(())
    }
}
