//! Column support cache
//!
//! Remembers whether a campaign schema has a given column. Entries are a
//! function of the schema only, so concurrent writers of one key agree and
//! entries are never invalidated. Failed probes are not recorded.

use crate::execution::gateway::{GatewayRequest, QueryGateway};
use crate::query::{ComposedQuery, SqlParam, PARAM_MARKER};
use dashmap::DashMap;
use tracing::{debug, warn};

type ColumnKey = (String, String, String);

#[derive(Debug, Default)]
pub struct ColumnSupportCache {
    entries: DashMap<ColumnKey, bool>,
}

impl ColumnSupportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, database: &str, table: &str, column: &str) -> Option<bool> {
        self.entries
            .get(&key(database, table, column))
            .map(|entry| *entry.value())
    }

    pub fn record(&self, database: &str, table: &str, column: &str, present: bool) {
        self.entries.insert(key(database, table, column), present);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Probe the schema once per key. Probe failures read as absent.
    pub async fn column_exists(
        &self,
        gateway: &dyn QueryGateway,
        database: &str,
        table: &str,
        column: &str,
    ) -> bool {
        if let Some(present) = self.cached(database, table, column) {
            return present;
        }

        let probe = ComposedQuery::new(
            format!("SHOW COLUMNS FROM {}.{} LIKE {};", database, table, PARAM_MARKER),
            vec![SqlParam::from(column)],
        );
        let outcome = match GatewayRequest::new(database, probe) {
            Ok(request) => gateway.execute(request).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                let present = !response.rows.is_empty();
                debug!("{}.{}.{} present: {}", database, table, column, present);
                self.record(database, table, column, present);
                present
            }
            Err(e) => {
                warn!(
                    "Column probe for {}.{}.{} failed, treating as absent: {}",
                    database, table, column, e
                );
                false
            }
        }
    }
}

fn key(database: &str, table: &str, column: &str) -> ColumnKey {
    (
        database.to_string(),
        table.to_string(),
        column.to_ascii_lowercase(),
    )
}
