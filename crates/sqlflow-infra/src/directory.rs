//! Config-backed resolution of `(client, database)` to a Metabase database id.

use std::collections::HashMap;

use sqlflow_core::execution::directory::DatabaseDirectory;
use sqlflow_types::config::DatabaseMapping;

/// Database directory loaded from the `[[databases]]` config entries.
///
/// Client names are matched case-insensitively with whitespace removed, the
/// same normalization used for schema collection names. Database names are
/// matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredDatabases {
    ids: HashMap<(String, String), i64>,
}

fn normalize_client(client: &str) -> String {
    client
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

impl ConfiguredDatabases {
    pub fn new(mappings: &[DatabaseMapping]) -> Self {
        let mut ids = HashMap::with_capacity(mappings.len());
        for mapping in mappings {
            let key = (
                normalize_client(&mapping.client),
                mapping.database.to_lowercase(),
            );
            if let Some(previous) = ids.insert(key, mapping.metabase_database_id) {
                tracing::warn!(
                    client = mapping.client.as_str(),
                    database = mapping.database.as_str(),
                    previous,
                    "duplicate database mapping, last entry wins"
                );
            }
        }
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl DatabaseDirectory for ConfiguredDatabases {
    fn resolve(&self, client: &str, database: &str) -> Option<i64> {
        self.ids
            .get(&(normalize_client(client), database.to_lowercase()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(client: &str, database: &str, id: i64) -> DatabaseMapping {
        DatabaseMapping {
            client: client.into(),
            database: database.into(),
            metabase_database_id: id,
        }
    }

    #[test]
    fn test_resolve_normalizes_client_name() {
        let dir = ConfiguredDatabases::new(&[mapping("acmecorp", "warehouse", 7)]);
        assert_eq!(dir.resolve("Acme Corp", "warehouse"), Some(7));
        assert_eq!(dir.resolve("ACMECORP", "Warehouse"), Some(7));
        assert_eq!(dir.resolve("globex", "warehouse"), None);
    }

    #[test]
    fn test_duplicate_mapping_last_wins() {
        let dir = ConfiguredDatabases::new(&[
            mapping("acme", "sales", 1),
            mapping("Acme", "sales", 2),
        ]);
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.resolve("acme", "sales"), Some(2));
    }
}
