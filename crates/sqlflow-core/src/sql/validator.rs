//! Schema validation: are the tables and columns a query references known?

use std::collections::{HashMap, HashSet};

use super::references::{SqlReferences, extract_references};

/// Outcome of validating one candidate query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidation {
    pub valid: bool,
    pub missing_tables: Vec<String>,
    pub missing_columns: Vec<String>,
    /// `None` exactly when `valid`.
    pub message: Option<String>,
}

impl SchemaValidation {
    fn parse_failure(error: String) -> Self {
        Self {
            valid: false,
            missing_tables: Vec::new(),
            missing_columns: Vec::new(),
            message: Some(format!("Unexpected error: {error}")),
        }
    }
}

/// Check `sql` against the known tables and columns. Never fails: a parse
/// error is reported as an invalid result carrying the parser message.
///
/// Comparison is case-insensitive. Known columns may be bare (`amount`) or
/// table-qualified (`sales.amount`). Aliases, CTE names and select-list
/// aliases are resolved inside the query and never reported as missing.
/// Missing names are reported as written in the SQL, first occurrence first.
pub fn validate_schema(
    sql: &str,
    known_tables: &[String],
    known_columns: &[String],
) -> SchemaValidation {
    match extract_references(sql) {
        Ok(refs) => check(&refs, known_tables, known_columns),
        Err(error) => SchemaValidation::parse_failure(error),
    }
}

struct KnownColumns {
    bare: HashSet<String>,
    qualified: HashSet<String>,
    /// Last segment of every known column, bare or qualified.
    any_name: HashSet<String>,
}

impl KnownColumns {
    fn new(columns: &[String]) -> Self {
        let mut known = Self {
            bare: HashSet::new(),
            qualified: HashSet::new(),
            any_name: HashSet::new(),
        };
        for column in columns {
            let lowered = column.to_lowercase();
            match lowered.rsplit_once('.') {
                Some((_, name)) => {
                    known.any_name.insert(name.to_string());
                    known.qualified.insert(lowered);
                }
                None => {
                    known.any_name.insert(lowered.clone());
                    known.bare.insert(lowered);
                }
            }
        }
        known
    }

    fn contains_unqualified(&self, name: &str) -> bool {
        self.any_name.contains(name)
    }

    fn contains_in_table(&self, table: &str, name: &str) -> bool {
        self.bare.contains(name) || self.qualified.contains(&format!("{table}.{name}"))
    }
}

fn check(
    refs: &SqlReferences,
    known_tables: &[String],
    known_columns: &[String],
) -> SchemaValidation {
    let known_tables: HashSet<String> = known_tables.iter().map(|t| t.to_lowercase()).collect();
    let known_columns = KnownColumns::new(known_columns);

    // alias or name (lowercased) -> base table name (lowercased)
    let mut relations: HashMap<String, String> = HashMap::new();
    let mut missing_tables: Vec<String> = Vec::new();

    for table in &refs.tables {
        let base = table.base_name().to_lowercase();
        if refs.cte_names.contains(&base) {
            continue;
        }
        relations.insert(base.clone(), base.clone());
        relations.insert(table.name.to_lowercase(), base.clone());
        if let Some(alias) = &table.alias {
            relations.insert(alias.to_lowercase(), base.clone());
        }
        if !known_tables.contains(&base) && !missing_tables.contains(&table.name) {
            missing_tables.push(table.name.clone());
        }
    }

    let mut missing_columns: Vec<String> = Vec::new();
    for column in &refs.columns {
        let name = column.name.to_lowercase();
        let known = match &column.qualifier {
            None => {
                refs.output_aliases.contains(&name) || known_columns.contains_unqualified(&name)
            }
            Some(qualifier) => {
                let qualifier = qualifier.to_lowercase();
                if refs.cte_names.contains(&qualifier) || refs.derived_aliases.contains(&qualifier) {
                    // Columns of in-query relations are checked where they are defined.
                    true
                } else {
                    let table = relations.get(&qualifier).unwrap_or(&qualifier);
                    known_columns.contains_in_table(table, &name)
                }
            }
        };
        let written = column.display();
        if !known && !missing_columns.contains(&written) {
            missing_columns.push(written);
        }
    }

    let mut parts = Vec::with_capacity(2);
    if !missing_tables.is_empty() {
        parts.push(format!(
            "Tables not found in predefined tables: {}",
            missing_tables.join(", ")
        ));
    }
    if !missing_columns.is_empty() {
        parts.push(format!(
            "Columns not found in predefined columns: {}",
            missing_columns.join(", ")
        ));
    }

    SchemaValidation {
        valid: parts.is_empty(),
        missing_tables,
        missing_columns,
        message: (!parts.is_empty()).then(|| parts.join(" | ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn known_references_pass() {
        let result = validate_schema(
            "SELECT DATE_TRUNC('month', sales.date) AS sales_month, SUM(sales.amount) AS total \
             FROM sales GROUP BY sales_month ORDER BY sales_month",
            &strings(&["sales"]),
            &strings(&["sales.amount", "sales.date"]),
        );
        assert!(result.valid, "{result:?}");
        assert_eq!(result.message, None);
    }

    #[test]
    fn alias_resolves_to_table() {
        let result = validate_schema(
            "SELECT s.amount FROM sales AS s",
            &strings(&["sales"]),
            &strings(&["sales.amount"]),
        );
        assert!(result.valid, "{result:?}");
    }

    #[test]
    fn bare_known_columns_match_qualified_references() {
        let result = validate_schema(
            "SELECT s.amount, region FROM Sales s",
            &strings(&["sales"]),
            &strings(&["amount", "region"]),
        );
        assert!(result.valid, "{result:?}");
    }

    #[test]
    fn unknown_table_is_named_verbatim() {
        let result = validate_schema(
            "SELECT orders.total FROM orders",
            &strings(&["sales"]),
            &strings(&["sales.amount"]),
        );
        assert!(!result.valid);
        assert_eq!(result.missing_tables, vec!["orders"]);
        let message = result.message.unwrap();
        assert!(message.starts_with("Tables not found in predefined tables: orders"));
        assert!(message.contains(" | Columns not found in predefined columns: orders.total"));
    }

    #[test]
    fn only_missing_columns_has_no_separator() {
        let result = validate_schema(
            "SELECT profit FROM sales",
            &strings(&["sales"]),
            &strings(&["amount"]),
        );
        assert_eq!(
            result.message.as_deref(),
            Some("Columns not found in predefined columns: profit")
        );
    }

    #[test]
    fn cte_names_are_not_tables() {
        let result = validate_schema(
            "WITH m AS (SELECT SUM(amount) AS total FROM sales) SELECT m.total FROM m",
            &strings(&["sales"]),
            &strings(&["amount"]),
        );
        assert!(result.valid, "{result:?}");
    }

    #[test]
    fn parse_error_is_captured_not_raised() {
        let result = validate_schema("SELEC amount FROM", &strings(&["sales"]), &[]);
        assert!(!result.valid);
        assert!(result.message.unwrap().starts_with("Unexpected error: "));
    }

    #[test]
    fn missing_names_are_deduplicated() {
        let result = validate_schema(
            "SELECT a.x FROM orders a JOIN orders b ON a.x = b.y",
            &strings(&["sales"]),
            &[],
        );
        assert_eq!(result.missing_tables, vec!["orders"]);
        assert_eq!(result.missing_columns, vec!["a.x", "b.y"]);
    }
}
