//! Table and column references extracted from SQL text with `sqlparser`.

use std::collections::HashSet;
use std::ops::ControlFlow;

use sqlparser::ast::{
    Expr, Ident, ObjectName, Query, SelectItem, SetExpr, Statement, TableAlias, TableFactor, Visit,
    Visitor,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// A table named in a FROM/JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// The name as written, including any schema prefix.
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// The bare table name (last path segment).
    pub fn base_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// A column identifier, optionally qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    /// The reference as written (`alias.column` or `column`).
    pub fn display(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{q}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Everything the validator needs to know about one SQL text.
///
/// Name sets that only exist inside the query itself (CTE names, derived
/// table aliases, select-list aliases) are collected so references to them
/// are not mistaken for schema objects.
#[derive(Debug, Default, Clone)]
pub struct SqlReferences {
    pub tables: Vec<TableRef>,
    pub columns: Vec<ColumnRef>,
    pub cte_names: HashSet<String>,
    pub derived_aliases: HashSet<String>,
    pub output_aliases: HashSet<String>,
}

/// Parse SQL and collect references.
///
/// Errors carry the parser's message. Empty input is an error.
pub fn extract_references(sql: &str) -> Result<SqlReferences, String> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| e.to_string())?;
    if statements.is_empty() {
        return Err("no SQL statement found".to_string());
    }
    Ok(collect(&statements))
}

fn collect(statements: &[Statement]) -> SqlReferences {
    let mut collector = ReferenceCollector::default();
    for statement in statements {
        let _ = statement.visit(&mut collector);
    }
    collector.refs
}

fn lower(ident: &Ident) -> String {
    ident.value.to_lowercase()
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|i| i.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Default)]
struct ReferenceCollector {
    refs: SqlReferences,
}

impl ReferenceCollector {
    /// Record the names a query introduces: its CTEs (recursively into their
    /// bodies) and its select-list aliases.
    ///
    /// The visitor has no per-query hook, so every place a `Query` can hang
    /// off the tree (statements, CTEs, derived tables, subquery expressions,
    /// parenthesized set operands) routes through here.
    fn collect_query_names(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.refs.cte_names.insert(lower(&cte.alias.name));
                for column in &cte.alias.columns {
                    self.refs.output_aliases.insert(lower(column));
                }
                self.collect_query_names(&cte.query);
            }
        }
        self.collect_output_aliases(&query.body);
    }

    fn collect_output_aliases(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for item in &select.projection {
                    if let SelectItem::ExprWithAlias { alias, .. } = item {
                        self.refs.output_aliases.insert(lower(alias));
                    }
                }
            }
            SetExpr::Query(query) => self.collect_query_names(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_output_aliases(left);
                self.collect_output_aliases(right);
            }
            _ => {}
        }
    }

    fn collect_table_alias(&mut self, alias: &TableAlias) {
        self.refs.derived_aliases.insert(lower(&alias.name));
        for column in &alias.columns {
            self.refs.output_aliases.insert(lower(column));
        }
    }
}

impl Visitor for ReferenceCollector {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        if let Statement::Query(query) = statement {
            self.collect_query_names(query);
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        match table_factor {
            TableFactor::Table { name, alias, .. } => {
                self.refs.tables.push(TableRef {
                    name: object_name(name),
                    alias: alias.as_ref().map(|a| a.name.value.clone()),
                });
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                self.collect_query_names(subquery);
                if let Some(alias) = alias {
                    self.collect_table_alias(alias);
                }
            }
            TableFactor::NestedJoin {
                alias: Some(alias), ..
            } => self.collect_table_alias(alias),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        match expr {
            Expr::Identifier(ident) => self.refs.columns.push(ColumnRef {
                qualifier: None,
                name: ident.value.clone(),
            }),
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
                let name = parts[parts.len() - 1].value.clone();
                let qualifier = parts[parts.len() - 2].value.clone();
                self.refs.columns.push(ColumnRef {
                    qualifier: Some(qualifier),
                    name,
                });
            }
            Expr::Subquery(subquery)
            | Expr::ArraySubquery(subquery)
            | Expr::InSubquery { subquery, .. }
            | Expr::Exists { subquery, .. } => self.collect_query_names(subquery),
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(refs: &SqlReferences) -> Vec<String> {
        refs.tables.iter().map(|t| t.name.clone()).collect()
    }

    fn columns(refs: &SqlReferences) -> Vec<String> {
        refs.columns.iter().map(ColumnRef::display).collect()
    }

    #[test]
    fn simple_select_references() {
        let refs = extract_references("SELECT amount, region FROM sales").unwrap();
        assert_eq!(names(&refs), vec!["sales"]);
        assert_eq!(columns(&refs), vec!["amount", "region"]);
    }

    #[test]
    fn join_with_aliases() {
        let refs = extract_references(
            "SELECT s.amount, c.name FROM sales s JOIN customers AS c ON s.customer_id = c.id",
        )
        .unwrap();
        assert_eq!(names(&refs), vec!["sales", "customers"]);
        assert_eq!(refs.tables[0].alias.as_deref(), Some("s"));
        assert_eq!(refs.tables[1].alias.as_deref(), Some("c"));
        assert!(columns(&refs).contains(&"s.customer_id".to_string()));
    }

    #[test]
    fn cte_and_select_aliases_are_collected() {
        let refs = extract_references(
            "WITH monthly AS (SELECT SUM(amount) AS total FROM sales) \
             SELECT total FROM monthly ORDER BY total",
        )
        .unwrap();
        assert!(refs.cte_names.contains("monthly"));
        assert!(refs.output_aliases.contains("total"));
    }

    #[test]
    fn derived_table_alias_is_collected() {
        let refs =
            extract_references("SELECT t.x FROM (SELECT amount AS x FROM sales) AS t").unwrap();
        assert!(refs.derived_aliases.contains("t"));
        assert_eq!(names(&refs), vec!["sales"]);
    }

    #[test]
    fn nested_query_names_are_collected() {
        let refs = extract_references(
            "SELECT region FROM sales \
             WHERE amount > (SELECT AVG(amount) AS avg_amount FROM sales) \
             AND customer_id IN (WITH vip AS (SELECT id AS vip_id FROM customers) \
                                 SELECT vip_id FROM vip) \
             AND EXISTS (SELECT 1 AS hit FROM (SELECT id AS rid FROM returns) AS r)",
        )
        .unwrap();
        assert!(refs.cte_names.contains("vip"));
        assert!(refs.derived_aliases.contains("r"));
        for alias in ["avg_amount", "vip_id", "hit", "rid"] {
            assert!(refs.output_aliases.contains(alias), "missing {alias}");
        }
        assert_eq!(
            names(&refs),
            vec!["sales", "sales", "customers", "vip", "returns"]
        );
    }

    #[test]
    fn cte_inside_cte_is_collected() {
        let refs = extract_references(
            "WITH outer_q AS (WITH inner_q AS (SELECT amount AS a FROM sales) \
                              SELECT a AS b FROM inner_q) \
             SELECT b FROM outer_q",
        )
        .unwrap();
        assert!(refs.cte_names.contains("outer_q"));
        assert!(refs.cte_names.contains("inner_q"));
        assert!(refs.output_aliases.contains("a"));
        assert!(refs.output_aliases.contains("b"));
    }

    #[test]
    fn schema_qualified_table_base_name() {
        let refs = extract_references("SELECT amount FROM public.sales").unwrap();
        assert_eq!(refs.tables[0].name, "public.sales");
        assert_eq!(refs.tables[0].base_name(), "sales");
    }

    #[test]
    fn parse_failure_is_an_error() {
        assert!(extract_references("SELEC amount FROM").is_err());
        assert!(extract_references("").is_err());
    }
}
