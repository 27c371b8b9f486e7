//! Prompt construction for the generation-backed nodes.

use sqlflow_types::schema::SchemaContext;
use sqlflow_types::visualization::ChartKind;

pub const SQL_GENERATION_SYSTEM: &str = "You translate analytics questions into a single SQL \
query. Use only the tables and columns present in the provided schema. Return the query in \
the `sql_query` field without commentary.";

pub const SQL_CORRECTION_SYSTEM: &str = "You fix SQL queries that failed validation. Use only \
the tables and columns present in the provided schema and address every reported error. \
Return one corrected query in the `sql_query` field.";

pub const VISUALIZATION_SYSTEM: &str = "You recommend how to chart the result of a SQL query. \
Choose one or more chart types from the allowed list and explain the choice briefly.";

pub const FEEDBACK_SYSTEM: &str = "You read a user's feedback about a chart and decide whether \
it names a chart type. Set `visualization_status` to true only when at least one allowed chart \
type is clearly requested, and list the requested types.";

fn allowed_charts() -> String {
    ChartKind::ALL
        .iter()
        .map(|k| k.label())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn sql_generation(question: &str, schema: &SchemaContext) -> String {
    format!(
        "Schema:\n{}\n\nKnown tables: {}\n\nQuestion: {question}",
        schema.to_prompt_json(),
        schema.tables.join(", "),
    )
}

pub fn sql_correction(
    question: &str,
    schema: &SchemaContext,
    failing_sql: &str,
    errors: &str,
) -> String {
    format!(
        "Schema:\n{}\n\nQuestion: {question}\n\nQuery that failed:\n{failing_sql}\n\n\
         Errors:\n{errors}",
        schema.to_prompt_json(),
    )
}

pub fn visualization(question: &str, sql: &str) -> String {
    format!(
        "Allowed chart types: {}\n\nQuestion: {question}\n\nSQL:\n{sql}",
        allowed_charts()
    )
}

pub fn feedback_classification(feedback: &str, sql: Option<&str>) -> String {
    format!(
        "Allowed chart types: {}\n\nSQL:\n{}\n\nUser feedback: {feedback}",
        allowed_charts(),
        sql.unwrap_or("(none)"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_prompt_carries_errors_and_sql() {
        let prompt = sql_correction(
            "total sales",
            &SchemaContext::default(),
            "SELECT * FROM orders",
            "Tables not found in predefined tables: orders",
        );
        assert!(prompt.contains("SELECT * FROM orders"));
        assert!(prompt.contains("orders"));
        assert!(prompt.contains("total sales"));
    }

    #[test]
    fn feedback_prompt_lists_allowed_charts() {
        let prompt = feedback_classification("make it a pie", None);
        assert!(prompt.contains("pie chart"));
        assert!(prompt.contains("numeric indicator"));
    }
}
