//! Chart kinds and the final visualization artifact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The chart types the workflow can recommend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    NumericIndicator,
    Pie,
    Scatter,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::NumericIndicator,
        ChartKind::Pie,
        ChartKind::Scatter,
    ];

    /// Human-facing label, as used in prompts and generator output.
    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar chart",
            ChartKind::Line => "line chart",
            ChartKind::NumericIndicator => "numeric indicator",
            ChartKind::Pie => "pie chart",
            ChartKind::Scatter => "scatter chart",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    /// Accepts labels loosely: case, `_`/`-` separators and a trailing
    /// "chart"/"graph" are ignored ("Pie Chart", "pie", "numeric_indicator").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        let stem = normalized
            .trim_end_matches(" chart")
            .trim_end_matches(" graph")
            .trim();
        match stem {
            "bar" | "column" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "numeric indicator" | "number" | "numeric" | "kpi" => Ok(ChartKind::NumericIndicator),
            "pie" | "donut" => Ok(ChartKind::Pie),
            "scatter" | "scatter plot" => Ok(ChartKind::Scatter),
            _ => Err(format!("unknown chart type: '{s}'")),
        }
    }
}

/// Output of the finalize node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationArtifact {
    pub chart_types: Vec<ChartKind>,
    pub sql_query: Option<String>,
    pub columns: Vec<String>,
    pub row_count: usize,
    /// Validation errors still outstanding when the run proceeded.
    #[serde(default)]
    pub validation_warnings: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl VisualizationArtifact {
    pub fn is_validated(&self) -> bool {
        self.validation_warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_kind_parses_loose_labels() {
        assert_eq!("pie chart".parse::<ChartKind>().unwrap(), ChartKind::Pie);
        assert_eq!("Pie".parse::<ChartKind>().unwrap(), ChartKind::Pie);
        assert_eq!("Bar Chart".parse::<ChartKind>().unwrap(), ChartKind::Bar);
        assert_eq!(
            "numeric_indicator".parse::<ChartKind>().unwrap(),
            ChartKind::NumericIndicator
        );
        assert_eq!("scatter-chart".parse::<ChartKind>().unwrap(), ChartKind::Scatter);
        assert!("heatmap".parse::<ChartKind>().is_err());
    }

    #[test]
    fn test_chart_kind_label_roundtrip() {
        for kind in ChartKind::ALL {
            assert_eq!(kind.label().parse::<ChartKind>().unwrap(), kind);
        }
    }
}
