use crate::catalog::standard;
use crate::query::FragmentSpec;
use serde::{Deserialize, Serialize};

/// Single-value aggregate; the value is the first numeric cell of the first row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub key: String,
    pub label: String,
    pub sql_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_table: Option<String>,
}

impl MetricDefinition {
    pub fn new(key: &str, label: &str, sql_template: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            sql_template: sql_template.to_string(),
            date_column: None,
            base_table: None,
        }
    }

    pub fn dated(mut self, column: &str) -> Self {
        self.date_column = Some(column.to_string());
        self
    }

    pub fn spec(&self) -> FragmentSpec<'_> {
        fragment_spec(
            &self.sql_template,
            self.base_table.as_deref(),
            self.date_column.as_deref(),
        )
    }
}

/// Grouped aggregate returning `label, value` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDefinition {
    pub key: String,
    pub title: String,
    pub sql_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_table: Option<String>,
}

impl ChartDefinition {
    pub fn new(key: &str, title: &str, sql_template: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            sql_template: sql_template.to_string(),
            date_column: None,
            base_table: None,
        }
    }

    pub fn dated(mut self, column: &str) -> Self {
        self.date_column = Some(column.to_string());
        self
    }

    pub fn spec(&self) -> FragmentSpec<'_> {
        fragment_spec(
            &self.sql_template,
            self.base_table.as_deref(),
            self.date_column.as_deref(),
        )
    }
}

fn fragment_spec<'a>(
    template: &'a str,
    base_table: Option<&'a str>,
    date_column: Option<&'a str>,
) -> FragmentSpec<'a> {
    let mut spec = FragmentSpec::new(template);
    if let Some(table) = base_table {
        spec = spec.with_base_table(table);
    }
    if let Some(column) = date_column {
        spec = spec.with_date_column(column);
    }
    spec
}

/// A campaign and the analytic fragments run against its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    /// Schema substituted for `{db}`.
    pub database: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub charts: Vec<ChartDefinition>,
    #[serde(default)]
    pub sample_query: Option<String>,
    /// Date column of the sample query as written in it; no date filter when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_date_column: Option<String>,
}

impl Campaign {
    /// Campaign carrying the standard metric, chart and sample fragments.
    pub fn new(id: &str, name: &str, database: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            database: database.to_string(),
            description: String::new(),
            metrics: Vec::new(),
            charts: Vec::new(),
            sample_query: None,
            sample_date_column: None,
        }
        .with_standard_defaults()
    }

    /// Fill whatever the campaign left undefined with the standard set.
    pub fn with_standard_defaults(mut self) -> Self {
        if self.metrics.is_empty() {
            self.metrics = standard::standard_metrics();
        }
        if self.charts.is_empty() {
            self.charts = standard::standard_charts();
        }
        if self.sample_query.is_none() {
            self.sample_query = Some(standard::SAMPLE_QUERY.to_string());
            self.sample_date_column = Some(standard::SAMPLE_DATE_COLUMN.to_string());
        }
        self
    }

    pub fn metric(&self, key: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.key == key)
    }

    pub fn chart(&self, key: &str) -> Option<&ChartDefinition> {
        self.charts.iter().find(|c| c.key == key)
    }

    /// Sample fragment; its base table is inferred from the template.
    pub fn sample_spec(&self) -> Option<FragmentSpec<'_>> {
        let spec = FragmentSpec::new(self.sample_query.as_deref()?);
        Some(match self.sample_date_column.as_deref() {
            Some(column) => spec.with_date_column(column),
            None => spec,
        })
    }
}
