//! Cost Management query wire types

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BillingError;

/// Custom time range sent with a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    /// Inclusive start, `YYYY-MM-DDT00:00:00Z`
    pub from: String,
    /// Exclusive end, `YYYY-MM-DDT00:00:00Z`
    pub to: String,
}

impl TimePeriod {
    /// First of the month through tomorrow midnight UTC
    pub fn month_to_date(today: NaiveDate) -> Self {
        let first = today.with_day(1).unwrap_or(today);
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);

        Self {
            from: midnight(first),
            to: midnight(tomorrow),
        }
    }
}

fn midnight(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

/// Single named aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregation {
    /// Column to aggregate
    pub name: String,
    /// Aggregation function
    pub function: String,
}

/// Dataset section of a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// `None` collapses the window into one row
    pub granularity: String,
    /// Named aggregations, keyed by output column
    pub aggregation: BTreeMap<String, Aggregation>,
}

/// Body of a Cost Management `query` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    /// Cost type (`ActualCost`)
    #[serde(rename = "type")]
    pub cost_type: String,
    /// `Custom` when `time_period` is set
    pub timeframe: String,
    /// Query window
    pub time_period: TimePeriod,
    /// What to aggregate
    pub dataset: Dataset,
}

impl QueryDefinition {
    /// Sum of actual cost over the month so far, no grouping
    pub fn month_to_date_actual_cost(today: NaiveDate) -> Self {
        let total = Aggregation {
            name: "Cost".to_string(),
            function: "Sum".to_string(),
        };
        let aggregation = BTreeMap::from([("totalCost".to_string(), total)]);

        Self {
            cost_type: "ActualCost".to_string(),
            timeframe: "Custom".to_string(),
            time_period: TimePeriod::month_to_date(today),
            dataset: Dataset {
                granularity: "None".to_string(),
                aggregation,
            },
        }
    }
}

/// Column metadata returned with a query result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryColumn {
    /// Column name
    pub name: String,
    /// Column type
    #[serde(rename = "type", default)]
    pub column_type: Option<String>,
}

/// Tabular query result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Result columns
    #[serde(default)]
    pub columns: Vec<QueryColumn>,
    /// Result rows
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    /// Continuation link, unused for single-row aggregates
    #[serde(default)]
    pub next_link: Option<String>,
}

impl QueryResult {
    /// Interpret the first row as `(cost, currency)`.
    ///
    /// Returns `Ok(None)` when there is no row (or the first row is empty).
    pub fn first_cost(&self) -> Result<Option<(f64, String)>, BillingError> {
        let Some(row) = self.rows.first().filter(|row| !row.is_empty()) else {
            return Ok(None);
        };

        let cost = match row.first() {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|cost| cost.is_finite())
        .ok_or_else(|| BillingError::Malformed(format!("cost is not numeric: {}", row[0])))?;

        let currency = match row.get(1) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                return Err(BillingError::Malformed(
                    "result row has no currency column".to_string(),
                ))
            }
            Some(other) => other.to_string(),
        };

        Ok(Some((cost, currency)))
    }
}

/// Envelope around a query result
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    /// Result table
    #[serde(default)]
    pub properties: QueryResult,
}
