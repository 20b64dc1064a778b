//! Typed ESG records and their flat sheet form.
//!
//! The spreadsheet path takes loosely shaped records; these types give
//! callers a checked way to produce them with stable column names.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{Record, RecordValue, SheetInput};

/// Conversion into one flat sheet row.
pub trait IntoRecord {
    fn into_record(self) -> Record;
}

impl IntoRecord for Record {
    fn into_record(self) -> Record {
        self
    }
}

/// A published ESG resource (report, policy, framework document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub title: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published: Option<NaiveDateTime>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ResourceRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            resource_type: None,
            url: None,
            published: None,
            tags: Vec::new(),
        }
    }
}

impl IntoRecord for ResourceRecord {
    fn into_record(self) -> Record {
        let mut record = Record::new();
        record.insert("Title".to_string(), self.title.into());
        record.insert("Type".to_string(), self.resource_type.into());
        record.insert("URL".to_string(), self.url.into());
        record.insert("Published".to_string(), self.published.into());
        // Joined with "," like any other list value
        record.insert(
            "Tags".to_string(),
            RecordValue::Other(serde_json::Value::from(self.tags)),
        );
        record
    }
}

/// One measured ESG metric for a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointRecord {
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl DataPointRecord {
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
            unit: None,
            period: None,
            source: None,
        }
    }
}

impl IntoRecord for DataPointRecord {
    fn into_record(self) -> Record {
        let mut record = Record::new();
        record.insert("Metric".to_string(), self.metric.into());
        record.insert("Value".to_string(), self.value.into());
        record.insert("Unit".to_string(), self.unit.into());
        record.insert("Period".to_string(), self.period.into());
        record.insert("Source".to_string(), self.source.into());
        record
    }
}

/// Append a sheet of typed records to `input`, replacing any sheet of the same name.
pub fn add_sheet<R, I>(input: &mut SheetInput, name: &str, records: I)
where
    R: IntoRecord,
    I: IntoIterator<Item = R>,
{
    let rows = records.into_iter().map(IntoRecord::into_record).collect();
    input.insert(name.to_string(), rows);
}
