//! Normalizes the fipiran fund comparison listing before it is forwarded.

use crate::background_jobs::transform::TransformError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const JOB_NAME: &str = "fund_compare";
const SOURCE: &str = "fipiran_fundcompare";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundItem {
    reg_no: String,
    name: String,
    fund_type: i64,
    #[serde(default)]
    fund_size: Option<i64>,
    initiation_date: String,
    #[serde(default)]
    annual_efficiency: Option<f64>,
    #[serde(default)]
    net_asset: Option<i64>,
    date: String,
    #[serde(default)]
    manager: Option<String>,
    #[serde(default)]
    website_address: Option<Vec<String>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ProcessedFund {
    reg_no: String,
    name: String,
    fund_type: i64,
    fund_size: Option<i64>,
    annual_efficiency: Option<f64>,
    net_asset: Option<i64>,
    date: String,
    manager: Option<String>,
    main_website: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExternalFundPayload {
    source: &'static str,
    fetched_at: String,
    items: Vec<ProcessedFund>,
}

/// Accepts RFC3339 or zone-less ISO timestamps; zone-less values are taken as UTC.
fn parse_datetime(value: &str) -> Result<DateTime<Utc>, TransformError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| TransformError::Other(format!("invalid datetime '{}': {}", value, e)))
}

impl TryFrom<FundItem> for ProcessedFund {
    type Error = TransformError;

    fn try_from(item: FundItem) -> Result<Self, Self::Error> {
        parse_datetime(&item.initiation_date)?;
        let date = parse_datetime(&item.date)?;
        let main_website = item
            .website_address
            .and_then(|sites| sites.into_iter().next());

        Ok(ProcessedFund {
            reg_no: item.reg_no,
            name: item.name,
            fund_type: item.fund_type,
            fund_size: item.fund_size,
            annual_efficiency: item.annual_efficiency,
            net_asset: item.net_asset,
            date: date.to_rfc3339(),
            manager: item.manager,
            main_website,
        })
    }
}

pub fn process_fund_compare(data: JsonValue) -> Result<JsonValue, TransformError> {
    let raw_items = match data {
        JsonValue::Object(mut map) => map.remove("items").unwrap_or(JsonValue::Array(vec![])),
        other => {
            return Err(TransformError::Other(format!(
                "expected an object with 'items', got {}",
                other
            )))
        }
    };

    let items: Vec<FundItem> = serde_json::from_value(raw_items)?;
    let items = items
        .into_iter()
        .map(ProcessedFund::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let payload = ExternalFundPayload {
        source: SOURCE,
        fetched_at: Utc::now().to_rfc3339(),
        items,
    };
    Ok(serde_json::to_value(payload)?)
}
