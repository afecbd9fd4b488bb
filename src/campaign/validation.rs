use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::violations::Violation;

use super::MICROS_PER_UNIT;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest daily budget whose micro amount still fits the platform's int64.
pub const MAXIMUM_DAILY_BUDGET: i64 = i64::MAX / MICROS_PER_UNIT;

/// Campaign fields as submitted. Fields are kept as raw json values so that
/// every missing or mistyped field can be reported at once instead of the
/// body failing to parse on the first.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CreateCampaignBody {
    pub name: Option<Value>,
    pub objective: Option<Value>,
    pub campaign_type: Option<Value>,
    pub daily_budget: Option<Value>,
    pub start_date: Option<Value>,
    pub end_date: Option<Value>,
    pub ad_group_name: Option<Value>,
    pub ad_headline: Option<Value>,
    pub ad_description: Option<Value>,
    pub asset_url: Option<Value>,
}

/// A creation request that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCampaign {
    pub name: String,
    pub objective: String,
    pub campaign_type: String,
    pub daily_budget: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub ad_group_name: String,
    pub ad_headline: String,
    pub ad_description: String,
    pub asset_url: Option<String>,
}

fn required(
    violations: &mut Vec<Violation>,
    field: &'static str,
    value: Option<Value>,
) -> Option<String> {
    match value {
        Some(Value::String(value)) if !value.trim().is_empty() => Some(value),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            violations.push(Violation::MissingField { field });
            None
        }
        Some(_) => {
            violations.push(Violation::InvalidType {
                field,
                expected: "string",
            });
            None
        }
    }
}

/// Zero padded `YYYY-MM-DD` only.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, DATE_FORMAT).ok()?;
    (date.format(DATE_FORMAT).to_string() == value).then_some(date)
}

fn required_date(
    violations: &mut Vec<Violation>,
    field: &'static str,
    value: Option<Value>,
) -> Option<NaiveDate> {
    let value = required(violations, field, value)?;
    match parse_date(value.trim()) {
        Some(date) => Some(date),
        None => {
            violations.push(Violation::InvalidDate { field, value });
            None
        }
    }
}

fn required_budget(violations: &mut Vec<Violation>, value: Option<Value>) -> Option<i64> {
    let daily_budget = match value {
        None | Some(Value::Null) => {
            violations.push(Violation::MissingField {
                field: "daily_budget",
            });
            return None;
        }
        Some(Value::Number(number)) => number.as_i64(),
        Some(_) => None,
    };

    match daily_budget {
        None => {
            violations.push(Violation::InvalidType {
                field: "daily_budget",
                expected: "integer",
            });
            None
        }
        Some(daily_budget) if daily_budget <= 0 => {
            violations.push(Violation::BudgetNotPositive { daily_budget });
            None
        }
        Some(daily_budget) if daily_budget > MAXIMUM_DAILY_BUDGET => {
            violations.push(Violation::BudgetTooLarge {
                daily_budget,
                maximum_daily_budget: MAXIMUM_DAILY_BUDGET,
            });
            None
        }
        Some(daily_budget) => Some(daily_budget),
    }
}

/// Checks a creation request, reporting every problem found.
pub fn validate(body: CreateCampaignBody) -> Result<NewCampaign, Error> {
    let mut violations = vec![];

    let name = required(&mut violations, "name", body.name);
    let objective = required(&mut violations, "objective", body.objective);
    let campaign_type = required(&mut violations, "campaign_type", body.campaign_type);
    let daily_budget = required_budget(&mut violations, body.daily_budget);
    let start_date = required_date(&mut violations, "start_date", body.start_date);
    let end_date = required_date(&mut violations, "end_date", body.end_date);
    let ad_group_name = required(&mut violations, "ad_group_name", body.ad_group_name);
    let ad_headline = required(&mut violations, "ad_headline", body.ad_headline);
    let ad_description = required(&mut violations, "ad_description", body.ad_description);
    let asset_url = match body.asset_url {
        Some(Value::String(url)) if !url.trim().is_empty() => Some(url),
        None | Some(Value::Null) | Some(Value::String(_)) => None,
        Some(_) => {
            violations.push(Violation::InvalidType {
                field: "asset_url",
                expected: "string",
            });
            None
        }
    };

    if let (Some(start_date), Some(end_date)) = (start_date, end_date) {
        if start_date >= end_date {
            violations.push(Violation::StartNotBeforeEnd {
                start_date: start_date.format(DATE_FORMAT).to_string(),
                end_date: end_date.format(DATE_FORMAT).to_string(),
            });
        }
    }

    match (
        name,
        objective,
        campaign_type,
        daily_budget,
        start_date,
        end_date,
        ad_group_name,
        ad_headline,
        ad_description,
    ) {
        (
            Some(name),
            Some(objective),
            Some(campaign_type),
            Some(daily_budget),
            Some(start_date),
            Some(end_date),
            Some(ad_group_name),
            Some(ad_headline),
            Some(ad_description),
        ) if violations.is_empty() => Ok(NewCampaign {
            name,
            objective,
            campaign_type,
            daily_budget,
            start_date,
            end_date,
            ad_group_name,
            ad_headline,
            ad_description,
            asset_url,
        }),
        _ => Err(Error::InvalidCampaign { violations }),
    }
}
