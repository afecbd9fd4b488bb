use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Violation {
    MissingField {
        field: &'static str,
    },
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    InvalidDate {
        field: &'static str,
        value: String,
    },
    BudgetNotPositive {
        daily_budget: i64,
    },
    BudgetTooLarge {
        daily_budget: i64,
        maximum_daily_budget: i64,
    },
    StartNotBeforeEnd {
        start_date: String,
        end_date: String,
    },
}

impl Violation {
    pub fn field(&self) -> &'static str {
        match self {
            Violation::MissingField { field } => *field,
            Violation::InvalidType { field, .. } => *field,
            Violation::InvalidDate { field, .. } => *field,
            Violation::BudgetNotPositive { .. } => "daily_budget",
            Violation::BudgetTooLarge { .. } => "daily_budget",
            Violation::StartNotBeforeEnd { .. } => "end_date",
        }
    }
}
