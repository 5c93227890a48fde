//! Staff records and the closed vocabulary of fields a template can map to.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use strum::AsRefStr;
use strum::EnumIter;
use strum::EnumString;

/// A field of a staff record that template labels can be mapped to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StaffField {
    CompanyId,
    EmployeeId,
    FirstName,
    LastName,
    Email,
    Phone,
    Department,
    Title,
    HireDate,
    Status,
    Notes,
}

/// A typed value read from a staff record
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(text) => write!(f, "{text}"),
            FieldValue::Integer(number) => write!(f, "{number}"),
            FieldValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// One employee of a company.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub company_id: i64,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StaffRecord {
    /// Reads a field. Empty text counts as absent.
    pub fn value(&self, field: StaffField) -> Option<FieldValue> {
        match field {
            StaffField::CompanyId => Some(FieldValue::Integer(self.company_id)),
            StaffField::EmployeeId => text(Some(&self.employee_id)),
            StaffField::FirstName => text(Some(&self.first_name)),
            StaffField::LastName => text(Some(&self.last_name)),
            StaffField::Email => text(self.email.as_ref()),
            StaffField::Phone => text(self.phone.as_ref()),
            StaffField::Department => text(self.department.as_ref()),
            StaffField::Title => text(self.title.as_ref()),
            StaffField::HireDate => self.hire_date.map(FieldValue::Date),
            StaffField::Status => text(self.status.as_ref()),
            StaffField::Notes => text(self.notes.as_ref()),
        }
    }
}

fn text(value: Option<&String>) -> Option<FieldValue> {
    value
        .filter(|value| !value.is_empty())
        .map(|value| FieldValue::Text(value.to_owned()))
}

/// Sorts records into population order: creation order, i.e. ascending id
pub fn sort_for_population(records: &mut [StaffRecord]) {
    records.sort_by_key(|record| record.id);
}
