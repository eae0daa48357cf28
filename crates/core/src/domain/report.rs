use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user::{TeamId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DailyReportId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthlyReportId(pub String);

/// Calendar month a monthly report covers, serialized as `YYYY-MM`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportPeriod(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid report period `{raw}` (expected YYYY-MM)")]
pub struct InvalidPeriod {
    pub raw: String,
}

impl ReportPeriod {
    pub fn parse(raw: &str) -> Result<Self, InvalidPeriod> {
        let trimmed = raw.trim();
        let invalid = || InvalidPeriod { raw: raw.to_string() };

        let (year, month) = trimmed.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let _year: u16 = year.parse().map_err(|_| invalid())?;
        let month_num: u8 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month_num) {
            return Err(invalid());
        }

        Ok(Self(trimmed.to_string()))
    }

    /// True when `date` falls inside this period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.format("%Y-%m").to_string() == self.0
    }
}

/// One toolbox-meeting checklist, filed per team per working day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    pub id: DailyReportId,
    pub team_id: TeamId,
    pub report_date: NaiveDate,
    pub attendee_count: u32,
    pub risk_notes: Option<String>,
    pub items: Vec<DailyReportItem>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReportItem {
    pub label: String,
    pub checked: bool,
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub id: MonthlyReportId,
    pub team_id: TeamId,
    pub period: ReportPeriod,
    pub submitted_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only aggregation over the daily reports of one team and period.
/// Displayed alongside an approval request; carries no invariants of its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct MonthlySummary {
    pub daily_report_count: u32,
    pub attendee_total: u32,
    pub item_count: u32,
    pub checked_item_count: u32,
}

impl MonthlySummary {
    pub fn checked_ratio(&self) -> f64 {
        if self.item_count == 0 {
            return 0.0;
        }
        f64::from(self.checked_item_count) / f64::from(self.item_count)
    }
}
