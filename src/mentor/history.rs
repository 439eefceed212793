// src/mentor/history.rs — Date buckets for the session list

use chrono::{Local, NaiveDate};

use crate::store::ChatSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGroup {
    Today,
    Yesterday,
    LastSevenDays,
    Older,
}

impl DateGroup {
    pub const ALL: [DateGroup; 4] = [
        DateGroup::Today,
        DateGroup::Yesterday,
        DateGroup::LastSevenDays,
        DateGroup::Older,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DateGroup::Today => "Today",
            DateGroup::Yesterday => "Yesterday",
            DateGroup::LastSevenDays => "Last 7 days",
            DateGroup::Older => "Older",
        }
    }

    /// Bucket for a calendar day relative to `today`.
    pub fn for_day(day: NaiveDate, today: NaiveDate) -> Self {
        let age = (today - day).num_days();
        match age {
            i64::MIN..=0 => DateGroup::Today,
            1 => DateGroup::Yesterday,
            2..=7 => DateGroup::LastSevenDays,
            _ => DateGroup::Older,
        }
    }
}

/// Group sessions by the local calendar day of `updated_at`.
///
/// Empty groups are omitted; input order is kept within each group.
pub fn group_by_date(
    sessions: &[ChatSession],
    today: NaiveDate,
) -> Vec<(DateGroup, Vec<&ChatSession>)> {
    DateGroup::ALL
        .iter()
        .map(|group| {
            let members: Vec<&ChatSession> = sessions
                .iter()
                .filter(|s| {
                    let day = s.updated_at.with_timezone(&Local).date_naive();
                    DateGroup::for_day(day, today) == *group
                })
                .collect();
            (*group, members)
        })
        .filter(|(_, members)| !members.is_empty())
        .collect()
}
