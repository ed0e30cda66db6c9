use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kitchen capacity an order consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Bento,
    #[default]
    Custom,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Bento => "bento",
            SlotKind::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Limited,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub status: SlotStatus,
    pub remaining: BTreeMap<SlotKind, u32>,
}

impl DayAvailability {
    pub fn remaining(&self, slot: SlotKind) -> u32 {
        self.remaining.get(&slot).copied().unwrap_or(0)
    }
}

/// Source of open order slots. Callers only use it for advisory warnings.
pub trait AvailabilitySource {
    /// Availability for `date`, or `None` when the date is outside the
    /// window this source knows about.
    fn day(&self, date: NaiveDate) -> Option<DayAvailability>;

    fn today(&self) -> NaiveDate;

    fn range(&self, from: NaiveDate, days: u32) -> Vec<DayAvailability> {
        (0..days)
            .filter_map(|offset| self.day(from + Duration::days(offset as i64)))
            .collect()
    }
}

/// Rolling two-week calendar the order page advertises: the first week is
/// nearly booked out, the second week has full capacity with fewer slots on
/// weekends.
#[derive(Debug, Clone)]
pub struct SampleAvailability {
    today: NaiveDate,
    window: u32,
}

impl SampleAvailability {
    pub const WINDOW_DAYS: u32 = 14;
    pub const BENTO_CAPACITY: u32 = 3;
    pub const CUSTOM_CAPACITY: u32 = 2;

    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            window: Self::WINDOW_DAYS,
        }
    }

    pub fn starting_today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}

impl AvailabilitySource for SampleAvailability {
    fn day(&self, date: NaiveDate) -> Option<DayAvailability> {
        let offset = (date - self.today).num_days();
        if offset < 0 || offset >= self.window as i64 {
            return None;
        }
        let offset = offset as u32;

        let (bento, custom, status) = if offset < 7 {
            let bento = 1u32.saturating_sub(offset / 2);
            let custom = 1u32.saturating_sub(offset / 3);
            let status = if offset < 3 {
                SlotStatus::Limited
            } else {
                SlotStatus::Unavailable
            };
            (bento, custom, status)
        } else {
            let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
            if weekend {
                (2, 1, SlotStatus::Available)
            } else {
                (3, 2, SlotStatus::Available)
            }
        };

        Some(DayAvailability {
            date,
            status,
            remaining: BTreeMap::from([(SlotKind::Bento, bento), (SlotKind::Custom, custom)]),
        })
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
