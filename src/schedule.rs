use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A TIPLOC as declared by a TI/TA record, joined against stops at query time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub public_id: Option<String>, // CRS code; only present for places that sell tickets
    pub stanox: Option<String>,
    pub nlc: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaysOfWeek {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl DaysOfWeek {
    pub fn get_by_weekday(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    pub fn runs_on(&self, date: NaiveDate) -> bool {
        self.get_by_weekday(date.weekday())
    }

    /// Renders the mask back into CIF form, e.g. `1111100`.
    pub fn to_mask(&self) -> String {
        self.into_iter()
            .map(|day| if day { '1' } else { '0' })
            .collect()
    }
}

impl IntoIterator for &DaysOfWeek {
    type Item = bool;
    type IntoIter = std::array::IntoIter<bool, 7>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIterator::into_iter([
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ])
    }
}

/// Short-term planning indicator. Variant order is not precedence; see `precedence`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StpIndicator {
    Cancellation,
    New,
    Overlay,
    Permanent,
}

impl StpIndicator {
    /// Higher wins when several schedules cover the same day.
    pub fn precedence(self) -> u8 {
        match self {
            StpIndicator::Cancellation => 2,
            StpIndicator::Overlay => 1,
            StpIndicator::New | StpIndicator::Permanent => 0,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            StpIndicator::Cancellation => 'C',
            StpIndicator::New => 'N',
            StpIndicator::Overlay => 'O',
            StpIndicator::Permanent => 'P',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationCategory {
    Join,
    Divide,
    Next,
}

/// When the associated train is at the association location, relative to the base train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateIndicator {
    Same,
    Next,
    Previous,
}

impl DateIndicator {
    pub fn reversed(self) -> DateIndicator {
        match self {
            DateIndicator::Same => DateIndicator::Same,
            DateIndicator::Next => DateIndicator::Previous,
            DateIndicator::Previous => DateIndicator::Next,
        }
    }

    pub fn day_diff(self) -> i8 {
        match self {
            DateIndicator::Same => 0,
            DateIndicator::Next => 1,
            DateIndicator::Previous => -1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingCharacteristics {
    pub vacuum_braked: bool,
    pub one_hundred_mph: bool,
    pub driver_only_passenger: bool,
    pub br_mark_four_coaches: bool,
    pub guard_required: bool,
    pub one_hundred_and_ten_mph: bool,
    pub push_pull: bool,
    pub runs_as_required: bool,
    pub air_conditioned_with_pa: bool,
    pub steam_heat: bool,
    pub runs_to_locations_as_required: bool,
    pub sb1c_gauge: bool,
}

/// One stop or passing point of a schedule, in journey order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainLocation {
    pub seq: u32,
    pub id: String,
    pub id_suffix: Option<String>, // to allow associations to be matched when the same location
                                   // occurs multiple times in a given train
    pub working_arr: Option<String>,
    pub working_dep: Option<String>,
    pub working_pass: Option<String>,
    pub public_arr: Option<String>,
    pub public_dep: Option<String>,
    pub platform: Option<String>,
    pub line: Option<String>,
    pub path: Option<String>,
    pub activities: Vec<String>,
    pub engineering_allowance: Option<String>,
    pub pathing_allowance: Option<String>,
    pub performance_allowance: Option<String>,
}

/// A single BS record (plus its BX and location records).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    pub id: u64,
    pub uid: String,
    pub stp: StpIndicator,
    pub valid_begin: NaiveDate,
    pub valid_end: NaiveDate,
    pub days_of_week: DaysOfWeek,
    pub bank_holiday_running: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub signalling_id: Option<String>,
    pub headcode: Option<String>,
    pub business_sector: Option<String>,
    pub power_type: Option<String>,
    pub timing_load: Option<String>,
    pub speed: Option<String>,
    pub operating_characteristics: OperatingCharacteristics,
    pub seating_class: Option<String>,
    pub sleepers: Option<String>,
    pub reservations: Option<String>,
    pub catering: Option<String>,
    pub branding: Option<String>,
    pub traction_class: Option<String>,
    pub uic_code: Option<String>,
    pub atoc_code: Option<String>,
    pub applicable_timetable: Option<String>,
    pub route: Vec<TrainLocation>,
}

impl Schedule {
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_begin <= date && date <= self.valid_end
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Association {
    pub main_train_id: String,
    pub other_train_id: String,
    pub stp: StpIndicator,
    pub valid_begin: NaiveDate,
    pub valid_end: NaiveDate,
    pub days: DaysOfWeek,
    pub category: Option<AssociationCategory>, // blank on some STP cancellations
    pub date_indicator: DateIndicator,
    pub location: String,
    pub location_suffix: Option<u32>,
    pub other_train_location_suffix: Option<u32>,
    pub for_passengers: bool,
}

impl Association {
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_begin <= date && date <= self.valid_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::StpIndicator::{Cancellation, New, Overlay, Permanent};

    #[test]
    fn weekday_mask_is_monday_first() {
        let days = DaysOfWeek {
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: false,
            sunday: false,
        };
        assert_eq!(days.to_mask(), "1111100");
        // 2024-03-02 was a Saturday
        assert!(!days.runs_on(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
        assert!(days.runs_on(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()));
    }

    #[test]
    fn cancellation_outranks_overlay_outranks_permanent() {
        assert!(Cancellation.precedence() > Overlay.precedence());
        assert!(Overlay.precedence() > Permanent.precedence());
        assert_eq!(New.precedence(), Permanent.precedence());
    }

    #[test]
    fn reversing_a_date_indicator_flips_next_and_previous() {
        assert_eq!(DateIndicator::Next.reversed(), DateIndicator::Previous);
        assert_eq!(DateIndicator::Previous.reversed(), DateIndicator::Next);
        assert_eq!(DateIndicator::Same.reversed(), DateIndicator::Same);
        assert_eq!(DateIndicator::Next.reversed().day_diff(), -1);
    }
}
