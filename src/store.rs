use crate::error::Error;
use crate::schedule::{Association, Location, Schedule, TrainLocation};

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Details from the HD record of the extract a store was built from.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractHeader {
    pub mainframe_identity: String,
    pub extract_date: Option<NaiveDate>,
    pub current_reference: String,
    pub update_indicator: String,
    pub user_start_date: Option<NaiveDate>,
    pub user_end_date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeKind {
    Tiploc,
    Crs,
    Stanox,
}

/// A schedule location joined against the TIPLOC table.
#[derive(Clone, Debug, Serialize)]
pub struct Stop {
    #[serde(flatten)]
    pub location: TrainLocation,
    pub name: Option<String>,
    pub crs: Option<String>,
    pub stanox: Option<String>,
}

/// The query contract the resolvers are written against.
pub trait TimetableStore {
    /// Schedules for `uid` valid on `date`, highest STP precedence first and, within
    /// equal precedence, the most recently ingested first.
    fn schedules_by_uid_and_date(&self, uid: &str, date: NaiveDate) -> Vec<Arc<Schedule>>;
    fn locations_for_schedule_id(&self, id: u64) -> Vec<Stop>;
    /// Associations naming `uid` on either side, valid on `date`, ordered by STP
    /// indicator letter descending (P, O, N, C) and then by ingest order.
    fn associations_by_uid(&self, uid: &str, date: NaiveDate) -> Vec<Arc<Association>>;
    fn code_lookup(&self, kind: CodeKind, code: &str) -> Option<&Location>;
}

/// Everything that is persisted in a snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreData {
    pub header: Option<ExtractHeader>,
    pub locations: HashMap<String, Location>,
    pub schedules: Vec<Arc<Schedule>>,
    pub associations: Vec<Arc<Association>>,
}

/// An immutable, indexed timetable. Only ever built whole.
#[derive(Debug, Default)]
pub struct Store {
    data: StoreData,
    schedules_by_uid: HashMap<String, Vec<usize>>,
    associations_by_uid: HashMap<String, Vec<usize>>,
    tiploc_by_crs: HashMap<String, String>,
    tiploc_by_stanox: HashMap<String, String>,
}

impl Store {
    pub fn new(data: StoreData) -> Self {
        let mut schedules_by_uid: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, schedule) in data.schedules.iter().enumerate() {
            schedules_by_uid
                .entry(schedule.uid.clone())
                .or_default()
                .push(i);
        }

        let mut associations_by_uid: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, assoc) in data.associations.iter().enumerate() {
            associations_by_uid
                .entry(assoc.main_train_id.clone())
                .or_default()
                .push(i);
            if assoc.other_train_id != assoc.main_train_id {
                associations_by_uid
                    .entry(assoc.other_train_id.clone())
                    .or_default()
                    .push(i);
            }
        }

        let mut tiploc_by_crs = HashMap::new();
        let mut tiploc_by_stanox = HashMap::new();
        for location in data.locations.values() {
            if let Some(crs) = &location.public_id {
                tiploc_by_crs.insert(crs.clone(), location.id.clone());
            }
            if let Some(stanox) = &location.stanox {
                tiploc_by_stanox.insert(stanox.clone(), location.id.clone());
            }
        }

        Self {
            data,
            schedules_by_uid,
            associations_by_uid,
            tiploc_by_crs,
            tiploc_by_stanox,
        }
    }

    pub fn header(&self) -> Option<&ExtractHeader> {
        self.data.header.as_ref()
    }

    pub fn schedule_count(&self) -> usize {
        self.data.schedules.len()
    }

    pub fn association_count(&self) -> usize {
        self.data.associations.len()
    }

    pub fn location_count(&self) -> usize {
        self.data.locations.len()
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Store, Error> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        let data = serde_json::from_str::<StoreData>(&contents)?;
        let store = Store::new(data);
        info!(
            schedules = store.schedule_count(),
            associations = store.association_count(),
            "Loaded timetable snapshot from {}",
            path.as_ref().display()
        );
        Ok(store)
    }

    /// Writes the snapshot next to its destination first, so a reader never sees a
    /// half-written file.
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let filename = path.as_ref();
        let json_string = serde_json::to_string(&self.data)?;
        let tmp_filename = filename.with_extension("tmp");

        fs::write(&tmp_filename, json_string).await?;
        fs::rename(&tmp_filename, filename).await?;

        info!("Wrote timetable snapshot to {}", filename.display());
        Ok(())
    }
}

impl TimetableStore for Store {
    fn schedules_by_uid_and_date(&self, uid: &str, date: NaiveDate) -> Vec<Arc<Schedule>> {
        let Some(indices) = self.schedules_by_uid.get(uid) else {
            return vec![];
        };
        indices
            .iter()
            .rev()
            .map(|&i| &self.data.schedules[i])
            .filter(|schedule| schedule.is_valid_on(date))
            // stable, so the reversed ingest order survives within equal precedence
            .sorted_by_key(|schedule| std::cmp::Reverse(schedule.stp.precedence()))
            .cloned()
            .collect()
    }

    fn locations_for_schedule_id(&self, id: u64) -> Vec<Stop> {
        let index = usize::try_from(id).ok();
        let Some(schedule) = index.and_then(|i| self.data.schedules.get(i)) else {
            return vec![];
        };
        schedule
            .route
            .iter()
            .map(|location| {
                let known = self.data.locations.get(&location.id);
                Stop {
                    location: location.clone(),
                    name: known.map(|x| x.name.clone()),
                    crs: known.and_then(|x| x.public_id.clone()),
                    stanox: known.and_then(|x| x.stanox.clone()),
                }
            })
            .collect()
    }

    fn associations_by_uid(&self, uid: &str, date: NaiveDate) -> Vec<Arc<Association>> {
        let Some(indices) = self.associations_by_uid.get(uid) else {
            return vec![];
        };
        indices
            .iter()
            .map(|&i| &self.data.associations[i])
            .filter(|assoc| assoc.is_valid_on(date))
            .sorted_by_key(|assoc| std::cmp::Reverse(assoc.stp.as_char()))
            .cloned()
            .collect()
    }

    fn code_lookup(&self, kind: CodeKind, code: &str) -> Option<&Location> {
        let tiploc = match kind {
            CodeKind::Tiploc => code,
            CodeKind::Crs => self.tiploc_by_crs.get(code)?.as_str(),
            CodeKind::Stanox => self.tiploc_by_stanox.get(code)?.as_str(),
        };
        self.data.locations.get(tiploc)
    }
}

/// Accumulates records during ingestion. Never queryable; `build` is the only way out.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    data: StoreData,
    current: Option<Schedule>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header(&mut self, header: ExtractHeader) {
        self.data.header = Some(header);
    }

    pub fn insert_location(&mut self, location: Location) {
        self.data.locations.insert(location.id.clone(), location);
    }

    pub fn remove_location(&mut self, tiploc: &str) -> Option<Location> {
        self.data.locations.remove(tiploc)
    }

    pub fn insert_association(&mut self, assoc: Association) {
        self.data.associations.push(Arc::new(assoc));
    }

    pub fn next_schedule_id(&self) -> u64 {
        self.data.schedules.len() as u64 + u64::from(self.current.is_some())
    }

    /// Starts a new schedule; the previous one (if any) is complete.
    pub fn begin_schedule(&mut self, schedule: Schedule) {
        self.finish_schedule();
        self.current = Some(schedule);
    }

    pub fn current_schedule(&mut self) -> Option<&mut Schedule> {
        self.current.as_mut()
    }

    pub fn finish_schedule(&mut self) {
        if let Some(schedule) = self.current.take() {
            self.data.schedules.push(Arc::new(schedule));
        }
    }

    pub fn build(mut self) -> Store {
        self.finish_schedule();
        Store::new(self.data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schedule::StpIndicator::{Cancellation, New, Overlay, Permanent};
    use crate::schedule::{
        AssociationCategory, DateIndicator, DaysOfWeek, OperatingCharacteristics, StpIndicator,
    };

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn days(mask: &str) -> DaysOfWeek {
        let bit = |i: usize| &mask[i..i + 1] == "1";
        DaysOfWeek {
            monday: bit(0),
            tuesday: bit(1),
            wednesday: bit(2),
            thursday: bit(3),
            friday: bit(4),
            saturday: bit(5),
            sunday: bit(6),
        }
    }

    pub fn stop(seq: u32, tiploc: &str) -> TrainLocation {
        TrainLocation {
            seq,
            id: tiploc.to_string(),
            id_suffix: None,
            working_arr: None,
            working_dep: None,
            working_pass: None,
            public_arr: None,
            public_dep: None,
            platform: None,
            line: None,
            path: None,
            activities: vec![],
            engineering_allowance: None,
            pathing_allowance: None,
            performance_allowance: None,
        }
    }

    pub fn schedule(
        uid: &str,
        stp: StpIndicator,
        from: &str,
        to: &str,
        mask: &str,
        route: &[&str],
    ) -> Schedule {
        Schedule {
            id: 0,
            uid: uid.to_string(),
            stp,
            valid_begin: date(from),
            valid_end: date(to),
            days_of_week: days(mask),
            bank_holiday_running: None,
            status: Some("P".to_string()),
            category: Some("OO".to_string()),
            signalling_id: Some("2A25".to_string()),
            headcode: None,
            business_sector: None,
            power_type: Some("EMU".to_string()),
            timing_load: Some("375".to_string()),
            speed: Some("100".to_string()),
            operating_characteristics: OperatingCharacteristics::default(),
            seating_class: Some("S".to_string()),
            sleepers: None,
            reservations: None,
            catering: None,
            branding: None,
            traction_class: None,
            uic_code: None,
            atoc_code: Some("SE".to_string()),
            applicable_timetable: None,
            route: route
                .iter()
                .enumerate()
                .map(|(i, tiploc)| stop(i as u32, tiploc))
                .collect(),
        }
    }

    /// A row valid for the whole of 2024.
    pub fn all_year(uid: &str, stp: StpIndicator, mask: &str, route: &[&str]) -> Schedule {
        schedule(uid, stp, "2024-01-01", "2024-12-31", mask, route)
    }

    /// A row running every day between two dates.
    pub fn daily(uid: &str, stp: StpIndicator, from: &str, to: &str, route: &[&str]) -> Schedule {
        schedule(uid, stp, from, to, "1111111", route)
    }

    pub fn association(
        main: &str,
        other: &str,
        stp: StpIndicator,
        mask: &str,
        category: AssociationCategory,
        date_indicator: DateIndicator,
        tiploc: &str,
    ) -> Association {
        Association {
            main_train_id: main.to_string(),
            other_train_id: other.to_string(),
            stp,
            valid_begin: date("2024-01-01"),
            valid_end: date("2024-12-31"),
            days: days(mask),
            category: Some(category),
            date_indicator,
            location: tiploc.to_string(),
            location_suffix: None,
            other_train_location_suffix: None,
            for_passengers: true,
        }
    }

    pub fn location(tiploc: &str, name: &str, crs: Option<&str>) -> Location {
        Location {
            id: tiploc.to_string(),
            name: name.to_string(),
            public_id: crs.map(|x| x.to_string()),
            stanox: Some("12345".to_string()),
            nlc: None,
        }
    }

    /// Builds a store the same way the importer does, assigning ids in order.
    pub fn build(
        schedules: Vec<Schedule>,
        associations: Vec<Association>,
        locations: Vec<Location>,
    ) -> Store {
        let mut builder = StoreBuilder::new();
        for location in locations {
            builder.insert_location(location);
        }
        for mut schedule in schedules {
            schedule.id = builder.next_schedule_id();
            builder.begin_schedule(schedule);
        }
        for assoc in associations {
            builder.insert_association(assoc);
        }
        builder.build()
    }

    #[test]
    fn schedules_are_filtered_by_validity_and_ordered_by_precedence() {
        let store = build(
            vec![
                daily("A00002", Overlay, "2024-06-01", "2024-06-07", &[]),
                all_year("A00002", Permanent, "1111111", &[]),
                daily("A00002", Cancellation, "2024-06-03", "2024-06-03", &[]),
            ],
            vec![],
            vec![],
        );
        let stps = |d: &str| {
            store
                .schedules_by_uid_and_date("A00002", date(d))
                .iter()
                .map(|x| x.stp)
                .collect::<Vec<_>>()
        };
        assert_eq!(stps("2024-06-03"), vec![Cancellation, Overlay, Permanent]);
        assert_eq!(stps("2024-07-01"), vec![Permanent]);
        let unknown = store.schedules_by_uid_and_date("Z99999", date("2024-07-01"));
        assert!(unknown.is_empty());
    }

    #[test]
    fn equal_precedence_prefers_later_ingest() {
        let store = build(
            vec![
                all_year("A00003", Permanent, "1111111", &["EARLY"]),
                all_year("A00003", New, "1111111", &["LATE"]),
            ],
            vec![],
            vec![],
        );
        let found = store.schedules_by_uid_and_date("A00003", date("2024-02-01"));
        assert_eq!(found[0].route[0].id, "LATE");
    }

    #[test]
    fn locations_are_joined_against_the_tiploc_table() {
        let route = ["ASHFKY", "NOWHERE"];
        let store = build(
            vec![all_year("A00004", Permanent, "1111111", &route)],
            vec![],
            vec![location("ASHFKY", "ASHFORD INTERNATIONAL", Some("AFK"))],
        );
        let stops = store.locations_for_schedule_id(0);
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].crs.as_deref(), Some("AFK"));
        assert_eq!(stops[0].name.as_deref(), Some("ASHFORD INTERNATIONAL"));
        assert!(stops[1].name.is_none());
        assert!(store.locations_for_schedule_id(7).is_empty());
    }

    #[test]
    fn associations_are_found_from_either_side_in_stp_letter_order() {
        let join = |stp| {
            association(
                "A00010",
                "A00011",
                stp,
                "1111111",
                AssociationCategory::Join,
                DateIndicator::Same,
                "ASHFKY",
            )
        };
        let store = build(
            vec![],
            vec![join(Cancellation), join(Permanent), join(Overlay)],
            vec![],
        );
        let from_other = store.associations_by_uid("A00011", date("2024-05-01"));
        let stps: Vec<_> = from_other.iter().map(|x| x.stp).collect();
        assert_eq!(stps, vec![Permanent, Overlay, Cancellation]);

        let from_main = store.associations_by_uid("A00010", date("2024-05-01"));
        assert_eq!(from_main.len(), 3);
        let next_year = store.associations_by_uid("A00010", date("2025-05-01"));
        assert!(next_year.is_empty());
    }

    #[test]
    fn code_lookup_by_every_kind() {
        let ashford = location("ASHFKY", "ASHFORD INTERNATIONAL", Some("AFK"));
        let store = build(vec![], vec![], vec![ashford]);
        let by_crs = store.code_lookup(CodeKind::Crs, "AFK").unwrap();
        assert_eq!(by_crs.id, "ASHFKY");
        let by_stanox = store.code_lookup(CodeKind::Stanox, "12345").unwrap();
        assert_eq!(by_stanox.id, "ASHFKY");
        assert!(store.code_lookup(CodeKind::Tiploc, "ASHFKY").is_some());
        assert!(store.code_lookup(CodeKind::Crs, "XXX").is_none());
    }
}
