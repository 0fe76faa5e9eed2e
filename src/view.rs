//! Read-only output objects built from resolver results.
//!
//! Nothing here changes what the resolvers returned; every view is assembled
//! from borrowed results into fresh values.

use crate::associations::{resolve_associations, Enrichment, ResolvedAssociation, StopKey};
use crate::error::QueryError;
use crate::resolver::{resolve, ResolvedSchedule};
use crate::schedule::{Schedule, StpIndicator};
use crate::store::{Stop, TimetableStore};
use crate::tops::{infer_for_schedule, TopsInference};

use chrono::NaiveDate;
use serde::ser::Serializer;
use serde::Serialize;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Keys in insertion order. A repeated key keeps its first position and takes
/// the latest value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        OrderedMap(Vec::new())
    }

    pub fn insert(&mut self, key: String, value: V) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayTimes {
    pub sta: Option<String>,
    pub std: Option<String>,
    pub pass: Option<String>,
}

impl DisplayTimes {
    fn for_stop(stop: &Stop) -> Self {
        let location = &stop.location;
        DisplayTimes {
            sta: location
                .public_arr
                .clone()
                .or_else(|| location.working_arr.clone()),
            std: location
                .public_dep
                .clone()
                .or_else(|| location.working_dep.clone())
                .or_else(|| location.working_pass.clone()),
            pass: location.working_pass.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub stop: Stop,
    pub display_times: DisplayTimes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<ResolvedAssociation>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TopsView {
    #[serde(flatten)]
    pub inference: TopsInference,
    pub image_url: Option<String>,
}

impl TopsView {
    fn new(inference: TopsInference, images: &HashMap<String, String>) -> Self {
        let image_url = inference.image_ref.and_then(|key| images.get(key).cloned());
        TopsView { inference, image_url }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ScheduleView {
    pub uid: String,
    pub date: NaiveDate,
    pub stp: StpIndicator,
    pub cancelled: bool,
    pub weekday_match: bool,
    pub operator_name: Option<&'static str>,
    pub rows: usize,
    pub tops: Option<TopsView>,
    pub locations: Vec<LocationView>,
    pub associations_by_stop: OrderedMap<Vec<ResolvedAssociation>>,
    pub current: Arc<Schedule>,
    pub entries: Vec<Arc<Schedule>>,
}

fn stop_key_name((tiploc, occurrence): &StopKey) -> String {
    format!("{}/{}", tiploc, occurrence)
}

impl ScheduleView {
    pub fn new(
        resolved: &ResolvedSchedule,
        date: NaiveDate,
        associations: &BTreeMap<StopKey, Vec<ResolvedAssociation>>,
        images: &HashMap<String, String>,
    ) -> Self {
        let mut occurrences: HashMap<&str, u32> = HashMap::new();
        let locations = resolved
            .stops
            .iter()
            .map(|stop| {
                let occurrence = occurrences.entry(stop.location.id.as_str()).or_insert(0);
                *occurrence += 1;
                let key = (stop.location.id.clone(), *occurrence);
                LocationView {
                    stop: stop.clone(),
                    display_times: DisplayTimes::for_stop(stop),
                    associations: associations.get(&key).cloned().unwrap_or_default(),
                }
            })
            .collect();

        let mut associations_by_stop = OrderedMap::new();
        for (key, value) in associations {
            associations_by_stop.insert(stop_key_name(key), value.clone());
        }

        ScheduleView {
            uid: resolved.uid.clone(),
            date,
            stp: resolved.stp,
            cancelled: resolved.cancelled,
            weekday_match: resolved.weekday_match,
            operator_name: resolved.operator_name,
            rows: resolved.entries.len(),
            tops: infer_for_schedule(&resolved.schedule).map(|x| TopsView::new(x, images)),
            locations,
            associations_by_stop,
            current: resolved.schedule.clone(),
            entries: resolved.entries.clone(),
        }
    }
}

/// Resolves a train, its associations (with the linked trains' endpoints) and
/// its likely class.
pub fn schedule_view<S>(
    store: &S,
    uid: &str,
    date: NaiveDate,
    images: &HashMap<String, String>,
) -> Result<ScheduleView, QueryError>
where
    S: TimetableStore + ?Sized,
{
    let resolved = resolve(store, uid, date)?;
    let associations = resolve_associations(store, uid, date, Enrichment::Endpoints);
    Ok(ScheduleView::new(&resolved, date, &associations, images))
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryView {
    pub cancelled: bool,
    pub tops_inferred: Option<String>,
    pub tops_possible: Vec<&'static str>,
    pub atoc_code: Option<String>,
    pub power_type: Option<String>,
    /// Platform at each public calling point, by CRS.
    pub platforms: OrderedMap<Option<String>>,
}

impl SummaryView {
    pub fn new(resolved: &ResolvedSchedule) -> Self {
        let tops = infer_for_schedule(&resolved.schedule);
        let mut platforms = OrderedMap::new();
        for stop in &resolved.stops {
            // passing points have no platform worth showing
            if let (Some(crs), None) = (&stop.crs, &stop.location.working_pass) {
                platforms.insert(crs.clone(), stop.location.platform.clone());
            }
        }

        SummaryView {
            cancelled: resolved.cancelled,
            tops_inferred: tops.as_ref().map(|x| x.inferred_label.clone()),
            tops_possible: tops.map(|x| x.possible_classes).unwrap_or_default(),
            atoc_code: resolved.schedule.atoc_code.clone(),
            power_type: resolved.schedule.power_type.clone(),
            platforms,
        }
    }
}

/// An unknown train serializes as an empty object so one miss does not spoil a batch.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum SummaryEntry {
    Found(SummaryView),
    Missing {},
}

pub fn summaries<S>(store: &S, uids: &[String], date: NaiveDate) -> OrderedMap<SummaryEntry>
where
    S: TimetableStore + ?Sized,
{
    let mut out = OrderedMap::new();
    for uid in uids {
        let entry = match resolve(store, uid, date) {
            Ok(resolved) => SummaryEntry::Found(SummaryView::new(&resolved)),
            Err(_) => SummaryEntry::Missing {},
        };
        out.insert(uid.clone(), entry);
    }
    out
}
