//! Links a train to the trains it joins, divides from or forms.
//!
//! Rows are stored relative to a base train and can be found from either side.
//! Resolution de-duplicates overrides, drops cancellations, re-expresses every
//! row from the point of view of the queried train and optionally looks up the
//! linked train's endpoints. That lookup goes through the schedule resolver
//! only, so enrichment never goes more than one level deep.

use crate::resolver::resolve;
use crate::schedule::{Association, AssociationCategory, DateIndicator, StpIndicator};
use crate::store::{Stop, TimetableStore};

use chrono::{Duration, NaiveDate};
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enrichment {
    None,
    Endpoints,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub name: Option<String>,
    pub crs: Option<String>,
    pub tiploc: String,
}

impl From<&Stop> for Endpoint {
    fn from(stop: &Stop) -> Self {
        Endpoint {
            name: stop.name.clone(),
            crs: stop.crs.clone(),
            tiploc: stop.location.id.clone(),
        }
    }
}

/// An association seen from the queried train. `uid` is always the queried
/// train and `uid_assoc` the other one.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedAssociation {
    pub uid: String,
    pub uid_assoc: String,
    pub category: Option<AssociationCategory>,
    pub tiploc: String,
    pub suffix: Option<u32>,
    pub suffix_assoc: Option<u32>,
    pub stp: StpIndicator,
    pub for_passengers: bool,
    /// True when the queried train was stored as the associated side.
    pub from: bool,
    pub relative_indicator: DateIndicator,
    pub direction: bool,
    /// Date on which the other train is at the association location.
    pub lookup_date: NaiveDate,
    pub origin: Option<Endpoint>,
    pub destination: Option<Endpoint>,
    pub far: Option<Endpoint>,
}

/// Boarding point key: TIPLOC and the occurrence of it in the queried train's route.
pub type StopKey = (String, u32);

type DedupKey = (String, Option<u32>, Option<AssociationCategory>, String, String);

type SiblingKey = (String, Option<u32>, String, String);

fn dedup_key(assoc: &Association) -> DedupKey {
    (
        assoc.location.clone(),
        assoc.location_suffix,
        assoc.category,
        assoc.main_train_id.clone(),
        assoc.other_train_id.clone(),
    )
}

fn sibling_key(assoc: &Association) -> SiblingKey {
    (
        assoc.location.clone(),
        assoc.location_suffix,
        assoc.main_train_id.clone(),
        assoc.other_train_id.clone(),
    )
}

/// Some cancellations leave the category blank. Such a row still overrides the
/// association it cancels, so it takes the category of its siblings when they
/// agree on one.
fn complete_cancelled_categories(rows: Vec<Arc<Association>>) -> Vec<Arc<Association>> {
    let mut siblings: HashMap<SiblingKey, Vec<AssociationCategory>> = HashMap::new();
    for row in &rows {
        if let Some(category) = row.category {
            siblings.entry(sibling_key(row)).or_default().push(category);
        }
    }

    rows.into_iter()
        .map(|row| {
            if row.stp != StpIndicator::Cancellation || row.category.is_some() {
                return row;
            }
            let categories = match siblings.get(&sibling_key(&row)) {
                Some(x) => x.iter().unique().collect::<Vec<_>>(),
                None => return row,
            };
            match categories[..] {
                [category] => {
                    let mut completed = (*row).clone();
                    completed.category = Some(*category);
                    Arc::new(completed)
                }
                _ => row,
            }
        })
        .collect()
}

/// Keeps the rows that apply on `date`: of several rows sharing a key, the last
/// weekday-matching one in store order, unless it is a cancellation.
fn effective_rows(rows: Vec<Arc<Association>>, date: NaiveDate) -> Vec<Arc<Association>> {
    let mut winners = complete_cancelled_categories(rows)
        .into_iter()
        .filter(|row| row.days.runs_on(date))
        .rev()
        .unique_by(|row| dedup_key(row))
        .collect::<Vec<_>>();
    winners.reverse();
    winners.retain(|row| row.stp != StpIndicator::Cancellation);
    winners
}

fn canonicalize(row: &Association, uid: &str, date: NaiveDate) -> ResolvedAssociation {
    let from = row.other_train_id == uid && row.main_train_id != uid;
    let (uid, uid_assoc, suffix, suffix_assoc, relative_indicator) = if from {
        (
            row.other_train_id.clone(),
            row.main_train_id.clone(),
            row.other_train_location_suffix,
            row.location_suffix,
            row.date_indicator.reversed(),
        )
    } else {
        (
            row.main_train_id.clone(),
            row.other_train_id.clone(),
            row.location_suffix,
            row.other_train_location_suffix,
            row.date_indicator,
        )
    };
    let shift = Duration::days(relative_indicator.day_diff().into());
    let lookup_date = date.checked_add_signed(shift).unwrap_or(date);

    ResolvedAssociation {
        uid,
        uid_assoc,
        category: row.category,
        tiploc: row.location.clone(),
        suffix,
        suffix_assoc,
        stp: row.stp,
        for_passengers: row.for_passengers,
        from,
        relative_indicator,
        direction: from,
        lookup_date,
        origin: None,
        destination: None,
        far: None,
    }
}

fn add_endpoints<S>(store: &S, assoc: &mut ResolvedAssociation)
where
    S: TimetableStore + ?Sized,
{
    let linked = match resolve(store, &assoc.uid_assoc, assoc.lookup_date) {
        Ok(x) => x,
        Err(e) => {
            debug!(
                "Association {} -> {} left unresolved: {}",
                assoc.uid, assoc.uid_assoc, e
            );
            return;
        }
    };
    let (Some(first), Some(last)) = (linked.stops.first(), linked.stops.last()) else {
        return;
    };

    let origin = Endpoint::from(first);
    let destination = Endpoint::from(last);
    // the anchor is where the other train terminates, so name where it came from
    assoc.direction = assoc.tiploc == destination.tiploc;
    assoc.far = Some(if assoc.direction {
        origin.clone()
    } else {
        destination.clone()
    });
    assoc.origin = Some(origin);
    assoc.destination = Some(destination);
}

pub fn resolve_associations<S>(
    store: &S,
    uid: &str,
    date: NaiveDate,
    enrichment: Enrichment,
) -> BTreeMap<StopKey, Vec<ResolvedAssociation>>
where
    S: TimetableStore + ?Sized,
{
    let rows = store.associations_by_uid(uid, date);
    let fetched = rows.len();

    let mut grouped: BTreeMap<StopKey, Vec<ResolvedAssociation>> = BTreeMap::new();
    for row in effective_rows(rows, date) {
        let mut assoc = canonicalize(&row, uid, date);
        if enrichment == Enrichment::Endpoints {
            add_endpoints(store, &mut assoc);
        }
        grouped
            .entry((assoc.tiploc.clone(), assoc.suffix.unwrap_or(1)))
            .or_default()
            .push(assoc);
    }

    debug!(
        "{} of {} association rows for {} apply on {}",
        grouped.values().map(Vec::len).sum::<usize>(),
        fetched,
        uid,
        date
    );
    grouped
}
