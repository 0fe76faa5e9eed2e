//! Picks the single effective schedule for a train on a date.
//!
//! Candidates arrive from the store already ordered by STP precedence
//! (cancellation, overlay, then new and permanent alike), with later-ingested
//! rows first among equals. The first candidate that runs on the weekday wins;
//! if none does, the best candidate is still returned, flagged as not running.

use crate::error::QueryError;
use crate::operators::operator_name;
use crate::schedule::{Schedule, StpIndicator};
use crate::store::{Stop, TimetableStore};

use chrono::NaiveDate;
use tracing::debug;

use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ResolvedSchedule {
    pub uid: String,
    /// STP indicator of the effective row, which may be a cancellation.
    pub stp: StpIndicator,
    pub cancelled: bool,
    pub weekday_match: bool,
    /// The timetable that applies. For a cancelled train this is the schedule
    /// being cancelled.
    pub schedule: Arc<Schedule>,
    pub operator_name: Option<&'static str>,
    pub stops: Vec<Stop>,
    /// Every candidate valid on the date, in precedence order.
    pub entries: Vec<Arc<Schedule>>,
}

fn select(candidates: &[Arc<Schedule>], date: NaiveDate) -> Option<(&Arc<Schedule>, bool)> {
    candidates
        .iter()
        .find(|schedule| schedule.days_of_week.runs_on(date))
        .map(|schedule| (schedule, true))
        .or_else(|| candidates.first().map(|schedule| (schedule, false)))
}

pub fn resolve<S>(store: &S, uid: &str, date: NaiveDate) -> Result<ResolvedSchedule, QueryError>
where
    S: TimetableStore + ?Sized,
{
    let entries = store.schedules_by_uid_and_date(uid, date);
    let (effective, weekday_match) = select(&entries, date)
        .ok_or_else(|| QueryError::NotFound(uid.to_string()))?;

    let cancelled = effective.stp == StpIndicator::Cancellation;
    let underlying = entries
        .iter()
        .filter(|schedule| schedule.stp != StpIndicator::Cancellation)
        .cloned()
        .collect::<Vec<_>>();
    let body = match select(&underlying, date) {
        Some((schedule, _)) if cancelled => schedule.clone(),
        _ => effective.clone(),
    };

    debug!(
        "Resolved {} on {} to schedule {} ({:?}) out of {} candidates",
        uid,
        date,
        body.id,
        effective.stp,
        entries.len()
    );

    Ok(ResolvedSchedule {
        uid: uid.to_string(),
        stp: effective.stp,
        cancelled,
        weekday_match,
        operator_name: body.atoc_code.as_deref().and_then(operator_name),
        stops: store.locations_for_schedule_id(body.id),
        schedule: body,
        entries: entries.clone(),
    })
}

/// Parses a `YYYY-MM-DD` date as given on the command line.
pub fn parse_query_date(date: &str) -> Result<NaiveDate, QueryError> {
    let well_formed = date.len() == 10
        && date.bytes().enumerate().all(|(i, x)| match i {
            4 | 7 => x == b'-',
            _ => x.is_ascii_digit(),
        });
    if !well_formed {
        return Err(QueryError::InvalidDate(date.to_string()));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| QueryError::InvalidDate(date.to_string()))
}
