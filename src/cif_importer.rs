use crate::cif::{decode, CifError, CifErrorType, Field, Record, RecordType, RECORD_LENGTH};
use crate::error::Error;
use crate::importer::SlowImporter;
use crate::schedule::{
    Association, AssociationCategory, DateIndicator, DaysOfWeek, Location,
    OperatingCharacteristics, Schedule, StpIndicator, TrainLocation,
};
use crate::store::{ExtractHeader, Store, StoreBuilder};

use async_trait::async_trait;
use chrono::NaiveDate;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct CifImporter {
    builder: StoreBuilder,
}

fn produce_cif_error_closure(
    number: u64,
    column: usize,
) -> Box<dyn FnOnce(CifErrorType) -> CifError> {
    Box::new(move |x| CifError {
        error_type: x,
        line: number,
        column,
    })
}

fn read_stp_indicator<F, T>(stp_slice: &str, error_logic: F) -> Result<StpIndicator, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    match stp_slice {
        "C" => Ok(StpIndicator::Cancellation),
        "N" => Ok(StpIndicator::New),
        "O" => Ok(StpIndicator::Overlay),
        // blank is how permanent schedules were marked before P existed
        "P" | " " => Ok(StpIndicator::Permanent),
        x => Err(error_logic(CifErrorType::InvalidStpIndicator(
            x.to_string(),
        ))),
    }
}

fn read_days_of_week<F, T>(slice: &str, error_logic: F) -> Result<DaysOfWeek, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    if slice.len() != 7 || !slice.chars().all(|x| x == '0' || x == '1') {
        Err(error_logic(CifErrorType::InvalidDaysOfWeek(
            slice.to_string(),
        )))
    } else {
        Ok(DaysOfWeek {
            monday: &slice[0..1] == "1",
            tuesday: &slice[1..2] == "1",
            wednesday: &slice[2..3] == "1",
            thursday: &slice[3..4] == "1",
            friday: &slice[4..5] == "1",
            saturday: &slice[5..6] == "1",
            sunday: &slice[6..7] == "1",
        })
    }
}

fn read_operating_characteristics<F, T>(
    slice: &str,
    error_logic: F,
) -> Result<OperatingCharacteristics, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    let mut operating_characteristics = OperatingCharacteristics {
        ..Default::default()
    };

    for chr in slice.chars() {
        match chr {
            'B' => operating_characteristics.vacuum_braked = true,
            'C' => operating_characteristics.one_hundred_mph = true,
            'D' => operating_characteristics.driver_only_passenger = true,
            'E' => operating_characteristics.br_mark_four_coaches = true,
            'G' => operating_characteristics.guard_required = true,
            'M' => operating_characteristics.one_hundred_and_ten_mph = true,
            'P' => operating_characteristics.push_pull = true,
            'Q' => operating_characteristics.runs_as_required = true,
            'R' => operating_characteristics.air_conditioned_with_pa = true,
            'S' => operating_characteristics.steam_heat = true,
            'Y' => operating_characteristics.runs_to_locations_as_required = true,
            'Z' => operating_characteristics.sb1c_gauge = true,
            ' ' => (),
            x => {
                return Err(error_logic(CifErrorType::InvalidOperatingCharacteristic(
                    x.to_string(),
                )))
            }
        }
    }

    Ok(operating_characteristics)
}

fn read_association_category<F, T>(
    slice: Option<&str>,
    error_logic: F,
) -> Result<Option<AssociationCategory>, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    match slice {
        None => Ok(None),
        Some("JJ") => Ok(Some(AssociationCategory::Join)),
        Some("VV") => Ok(Some(AssociationCategory::Divide)),
        Some("NP") => Ok(Some(AssociationCategory::Next)),
        Some(x) => Err(error_logic(CifErrorType::InvalidAssociationCategory(
            x.to_string(),
        ))),
    }
}

fn read_date_indicator<F, T>(slice: &str, error_logic: F) -> Result<DateIndicator, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    match slice {
        // blank on STP cancellations
        "S" | " " => Ok(DateIndicator::Same),
        "N" => Ok(DateIndicator::Next),
        "P" => Ok(DateIndicator::Previous),
        x => Err(error_logic(CifErrorType::InvalidAssociationDateIndicator(
            x.to_string(),
        ))),
    }
}

fn read_association_type<F, T>(slice: &str, error_logic: F) -> Result<bool, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    match slice {
        "P" => Ok(true),
        "O" | " " => Ok(false),
        x => Err(error_logic(CifErrorType::InvalidAssociationType(
            x.to_string(),
        ))),
    }
}

/// A public time of 0000 means the stop is not advertised.
fn read_public_time(time: Option<String>) -> Option<String> {
    time.filter(|x| x != "0000")
}

fn read_activities(slice: &str) -> Vec<String> {
    slice
        .as_bytes()
        .chunks(2)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn mandatory_text<'a>(record: &'a Record, field: Field, number: u64) -> Result<&'a str, CifError> {
    record.text(field).ok_or_else(|| CifError {
        error_type: CifErrorType::MissingField(field),
        line: number,
        column: record.record_type.column(field),
    })
}

fn mandatory_date(record: &Record, field: Field, number: u64) -> Result<NaiveDate, CifError> {
    record.date(field).ok_or_else(|| CifError {
        error_type: CifErrorType::MissingField(field),
        line: number,
        column: record.record_type.column(field),
    })
}

impl CifImporter {
    pub fn new() -> CifImporter {
        CifImporter {
            ..Default::default()
        }
    }

    fn current_schedule(
        &mut self,
        record: &Record,
        number: u64,
    ) -> Result<&mut Schedule, CifError> {
        self.builder.current_schedule().ok_or_else(|| CifError {
            error_type: CifErrorType::OrphanedRecord(record.record_type.tag().to_string()),
            line: number,
            column: 0,
        })
    }

    fn read_header(&mut self, record: &Record) {
        let text = |field| record.text(field).map(str::trim_end).unwrap_or_default();
        let header = ExtractHeader {
            mainframe_identity: text(Field::MainframeIdentity).to_string(),
            extract_date: record.date(Field::ExtractDate),
            current_reference: text(Field::CurrentFileReference).to_string(),
            update_indicator: text(Field::UpdateIndicator).to_string(),
            user_start_date: record.date(Field::UserStartDate),
            user_end_date: record.date(Field::UserEndDate),
        };
        if header.update_indicator != "F" {
            warn!(
                "Extract {} is not a full extract; only its inserts are loaded",
                header.current_reference
            );
        }
        info!(
            "Reading extract {} from {}",
            header.current_reference, header.mainframe_identity
        );
        debug!(
            "Extract covers {:?} to {:?}",
            header.user_start_date, header.user_end_date
        );
        self.builder.set_header(header);
    }

    fn read_tiploc(&mut self, record: &Record, number: u64) -> Result<(), CifError> {
        let tiploc = mandatory_text(record, Field::Tiploc, number)?;
        match record.record_type {
            RecordType::TiplocDelete => {
                self.builder.remove_location(tiploc); // it's OK if the TIPLOC isn't found
                return Ok(());
            }
            RecordType::TiplocAmend => {
                self.builder.remove_location(tiploc);
            }
            _ => (),
        }
        let id = record.text(Field::NewTiploc).unwrap_or(tiploc);
        let name = record.text(Field::TpsDescription).unwrap_or_default();
        let stanox = record
            .text(Field::Stanox)
            .map(|x| x.trim())
            .filter(|x| !x.is_empty() && *x != "00000");

        self.builder.insert_location(Location {
            id: id.to_string(),
            name: name.to_string(),
            public_id: record.optional_string(Field::Crs),
            stanox: stanox.map(|x| x.to_string()),
            nlc: record.integer(Field::Nlc),
        });
        Ok(())
    }

    fn read_association(&mut self, record: &Record, number: u64) -> Result<(), CifError> {
        let column = |field| record.record_type.column(field);
        let stp = read_stp_indicator(
            mandatory_text(record, Field::StpIndicator, number)?,
            produce_cif_error_closure(number, column(Field::StpIndicator)),
        )?;
        let days = read_days_of_week(
            mandatory_text(record, Field::AssocDays, number)?,
            produce_cif_error_closure(number, column(Field::AssocDays)),
        )?;
        let category = read_association_category(
            record.text(Field::AssocCategory),
            produce_cif_error_closure(number, column(Field::AssocCategory)),
        )?;
        let date_indicator = read_date_indicator(
            mandatory_text(record, Field::DateIndicator, number)?,
            produce_cif_error_closure(number, column(Field::DateIndicator)),
        )?;
        let for_passengers = read_association_type(
            mandatory_text(record, Field::AssocType, number)?,
            produce_cif_error_closure(number, column(Field::AssocType)),
        )?;

        self.builder.finish_schedule();
        self.builder.insert_association(Association {
            main_train_id: mandatory_text(record, Field::MainUid, number)?.to_string(),
            other_train_id: mandatory_text(record, Field::AssocUid, number)?.to_string(),
            stp,
            valid_begin: mandatory_date(record, Field::DateRunsFrom, number)?,
            valid_end: mandatory_date(record, Field::DateRunsTo, number)?,
            days,
            category,
            date_indicator,
            location: mandatory_text(record, Field::Tiploc, number)?.to_string(),
            location_suffix: record.integer(Field::BaseLocationSuffix),
            other_train_location_suffix: record.integer(Field::AssocLocationSuffix),
            for_passengers,
        });
        Ok(())
    }

    fn read_basic_schedule(&mut self, record: &Record, number: u64) -> Result<(), CifError> {
        let column = |field| record.record_type.column(field);
        let stp = read_stp_indicator(
            mandatory_text(record, Field::StpIndicator, number)?,
            produce_cif_error_closure(number, column(Field::StpIndicator)),
        )?;
        let days_of_week = read_days_of_week(
            mandatory_text(record, Field::DaysRun, number)?,
            produce_cif_error_closure(number, column(Field::DaysRun)),
        )?;
        let characteristics = record.text(Field::OperatingCharacteristics);
        let operating_characteristics = read_operating_characteristics(
            characteristics.unwrap_or_default(),
            produce_cif_error_closure(number, column(Field::OperatingCharacteristics)),
        )?;

        let schedule = Schedule {
            id: self.builder.next_schedule_id(),
            uid: mandatory_text(record, Field::Uid, number)?.to_string(),
            stp,
            valid_begin: mandatory_date(record, Field::DateRunsFrom, number)?,
            valid_end: mandatory_date(record, Field::DateRunsTo, number)?,
            days_of_week,
            bank_holiday_running: record.optional_string(Field::BankHolidayRunning),
            status: record.optional_string(Field::TrainStatus),
            category: record.optional_string(Field::TrainCategory),
            signalling_id: record.optional_string(Field::SignallingId),
            headcode: record.optional_string(Field::Headcode),
            business_sector: record.optional_string(Field::BusinessSector),
            power_type: record.optional_string(Field::PowerType),
            timing_load: record.optional_string(Field::TimingLoad),
            speed: record.optional_string(Field::Speed),
            operating_characteristics,
            seating_class: record.optional_string(Field::SeatingClass),
            sleepers: record.optional_string(Field::Sleepers),
            reservations: record.optional_string(Field::Reservations),
            catering: record.optional_string(Field::Catering),
            branding: record.optional_string(Field::Branding),
            traction_class: None,
            uic_code: None,
            atoc_code: None,
            applicable_timetable: None,
            route: vec![],
        };
        self.builder.begin_schedule(schedule);
        Ok(())
    }

    fn read_extended_schedule(&mut self, record: &Record, number: u64) -> Result<(), CifError> {
        let schedule = self.current_schedule(record, number)?;
        schedule.traction_class = record.optional_string(Field::TractionClass);
        schedule.uic_code = record.optional_string(Field::UicCode);
        schedule.atoc_code = record.optional_string(Field::AtocCode);
        schedule.applicable_timetable = record.optional_string(Field::ApplicableTimetable);
        Ok(())
    }

    fn read_location(&mut self, record: &Record, number: u64) -> Result<(), CifError> {
        let schedule = self.current_schedule(record, number)?;
        let location = TrainLocation {
            seq: schedule.route.len() as u32,
            id: mandatory_text(record, Field::Tiploc, number)?.to_string(),
            id_suffix: record.optional_string(Field::TiplocInstance),
            working_arr: record.optional_string(Field::Arrival),
            working_dep: record.optional_string(Field::Departure),
            working_pass: record.optional_string(Field::Pass),
            public_arr: read_public_time(record.optional_string(Field::PublicArrival)),
            public_dep: read_public_time(record.optional_string(Field::PublicDeparture)),
            platform: record.optional_string(Field::Platform),
            line: record.optional_string(Field::Line),
            path: record.optional_string(Field::Path),
            activities: read_activities(record.text(Field::Activity).unwrap_or_default()),
            engineering_allowance: record.optional_string(Field::EngineeringAllowance),
            pathing_allowance: record.optional_string(Field::PathingAllowance),
            performance_allowance: record.optional_string(Field::PerformanceAllowance),
        };
        schedule.route.push(location);
        Ok(())
    }

    /// Returns true once the trailer has been read.
    fn read_record(&mut self, line: &str, number: u64) -> Result<bool, CifError> {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            return Ok(false);
        }
        if line.len() != RECORD_LENGTH {
            return Err(CifError {
                error_type: CifErrorType::InvalidRecordLength(line.len()),
                line: number,
                column: 0,
            });
        }
        let record = decode(line).map_err(|x| x.at_line(number))?;

        match record.record_type {
            RecordType::Header => self.read_header(&record),
            RecordType::TiplocInsert | RecordType::TiplocAmend | RecordType::TiplocDelete => {
                self.read_tiploc(&record, number)?
            }
            RecordType::Association => self.read_association(&record, number)?,
            RecordType::BasicSchedule => self.read_basic_schedule(&record, number)?,
            RecordType::BasicScheduleExtra => self.read_extended_schedule(&record, number)?,
            RecordType::LocationOrigin
            | RecordType::LocationIntermediate
            | RecordType::LocationTerminating => self.read_location(&record, number)?,
            RecordType::ChangeEnRoute => {
                debug!("Skipping change en route record on line {}", number)
            }
            RecordType::Trailer => return Ok(true),
        }
        Ok(false)
    }
}

#[async_trait]
impl SlowImporter for CifImporter {
    async fn import<R>(&mut self, reader: R) -> Result<Store, Error>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        // a failed import must not leak half a timetable into the next attempt
        self.builder = StoreBuilder::new();
        let mut lines = reader.lines();

        let mut i: u64 = 0;
        let mut finished = false;

        while let Some(line) = lines.next_line().await? {
            i += 1;
            if i % 100_000 == 0 {
                debug!("Read {} lines of CIF", i);
            }
            let result = self.read_record(&line, i);
            if result.is_err() {
                self.builder = StoreBuilder::new();
            }
            if result? {
                finished = true;
                break;
            }
        }

        let builder = std::mem::take(&mut self.builder);
        if !finished {
            return Err(CifError {
                error_type: CifErrorType::MissingTrailer,
                line: i,
                column: 0,
            }
            .into());
        }

        let store = builder.build();
        info!(
            "Loaded {} schedules, {} associations and {} locations from {} lines of CIF",
            store.schedule_count(),
            store.association_count(),
            store.location_count(),
            i
        );
        Ok(store)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{CodeKind, TimetableStore};

    use tokio::io::BufReader;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// A tiny two-train extract: 1A01 divides at Ashford, the rear portion runs on as 2B02.
    pub const EXTRACT: &str = concat!(
        "HDTPS.UDFROC1.PD2401010101241200DFROC1A       FA010124311224                    \n",
        "TIASHFKY 00123400HASHFORD INTERNATIONAL     12345   0AFKASHFORD INTL            \n",
        "TIDOVERP 00123500HDOVER PRIORY              23456   0DVPDOVER PRIORY            \n",
        "TICANTBW 00123600HCANTERBURY WEST           34567   0CBWCANTERBURY W            \n",
        "BSNA000012401012412311111100 POO1A01              EMU395 140D     S            P\n",
        "BX         SEY                                                                  \n",
        "LOSTPANCI 1000 10005         TB                                                 \n",
        "LIASHFKY  1037 1040      103710404  FL    T                                     \n",
        "LTDOVERP  1120 11201     TF                                                     \n",
        "BSNA000022401012412311111100 POO2B02              EMU395 140D     S            P\n",
        "BX         SEY                                                                  \n",
        "LOASHFKY  1042 10424         TB                                                 \n",
        "LTCANTBW  1102 11021     TF                                                     \n",
        "AANA00001A000022401012412311111100VVSASHFKY   TP                               P\n",
        "ZZ                                                                              \n",
    );

    async fn import(extract: &str) -> Result<Store, Error> {
        let mut importer = CifImporter::new();
        importer.import(BufReader::new(extract.as_bytes())).await
    }

    #[test]
    fn fixture_lines_are_full_width() {
        for line in EXTRACT.lines() {
            assert_eq!(line.len(), RECORD_LENGTH, "{}", line);
        }
    }

    #[tokio::test]
    async fn imports_schedules_locations_and_associations() {
        let store = import(EXTRACT).await.unwrap();
        assert_eq!(store.schedule_count(), 2);
        assert_eq!(store.association_count(), 1);
        assert_eq!(store.location_count(), 3);
        assert_eq!(store.header().unwrap().update_indicator, "F");

        let schedules = store.schedules_by_uid_and_date("A00001", date("2024-03-04"));
        assert_eq!(schedules.len(), 1);
        let schedule = &schedules[0];
        assert_eq!(schedule.stp, StpIndicator::Permanent);
        assert_eq!(schedule.atoc_code.as_deref(), Some("SE"));
        assert_eq!(schedule.timing_load.as_deref(), Some("395"));
        assert_eq!(schedule.days_of_week.to_mask(), "1111100");
        assert!(schedule.operating_characteristics.driver_only_passenger);

        let stops = store.locations_for_schedule_id(schedule.id);
        let route: Vec<_> = stops.iter().map(|x| x.location.id.as_str()).collect();
        assert_eq!(route, vec!["STPANCI", "ASHFKY", "DOVERP"]);
        assert_eq!(stops[1].location.public_arr.as_deref(), Some("1037"));
        assert_eq!(stops[1].location.activities, vec!["T".to_string()]);
        assert_eq!(stops[1].crs.as_deref(), Some("AFK"));
        assert!(stops[0].name.is_none());

        let assocs = store.associations_by_uid("A00002", date("2024-03-04"));
        assert_eq!(assocs.len(), 1);
        assert_eq!(assocs[0].category, Some(AssociationCategory::Divide));
        assert_eq!(assocs[0].main_train_id, "A00001");
        assert!(assocs[0].for_passengers);
    }

    #[tokio::test]
    async fn missing_trailer_commits_nothing() {
        let truncated: String = EXTRACT.split_inclusive('\n').take(5).collect();
        match import(&truncated).await.unwrap_err() {
            Error::CifError(x) => assert!(matches!(x.error_type, CifErrorType::MissingTrailer)),
            other => panic!("unexpected error {}", other),
        }
    }

    #[tokio::test]
    async fn decode_errors_abort_with_line_number() {
        let broken = EXTRACT.replacen("BX         SEY", "QX         SEY", 1);
        let err = import(&broken).await.unwrap_err();
        match err {
            Error::CifError(x) => {
                assert_eq!(x.line, 6);
                assert!(matches!(x.error_type, CifErrorType::InvalidRecordType(_)));
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[tokio::test]
    async fn location_outside_schedule_is_rejected() {
        let orphan = concat!(
            "LOSTPANCI 1000 10005         TB                                                 \n",
            "ZZ                                                                              \n",
        );
        match import(orphan).await.unwrap_err() {
            Error::CifError(x) => assert!(matches!(x.error_type, CifErrorType::OrphanedRecord(_))),
            other => panic!("unexpected error {}", other),
        }
    }

    #[tokio::test]
    async fn tiploc_amend_and_delete_apply_in_order() {
        let extract = concat!(
            "TIASHFKY 00123400HASHFORD INTERNATIONAL     12345   0AFKASHFORD INTL            \n",
            "TIDOVERP 00123500HDOVER PRIORY              23456   0DVPDOVER PRIORY            \n",
            "TAASHFKY 00123400HASHFORD INTL (KENT)       12345   0AFKASHFORD INTL    ASHFD   \n",
            "TDDOVERP                                                                        \n",
            "ZZ                                                                              \n",
        );
        let store = import(extract).await.unwrap();
        assert_eq!(store.location_count(), 1);
        let renamed = store.code_lookup(CodeKind::Crs, "AFK").unwrap();
        assert_eq!(renamed.id, "ASHFD");
        assert_eq!(renamed.name, "ASHFORD INTL (KENT)");
    }

    #[test]
    fn activities_are_split_into_pairs() {
        assert_eq!(read_activities("T -D        "), ["T", "-D"]);
        assert!(read_activities("            ").is_empty());
    }

    #[test]
    fn public_time_of_zero_is_unadvertised() {
        assert_eq!(read_public_time(Some("0000".to_string())), None);
        let advertised = Some("1037".to_string());
        assert_eq!(read_public_time(advertised.clone()), advertised);
    }
}
