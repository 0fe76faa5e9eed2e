//! Fixed-width CIF record decoding.
//!
//! Every CIF record is 80 columns: a two character record type followed by
//! positional fields. Each record type has a static layout table; decoding walks
//! the table left to right, slicing the line and applying the field's rule.

use chrono::{Datelike, NaiveDate};

use std::fmt;

pub const RECORD_LENGTH: usize = 80;

#[derive(Debug)]
pub enum CifErrorType {
    InvalidRecordType(String),
    InvalidRecordLength(usize),
    NonAsciiRecord,
    InvalidDate(String),
    InvalidInteger(String),
    InvalidStpIndicator(String),
    InvalidDaysOfWeek(String),
    InvalidAssociationCategory(String),
    InvalidAssociationDateIndicator(String),
    InvalidAssociationType(String),
    InvalidOperatingCharacteristic(String),
    MissingField(Field),
    OrphanedRecord(String),
    MissingTrailer,
}

impl fmt::Display for CifErrorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CifErrorType::InvalidRecordType(x) => write!(f, "Invalid Record Type {}", x),
            CifErrorType::InvalidRecordLength(x) => write!(f, "Invalid Record Length {}", x),
            CifErrorType::NonAsciiRecord => write!(f, "Record contains non-ASCII characters"),
            CifErrorType::InvalidDate(x) => write!(f, "Invalid date {}", x),
            CifErrorType::InvalidInteger(x) => write!(f, "Invalid number {}", x),
            CifErrorType::InvalidStpIndicator(x) => write!(f, "Invalid STP indicator {}", x),
            CifErrorType::InvalidDaysOfWeek(x) => write!(f, "Invalid days of week string {}", x),
            CifErrorType::InvalidAssociationCategory(x) => {
                write!(f, "Invalid association category {}", x)
            }
            CifErrorType::InvalidAssociationDateIndicator(x) => {
                write!(f, "Invalid association date indicator {}", x)
            }
            CifErrorType::InvalidAssociationType(x) => write!(f, "Invalid association type {}", x),
            CifErrorType::InvalidOperatingCharacteristic(x) => {
                write!(f, "Invalid operating characteristic {}", x)
            }
            CifErrorType::MissingField(x) => write!(f, "Missing mandatory field {:?}", x),
            CifErrorType::OrphanedRecord(x) => {
                write!(f, "{} record found outside of a schedule", x)
            }
            CifErrorType::MissingTrailer => write!(f, "Extract ended without a ZZ trailer record"),
        }
    }
}

#[derive(Debug)]
pub struct CifError {
    pub error_type: CifErrorType,
    pub line: u64,
    pub column: usize,
}

impl fmt::Display for CifError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Error reading CIF file line {} column {}: {}",
            self.line, self.column, self.error_type
        )
    }
}

/// A decode failure for a single line; the importer adds the line number.
#[derive(Debug)]
pub struct DecodeError {
    pub error_type: CifErrorType,
    pub column: usize,
}

impl DecodeError {
    pub fn at_line(self, line: u64) -> CifError {
        CifError {
            error_type: self.error_type,
            line,
            column: self.column,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordType {
    Header,
    TiplocInsert,
    TiplocAmend,
    TiplocDelete,
    Association,
    BasicSchedule,
    BasicScheduleExtra,
    LocationOrigin,
    LocationIntermediate,
    LocationTerminating,
    ChangeEnRoute,
    Trailer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    // HD
    MainframeIdentity,
    ExtractDate,
    ExtractTime,
    CurrentFileReference,
    LastFileReference,
    UpdateIndicator,
    Version,
    UserStartDate,
    UserEndDate,
    // TI / TA / TD
    Tiploc,
    CapsIdent,
    Nlc,
    NlcCheck,
    TpsDescription,
    Stanox,
    PoMcpCode,
    Crs,
    NlcDescription,
    NewTiploc,
    // AA / BS
    TransactionType,
    MainUid,
    AssocUid,
    AssocDays,
    AssocCategory,
    DateIndicator,
    BaseLocationSuffix,
    AssocLocationSuffix,
    AssocType,
    // BS
    Uid,
    DateRunsFrom,
    DateRunsTo,
    DaysRun,
    BankHolidayRunning,
    TrainStatus,
    TrainCategory,
    SignallingId,
    Headcode,
    BusinessSector,
    PowerType,
    TimingLoad,
    Speed,
    OperatingCharacteristics,
    SeatingClass,
    Sleepers,
    Reservations,
    Catering,
    Branding,
    StpIndicator,
    // BX
    TractionClass,
    UicCode,
    AtocCode,
    ApplicableTimetable,
    // LO / LI / LT
    TiplocInstance,
    Arrival,
    Departure,
    Pass,
    PublicArrival,
    PublicDeparture,
    Platform,
    Line,
    Path,
    Activity,
    EngineeringAllowance,
    PathingAllowance,
    PerformanceAllowance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    Raw,
    Trimmed,
    TrimmedOrAbsent,
    Date,
    IntegerOrAbsent,
    Discard,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub width: usize,
    pub rule: Rule,
    pub tag: Option<Field>,
}

const fn tagged(width: usize, rule: Rule, tag: Field) -> FieldSpec {
    FieldSpec {
        width,
        rule,
        tag: Some(tag),
    }
}

const fn spare(width: usize) -> FieldSpec {
    FieldSpec {
        width,
        rule: Rule::Discard,
        tag: None,
    }
}

use Field::*;
use Rule::*;

static HEADER_LAYOUT: [FieldSpec; 10] = [
    tagged(20, Raw, MainframeIdentity),
    tagged(6, Date, ExtractDate),
    tagged(4, Trimmed, ExtractTime),
    tagged(7, Raw, CurrentFileReference),
    tagged(7, Raw, LastFileReference),
    tagged(1, Raw, UpdateIndicator),
    tagged(1, Raw, Version),
    tagged(6, Date, UserStartDate),
    tagged(6, Date, UserEndDate),
    spare(20),
];

static TIPLOC_LAYOUT: [FieldSpec; 10] = [
    tagged(7, Trimmed, Tiploc),
    tagged(2, IntegerOrAbsent, CapsIdent),
    tagged(6, IntegerOrAbsent, Nlc),
    tagged(1, Raw, NlcCheck),
    tagged(26, Trimmed, TpsDescription),
    tagged(5, Raw, Stanox),
    tagged(4, IntegerOrAbsent, PoMcpCode),
    tagged(3, TrimmedOrAbsent, Crs),
    tagged(16, Trimmed, NlcDescription),
    spare(8),
];

static TIPLOC_AMEND_LAYOUT: [FieldSpec; 11] = [
    tagged(7, Trimmed, Tiploc),
    tagged(2, IntegerOrAbsent, CapsIdent),
    tagged(6, IntegerOrAbsent, Nlc),
    tagged(1, Raw, NlcCheck),
    tagged(26, Trimmed, TpsDescription),
    tagged(5, Raw, Stanox),
    tagged(4, IntegerOrAbsent, PoMcpCode),
    tagged(3, TrimmedOrAbsent, Crs),
    tagged(16, Trimmed, NlcDescription),
    tagged(7, TrimmedOrAbsent, NewTiploc),
    spare(1),
];

static TIPLOC_DELETE_LAYOUT: [FieldSpec; 2] = [tagged(7, Trimmed, Tiploc), spare(71)];

static ASSOCIATION_LAYOUT: [FieldSpec; 15] = [
    tagged(1, Raw, TransactionType),
    tagged(6, Raw, MainUid),
    tagged(6, Raw, AssocUid),
    tagged(6, Date, DateRunsFrom),
    tagged(6, Date, DateRunsTo),
    tagged(7, Raw, AssocDays),
    tagged(2, TrimmedOrAbsent, AssocCategory),
    tagged(1, Raw, DateIndicator),
    tagged(7, Trimmed, Tiploc),
    tagged(1, IntegerOrAbsent, BaseLocationSuffix),
    tagged(1, IntegerOrAbsent, AssocLocationSuffix),
    spare(1), // diagram type, always T
    tagged(1, Raw, AssocType),
    spare(31),
    tagged(1, Raw, StpIndicator),
];

static BASIC_SCHEDULE_LAYOUT: [FieldSpec; 25] = [
    tagged(1, Raw, TransactionType),
    tagged(6, Raw, Uid),
    tagged(6, Date, DateRunsFrom),
    tagged(6, Date, DateRunsTo),
    tagged(7, Raw, DaysRun),
    tagged(1, TrimmedOrAbsent, BankHolidayRunning),
    tagged(1, TrimmedOrAbsent, TrainStatus),
    tagged(2, TrimmedOrAbsent, TrainCategory),
    tagged(4, TrimmedOrAbsent, SignallingId),
    tagged(4, TrimmedOrAbsent, Headcode),
    spare(1), // course indicator
    spare(8), // train service code
    tagged(1, TrimmedOrAbsent, BusinessSector),
    tagged(3, TrimmedOrAbsent, PowerType),
    tagged(4, TrimmedOrAbsent, TimingLoad),
    tagged(3, TrimmedOrAbsent, Speed),
    tagged(6, Raw, OperatingCharacteristics),
    tagged(1, TrimmedOrAbsent, SeatingClass),
    tagged(1, TrimmedOrAbsent, Sleepers),
    tagged(1, TrimmedOrAbsent, Reservations),
    spare(1), // connection indicator
    tagged(4, TrimmedOrAbsent, Catering),
    tagged(4, TrimmedOrAbsent, Branding),
    spare(1),
    tagged(1, Raw, StpIndicator),
];

static BASIC_SCHEDULE_EXTRA_LAYOUT: [FieldSpec; 7] = [
    tagged(4, TrimmedOrAbsent, TractionClass),
    tagged(5, TrimmedOrAbsent, UicCode),
    tagged(2, TrimmedOrAbsent, AtocCode),
    tagged(1, TrimmedOrAbsent, ApplicableTimetable),
    spare(8), // retail service id
    spare(1), // data source
    spare(57),
];

static LOCATION_ORIGIN_LAYOUT: [FieldSpec; 11] = [
    tagged(7, Trimmed, Tiploc),
    tagged(1, TrimmedOrAbsent, TiplocInstance),
    tagged(5, TrimmedOrAbsent, Departure),
    tagged(4, TrimmedOrAbsent, PublicDeparture),
    tagged(3, TrimmedOrAbsent, Platform),
    tagged(3, TrimmedOrAbsent, Line),
    tagged(2, TrimmedOrAbsent, EngineeringAllowance),
    tagged(2, TrimmedOrAbsent, PathingAllowance),
    tagged(12, Raw, Activity),
    tagged(2, TrimmedOrAbsent, PerformanceAllowance),
    spare(37),
];

static LOCATION_INTERMEDIATE_LAYOUT: [FieldSpec; 15] = [
    tagged(7, Trimmed, Tiploc),
    tagged(1, TrimmedOrAbsent, TiplocInstance),
    tagged(5, TrimmedOrAbsent, Arrival),
    tagged(5, TrimmedOrAbsent, Departure),
    tagged(5, TrimmedOrAbsent, Pass),
    tagged(4, TrimmedOrAbsent, PublicArrival),
    tagged(4, TrimmedOrAbsent, PublicDeparture),
    tagged(3, TrimmedOrAbsent, Platform),
    tagged(3, TrimmedOrAbsent, Line),
    tagged(3, TrimmedOrAbsent, Path),
    tagged(12, Raw, Activity),
    tagged(2, TrimmedOrAbsent, EngineeringAllowance),
    tagged(2, TrimmedOrAbsent, PathingAllowance),
    tagged(2, TrimmedOrAbsent, PerformanceAllowance),
    spare(20),
];

static LOCATION_TERMINATING_LAYOUT: [FieldSpec; 8] = [
    tagged(7, Trimmed, Tiploc),
    tagged(1, TrimmedOrAbsent, TiplocInstance),
    tagged(5, TrimmedOrAbsent, Arrival),
    tagged(4, TrimmedOrAbsent, PublicArrival),
    tagged(3, TrimmedOrAbsent, Platform),
    tagged(3, TrimmedOrAbsent, Path),
    tagged(12, Raw, Activity),
    spare(43),
];

// change en route detail is not carried into the store
static CHANGE_EN_ROUTE_LAYOUT: [FieldSpec; 1] = [spare(78)];

static TRAILER_LAYOUT: [FieldSpec; 1] = [spare(78)];

impl RecordType {
    pub fn from_tag(tag: &str) -> Option<RecordType> {
        Some(match tag {
            "HD" => RecordType::Header,
            "TI" => RecordType::TiplocInsert,
            "TA" => RecordType::TiplocAmend,
            "TD" => RecordType::TiplocDelete,
            "AA" => RecordType::Association,
            "BS" => RecordType::BasicSchedule,
            "BX" => RecordType::BasicScheduleExtra,
            "LO" => RecordType::LocationOrigin,
            "LI" => RecordType::LocationIntermediate,
            "LT" => RecordType::LocationTerminating,
            "CR" => RecordType::ChangeEnRoute,
            "ZZ" => RecordType::Trailer,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            RecordType::Header => "HD",
            RecordType::TiplocInsert => "TI",
            RecordType::TiplocAmend => "TA",
            RecordType::TiplocDelete => "TD",
            RecordType::Association => "AA",
            RecordType::BasicSchedule => "BS",
            RecordType::BasicScheduleExtra => "BX",
            RecordType::LocationOrigin => "LO",
            RecordType::LocationIntermediate => "LI",
            RecordType::LocationTerminating => "LT",
            RecordType::ChangeEnRoute => "CR",
            RecordType::Trailer => "ZZ",
        }
    }

    pub fn layout(self) -> &'static [FieldSpec] {
        match self {
            RecordType::Header => &HEADER_LAYOUT,
            RecordType::TiplocInsert => &TIPLOC_LAYOUT,
            RecordType::TiplocAmend => &TIPLOC_AMEND_LAYOUT,
            RecordType::TiplocDelete => &TIPLOC_DELETE_LAYOUT,
            RecordType::Association => &ASSOCIATION_LAYOUT,
            RecordType::BasicSchedule => &BASIC_SCHEDULE_LAYOUT,
            RecordType::BasicScheduleExtra => &BASIC_SCHEDULE_EXTRA_LAYOUT,
            RecordType::LocationOrigin => &LOCATION_ORIGIN_LAYOUT,
            RecordType::LocationIntermediate => &LOCATION_INTERMEDIATE_LAYOUT,
            RecordType::LocationTerminating => &LOCATION_TERMINATING_LAYOUT,
            RecordType::ChangeEnRoute => &CHANGE_EN_ROUTE_LAYOUT,
            RecordType::Trailer => &TRAILER_LAYOUT,
        }
    }

    /// Zero-based column at which `field` starts, for error reporting.
    pub fn column(self, field: Field) -> usize {
        let mut column = 2;
        for spec in self.layout() {
            if spec.tag == Some(field) {
                return column;
            }
            column += spec.width;
        }
        0
    }

    /// Columns covered by the type prefix plus every field of the layout.
    pub fn width(self) -> usize {
        2 + self.layout().iter().map(|spec| spec.width).sum::<usize>()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Date(NaiveDate),
    /// The number and the columns it was read from, padding included.
    Integer(u32, String),
    Absent,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Text(x) => write!(f, "{}", x),
            Value::Date(x) => write!(f, "{}", x.format("%Y-%m-%d")),
            Value::Integer(x, _) => write!(f, "{}", x),
            Value::Absent => Ok(()),
        }
    }
}

/// A decoded line: its type and the tagged values in layout order.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub record_type: RecordType,
    pub fields: Vec<(Field, Value)>,
}

static ABSENT: Value = Value::Absent;

impl Record {
    pub fn get(&self, field: Field) -> &Value {
        self.fields
            .iter()
            .find(|(tag, _)| *tag == field)
            .map(|(_, value)| value)
            .unwrap_or(&ABSENT)
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match self.get(field) {
            Value::Text(x) => Some(x.as_str()),
            _ => None,
        }
    }

    pub fn optional_string(&self, field: Field) -> Option<String> {
        self.text(field).map(|x| x.to_string())
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        match self.get(field) {
            Value::Date(x) => Some(*x),
            _ => None,
        }
    }

    pub fn integer(&self, field: Field) -> Option<u32> {
        match self.get(field) {
            Value::Integer(x, _) => Some(*x),
            _ => None,
        }
    }
}

fn read_date(slice: &str) -> Result<NaiveDate, CifErrorType> {
    // 999999 marks an open-ended validity period
    if slice == "999999" {
        return Ok(NaiveDate::MAX);
    }
    if slice.len() != 6 || !slice.chars().all(|x| x.is_ascii_digit()) {
        return Err(CifErrorType::InvalidDate(slice.to_string()));
    }
    let number = |range: std::ops::Range<usize>| slice[range].parse::<u32>().unwrap_or_default();
    NaiveDate::from_ymd_opt(2000 + number(0..2) as i32, number(2..4), number(4..6))
        .ok_or_else(|| CifErrorType::InvalidDate(slice.to_string()))
}

fn read_integer(slice: &str) -> Result<Value, CifErrorType> {
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return Ok(Value::Absent);
    }
    // str::parse would also take a leading sign
    if !trimmed.bytes().all(|x| x.is_ascii_digit()) {
        return Err(CifErrorType::InvalidInteger(slice.to_string()));
    }
    match trimmed.parse::<u32>() {
        Ok(x) => Ok(Value::Integer(x, slice.to_string())),
        Err(_) => Err(CifErrorType::InvalidInteger(slice.to_string())),
    }
}

fn read_field(slice: &str, rule: Rule) -> Result<Value, CifErrorType> {
    Ok(match rule {
        Rule::Raw => Value::Text(slice.to_string()),
        Rule::Trimmed => Value::Text(slice.trim_end().to_string()),
        Rule::TrimmedOrAbsent => match slice.trim_end() {
            "" => Value::Absent,
            x => Value::Text(x.to_string()),
        },
        Rule::Date => Value::Date(read_date(slice)?),
        Rule::IntegerOrAbsent => read_integer(slice)?,
        Rule::Discard => Value::Absent,
    })
}

/// Decodes one record according to the layout of its type.
pub fn decode(line: &str) -> Result<Record, DecodeError> {
    if !line.is_ascii() {
        return Err(DecodeError {
            error_type: CifErrorType::NonAsciiRecord,
            column: 0,
        });
    }
    let record_type = line
        .get(..2)
        .and_then(RecordType::from_tag)
        .ok_or_else(|| DecodeError {
            error_type: CifErrorType::InvalidRecordType(line.chars().take(2).collect()),
            column: 0,
        })?;
    if line.len() < record_type.width() {
        return Err(DecodeError {
            error_type: CifErrorType::InvalidRecordLength(line.len()),
            column: line.len(),
        });
    }

    let mut fields = Vec::new();
    let mut column = 2;
    for spec in record_type.layout() {
        let slice = &line[column..column + spec.width];
        if let Some(tag) = spec.tag {
            if spec.rule != Rule::Discard {
                let value = read_field(slice, spec.rule)
                    .map_err(|error_type| DecodeError { error_type, column })?;
                fields.push((tag, value));
            }
        }
        column += spec.width;
    }

    Ok(Record { record_type, fields })
}

fn write_field(value: &Value, spec: &FieldSpec) -> String {
    let width = spec.width;
    match (value, spec.rule) {
        (Value::Date(x), _) if *x == NaiveDate::MAX => "999999".to_string(),
        (Value::Date(x), _) => format!("{:02}{:02}{:02}", x.year() - 2000, x.month(), x.day()),
        (Value::Integer(_, raw), _) if raw.len() == width => raw.clone(),
        (Value::Integer(x, _), _) => format!("{:0width$}", x, width = width),
        (Value::Text(x), _) => format!("{:<width$}", x, width = width),
        (Value::Absent, _) => " ".repeat(width),
    }
}

/// Renders a record back into its padded 80 column form. Discarded fields come
/// back as spaces.
pub fn encode(record: &Record) -> String {
    let mut line = String::with_capacity(RECORD_LENGTH);
    line.push_str(record.record_type.tag());
    for spec in record.record_type.layout() {
        match spec.tag {
            Some(tag) if spec.rule != Rule::Discard => {
                line.push_str(&write_field(record.get(tag), spec))
            }
            _ => line.push_str(&" ".repeat(spec.width)),
        }
    }
    line
}
