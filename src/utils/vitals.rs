//! Typed reads of the vital-event fields the resolver heuristics need.
//!
//! Every accessor separates "not recorded" (`Ok(None)`) from "recorded but
//! unparsable" (`Err(MetricEvaluation)`), so callers can fail open explicitly.
use chrono::NaiveDate;

use crate::utils::errors::{LinkageError, LinkageResult};
use crate::utils::record::{birth, death, is_missing, marriage, Record};
use crate::utils::types::RecordKind;

fn parse_number(record: &Record, value: &str, what: &str) -> LinkageResult<i32> {
    value.trim().parse::<i32>().map_err(|_| {
        LinkageError::MetricEvaluation(format!(
            "unparsable {what} {value:?} in {} record {}",
            record.kind(),
            record.id()
        ))
    })
}

fn optional_number(record: &Record, index: usize, what: &str) -> LinkageResult<Option<i32>> {
    match record.present(index) {
        Some(value) => parse_number(record, value, what).map(Some),
        None => Ok(None),
    }
}

/// Splits a `dd/mm/yyyy` date into parts, each `None` where masked with dashes.
fn split_dmy(record: &Record, value: &str) -> LinkageResult<(Option<i32>, Option<i32>, Option<i32>)> {
    let parts: Vec<&str> = value.trim().split('/').collect();
    if parts.len() != 3 {
        return Err(LinkageError::MetricEvaluation(format!(
            "malformed date {value:?} in {} record {}",
            record.kind(),
            record.id()
        )));
    }
    let part = |s: &str, what: &str| -> LinkageResult<Option<i32>> {
        if is_missing(s) || s.chars().all(|c| c == '-') {
            Ok(None)
        } else {
            parse_number(record, s, what).map(Some)
        }
    };
    Ok((part(parts[0], "day")?, part(parts[1], "month")?, part(parts[2], "year")?))
}

/// Year of birth of the record's subject.
pub fn birth_year(record: &Record) -> LinkageResult<Option<i32>> {
    match record.kind() {
        RecordKind::Birth => optional_number(record, birth::BIRTH_YEAR, "birth year"),
        RecordKind::Death => match record.present(death::DATE_OF_BIRTH) {
            Some(dob) => Ok(split_dmy(record, dob)?.2),
            None => Ok(None),
        },
        RecordKind::Marriage => Ok(None),
    }
}

/// Full birth date; an unknown day defaults to the first of the month.
/// Needs at least year and month.
pub fn birth_date(record: &Record) -> LinkageResult<Option<NaiveDate>> {
    let (day, month, year) = match record.kind() {
        RecordKind::Birth => (
            optional_number(record, birth::BIRTH_DAY, "birth day")?,
            optional_number(record, birth::BIRTH_MONTH, "birth month")?,
            optional_number(record, birth::BIRTH_YEAR, "birth year")?,
        ),
        RecordKind::Death => match record.present(death::DATE_OF_BIRTH) {
            Some(dob) => split_dmy(record, dob)?,
            None => return Ok(None),
        },
        RecordKind::Marriage => return Ok(None),
    };
    let (Some(year), Some(month)) = (year, month) else {
        return Ok(None);
    };
    let day = day.unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .map(Some)
        .ok_or_else(|| {
            LinkageError::MetricEvaluation(format!(
                "impossible date {day}/{month}/{year} in {} record {}",
                record.kind(),
                record.id()
            ))
        })
}

/// Age of the subject at death, from the recorded age or from the death and
/// birth years.
pub fn age_at_death(record: &Record) -> LinkageResult<Option<i32>> {
    if record.kind() != RecordKind::Death {
        return Ok(None);
    }
    if let Some(age) = optional_number(record, death::AGE_AT_DEATH, "age at death")? {
        return Ok(Some(age));
    }
    let death_year = optional_number(record, death::DEATH_YEAR, "death year")?;
    match (death_year, birth_year(record)?) {
        (Some(died), Some(born)) => Ok(Some(died - born)),
        _ => Ok(None),
    }
}

/// Place associated with the subject: birth address, place of death or place
/// of marriage.
pub fn place(record: &Record) -> Option<&str> {
    match record.kind() {
        RecordKind::Birth => record.present(birth::BIRTH_ADDRESS),
        RecordKind::Death => record.present(death::PLACE_OF_DEATH),
        RecordKind::Marriage => record.present(marriage::PLACE_OF_MARRIAGE),
    }
}

/// Year of the (parents') marriage where the layout carries one.
pub fn marriage_year(record: &Record) -> LinkageResult<Option<i32>> {
    match record.kind().marriage_date_fields() {
        Some([_, _, year]) => optional_number(record, year, "marriage year"),
        None => Ok(None),
    }
}
