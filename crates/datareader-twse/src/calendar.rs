//! Republic of China (Minguo) calendar conversion.

use chrono::{Datelike, NaiveDate};
use datareader_core::{DataError, Result};

/// Offset between the ROC era year and the Gregorian year.
pub const ROC_YEAR_OFFSET: i32 = 1911;

/// Converts a seven-digit ROC date (`YYYMMDD`) to a Gregorian date.
///
/// `"1141031"` is 2025-10-31. Dates that do not exist, such as
/// `"1120229"` (2023 is not a leap year) or month 13, are rejected rather
/// than rolled over.
///
/// # Errors
/// Returns [`DataError::InvalidDate`] quoting the input if it is not seven
/// ASCII digits or names a date that does not exist.
pub fn roc_to_gregorian(roc: &str) -> Result<NaiveDate> {
    if roc.len() != 7 || !roc.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DataError::InvalidDate(format!(
            "{roc:?} is not a 7-digit ROC date"
        )));
    }

    let field = |range: std::ops::Range<usize>| -> Result<u32> {
        roc[range]
            .parse()
            .map_err(|e| DataError::InvalidDate(format!("{roc:?}: {e}")))
    };
    let era_year = field(0..3)?;
    let month = field(3..5)?;
    let day = field(5..7)?;

    let year = i32::try_from(era_year)
        .map_err(|e| DataError::InvalidDate(format!("{roc:?}: {e}")))?
        + ROC_YEAR_OFFSET;
    // chrono refuses out-of-range components instead of normalizing them.
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DataError::InvalidDate(format!("{roc:?} is not a calendar date")))
}

/// Formats a Gregorian date as a seven-digit ROC date.
///
/// # Errors
/// Returns [`DataError::InvalidDate`] if the year falls outside ROC years 1 to 999.
pub fn gregorian_to_roc(date: NaiveDate) -> Result<String> {
    let era_year = date.year() - ROC_YEAR_OFFSET;
    if !(1..=999).contains(&era_year) {
        return Err(DataError::InvalidDate(format!(
            "{date} has no three-digit ROC year"
        )));
    }
    Ok(format!(
        "{era_year:03}{:02}{:02}",
        date.month(),
        date.day()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_to_gregorian() {
        assert_eq!(
            roc_to_gregorian("1141031").unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 31).unwrap()
        );
        assert_eq!(
            roc_to_gregorian("0990101").unwrap(),
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
        );
        assert_eq!(
            roc_to_gregorian("1130229").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_nonexistent_dates_are_rejected() {
        for input in ["1120229", "1131301", "1130000", "1130431"] {
            let err = roc_to_gregorian(input).unwrap_err();
            assert!(matches!(err, DataError::InvalidDate(_)), "{input}");
            assert!(err.to_string().contains(input));
        }
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        for input in ["", "114103", "11410310", "114-1031", "2025-10-31", "１１４１０３１"] {
            assert!(roc_to_gregorian(input).is_err(), "{input}");
        }
    }

    #[test]
    fn test_round_trip() {
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        while date <= end {
            let roc = gregorian_to_roc(date).unwrap();
            assert_eq!(roc.len(), 7);
            assert_eq!(roc_to_gregorian(&roc).unwrap(), date);
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_gregorian_to_roc_range() {
        assert_eq!(
            gregorian_to_roc(NaiveDate::from_ymd_opt(1912, 1, 1).unwrap()).unwrap(),
            "0010101"
        );
        assert!(gregorian_to_roc(NaiveDate::from_ymd_opt(1911, 12, 31).unwrap()).is_err());
        assert!(gregorian_to_roc(NaiveDate::from_ymd_opt(2911, 1, 1).unwrap()).is_err());
    }
}
