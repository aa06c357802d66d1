//! Egyptian National ID parsing and validation
//!
//! A National ID is 14 ASCII digits laid out as:
//!
//! | Position | Meaning                                   |
//! |----------|-------------------------------------------|
//! | 1        | Century (`2` = 1900s, `3` = 2000s)        |
//! | 2-7      | Birth date as `YYMMDD`                    |
//! | 8-9      | Governorate code                          |
//! | 10-13    | Sequence, position 13 carries the gender  |
//! | 14       | Check digit                               |
//!
//! The check digit is only required to be a digit. No checksum is computed
//! over the other 13 digits: the published formula is not confirmed, so this
//! is a known gap rather than something to guess at.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use super::governorate;

/// Number of digits in a National ID
pub const NATIONAL_ID_LENGTH: usize = 14;

/// Validation failures, one per rule so callers can report precisely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("National ID must be a 14-digit numeric string")]
    MalformedInput,
    #[error("Unsupported century digit in National ID")]
    UnsupportedCentury,
    #[error("Invalid birth date in National ID")]
    InvalidBirthDate,
    #[error("Unknown governorate code in National ID")]
    UnknownGovernorate,
}

/// Gender encoded by the parity of position 13
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    fn from_digit(digit: u8) -> Self {
        if digit % 2 == 1 {
            Gender::Male
        } else {
            Gender::Female
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Demographic fields extracted from a valid National ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NationalIdDetails {
    /// Birth date in ISO format (YYYY-MM-DD)
    #[schema(example = "2001-01-01")]
    pub birth_date: NaiveDate,
    pub gender: Gender,
    #[schema(example = "21")]
    pub governorate_code: String,
    #[schema(example = "Giza")]
    pub governorate_name: &'static str,
}

/// A structurally valid National ID: exactly 14 ASCII digits.
///
/// Only [`NationalId::parse`] constructs one, so the accessors can slice
/// without re-checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationalId<'a> {
    raw: &'a str,
}

impl<'a> NationalId<'a> {
    pub fn parse(input: &'a str) -> Result<Self, ValidationError> {
        let bytes = input.as_bytes();
        if bytes.len() != NATIONAL_ID_LENGTH || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(ValidationError::MalformedInput);
        }
        Ok(Self { raw: input })
    }

    pub fn century_digit(&self) -> u8 {
        self.digit(0)
    }

    pub fn governorate_code(&self) -> &'a str {
        &self.raw[7..9]
    }

    fn digit(&self, index: usize) -> u8 {
        self.raw.as_bytes()[index] - b'0'
    }

    fn number(&self, start: usize) -> u32 {
        u32::from(self.digit(start)) * 10 + u32::from(self.digit(start + 1))
    }

    fn birth_date(&self) -> Result<NaiveDate, ValidationError> {
        let century = match self.century_digit() {
            2 => 1900,
            3 => 2000,
            _ => return Err(ValidationError::UnsupportedCentury),
        };

        let year = century + self.number(1) as i32;
        let month = self.number(3);
        let day = self.number(5);

        NaiveDate::from_ymd_opt(year, month, day).ok_or(ValidationError::InvalidBirthDate)
    }

    fn gender(&self) -> Gender {
        Gender::from_digit(self.digit(12))
    }
}

/// Validate a National ID and extract its details.
///
/// Rules are checked in order (shape, century, birth date, governorate) and
/// the first failing rule is reported.
pub fn validate(input: &str) -> Result<NationalIdDetails, ValidationError> {
    let id = NationalId::parse(input)?;
    let birth_date = id.birth_date()?;

    let governorate_code = id.governorate_code();
    let governorate_name =
        governorate::lookup(governorate_code).ok_or(ValidationError::UnknownGovernorate)?;

    Ok(NationalIdDetails {
        birth_date,
        gender: id.gender(),
        governorate_code: governorate_code.to_string(),
        governorate_name,
    })
}
