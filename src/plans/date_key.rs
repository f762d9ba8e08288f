//! Day-plan keys are `YYYY-MM-DD`. Zero padding makes string order match
//! calendar order, so range queries compare the raw strings.

use time::{macros::format_description, Date};

use crate::error::{ServiceError, ServiceResult};

pub fn parse(raw: &str) -> ServiceResult<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| ServiceError::bad_request(format!("Invalid date {raw:?}, expected YYYY-MM-DD")))
}

pub fn format(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

/// Validates and canonicalizes a key received from a client.
pub fn normalize(raw: &str) -> ServiceResult<String> {
    parse(raw).map(format)
}
