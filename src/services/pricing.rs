//! Server-side price computation. All amounts are integer cents.

use crate::{
    errors::{IntakeError, IntakeResult},
    models::submission::ServiceType,
};
use serde::Serialize;

/// Files covered by the base price.
pub const INCLUDED_FILES: usize = 10;

/// Surcharge per file beyond [`INCLUDED_FILES`].
pub const EXTRA_FILE_CENTS: u64 = 50;

pub fn base_price_cents(service: ServiceType) -> u64 {
    match service {
        ServiceType::Mixing => 3000,
        ServiceType::Mastering => 1500,
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub service: ServiceType,
    pub file_count: usize,
    pub base_cents: u64,
    pub extra_files: usize,
    pub extra_cents: u64,
    pub total_cents: u64,
}

/// Fails with a validation error when the total does not fit in a `u64`.
pub fn quote(service: ServiceType, file_count: usize) -> IntakeResult<PriceQuote> {
    let base_cents = base_price_cents(service);
    let extra_files = file_count.saturating_sub(INCLUDED_FILES);
    let too_large =
        || IntakeError::Validation(format!("file count {file_count} is too large to price"));
    let extra_cents = u64::try_from(extra_files)
        .ok()
        .and_then(|n| n.checked_mul(EXTRA_FILE_CENTS))
        .ok_or_else(too_large)?;
    let total_cents = base_cents.checked_add(extra_cents).ok_or_else(too_large)?;
    Ok(PriceQuote {
        service,
        file_count,
        base_cents,
        extra_files,
        extra_cents,
        total_cents,
    })
}
