// src/utils.rs

use crate::error::QueryError;
use ethers::types::Address;
use ethers::utils::to_checksum;
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

lazy_static! {
    /// Candidate Ethereum addresses embedded in free text.
    pub static ref ADDRESS_RE: Regex = Regex::new(r"0x[a-fA-F0-9]{40}").unwrap();
}

/// Check a candidate address string against EIP-55 rules.
///
/// All-lowercase and all-uppercase hex are accepted; mixed case must match
/// the checksum encoding exactly.
pub fn validate_address(candidate: &str) -> bool {
    if candidate.len() != 42 || !candidate.starts_with("0x") {
        return false;
    }
    let hex_part = &candidate[2..];
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let parsed = match Address::from_str(candidate) {
        Ok(address) => address,
        Err(_) => return false,
    };
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        return to_checksum(&parsed, None) == candidate;
    }
    true
}

/// `0x1234...abcd` display form.
pub fn short_address(address: &str) -> String {
    if address.len() < 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Validate an inbound query before any planning happens: length bounds,
/// then every detected address substring.
pub fn validate_query(query: &str) -> Result<(), QueryError> {
    if query.len() < 3 {
        return Err(QueryError::TooShort);
    }
    if query.len() > 500 {
        return Err(QueryError::TooLong);
    }
    for candidate in ADDRESS_RE.find_iter(query) {
        if !validate_address(candidate.as_str()) {
            return Err(QueryError::MalformedAddress(
                candidate.as_str()[..10].to_string(),
            ));
        }
    }
    Ok(())
}
