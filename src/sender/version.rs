use super::client::TransportResponse;
use crate::domain::FaultKind;

/// Response header carrying the service's transformer API version.
pub const API_VERSION_HEADER: &str = "apiVersion";

/// The only transformer API version this client speaks.
pub const SUPPORTED_TRANSFORMER_API_VERSION: u32 = 2;

/// Checks the API version of a 2xx response.
///
/// Missing or different versions mean the wire contract is broken.
pub fn check_api_version(response: &TransportResponse) -> Result<(), FaultKind> {
    let Some(raw) = response.header(API_VERSION_HEADER) else {
        return Err(FaultKind::MissingApiVersion);
    };
    match raw.trim().parse::<u32>() {
        Ok(SUPPORTED_TRANSFORMER_API_VERSION) => Ok(()),
        _ => Err(FaultKind::IncompatibleApiVersion {
            expected: SUPPORTED_TRANSFORMER_API_VERSION,
            found: raw.to_string(),
        }),
    }
}
