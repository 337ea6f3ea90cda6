//! LAN-discovery service naming.
//!
//! Scanner apps find the host by browsing for `_http._tcp` services whose
//! instance name starts with `"<product> server - "`, then match the numeric
//! suffix derived from the host name.  Both sides must derive the suffix with
//! the identical algorithm, so it lives here as a pure function: concatenate
//! the numeric code of every host-name character, then keep the first ten
//! digits.

/// Product name used in the advertised service instance name.
pub const PRODUCT_NAME: &str = "ScanBridge";

/// Derives the numeric discovery suffix from a host name.
///
/// Character codes are UTF-16 code units, matching what the existing mobile
/// clients compute; for the ASCII host names seen in practice this is simply
/// the byte value of each character.
pub fn derive_service_suffix(hostname: &str) -> String {
    hostname
        .encode_utf16()
        .map(|unit| unit.to_string())
        .collect::<String>()
        .chars()
        .take(10)
        .collect()
}

/// Builds the full advertised instance name, e.g.
/// `"ScanBridge server - 6869837584"`.
pub fn service_instance_name(hostname: &str) -> String {
    format!("{PRODUCT_NAME} server - {}", derive_service_suffix(hostname))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
