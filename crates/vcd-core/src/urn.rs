//! URN handling for vCD resource references.
//!
//! vCD hands out references either as bare identifiers or as URNs of the form
//! `urn:<namespace>:<kind>:<id>`. The network API paths only accept the bare
//! identifier.

const URN_SCHEME: &str = "urn";
const VDC_KIND: &str = "vdc";

/// Returns true if `reference` has the shape `urn:<namespace>:<kind>:<id>`
/// with every segment non-empty.
#[must_use]
pub fn is_urn(reference: &str) -> bool {
    let mut segments = reference.split(':');
    let (Some(scheme), Some(namespace), Some(kind), Some(id), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return false;
    };

    scheme == URN_SCHEME && !namespace.is_empty() && !kind.is_empty() && !id.is_empty()
}

/// Convert a VDC reference into the bare identifier used in URL paths.
///
/// `urn:vcloud:vdc:<id>` (any namespace) yields `<id>`. Anything else,
/// including URNs for other resource kinds, is returned unchanged.
#[must_use]
pub fn vdc_urn_to_id(reference: &str) -> &str {
    if !is_urn(reference) {
        return reference;
    }

    let mut segments = reference.splitn(4, ':');
    let _scheme = segments.next();
    let _namespace = segments.next();
    match (segments.next(), segments.next()) {
        (Some(VDC_KIND), Some(id)) => id,
        _ => reference,
    }
}
