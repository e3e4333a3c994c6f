//! Officer identity derivation.
//!
//! The registry never returns an officer identifier directly. It only appears as a
//! path segment of the officer's appointments link (`/officers/{id}/appointments`),
//! and the officer's name arrives as one `"SURNAME, Forename Other Forenames"` string.

use url::Url;

/// Delimiter and position of the identifier inside the appointments link path.
const PATH_DELIMITER: char = '/';
const OFFICER_ID_SEGMENT: usize = 2;

/// Structured parts of an officer display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfficerName {
    pub surname: Option<String>,
    pub forename: Option<String>,
    pub other_forenames: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Derives the officer identifier from an appointments link.
///
/// Absolute URLs are reduced to their path first. Returns `None` for an empty link
/// or when the identifier segment is missing or blank.
pub fn officer_id_from_link(link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    let path = if link.starts_with("http://") || link.starts_with("https://") {
        Url::parse(link).ok()?.path().to_string()
    } else {
        link.to_string()
    };

    path.split(PATH_DELIMITER)
        .nth(OFFICER_ID_SEGMENT)
        .and_then(non_empty)
}

/// Splits `"Surname, Forename Other Forenames"` into its parts.
///
/// A name without a comma yields all parts `None`; it is never an error.
pub fn parse_officer_name(name: &str) -> OfficerName {
    let Some((surname, given)) = name.split_once(',') else {
        tracing::debug!("Officer name '{}' has no surname separator", name);
        return OfficerName::default();
    };

    let given = given.trim();
    let (forename, other_forenames) = match given.split_once(' ') {
        Some((forename, rest)) => (non_empty(forename), non_empty(rest)),
        None => (non_empty(given), None),
    };

    OfficerName {
        surname: non_empty(surname),
        forename,
        other_forenames,
    }
}
