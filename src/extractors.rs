//! Pure mappings from raw registry JSON to flat records.
//!
//! Every lookup has a default (empty text, `false`, `0`, `None`) and nested lookups
//! stop at the first missing level. Nothing here performs I/O or panics.

use crate::models::*;
use crate::officer_id::{officer_id_from_link, parse_officer_name};
use serde_json::Value;

fn lookup<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(raw, |value, key| value.get(key))
}

/// Text at `path`; scalars other than strings are rendered, anything else is empty.
fn text(raw: &Value, path: &[&str]) -> String {
    match lookup(raw, path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn opt_text(raw: &Value, path: &[&str]) -> Option<String> {
    let value = text(raw, path);
    (!value.trim().is_empty()).then_some(value)
}

fn flag(raw: &Value, path: &[&str]) -> bool {
    match lookup(raw, path) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn number(raw: &Value, path: &[&str]) -> u32 {
    match lookup(raw, path) {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn array<'a>(raw: &'a Value, path: &[&str]) -> &'a [Value] {
    lookup(raw, path)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// The `items` list of a paged registry response (empty when absent).
pub fn items(raw: &Value) -> &[Value] {
    array(raw, &["items"])
}

// ============ Company profile ============

pub fn extract_company_profile(raw: &Value) -> CompanyProfile {
    CompanyProfile {
        company_number: text(raw, &["company_number"]),
        company_name: text(raw, &["company_name"]),
        company_status: text(raw, &["company_status"]),
        company_type: text(raw, &["type"]),
        jurisdiction: text(raw, &["jurisdiction"]),
        is_foreign_company: flag(raw, &["is_foreign_company"])
            || lookup(raw, &["foreign_company_details"]).is_some_and(Value::is_object),
        date_of_creation: text(raw, &["date_of_creation"]),
        etag: text(raw, &["etag"]),
        external_registration_number: text(raw, &["external_registration_number"]),
        address_line_1: text(raw, &["registered_office_address", "address_line_1"]),
        locality: text(raw, &["registered_office_address", "locality"]),
        postal_code: text(raw, &["registered_office_address", "postal_code"]),
        country: text(raw, &["registered_office_address", "country"]),
        accounts_overdue: flag(raw, &["accounts", "overdue"]),
        has_been_liquidated: flag(raw, &["has_been_liquidated"]),
        has_charges: flag(raw, &["has_charges"]),
        has_insolvency_history: flag(raw, &["has_insolvency_history"]),
        registered_office_is_in_dispute: flag(raw, &["registered_office_is_in_dispute"]),
        undeliverable_registered_office_address: flag(
            raw,
            &["undeliverable_registered_office_address"],
        ),
        links: CompanyLinks {
            officers: opt_text(raw, &["links", "officers"]),
            filing_history: opt_text(raw, &["links", "filing_history"]),
            charges: opt_text(raw, &["links", "charges"]),
            persons_with_significant_control: opt_text(
                raw,
                &["links", "persons_with_significant_control"],
            ),
        },
    }
}

pub fn extract_sic_codes(raw: &Value, company_number: &str) -> Vec<SicCode> {
    array(raw, &["sic_codes"])
        .iter()
        .map(|code| text(code, &[]))
        .filter(|code| !code.is_empty())
        .map(|code| SicCode {
            company_number: company_number.to_string(),
            code,
        })
        .collect()
}

pub fn extract_previous_names(raw: &Value, company_number: &str) -> Vec<PreviousCompanyName> {
    array(raw, &["previous_company_names"])
        .iter()
        .map(|prev| PreviousCompanyName {
            company_number: company_number.to_string(),
            ceased_on: text(prev, &["ceased_on"]),
            effective_from: text(prev, &["effective_from"]),
            name: text(prev, &["name"]),
        })
        .collect()
}

// ============ Officers ============

/// Maps one item of a company's officer list.
///
/// The appointment-list columns stay at their defaults until
/// [`apply_appointment_summary`] fills them in.
pub fn extract_officer(raw: &Value, company_number: &str) -> Officer {
    let officer_name = text(raw, &["name"]);
    let appointments_link = text(raw, &["links", "officer", "appointments"]);

    Officer {
        company_number: company_number.to_string(),
        name: parse_officer_name(&officer_name),
        officer_name,
        officer_role: text(raw, &["officer_role"]),
        nationality: text(raw, &["nationality"]),
        appointed_on: text(raw, &["appointed_on"]),
        dob_month: number(raw, &["date_of_birth", "month"]),
        dob_year: number(raw, &["date_of_birth", "year"]),
        premises: text(raw, &["address", "premises"]),
        address_line_1: text(raw, &["address", "address_line_1"]),
        postal_code: text(raw, &["address", "postal_code"]),
        locality: text(raw, &["address", "locality"]),
        country: text(raw, &["address", "country"]),
        country_of_residence: text(raw, &["country_of_residence"]),
        occupation: text(raw, &["occupation"]),
        officer_id: officer_id_from_link(&appointments_link),
        appointments_link,
        appointment_kind: String::new(),
        is_corporate_officer: false,
        total_company_appointments: 0,
    }
}

/// Maps an officer's appointment history response.
pub fn extract_officer_appointments(raw: &Value, officer_id: &str) -> OfficerAppointmentList {
    OfficerAppointmentList {
        kind: text(raw, &["kind"]),
        is_corporate_officer: flag(raw, &["is_corporate_officer"]),
        total_results: number(raw, &["total_results"]),
        items: items(raw)
            .iter()
            .map(|item| OfficerAppointment {
                officer_id: officer_id.to_string(),
                company_number: text(item, &["appointed_to", "company_number"]),
                company_name: text(item, &["appointed_to", "company_name"]),
                company_status: text(item, &["appointed_to", "company_status"]),
                officer_role: text(item, &["officer_role"]),
                appointed_on: text(item, &["appointed_on"]),
                resigned_on: text(item, &["resigned_on"]),
            })
            .collect(),
    }
}

/// Copies the appointment-list metadata onto the officer row.
pub fn apply_appointment_summary(officer: &mut Officer, list: &OfficerAppointmentList) {
    officer.appointment_kind = list.kind.clone();
    officer.is_corporate_officer = list.is_corporate_officer;
    officer.total_company_appointments = list.total_results;
}

// ============ Persons with significant control ============

pub fn extract_significant_control_person(
    raw: &Value,
    company_number: &str,
) -> SignificantControlPerson {
    SignificantControlPerson {
        company_number: company_number.to_string(),
        name: text(raw, &["name"]),
        title: text(raw, &["name_elements", "title"]),
        surname: text(raw, &["name_elements", "surname"]),
        forename: text(raw, &["name_elements", "forename"]),
        other_forenames: opt_text(raw, &["name_elements", "other_forenames"])
            .unwrap_or_else(|| text(raw, &["name_elements", "middle_name"])),
        dob_month: number(raw, &["date_of_birth", "month"]),
        dob_year: number(raw, &["date_of_birth", "year"]),
        kind: text(raw, &["kind"]),
        notified_on: text(raw, &["notified_on"]),
        nationality: text(raw, &["nationality"]),
        country_of_residence: text(raw, &["country_of_residence"]),
        address_premises: text(raw, &["address", "premises"]),
        address_line_1: text(raw, &["address", "address_line_1"]),
        address_line_2: text(raw, &["address", "address_line_2"]),
        address_locality: text(raw, &["address", "locality"]),
        address_postal_code: text(raw, &["address", "postal_code"]),
        address_country: text(raw, &["address", "country"]),
        etag: text(raw, &["etag"]),
        registration_number: text(raw, &["identification", "registration_number"]),
        legal_form: text(raw, &["identification", "legal_form"]),
        legal_authority: text(raw, &["identification", "legal_authority"]),
        country_registered: text(raw, &["identification", "country_registered"]),
        place_registered: text(raw, &["identification", "place_registered"]),
    }
}

/// Natures of control for one person; empty when the list is absent.
pub fn extract_natures_of_control(raw: &Value, company_number: &str) -> Vec<NatureOfControl> {
    let etag = text(raw, &["etag"]);
    array(raw, &["natures_of_control"])
        .iter()
        .map(|nature| text(nature, &[]))
        .filter(|nature| !nature.is_empty())
        .map(|nature| NatureOfControl {
            company_number: company_number.to_string(),
            etag: etag.clone(),
            nature,
        })
        .collect()
}

// ============ Charges ============

fn charge_id(raw: &Value) -> String {
    opt_text(raw, &["id"]).unwrap_or_else(|| {
        text(raw, &["links", "self"])
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default()
            .to_string()
    })
}

pub fn extract_charge(raw: &Value, company_number: &str) -> ChargeRecord {
    let charge_id = charge_id(raw);

    let persons_entitled = array(raw, &["persons_entitled"])
        .iter()
        .map(|person| ChargePersonEntitled {
            company_number: company_number.to_string(),
            charge_id: charge_id.clone(),
            name: text(person, &["name"]),
        })
        .collect();

    let transactions = array(raw, &["transactions"])
        .iter()
        .map(|tx| ChargeTransaction {
            company_number: company_number.to_string(),
            charge_id: charge_id.clone(),
            filing_type: text(tx, &["filing_type"]),
            transaction_id: text(tx, &["transaction_id"]),
            delivered_on: text(tx, &["delivered_on"]),
            filing_link: text(tx, &["links", "filing"]),
        })
        .collect();

    ChargeRecord {
        charge: Charge {
            company_number: company_number.to_string(),
            charge_id,
            charge_code: text(raw, &["charge_code"]),
            charge_number: number(raw, &["charge_number"]),
            status: text(raw, &["status"]),
            classification_type: text(raw, &["classification", "type"]),
            classification_description: text(raw, &["classification", "description"]),
            created_on: text(raw, &["created_on"]),
            delivered_on: text(raw, &["delivered_on"]),
            satisfied_on: text(raw, &["satisfied_on"]),
            particulars_type: text(raw, &["particulars", "type"]),
            particulars_description: text(raw, &["particulars", "description"]),
            secured_details_description: text(raw, &["secured_details", "description"]),
            etag: text(raw, &["etag"]),
        },
        persons_entitled,
        transactions,
    }
}
