use crate::officer_id::OfficerName;
use serde::Serialize;

// ============ Output tables ============

/// One output table per extracted entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    SicCode,
    PreviousCompanyName,
    Officer,
    OfficerAppointment,
    SignificantControlPerson,
    NatureOfControl,
    Charge,
    ChargePersonEntitled,
    ChargeTransaction,
}

impl EntityKind {
    /// Every table, in the order headers are written at the start of a run.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Company,
        EntityKind::SicCode,
        EntityKind::PreviousCompanyName,
        EntityKind::Officer,
        EntityKind::OfficerAppointment,
        EntityKind::SignificantControlPerson,
        EntityKind::NatureOfControl,
        EntityKind::Charge,
        EntityKind::ChargePersonEntitled,
        EntityKind::ChargeTransaction,
    ];

    /// Name used in run-scoped table/file names.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Company => "companies",
            EntityKind::SicCode => "sic_codes",
            EntityKind::PreviousCompanyName => "previous_company_names",
            EntityKind::Officer => "company_officers",
            EntityKind::OfficerAppointment => "officer_appointments",
            EntityKind::SignificantControlPerson => "persons_significant_control",
            EntityKind::NatureOfControl => "natures_of_control",
            EntityKind::Charge => "charges",
            EntityKind::ChargePersonEntitled => "charge_persons_entitled",
            EntityKind::ChargeTransaction => "charge_transactions",
        }
    }

    /// Column names, in output order.
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Company => &[
                "company_number",
                "company_name",
                "company_status",
                "company_type",
                "jurisdiction",
                "is_foreign_company",
                "date_of_creation",
                "etag",
                "external_registration_number",
                "address_line_1",
                "locality",
                "postal_code",
                "country",
                "accounts_overdue",
                "has_been_liquidated",
                "has_charges",
                "has_insolvency_history",
                "registered_office_is_in_dispute",
                "undeliverable_registered_office_address",
            ],
            EntityKind::SicCode => &["company_number", "sic_codes"],
            EntityKind::PreviousCompanyName => {
                &["company_number", "ceased_on", "effective_from", "name"]
            }
            EntityKind::Officer => &[
                "company_number",
                "officer_surname",
                "officer_forename",
                "officer_other_forenames",
                "officer_name",
                "officer_role",
                "nationality",
                "appointed_on",
                "dob_month",
                "dob_year",
                "premises",
                "address_line_1",
                "postal_code",
                "locality",
                "country",
                "country_of_residence",
                "occupation",
                "appointments",
                "officer_id",
                "appointment_kind",
                "is_corporate_officer",
                "total_company_appointments",
            ],
            EntityKind::OfficerAppointment => &[
                "officer_id",
                "company_number",
                "company_name",
                "company_status",
                "officer_role",
                "appointed_on",
                "resigned_on",
            ],
            EntityKind::SignificantControlPerson => &[
                "company_number",
                "name",
                "title",
                "surname",
                "forename",
                "other_forenames",
                "dob_month",
                "dob_year",
                "kind",
                "notified_on",
                "nationality",
                "country_of_residence",
                "address_premises",
                "address_line_1",
                "address_line_2",
                "address_locality",
                "address_postal_code",
                "address_country",
                "etag",
                "registration_number",
                "legal_form",
                "legal_authority",
                "country_registered",
                "place_registered",
            ],
            EntityKind::NatureOfControl => &["company_number", "etag", "nature_of_control"],
            EntityKind::Charge => &[
                "company_number",
                "charge_id",
                "charge_code",
                "charge_number",
                "status",
                "classification_type",
                "classification_description",
                "created_on",
                "delivered_on",
                "satisfied_on",
                "particulars_type",
                "particulars_description",
                "secured_details_description",
                "etag",
            ],
            EntityKind::ChargePersonEntitled => &["company_number", "charge_id", "name"],
            EntityKind::ChargeTransaction => &[
                "company_number",
                "charge_id",
                "filing_type",
                "transaction_id",
                "delivered_on",
                "filing_link",
            ],
        }
    }
}

/// A flat record that maps onto one row of its entity table.
pub trait Record {
    const KIND: EntityKind;

    /// Cells in the order of `KIND.headers()`.
    fn row(&self) -> Vec<String>;
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

// ============ Company ============

/// Sub-resource links of a company profile. Each one is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyLinks {
    pub officers: Option<String>,
    pub filing_history: Option<String>,
    pub charges: Option<String>,
    pub persons_with_significant_control: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyProfile {
    pub company_number: String,
    pub company_name: String,
    pub company_status: String,
    pub company_type: String,
    pub jurisdiction: String,
    pub is_foreign_company: bool,
    pub date_of_creation: String,
    pub etag: String,
    pub external_registration_number: String,
    pub address_line_1: String,
    pub locality: String,
    pub postal_code: String,
    pub country: String,
    pub accounts_overdue: bool,
    pub has_been_liquidated: bool,
    pub has_charges: bool,
    pub has_insolvency_history: bool,
    pub registered_office_is_in_dispute: bool,
    pub undeliverable_registered_office_address: bool,
    #[serde(skip)]
    pub links: CompanyLinks,
}

impl Record for CompanyProfile {
    const KIND: EntityKind = EntityKind::Company;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            self.company_name.clone(),
            self.company_status.clone(),
            self.company_type.clone(),
            self.jurisdiction.clone(),
            self.is_foreign_company.to_string(),
            self.date_of_creation.clone(),
            self.etag.clone(),
            self.external_registration_number.clone(),
            self.address_line_1.clone(),
            self.locality.clone(),
            self.postal_code.clone(),
            self.country.clone(),
            self.accounts_overdue.to_string(),
            self.has_been_liquidated.to_string(),
            self.has_charges.to_string(),
            self.has_insolvency_history.to_string(),
            self.registered_office_is_in_dispute.to_string(),
            self.undeliverable_registered_office_address.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SicCode {
    pub company_number: String,
    pub code: String,
}

impl Record for SicCode {
    const KIND: EntityKind = EntityKind::SicCode;

    fn row(&self) -> Vec<String> {
        vec![self.company_number.clone(), self.code.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviousCompanyName {
    pub company_number: String,
    pub ceased_on: String,
    pub effective_from: String,
    pub name: String,
}

impl Record for PreviousCompanyName {
    const KIND: EntityKind = EntityKind::PreviousCompanyName;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            self.ceased_on.clone(),
            self.effective_from.clone(),
            self.name.clone(),
        ]
    }
}

// ============ Officers ============

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Officer {
    pub company_number: String,
    #[serde(skip)]
    pub name: OfficerName,
    pub officer_name: String,
    pub officer_role: String,
    pub nationality: String,
    pub appointed_on: String,
    pub dob_month: u32,
    pub dob_year: u32,
    pub premises: String,
    pub address_line_1: String,
    pub postal_code: String,
    pub locality: String,
    pub country: String,
    pub country_of_residence: String,
    pub occupation: String,
    /// Raw appointments link, as returned by the registry.
    pub appointments_link: String,
    /// Derived from `appointments_link`; `None` when the link is empty.
    pub officer_id: Option<String>,
    pub appointment_kind: String,
    pub is_corporate_officer: bool,
    pub total_company_appointments: u32,
}

impl Record for Officer {
    const KIND: EntityKind = EntityKind::Officer;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            opt(&self.name.surname),
            opt(&self.name.forename),
            opt(&self.name.other_forenames),
            self.officer_name.clone(),
            self.officer_role.clone(),
            self.nationality.clone(),
            self.appointed_on.clone(),
            self.dob_month.to_string(),
            self.dob_year.to_string(),
            self.premises.clone(),
            self.address_line_1.clone(),
            self.postal_code.clone(),
            self.locality.clone(),
            self.country.clone(),
            self.country_of_residence.clone(),
            self.occupation.clone(),
            self.appointments_link.clone(),
            opt(&self.officer_id),
            self.appointment_kind.clone(),
            self.is_corporate_officer.to_string(),
            self.total_company_appointments.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfficerAppointment {
    pub officer_id: String,
    pub company_number: String,
    pub company_name: String,
    pub company_status: String,
    pub officer_role: String,
    pub appointed_on: String,
    pub resigned_on: String,
}

impl Record for OfficerAppointment {
    const KIND: EntityKind = EntityKind::OfficerAppointment;

    fn row(&self) -> Vec<String> {
        vec![
            self.officer_id.clone(),
            self.company_number.clone(),
            self.company_name.clone(),
            self.company_status.clone(),
            self.officer_role.clone(),
            self.appointed_on.clone(),
            self.resigned_on.clone(),
        ]
    }
}

/// An officer's appointment history response, flattened.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfficerAppointmentList {
    pub kind: String,
    pub is_corporate_officer: bool,
    pub total_results: u32,
    pub items: Vec<OfficerAppointment>,
}

// ============ Persons with significant control ============

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignificantControlPerson {
    pub company_number: String,
    pub name: String,
    pub title: String,
    pub surname: String,
    pub forename: String,
    pub other_forenames: String,
    pub dob_month: u32,
    pub dob_year: u32,
    pub kind: String,
    pub notified_on: String,
    pub nationality: String,
    pub country_of_residence: String,
    pub address_premises: String,
    pub address_line_1: String,
    pub address_line_2: String,
    pub address_locality: String,
    pub address_postal_code: String,
    pub address_country: String,
    pub etag: String,
    pub registration_number: String,
    pub legal_form: String,
    pub legal_authority: String,
    pub country_registered: String,
    pub place_registered: String,
}

impl Record for SignificantControlPerson {
    const KIND: EntityKind = EntityKind::SignificantControlPerson;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            self.name.clone(),
            self.title.clone(),
            self.surname.clone(),
            self.forename.clone(),
            self.other_forenames.clone(),
            self.dob_month.to_string(),
            self.dob_year.to_string(),
            self.kind.clone(),
            self.notified_on.clone(),
            self.nationality.clone(),
            self.country_of_residence.clone(),
            self.address_premises.clone(),
            self.address_line_1.clone(),
            self.address_line_2.clone(),
            self.address_locality.clone(),
            self.address_postal_code.clone(),
            self.address_country.clone(),
            self.etag.clone(),
            self.registration_number.clone(),
            self.legal_form.clone(),
            self.legal_authority.clone(),
            self.country_registered.clone(),
            self.place_registered.clone(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NatureOfControl {
    pub company_number: String,
    pub etag: String,
    pub nature: String,
}

impl Record for NatureOfControl {
    const KIND: EntityKind = EntityKind::NatureOfControl;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            self.etag.clone(),
            self.nature.clone(),
        ]
    }
}

// ============ Charges ============

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Charge {
    pub company_number: String,
    pub charge_id: String,
    pub charge_code: String,
    pub charge_number: u32,
    pub status: String,
    pub classification_type: String,
    pub classification_description: String,
    pub created_on: String,
    pub delivered_on: String,
    pub satisfied_on: String,
    pub particulars_type: String,
    pub particulars_description: String,
    pub secured_details_description: String,
    pub etag: String,
}

impl Record for Charge {
    const KIND: EntityKind = EntityKind::Charge;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            self.charge_id.clone(),
            self.charge_code.clone(),
            self.charge_number.to_string(),
            self.status.clone(),
            self.classification_type.clone(),
            self.classification_description.clone(),
            self.created_on.clone(),
            self.delivered_on.clone(),
            self.satisfied_on.clone(),
            self.particulars_type.clone(),
            self.particulars_description.clone(),
            self.secured_details_description.clone(),
            self.etag.clone(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargePersonEntitled {
    pub company_number: String,
    pub charge_id: String,
    pub name: String,
}

impl Record for ChargePersonEntitled {
    const KIND: EntityKind = EntityKind::ChargePersonEntitled;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            self.charge_id.clone(),
            self.name.clone(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargeTransaction {
    pub company_number: String,
    pub charge_id: String,
    pub filing_type: String,
    pub transaction_id: String,
    pub delivered_on: String,
    pub filing_link: String,
}

impl Record for ChargeTransaction {
    const KIND: EntityKind = EntityKind::ChargeTransaction;

    fn row(&self) -> Vec<String> {
        vec![
            self.company_number.clone(),
            self.charge_id.clone(),
            self.filing_type.clone(),
            self.transaction_id.clone(),
            self.delivered_on.clone(),
            self.filing_link.clone(),
        ]
    }
}

/// A charge together with its sub-collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargeRecord {
    pub charge: Charge,
    pub persons_entitled: Vec<ChargePersonEntitled>,
    pub transactions: Vec<ChargeTransaction>,
}
