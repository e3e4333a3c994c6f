//! Per-company retrieval workflow.
//!
//! 1. Fetch the company profile (fatal for this company on failure)
//! 2. Emit profile, SIC codes and previous names
//! 3. Officers, each officer's appointment history
//! 4. Persons with significant control and their natures of control
//! 5. Charges with persons entitled and transactions
//!
//! Steps 3-5 depend only on the profile and run concurrently. A failure or skip inside
//! one of them is recorded in the [`CompanyReport`] and never aborts its siblings.

use crate::errors::{AppError, ResultExt};
use crate::extractors::{
    apply_appointment_summary, extract_charge, extract_company_profile, extract_natures_of_control,
    extract_officer, extract_officer_appointments, extract_previous_names,
    extract_significant_control_person, extract_sic_codes, items,
};
use crate::links;
use crate::models::{ChargeRecord, CompanyProfile, OfficerAppointment};
use crate::registry_client::RegistryClient;
use crate::sink::{emit, RecordSink};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Page size requested from list endpoints.
const PAGE_SIZE: usize = 100;
/// Hard stop for list pagination.
const MAX_PAGES: usize = 50;

/// Why an entity or sub-resource was not processed. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Skip {
    /// The parent payload carries no link for this sub-resource.
    MissingLink { link: String },
    /// An officer list item without a name, by position in the list.
    UnnamedOfficer { position: usize },
    /// The officer's appointments link yields no identifier.
    MissingOfficerId { officer_name: String },
    /// Disabled by [`RetrievalOptions`].
    Disabled { section: String },
}

/// Outcome of one entity or sub-resource that did not produce rows.
#[derive(Debug, Clone)]
pub enum StepError {
    Skip(Skip),
    Failure(AppError),
}

impl From<AppError> for StepError {
    fn from(err: AppError) -> Self {
        StepError::Failure(err)
    }
}

type StepResult<T> = Result<T, StepError>;

/// Which optional sub-resources are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalOptions {
    pub include_appointments: bool,
    pub include_charges: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            include_appointments: true,
            include_charges: true,
        }
    }
}

/// Rows emitted per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub sic_codes: usize,
    pub previous_names: usize,
    pub officers: usize,
    pub appointments: usize,
    pub significant_control_persons: usize,
    pub natures_of_control: usize,
    pub charges: usize,
    pub charge_persons_entitled: usize,
    pub charge_transactions: usize,
}

impl RowCounts {
    fn merge(&mut self, other: &RowCounts) {
        self.sic_codes += other.sic_codes;
        self.previous_names += other.previous_names;
        self.officers += other.officers;
        self.appointments += other.appointments;
        self.significant_control_persons += other.significant_control_persons;
        self.natures_of_control += other.natures_of_control;
        self.charges += other.charges;
        self.charge_persons_entitled += other.charge_persons_entitled;
        self.charge_transactions += other.charge_transactions;
    }
}

/// What a single company's pipeline produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyReport {
    pub company_number: String,
    pub company_name: String,
    pub rows: RowCounts,
    pub skipped: Vec<Skip>,
    /// Isolated sub-resource failures; the company's other rows were still written.
    pub failures: Vec<String>,
}

impl CompanyReport {
    /// No sub-resource failed (skips are fine).
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn absorb(&mut self, section: Section) {
        self.rows.merge(&section.rows);
        self.skipped.extend(section.skipped);
        self.failures.extend(section.failures);
    }
}

#[derive(Debug, Default)]
struct Section {
    rows: RowCounts,
    skipped: Vec<Skip>,
    failures: Vec<String>,
}

impl Section {
    fn record(&mut self, company_number: &str, outcome: StepError) {
        match outcome {
            StepError::Skip(skip) => {
                tracing::debug!("Company {}: skipped {:?}", company_number, skip);
                self.skipped.push(skip);
            }
            StepError::Failure(err) => {
                tracing::warn!("Company {}: {}", company_number, err);
                self.failures.push(err.to_string());
            }
        }
    }
}

/// Rows produced for one officer, plus whatever kept its history from being fetched.
struct OfficerOutcome {
    appointments: usize,
    note: Option<StepError>,
}

/// Drives the retrieval of one company at a time.
#[derive(Clone)]
pub struct CompanyRetriever {
    client: RegistryClient,
    options: RetrievalOptions,
}

impl CompanyRetriever {
    pub fn new(client: RegistryClient) -> Self {
        Self {
            client,
            options: RetrievalOptions::default(),
        }
    }

    pub fn with_options(client: RegistryClient, options: RetrievalOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    /// Retrieves one company and appends its rows to `sink`.
    ///
    /// # Returns
    ///
    /// * `Ok(CompanyReport)` - The profile was fetched; isolated sub-resource problems
    ///   are listed in the report.
    /// * `Err(AppError)` - The profile could not be fetched or the sink rejected a row.
    pub async fn retrieve(
        &self,
        company_number: &str,
        sink: &dyn RecordSink,
    ) -> Result<CompanyReport, AppError> {
        tracing::info!("Retrieving company {}", company_number);

        let raw = self
            .client
            .get_company(company_number)
            .await
            .with_context(|| format!("Failed to fetch profile for company {}", company_number))?;

        let mut profile = extract_company_profile(&raw);
        if profile.company_number.is_empty() {
            profile.company_number = company_number.to_string();
        }
        let number = profile.company_number.clone();

        let mut report = CompanyReport {
            company_number: number.clone(),
            company_name: profile.company_name.clone(),
            ..Default::default()
        };

        emit(sink, &profile)?;

        for sic in extract_sic_codes(&raw, &number) {
            emit(sink, &sic)?;
            report.rows.sic_codes += 1;
        }
        for prev in extract_previous_names(&raw, &number) {
            emit(sink, &prev)?;
            report.rows.previous_names += 1;
        }

        let (officers, persons, charges) = tokio::join!(
            self.officer_section(&profile, sink),
            self.significant_control_section(&profile, sink),
            self.charge_section(&profile, sink),
        );
        report.absorb(officers);
        report.absorb(persons);
        report.absorb(charges);

        tracing::info!(
            "Company {} done: {} officers, {} appointments, {} PSCs, {} charges ({} skipped, {} failed)",
            number,
            report.rows.officers,
            report.rows.appointments,
            report.rows.significant_control_persons,
            report.rows.charges,
            report.skipped.len(),
            report.failures.len()
        );

        Ok(report)
    }

    fn resolve(&self, link: Option<&str>, name: &str) -> StepResult<Url> {
        link.and_then(|l| links::resolve_raw(self.client.base_url(), l))
            .ok_or_else(|| {
                StepError::Skip(Skip::MissingLink {
                    link: name.to_string(),
                })
            })
    }

    /// Fetches a list resource, following `start_index` pagination until
    /// `total_results` items are collected. The first page is returned with its
    /// `items` replaced by the full list.
    async fn fetch_list(&self, url: &Url) -> Result<Value, AppError> {
        let mut first = self
            .client
            .get(url, &[("items_per_page", PAGE_SIZE.to_string())])
            .await?;

        let total = first
            .get("total_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        let mut collected: Vec<Value> = items(&first).to_vec();

        let mut pages = 1;
        while collected.len() < total && pages < MAX_PAGES {
            let page = self
                .client
                .get(
                    url,
                    &[
                        ("items_per_page", PAGE_SIZE.to_string()),
                        ("start_index", collected.len().to_string()),
                    ],
                )
                .await?;
            let page_items = items(&page);
            if page_items.is_empty() {
                break;
            }
            collected.extend(page_items.iter().cloned());
            pages += 1;
        }

        if let Some(obj) = first.as_object_mut() {
            obj.insert("items".to_string(), Value::Array(collected));
        }
        Ok(first)
    }

    async fn fetch_linked(&self, link: Option<&str>, name: &str) -> StepResult<Value> {
        let url = self.resolve(link, name)?;
        let raw = self
            .fetch_list(&url)
            .await
            .with_context(|| format!("Failed to fetch {}", name))?;
        Ok(raw)
    }

    // ============ Officers ============

    async fn officer_section(&self, profile: &CompanyProfile, sink: &dyn RecordSink) -> Section {
        let number = &profile.company_number;
        let mut section = Section::default();

        let raw = match self
            .fetch_linked(profile.links.officers.as_deref(), "officers")
            .await
        {
            Ok(raw) => raw,
            Err(outcome) => {
                section.record(number, outcome);
                return section;
            }
        };

        for (position, item) in items(&raw).iter().enumerate() {
            match self.process_officer(item, position, number, sink).await {
                Ok(outcome) => {
                    section.rows.officers += 1;
                    section.rows.appointments += outcome.appointments;
                    if let Some(note) = outcome.note {
                        section.record(number, note);
                    }
                }
                Err(outcome) => section.record(number, outcome),
            }
        }

        section
    }

    async fn process_officer(
        &self,
        item: &Value,
        position: usize,
        company_number: &str,
        sink: &dyn RecordSink,
    ) -> StepResult<OfficerOutcome> {
        let mut officer = extract_officer(item, company_number);
        if officer.officer_name.trim().is_empty() {
            tracing::warn!(
                "Company {}: officer #{} has no name, skipping",
                company_number,
                position
            );
            return Err(StepError::Skip(Skip::UnnamedOfficer { position }));
        }

        let mut appointments: Vec<OfficerAppointment> = Vec::new();
        let mut note = None;

        match (officer.officer_id.clone(), self.options.include_appointments) {
            (_, false) => {
                note = Some(StepError::Skip(Skip::Disabled {
                    section: "appointments".to_string(),
                }));
            }
            (None, true) => {
                note = Some(StepError::Skip(Skip::MissingOfficerId {
                    officer_name: officer.officer_name.clone(),
                }));
            }
            (Some(officer_id), true) => {
                match self
                    .fetch_linked(Some(&officer.appointments_link), "appointments")
                    .await
                {
                    Ok(raw) => {
                        let list = extract_officer_appointments(&raw, &officer_id);
                        apply_appointment_summary(&mut officer, &list);
                        appointments = list.items;
                    }
                    Err(outcome) => note = Some(outcome),
                }
            }
        }

        emit(sink, &officer)?;
        for appointment in &appointments {
            emit(sink, appointment)?;
        }

        Ok(OfficerOutcome {
            appointments: appointments.len(),
            note,
        })
    }

    // ============ Persons with significant control ============

    async fn significant_control_section(
        &self,
        profile: &CompanyProfile,
        sink: &dyn RecordSink,
    ) -> Section {
        let number = &profile.company_number;
        let mut section = Section::default();

        let raw = match self
            .fetch_linked(
                profile.links.persons_with_significant_control.as_deref(),
                "persons_with_significant_control",
            )
            .await
        {
            Ok(raw) => raw,
            Err(outcome) => {
                section.record(number, outcome);
                return section;
            }
        };

        for item in items(&raw) {
            let person = extract_significant_control_person(item, number);
            if let Err(err) = emit(sink, &person) {
                section.record(number, err.into());
                continue;
            }
            section.rows.significant_control_persons += 1;

            // A person without natures of control keeps its row.
            for nature in extract_natures_of_control(item, number) {
                match emit(sink, &nature) {
                    Ok(()) => section.rows.natures_of_control += 1,
                    Err(err) => section.record(number, err.into()),
                }
            }
        }

        section
    }

    // ============ Charges ============

    async fn charge_section(&self, profile: &CompanyProfile, sink: &dyn RecordSink) -> Section {
        let number = &profile.company_number;
        let mut section = Section::default();

        if !self.options.include_charges {
            section.skipped.push(Skip::Disabled {
                section: "charges".to_string(),
            });
            return section;
        }

        let raw = match self
            .fetch_linked(profile.links.charges.as_deref(), "charges")
            .await
        {
            Ok(raw) => raw,
            Err(outcome) => {
                section.record(number, outcome);
                return section;
            }
        };

        for item in items(&raw) {
            let record = extract_charge(item, number);
            match emit_charge(sink, &record) {
                Ok(()) => {
                    section.rows.charges += 1;
                    section.rows.charge_persons_entitled += record.persons_entitled.len();
                    section.rows.charge_transactions += record.transactions.len();
                }
                Err(err) => section.record(number, err.into()),
            }
        }

        section
    }
}

fn emit_charge(sink: &dyn RecordSink, record: &ChargeRecord) -> Result<(), AppError> {
    emit(sink, &record.charge)?;
    for person in &record.persons_entitled {
        emit(sink, person)?;
    }
    for tx in &record.transactions {
        emit(sink, tx)?;
    }
    Ok(())
}
