//! Label-driven mapping from a site's detail rows to listing fields.

use std::collections::HashMap;

use super::html::field;
use crate::normalize::{parse_age, parse_salary};
use crate::types::codes::{
    map_phrases, EmploymentStatus, FinalEducation, Gender, HolidayType, Industry, Occupation,
    Prefecture,
};
use crate::types::listing::ExternalListing;

/// Row labels a site uses for each field. Several labels may map to the
/// same field; the first present wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldLabels {
    pub industry: &'static [&'static str],
    pub occupation: &'static [&'static str],
    pub employment_status: &'static [&'static str],
    pub work_location: &'static [&'static str],
    pub working_hours: &'static [&'static str],
    pub holiday: &'static [&'static str],
    pub salary: &'static [&'static str],
    pub age: &'static [&'static str],
    pub gender: &'static [&'static str],
    pub final_education: &'static [&'static str],
    pub required_experience: &'static [&'static str],
    pub work_detail: &'static [&'static str],
    pub commission: &'static [&'static str],
    pub refund_policy: &'static [&'static str],
}

/// Fill the optional fields of `listing`. Missing rows leave defaults.
pub fn apply_rows(listing: &mut ExternalListing, rows: &HashMap<String, String>, labels: &FieldLabels) {
    let text = |labels: &[&str]| field(rows, labels).unwrap_or_default().to_string();

    if let Some(industry) = field(rows, labels.industry) {
        listing.industries = map_phrases(industry, Industry::from_label);
    }
    if let Some(occupation) = field(rows, labels.occupation) {
        listing.occupations = map_phrases(occupation, Occupation::from_label);
    }
    if let Some(status) = field(rows, labels.employment_status) {
        listing.employment_statuses = map_phrases(status, EmploymentStatus::from_label);
    }

    listing.work_location = text(labels.work_location);
    listing.prefectures = map_phrases(&listing.work_location, Prefecture::from_label);
    listing.working_hours = text(labels.working_hours);

    listing.holiday_detail = text(labels.holiday);
    listing.holiday_type = HolidayType::from_label(&listing.holiday_detail);

    if let Some(salary) = field(rows, labels.salary) {
        (listing.salary_min, listing.salary_max) = parse_salary(salary);
    }
    if let Some(age) = field(rows, labels.age) {
        (listing.age_min, listing.age_max) = parse_age(age);
    }

    listing.gender = field(rows, labels.gender).and_then(Gender::from_label);
    listing.final_education = field(rows, labels.final_education).and_then(FinalEducation::from_label);
    listing.required_experience = text(labels.required_experience);
    listing.work_detail = text(labels.work_detail);
    listing.commission = text(labels.commission);
    listing.refund_policy = text(labels.refund_policy);
}
