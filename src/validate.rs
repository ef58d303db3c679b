use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{DateRule, Field, ValidationError, Violation, ViolationKind};
use crate::models::{Report, ReportKind};
use crate::wrap;

static SSN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}-\d{2}-\d{4}$").expect("SSN pattern compiles"));

pub const NAME_MAX: usize = 27;
pub const DESIG_MAX: usize = 12;
pub const UIC_MAX: usize = 5;
pub const STATION_MAX: usize = 18;
pub const SENIOR_GRADE_MAX: usize = 5;
pub const SENIOR_DESIG_MAX: usize = 5;
pub const SENIOR_TITLE_MAX: usize = 14;
pub const SENIOR_ADDRESS_MAX: usize = 40;
pub const DUTIES_ABBREVIATION_MAX: usize = 14;
pub const COUNSELOR_MAX: usize = 20;
pub const CAREER_REC_MAX: usize = 20;
pub const ACHIEVEMENTS_MAX: usize = 182;
pub const SCORE_MAX: u8 = 5;

/// Normalizes, then validates, a report being submitted.
pub fn submit(mut report: Report) -> Result<Report, ValidationError> {
    normalize(&mut report);
    validate(&report)?;
    Ok(report)
}

pub fn validate(report: &Report) -> Result<(), ValidationError> {
    let violations = violations(report);
    if violations.is_empty() {
        Ok(())
    } else {
        debug!(count = violations.len(), "report failed validation");
        Err(ValidationError { violations })
    }
}

/// Every rule the report breaks, in form order.
pub fn violations(report: &Report) -> Vec<Violation> {
    let mut found = Vec::new();
    check_subject(report, &mut found);
    check_classification(report, &mut found);
    check_dates(report, &mut found);
    check_occasion(report, &mut found);
    check_type_of_report(report, &mut found);
    check_senior(report, &mut found);
    check_narratives(report, &mut found);
    check_traits(report, &mut found);
    found
}

/// Applies the coercions the form performs on save.
///
/// Single-line fields are trimmed and the name is upper-cased. Comments and
/// career recommendations that wrap past their line budget are cut down to
/// the lines that fit; text that already fits is left as typed. A career
/// recommendation over the character limit is kept whole so validation
/// rejects it.
pub fn normalize(report: &mut Report) {
    for value in [
        &mut report.name,
        &mut report.rate,
        &mut report.desig,
        &mut report.ssn,
        &mut report.uic,
        &mut report.station,
        &mut report.senior_name,
        &mut report.senior_grade,
        &mut report.senior_desig,
        &mut report.senior_title,
        &mut report.senior_uic,
        &mut report.senior_ssn,
        &mut report.career_rec_1,
        &mut report.career_rec_2,
    ] {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }
    report.name = report.name.to_uppercase();

    for value in [&mut report.career_rec_1, &mut report.career_rec_2] {
        if char_len(value) > CAREER_REC_MAX {
            continue;
        }
        let wrapped = wrap::wrap(value, wrap::CAREER_REC_WIDTH);
        if wrap::line_count(&wrapped) > wrap::CAREER_REC_MAX_LINES {
            *value = wrap::truncate_lines(&wrapped, wrap::CAREER_REC_MAX_LINES);
        }
    }

    let wrapped = wrap::wrap(&report.comments, wrap::COMMENTS_WIDTH);
    let lines = wrap::line_count(&wrapped);
    if lines > wrap::COMMENTS_MAX_LINES {
        debug!(lines, "truncating comments");
        report.comments = wrap::truncate_lines(&wrapped, wrap::COMMENTS_MAX_LINES);
    }
}

/// The checks run while a single field is being typed.
///
/// These only warn: the SSN pattern, upper-case names, and UIC characters.
pub fn check_field(field: Field, value: &str) -> Option<Violation> {
    let value = value.trim();
    let kind = match field {
        Field::Ssn | Field::SeniorSsn if !value.is_empty() && !SSN_PATTERN.is_match(value) => {
            ViolationKind::SsnFormat
        }
        Field::Name if value != value.to_uppercase() => ViolationKind::NotUpperCase,
        Field::Uic | Field::SeniorUic if !value.chars().all(|c| c.is_ascii_alphanumeric()) => {
            ViolationKind::NotAlphanumeric
        }
        _ => return None,
    };
    Some(Violation::new(field, kind))
}

/// Runs [`check_field`] over every field that has a typing check.
pub fn field_warnings(report: &Report) -> Vec<Violation> {
    [
        (Field::Name, report.name.as_str()),
        (Field::Ssn, report.ssn.as_str()),
        (Field::Uic, report.uic.as_str()),
        (Field::SeniorSsn, report.senior_ssn.as_str()),
        (Field::SeniorUic, report.senior_uic.as_str()),
    ]
    .into_iter()
    .filter_map(|(field, value)| check_field(field, value))
    .collect()
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn max_len(found: &mut Vec<Violation>, field: Field, value: &str, max: usize) {
    let actual = char_len(value.trim());
    if actual > max {
        found.push(Violation::new(field, ViolationKind::TooLong { max, actual }));
    }
}

fn required_text(found: &mut Vec<Violation>, field: Field, value: &str, max: usize) {
    if value.trim().is_empty() {
        found.push(Violation::new(field, ViolationKind::Blank));
    } else {
        max_len(found, field, value, max);
    }
}

fn check_subject(report: &Report, found: &mut Vec<Violation>) {
    required_text(found, Field::Name, &report.name, NAME_MAX);
    max_len(found, Field::Designator, &report.desig, DESIG_MAX);

    if !SSN_PATTERN.is_match(report.ssn.trim()) {
        found.push(Violation::new(Field::Ssn, ViolationKind::SsnFormat));
    }

    let uic = report.uic.trim();
    if uic.is_empty() {
        found.push(Violation::new(Field::Uic, ViolationKind::Blank));
    } else if !uic.chars().all(|c| c.is_ascii_alphanumeric()) {
        found.push(Violation::new(Field::Uic, ViolationKind::NotAlphanumeric));
    } else {
        max_len(found, Field::Uic, uic, UIC_MAX);
    }

    required_text(found, Field::Station, &report.station, STATION_MAX);
}

fn check_classification(report: &Report, found: &mut Vec<Violation>) {
    if report.group.is_none() {
        found.push(Violation::new(Field::Group, ViolationKind::Unset));
    }
    if report.promotion_status.is_none() {
        found.push(Violation::new(Field::PromotionStatus, ViolationKind::Unset));
    }
    if report.billet_subcategory.is_none() {
        found.push(Violation::new(Field::BilletSubcategory, ViolationKind::Unset));
    }
}

fn check_dates(report: &Report, found: &mut Vec<Violation>) {
    let dates = [
        (Field::DateReported, report.date_reported),
        (Field::PeriodStart, report.period_start),
        (Field::PeriodEnd, report.period_end),
        (Field::DateCounseled, report.date_counseled),
    ];
    let (Some(reported), Some(start), Some(end), Some(counseled)) = (
        report.date_reported,
        report.period_start,
        report.period_end,
        report.date_counseled,
    ) else {
        // Point at the first missing date; partial comparisons are not attempted.
        let field = dates
            .iter()
            .find(|(_, date)| date.is_none())
            .map(|(field, _)| *field)
            .unwrap_or(Field::DateReported);
        found.push(Violation::new(field, ViolationKind::DatesIncomplete));
        return;
    };

    let rules = [
        (reported > start, Field::DateReported, DateRule::ReportedAfterStart),
        (reported > end, Field::DateReported, DateRule::ReportedAfterEnd),
        (counseled < reported, Field::DateCounseled, DateRule::CounseledBeforeReported),
        (counseled < start, Field::DateCounseled, DateRule::CounseledBeforeStart),
        (end < start, Field::PeriodEnd, DateRule::EndBeforeStart),
    ];
    for (broken, field, rule) in rules {
        if broken {
            found.push(Violation::new(field, ViolationKind::DateOrder(rule)));
        }
    }
}

fn check_occasion(report: &Report, found: &mut Vec<Violation>) {
    if report.special && (report.periodic || report.det_indiv || report.det_rs()) {
        found.push(Violation::new(
            Field::OccasionForReport,
            ViolationKind::OccasionConflict,
        ));
    }
}

fn check_type_of_report(report: &Report, found: &mut Vec<Violation>) {
    if report.ops_cdr() && report.concurrent {
        found.push(Violation::new(
            Field::TypeOfReport,
            ViolationKind::OpsCdrWithConcurrent,
        ));
    }
}

fn check_senior(report: &Report, found: &mut Vec<Violation>) {
    max_len(found, Field::SeniorName, &report.senior_name, NAME_MAX);
    max_len(found, Field::SeniorGrade, &report.senior_grade, SENIOR_GRADE_MAX);
    max_len(found, Field::SeniorDesignator, &report.senior_desig, SENIOR_DESIG_MAX);
    max_len(found, Field::SeniorTitle, &report.senior_title, SENIOR_TITLE_MAX);
    max_len(found, Field::SeniorUic, &report.senior_uic, UIC_MAX);
    max_len(found, Field::SeniorAddress, &report.senior_address, SENIOR_ADDRESS_MAX);
    max_len(found, Field::Counselor, &report.counselor, COUNSELOR_MAX);

    let senior_ssn = report.senior_ssn.trim();
    if !senior_ssn.is_empty() && !SSN_PATTERN.is_match(senior_ssn) {
        found.push(Violation::new(Field::SeniorSsn, ViolationKind::SsnFormat));
    }
}

fn check_narratives(report: &Report, found: &mut Vec<Violation>) {
    if char_len(&report.duties_abbreviation) > DUTIES_ABBREVIATION_MAX {
        found.push(Violation::new(
            Field::DutiesAbbreviation,
            ViolationKind::TooLong {
                max: DUTIES_ABBREVIATION_MAX,
                actual: char_len(&report.duties_abbreviation),
            },
        ));
    }

    let duties = wrap::wrap_duties_description(&report.duties_description);
    let lines = wrap::line_count(&duties);
    if lines > wrap::DUTIES_MAX_LINES {
        found.push(Violation::new(
            Field::DutiesDescription,
            ViolationKind::TooManyLines {
                max: wrap::DUTIES_MAX_LINES,
                actual: lines,
            },
        ));
    }

    max_len(found, Field::CareerRecommendation1, &report.career_rec_1, CAREER_REC_MAX);
    max_len(found, Field::CareerRecommendation2, &report.career_rec_2, CAREER_REC_MAX);

    if let ReportKind::Eval(extra) = &report.kind {
        max_len(found, Field::Achievements, &extra.achievements, ACHIEVEMENTS_MAX);
    }
}

fn check_traits(report: &Report, found: &mut Vec<Violation>) {
    for score in report.trait_scores() {
        if let Some(value) = score.score {
            if value > SCORE_MAX {
                found.push(Violation::new(
                    Field::Trait(score.label),
                    ViolationKind::ScoreOutOfRange(value),
                ));
            }
        }
    }
}
