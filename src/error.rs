use std::fmt;

use thiserror::Error;

/// A form block that a validation rule is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Designator,
    Ssn,
    Uic,
    Station,
    Group,
    PromotionStatus,
    BilletSubcategory,
    DateReported,
    PeriodStart,
    PeriodEnd,
    DateCounseled,
    OccasionForReport,
    TypeOfReport,
    SeniorName,
    SeniorGrade,
    SeniorDesignator,
    SeniorTitle,
    SeniorUic,
    SeniorSsn,
    SeniorAddress,
    DutiesAbbreviation,
    DutiesDescription,
    Counselor,
    CareerRecommendation1,
    CareerRecommendation2,
    Achievements,
    Trait(&'static str),
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Designator => "Designator",
            Field::Ssn => "SSN",
            Field::Uic => "UIC",
            Field::Station => "Ship/Station",
            Field::Group => "Summary Group",
            Field::PromotionStatus => "Promotion Status",
            Field::BilletSubcategory => "Billet Subcategory",
            Field::DateReported => "Date Reported",
            Field::PeriodStart => "Period of Report (From)",
            Field::PeriodEnd => "Period of Report (To)",
            Field::DateCounseled => "Date Counseled",
            Field::OccasionForReport => "Occasion for Report",
            Field::TypeOfReport => "Type of Report",
            Field::SeniorName => "Reporting Senior",
            Field::SeniorGrade => "Reporting Senior Grade",
            Field::SeniorDesignator => "Reporting Senior Designator",
            Field::SeniorTitle => "Reporting Senior Title",
            Field::SeniorUic => "Reporting Senior UIC",
            Field::SeniorSsn => "Reporting Senior SSN",
            Field::SeniorAddress => "Reporting Senior Address",
            Field::DutiesAbbreviation => "Primary Duty Abbreviation",
            Field::DutiesDescription => "Primary/Collateral/Watchstanding Duties",
            Field::Counselor => "Counselor",
            Field::CareerRecommendation1 => "Career Recommendation 1",
            Field::CareerRecommendation2 => "Career Recommendation 2",
            Field::Achievements => "Command Employment and Achievements",
            Field::Trait(label) => label,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which date-ordering rule was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DateRule {
    #[error("report date cannot be after the period of report start date")]
    ReportedAfterStart,
    #[error("report date cannot be after the period of report end date")]
    ReportedAfterEnd,
    #[error("counseling date cannot be before the report date")]
    CounseledBeforeReported,
    #[error("counseling date cannot be before the period of report start date")]
    CounseledBeforeStart,
    #[error("period of report end date cannot be before the start date")]
    EndBeforeStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("cannot be blank")]
    Blank,
    #[error("must be {max} characters or less (currently {actual})")]
    TooLong { max: usize, actual: usize },
    #[error("must match XXX-XX-XXXX")]
    SsnFormat,
    #[error("must contain only letters and digits")]
    NotAlphanumeric,
    #[error("will be saved in upper case")]
    NotUpperCase,
    #[error("must be specified")]
    Unset,
    #[error("all date fields must be set")]
    DatesIncomplete,
    #[error("{0}")]
    DateOrder(DateRule),
    #[error("Special reports cannot also be Periodic or Detachment reports")]
    OccasionConflict,
    #[error("Ops Commander and Concurrent cannot both be selected")]
    OpsCdrWithConcurrent,
    #[error("must be {max} lines or less (currently {actual} lines)")]
    TooManyLines { max: usize, actual: usize },
    #[error("must be between 0 and 5 (got {0})")]
    ScoreOutOfRange(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {kind}")]
pub struct Violation {
    pub field: Field,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(field: Field, kind: ViolationKind) -> Self {
        Self { field, kind }
    }
}

/// Every violation found in a report at submit time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Report failed validation ({} problem(s)):\n{}", .violations.len(), bullet_list(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn bullet_list(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}
