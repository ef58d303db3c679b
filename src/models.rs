use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Declares a form enumeration that serializes as the code printed on the form.
macro_rules! form_code {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $code)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> anyhow::Result<Self> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.code().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| anyhow!("Unknown {} code '{}'", stringify!($name), s))
            }
        }
    };
}

form_code! {
    /// Competitive category the member is ranked in (block 3-6).
    SummaryGroup {
        Act => "ACT",
        Tar => "TAR",
        Inact => "INACT",
        #[serde(alias = "ATADSW")]
        AtAdos => "AT-ADOS",
    }
}

form_code! {
    PromotionStatus {
        Regular => "REGULAR",
        Frocked => "FROCKED",
        Selected => "SELECTED",
        Spot => "SPOT",
    }
}

form_code! {
    PhysicalReadiness {
        Pass => "P",
        BcaPass => "B",
        Fail => "F",
        MedicallyWaived => "M",
        Waived => "W",
        NoPfa => "N",
    }
}

form_code! {
    BilletSubcategory {
        Na => "NA",
        Basic => "BASIC",
        Approved => "APPROVED",
        IndivAug => "INDIV AUG",
        CoAfloat => "CO AFLOAT",
        CoAshore => "CO ASHORE",
        Oic => "OIC",
        SeaComp => "SEA COMP",
        Crf => "CRF",
        Canvasser => "CANVASSER",
        Resident => "RESIDENT",
        Intern => "INTERN",
        Instructor => "INSTRUCTOR",
        Student => "STUDENT",
        Resac1 => "RESAC1",
        Resac6 => "RESAC6",
        Screened => "SCREENED",
        Special01 => "SPECIAL01",
        Special02 => "SPECIAL02",
        Special03 => "SPECIAL03",
        Special04 => "SPECIAL04",
        Special05 => "SPECIAL05",
        Special06 => "SPECIAL06",
        Special07 => "SPECIAL07",
        Special08 => "SPECIAL08",
        Special09 => "SPECIAL09",
        Special10 => "SPECIAL10",
        Special11 => "SPECIAL11",
        Special12 => "SPECIAL12",
        Special13 => "SPECIAL13",
        Special14 => "SPECIAL14",
        Special15 => "SPECIAL15",
        Special16 => "SPECIAL16",
        Special17 => "SPECIAL17",
        Special18 => "SPECIAL18",
        Special19 => "SPECIAL19",
        Special20 => "SPECIAL20",
    }
}

/// Individual promotion recommendation (block 42), stored as its 0-5 value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PromotionRecommendation {
    NotObserved = 0,
    SignificantProblems = 1,
    Progressing = 2,
    Promotable = 3,
    MustPromote = 4,
    EarlyPromote = 5,
}

impl PromotionRecommendation {
    pub const ALL: &'static [PromotionRecommendation] = &[
        PromotionRecommendation::NotObserved,
        PromotionRecommendation::SignificantProblems,
        PromotionRecommendation::Progressing,
        PromotionRecommendation::Promotable,
        PromotionRecommendation::MustPromote,
        PromotionRecommendation::EarlyPromote,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PromotionRecommendation::NotObserved => "NOB",
            PromotionRecommendation::SignificantProblems => "Significant Problems",
            PromotionRecommendation::Progressing => "Progressing",
            PromotionRecommendation::Promotable => "Promotable",
            PromotionRecommendation::MustPromote => "Must Promote",
            PromotionRecommendation::EarlyPromote => "Early Promote",
        }
    }
}

impl TryFrom<u8> for PromotionRecommendation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|rec| u8::from(*rec) == value)
            .ok_or_else(|| format!("promotion recommendation must be 0-5, got {}", value))
    }
}

impl From<PromotionRecommendation> for u8 {
    fn from(rec: PromotionRecommendation) -> u8 {
        rec as u8
    }
}

/// Which form a report is printed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum ReportType {
    Fitrep,
    Eval,
    #[value(name = "chiefeval")]
    ChiefEval,
}

impl ReportType {
    pub fn tag(self) -> &'static str {
        match self {
            ReportType::Fitrep => "fitrep",
            ReportType::Eval => "eval",
            ReportType::ChiefEval => "chiefeval",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ReportType::Fitrep => "FITREP",
            ReportType::Eval => "EVAL",
            ReportType::ChiefEval => "CHIEF EVAL",
        }
    }

    pub fn from_tag(tag: &str) -> anyhow::Result<Self> {
        match tag {
            "fitrep" => Ok(ReportType::Fitrep),
            "eval" => Ok(ReportType::Eval),
            "chiefeval" => Ok(ReportType::ChiefEval),
            other => Err(anyhow!("Unknown report type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitrepExtra {
    pub det_rs: bool,  // detachment of reporting senior
    pub ops_cdr: bool, // ops commander report
    pub physical_readiness: Option<PhysicalReadiness>,
    pub pro_expertise: Option<u8>,
    pub cmd_climate: Option<u8>,
    pub bearing_and_character: Option<u8>,
    pub teamwork: Option<u8>,
    pub accomp_and_initiative: Option<u8>,
    pub leadership: Option<u8>,
    pub tactical_performance: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalExtra {
    pub prom_frock: bool,
    pub physical_readiness: Option<PhysicalReadiness>,
    pub prof_knowledge: Option<u8>,
    pub quality_of_work: Option<u8>,
    pub cmd_climate: Option<u8>,
    pub bearing_and_character: Option<u8>,
    pub initiative: Option<u8>,
    pub teamwork: Option<u8>,
    pub leadership: Option<u8>,
    pub achievements: String,
    pub retain: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChiefEvalExtra {
    pub physical_readiness: Option<PhysicalReadiness>,
    pub technical_mastery: Option<u8>,
    pub expertise: Option<u8>,
    pub professionalism: Option<u8>,
    pub integrity: Option<u8>,
    pub accountability: Option<u8>,
    pub leadership: Option<u8>,
    pub teamwork: Option<u8>,
}

/// Fields that only exist on one kind of form, tagged by `doc_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "doc_type", rename_all = "lowercase")]
pub enum ReportKind {
    Fitrep(FitrepExtra),
    Eval(EvalExtra),
    ChiefEval(ChiefEvalExtra),
}

impl Default for ReportKind {
    fn default() -> Self {
        ReportKind::Fitrep(FitrepExtra::default())
    }
}

/// One performance trait score and the label printed next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraitScore {
    pub label: &'static str,
    pub score: Option<u8>,
}

pub const TRAIT_COUNT: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub rate: String,
    pub desig: String,
    pub ssn: String,
    pub group: Option<SummaryGroup>,
    pub uic: String,
    pub station: String,
    pub promotion_status: Option<PromotionStatus>,
    pub date_reported: Option<NaiveDate>,
    pub periodic: bool,
    pub det_indiv: bool,
    pub special: bool,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub not_observed: bool,
    pub regular: bool,
    pub concurrent: bool,
    pub billet_subcategory: Option<BilletSubcategory>,
    pub senior_name: String,
    pub senior_grade: String,
    pub senior_desig: String,
    pub senior_title: String,
    pub senior_uic: String,
    pub senior_ssn: String,
    pub senior_address: String,
    pub job: String,
    pub duties_abbreviation: String,
    pub duties_description: String,
    pub date_counseled: Option<NaiveDate>,
    pub counselor: String,
    pub career_rec_1: String,
    pub career_rec_2: String,
    pub comments: String,
    pub indiv_promo_rec: Option<PromotionRecommendation>,
    #[serde(flatten)]
    pub kind: ReportKind,
}

impl Report {
    /// A blank report of the given type, as a user starts it.
    pub fn new(report_type: ReportType) -> Self {
        let kind = match report_type {
            ReportType::Fitrep => ReportKind::Fitrep(FitrepExtra::default()),
            ReportType::Eval => ReportKind::Eval(EvalExtra::default()),
            ReportType::ChiefEval => ReportKind::ChiefEval(ChiefEvalExtra::default()),
        };
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn report_type(&self) -> ReportType {
        match self.kind {
            ReportKind::Fitrep(_) => ReportType::Fitrep,
            ReportKind::Eval(_) => ReportType::Eval,
            ReportKind::ChiefEval(_) => ReportType::ChiefEval,
        }
    }

    pub fn det_rs(&self) -> bool {
        matches!(&self.kind, ReportKind::Fitrep(extra) if extra.det_rs)
    }

    pub fn ops_cdr(&self) -> bool {
        matches!(&self.kind, ReportKind::Fitrep(extra) if extra.ops_cdr)
    }

    pub fn physical_readiness(&self) -> Option<PhysicalReadiness> {
        match &self.kind {
            ReportKind::Fitrep(extra) => extra.physical_readiness,
            ReportKind::Eval(extra) => extra.physical_readiness,
            ReportKind::ChiefEval(extra) => extra.physical_readiness,
        }
    }

    /// The seven performance traits of this form, in printed order.
    pub fn trait_scores(&self) -> [TraitScore; TRAIT_COUNT] {
        let t = |label, score| TraitScore { label, score };
        match &self.kind {
            ReportKind::Fitrep(x) => [
                t("Professional Expertise", x.pro_expertise),
                t("Command or Organizational Climate", x.cmd_climate),
                t("Military Bearing/Character", x.bearing_and_character),
                t("Teamwork", x.teamwork),
                t("Mission Accomplishment and Initiative", x.accomp_and_initiative),
                t("Leadership", x.leadership),
                t("Tactical Performance", x.tactical_performance),
            ],
            ReportKind::Eval(x) => [
                t("Professional Knowledge", x.prof_knowledge),
                t("Quality of Work", x.quality_of_work),
                t("Command or Organizational Climate", x.cmd_climate),
                t("Military Bearing/Character", x.bearing_and_character),
                t("Personal Job Accomplishment/Initiative", x.initiative),
                t("Teamwork", x.teamwork),
                t("Leadership", x.leadership),
            ],
            ReportKind::ChiefEval(x) => [
                t("Technical Mastery", x.technical_mastery),
                t("Expertise", x.expertise),
                t("Professionalism", x.professionalism),
                t("Integrity", x.integrity),
                t("Accountability", x.accountability),
                t("Leadership", x.leadership),
                t("Teamwork", x.teamwork),
            ],
        }
    }

    /// "FITREP for DOE, JOHN A", used as the PDF title.
    pub fn title(&self) -> String {
        let name = if self.name.trim().is_empty() {
            "(unnamed)"
        } else {
            self.name.trim()
        };
        format!("{} for {}", self.report_type().title(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_codes_round_trip_through_from_str() {
        for group in SummaryGroup::ALL {
            assert_eq!(group.code().parse::<SummaryGroup>().unwrap(), *group);
        }
        assert_eq!("indiv aug".parse::<BilletSubcategory>().unwrap(), BilletSubcategory::IndivAug);
        assert!("ACTIVE".parse::<SummaryGroup>().is_err());
    }

    #[test]
    fn test_summary_group_accepts_legacy_code() {
        let group: SummaryGroup = serde_json::from_str("\"ATADSW\"").unwrap();
        assert_eq!(group, SummaryGroup::AtAdos);
        assert_eq!(serde_json::to_string(&group).unwrap(), "\"AT-ADOS\"");
    }

    #[test]
    fn test_promotion_recommendation_rejects_out_of_range() {
        let rec: PromotionRecommendation = serde_json::from_str("4").unwrap();
        assert_eq!(rec, PromotionRecommendation::MustPromote);
        assert!(serde_json::from_str::<PromotionRecommendation>("6").is_err());
    }

    #[test]
    fn test_report_json_carries_doc_type_and_variant_fields() {
        let mut report = Report::new(ReportType::Fitrep);
        report.name = "DOE, JOHN A".to_string();
        if let ReportKind::Fitrep(extra) = &mut report.kind {
            extra.ops_cdr = true;
            extra.leadership = Some(4);
        }

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["doc_type"], "fitrep");
        assert_eq!(value["ops_cdr"], true);
        assert_eq!(value["leadership"], 4);
        assert!(value.get("id").is_none());

        let back: Report = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_variant_only_flags_are_false_elsewhere() {
        let eval = Report::new(ReportType::Eval);
        assert!(!eval.det_rs());
        assert!(!eval.ops_cdr());
        assert_eq!(eval.report_type(), ReportType::Eval);
    }

    #[test]
    fn test_trait_scores_follow_variant() {
        let mut chief = Report::new(ReportType::ChiefEval);
        if let ReportKind::ChiefEval(extra) = &mut chief.kind {
            extra.integrity = Some(5);
        }
        let scores = chief.trait_scores();
        assert_eq!(scores[3].label, "Integrity");
        assert_eq!(scores[3].score, Some(5));
        assert_eq!(scores.iter().filter(|t| t.score.is_some()).count(), 1);
    }
}
