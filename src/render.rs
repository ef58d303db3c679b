use chrono::NaiveDate;

use crate::models::{Report, ReportKind};
use crate::wrap;

/// Printable values of one report, keyed the way layouts name them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues {
    pub text: Vec<(&'static str, String)>,
    pub marks: Vec<String>,
    /// (trait row, score) pairs.
    pub traits: Vec<(usize, u8)>,
}

impl FormValues {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_mark(&self, key: &str) -> bool {
        self.marks.iter().any(|m| m == key)
    }
}

/// Form date format, e.g. `24JAN15`.
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%y%b%d").to_string().to_uppercase())
        .unwrap_or_default()
}

/// Lays out every value of `report` for printing.
///
/// Free text is wrapped and cut to its block here, so an over-long comment
/// prints as the first 18 lines whether or not the report was validated.
/// `summary_group_average` falls back to the member average.
pub fn prepare(report: &Report, summary_group_average: Option<String>) -> FormValues {
    let member_average = report.member_average();
    let code = |value: Option<String>| value.unwrap_or_default();

    let mut text: Vec<(&'static str, String)> = vec![
        ("name", report.name.clone()),
        ("rate", report.rate.clone()),
        ("desig", report.desig.clone()),
        ("ssn", report.ssn.clone()),
        ("uic", report.uic.clone()),
        ("station", report.station.clone()),
        ("promotion_status", code(report.promotion_status.map(|s| s.to_string()))),
        ("date_reported", format_date(report.date_reported)),
        ("period_start", format_date(report.period_start)),
        ("period_end", format_date(report.period_end)),
        ("physical_readiness", code(report.physical_readiness().map(|p| p.to_string()))),
        ("billet_subcategory", code(report.billet_subcategory.map(|b| b.to_string()))),
        ("senior_name", report.senior_name.clone()),
        ("senior_grade", report.senior_grade.clone()),
        ("senior_desig", report.senior_desig.clone()),
        ("senior_title", report.senior_title.clone()),
        ("senior_uic", report.senior_uic.clone()),
        ("senior_ssn", report.senior_ssn.clone()),
        ("job", wrap::wrap_job(&report.job)),
        ("duties_abbreviation", report.duties_abbreviation.clone()),
        ("duties_description", wrap::wrap_duties_description(&report.duties_description)),
        ("date_counseled", format_date(report.date_counseled)),
        ("counselor", report.counselor.clone()),
        ("career_rec_1", wrap::wrap_career_rec(&report.career_rec_1)),
        ("career_rec_2", wrap::wrap_career_rec(&report.career_rec_2)),
        ("comments", wrap::wrap_comments(&report.comments)),
        ("senior_address", report.senior_address.clone()),
        ("summary_group_average", summary_group_average.unwrap_or_else(|| member_average.clone())),
        ("member_average", member_average),
    ];
    text.retain(|(_, value)| !value.trim().is_empty());

    let mut marks = Vec::new();
    if let Some(group) = report.group {
        marks.push(format!("group.{}", group));
    }
    let flags = [
        ("occasion.periodic", report.periodic),
        ("occasion.det_indiv", report.det_indiv),
        ("occasion.det_rs", report.det_rs()),
        ("occasion.special", report.special),
        ("not_observed", report.not_observed),
        ("type.regular", report.regular),
        ("type.concurrent", report.concurrent),
        ("type.ops_cdr", report.ops_cdr()),
    ];
    marks.extend(flags.iter().filter(|(_, set)| *set).map(|(key, _)| key.to_string()));
    if let Some(rec) = report.indiv_promo_rec {
        marks.push(format!("promo_rec.{}", u8::from(rec)));
    }
    if let ReportKind::Eval(extra) = &report.kind {
        if extra.prom_frock {
            marks.push("prom_frock".to_string());
        }
        match extra.retain {
            Some(true) => marks.push("retain.yes".to_string()),
            Some(false) => marks.push("retain.no".to_string()),
            None => {}
        }
    }

    let traits = report
        .trait_scores()
        .iter()
        .enumerate()
        .filter_map(|(row, t)| t.score.map(|score| (row, score)))
        .collect();

    FormValues { text, marks, traits }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EvalExtra, FitrepExtra, PromotionRecommendation, ReportType, SummaryGroup,
    };

    #[test]
    fn test_format_date_is_form_style() {
        assert_eq!(format_date(NaiveDate::from_ymd_opt(2024, 1, 15)), "24JAN15");
        assert_eq!(format_date(NaiveDate::from_ymd_opt(2009, 11, 3)), "09NOV03");
        assert_eq!(format_date(None), "");
    }

    #[test]
    fn test_long_comments_print_eighteen_lines() {
        let mut report = Report::new(ReportType::Fitrep);
        let lines: Vec<String> = (1..=25).map(|n| format!("- Led effort number {}.", n)).collect();
        report.comments = lines.join("\n");

        let values = prepare(&report, None);
        let comments = values.get("comments").unwrap();
        assert_eq!(comments.split('\n').count(), 18);
        assert!(comments.ends_with("number 18."));
    }

    #[test]
    fn test_marks_follow_flags() {
        let mut report = Report::new(ReportType::Fitrep);
        report.group = Some(SummaryGroup::Tar);
        report.special = true;
        report.regular = true;
        report.indiv_promo_rec = Some(PromotionRecommendation::MustPromote);
        report.kind = ReportKind::Fitrep(FitrepExtra {
            ops_cdr: true,
            ..FitrepExtra::default()
        });

        let values = prepare(&report, None);
        assert_eq!(
            values.marks,
            vec!["group.TAR", "occasion.special", "type.regular", "type.ops_cdr", "promo_rec.4"]
        );
    }

    #[test]
    fn test_traits_keep_their_row() {
        let mut report = Report::new(ReportType::Eval);
        report.kind = ReportKind::Eval(EvalExtra {
            quality_of_work: Some(2),
            leadership: Some(0),
            retain: Some(true),
            ..EvalExtra::default()
        });

        let values = prepare(&report, None);
        assert_eq!(values.traits, vec![(1, 2), (6, 0)]);
        assert!(values.has_mark("retain.yes"));
        assert_eq!(values.get("member_average"), Some("2.00"));
    }

    #[test]
    fn test_summary_group_average_defaults_to_member_average() {
        let report = Report::new(ReportType::ChiefEval);
        let values = prepare(&report, None);
        assert_eq!(values.get("summary_group_average"), Some("0.00"));

        let values = prepare(&report, Some("3.75".to_string()));
        assert_eq!(values.get("summary_group_average"), Some("3.75"));
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let values = prepare(&Report::new(ReportType::Fitrep), None);
        assert!(values.get("name").is_none());
        assert!(values.get("duties_description").is_none());
        assert!(values.marks.is_empty());
    }
}
