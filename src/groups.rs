//! Summary groups: reports ranked against each other by the same senior.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::{
    BilletSubcategory, PromotionStatus, Report, ReportType, SummaryGroup,
};
use crate::traits;

/// Everything that has to match for two reports to be ranked together.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankingKey {
    pub report_type: ReportType,
    pub senior_name: String,
    pub period_end: Option<NaiveDate>,
    pub rate: String,
    pub desig: String,
    pub group: Option<SummaryGroup>,
    pub promotion_status: Option<PromotionStatus>,
    pub regular: bool,
    pub concurrent: bool,
    pub ops_cdr: bool,
    pub billet_subcategory: Option<BilletSubcategory>,
}

impl RankingKey {
    pub fn of(report: &Report) -> Self {
        Self {
            report_type: report.report_type(),
            senior_name: report.senior_name.trim().to_uppercase(),
            period_end: report.period_end,
            rate: report.rate.trim().to_uppercase(),
            desig: report.desig.trim().to_uppercase(),
            group: report.group,
            promotion_status: report.promotion_status,
            regular: report.regular,
            concurrent: report.concurrent,
            ops_cdr: report.ops_cdr(),
            billet_subcategory: report.billet_subcategory,
        }
    }

    /// Short description for listings, e.g. `FITREP LT ACT 25JAN31 (SMITH)`.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.report_type.title().to_string()];
        if !self.rate.is_empty() {
            parts.push(self.rate.clone());
        }
        if let Some(group) = self.group {
            parts.push(group.to_string());
        }
        if let Some(status) = self.promotion_status {
            parts.push(status.to_string());
        }
        if let Some(end) = self.period_end {
            parts.push(crate::render::format_date(Some(end)));
        }
        if !self.senior_name.is_empty() {
            parts.push(format!("({})", self.senior_name));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct RankingGroup {
    pub key: RankingKey,
    pub reports: Vec<Report>,
}

impl RankingGroup {
    /// Average of the member averages of reports with graded traits.
    pub fn average(&self) -> String {
        let averages: Vec<f64> = self
            .reports
            .iter()
            .filter(|r| r.has_observed_traits())
            .filter_map(|r| r.member_average().parse().ok())
            .collect();
        if averages.is_empty() {
            return "0.00".to_string();
        }
        format!("{:.2}", averages.iter().sum::<f64>() / averages.len() as f64)
    }
}

/// Buckets reports into summary groups, in key order.
pub fn ranking_groups(reports: &[Report]) -> Vec<RankingGroup> {
    let mut buckets: BTreeMap<RankingKey, Vec<Report>> = BTreeMap::new();
    for report in reports {
        buckets
            .entry(RankingKey::of(report))
            .or_default()
            .push(report.clone());
    }
    buckets
        .into_iter()
        .map(|(key, reports)| RankingGroup { key, reports })
        .collect()
}

/// The summary-group average printed on `report`'s form.
///
/// `others` is every stored report; `report` itself is counted once even if
/// it is already among them. A report alone in its group gets its own average.
pub fn summary_group_average(report: &Report, others: &[Report]) -> String {
    let key = RankingKey::of(report);
    let mut members: Vec<Report> = others
        .iter()
        .filter(|r| report.id.is_none() || r.id != report.id)
        .filter(|r| RankingKey::of(r) == key)
        .cloned()
        .collect();
    members.push(report.clone());

    let group = RankingGroup { key, reports: members };
    if group.reports.iter().any(|r| r.has_observed_traits()) {
        group.average()
    } else {
        traits::average(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportKind;

    fn fitrep(id: i64, senior: &str, leadership: u8) -> Report {
        let mut report = Report::new(ReportType::Fitrep);
        report.id = Some(id);
        report.rate = "LT".to_string();
        report.group = Some(SummaryGroup::Act);
        report.senior_name = senior.to_string();
        report.period_end = NaiveDate::from_ymd_opt(2025, 1, 31);
        if let ReportKind::Fitrep(extra) = &mut report.kind {
            extra.leadership = Some(leadership);
        }
        report
    }

    #[test]
    fn test_groups_split_on_senior_and_kind() {
        let reports = vec![
            fitrep(1, "SMITH", 4),
            fitrep(2, "smith ", 2),
            fitrep(3, "JONES", 5),
            Report::new(ReportType::Eval),
        ];
        let groups = ranking_groups(&reports);
        assert_eq!(groups.len(), 3);
        let smith = groups.iter().find(|g| g.key.senior_name == "SMITH").unwrap();
        assert_eq!(smith.reports.len(), 2);
        assert_eq!(smith.average(), "3.00");
    }

    #[test]
    fn test_groups_split_on_type_flags() {
        let mut concurrent = fitrep(2, "SMITH", 3);
        concurrent.concurrent = true;
        let groups = ranking_groups(&[fitrep(1, "SMITH", 3), concurrent]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_summary_average_counts_report_once() {
        let stored = vec![fitrep(1, "SMITH", 4), fitrep(2, "SMITH", 2)];
        let mut current = stored[0].clone();
        if let ReportKind::Fitrep(extra) = &mut current.kind {
            extra.leadership = Some(5);
        }
        assert_eq!(summary_group_average(&current, &stored), "3.50");
    }

    #[test]
    fn test_summary_average_alone_is_member_average() {
        let report = fitrep(9, "NOBODY", 4);
        assert_eq!(summary_group_average(&report, &[]), "4.00");
        assert_eq!(
            summary_group_average(&Report::new(ReportType::Eval), &[]),
            "0.00"
        );
    }

    #[test]
    fn test_unobserved_members_do_not_drag_average() {
        let mut nob = fitrep(2, "SMITH", 0);
        nob.not_observed = true;
        let group = RankingGroup {
            key: RankingKey::of(&nob),
            reports: vec![fitrep(1, "SMITH", 4), nob],
        };
        assert_eq!(group.average(), "4.00");
    }

    #[test]
    fn test_describe_key() {
        let key = RankingKey::of(&fitrep(1, "SMITH", 4));
        assert_eq!(key.describe(), "FITREP LT ACT 25JAN31 (SMITH)");
    }
}
