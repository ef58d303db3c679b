use crate::models::Report;

/// Score recorded in the NOB column of a trait block.
pub const NOT_OBSERVED: u8 = 0;

/// Average of the observed trait scores, formatted with two decimals.
///
/// Unset traits and NOB marks are left out of both the sum and the count.
/// With nothing observed the result is `"0.00"`.
pub fn average(scores: &[Option<u8>]) -> String {
    let observed: Vec<u32> = scores
        .iter()
        .flatten()
        .filter(|&&score| score != NOT_OBSERVED)
        .map(|&score| u32::from(score))
        .collect();

    if observed.is_empty() {
        return "0.00".to_string();
    }

    let total: u32 = observed.iter().sum();
    format!("{:.2}", f64::from(total) / observed.len() as f64)
}

impl Report {
    pub fn member_average(&self) -> String {
        let scores: Vec<Option<u8>> = self.trait_scores().iter().map(|t| t.score).collect();
        average(&scores)
    }

    /// True when at least one trait carries a graded (non-NOB) score.
    pub fn has_observed_traits(&self) -> bool {
        self.trait_scores()
            .iter()
            .any(|t| matches!(t.score, Some(score) if score != NOT_OBSERVED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportKind, ReportType};

    #[test]
    fn test_average_of_nothing_is_zero() {
        assert_eq!(average(&[None; 7]), "0.00");
        assert_eq!(average(&[]), "0.00");
    }

    #[test]
    fn test_average_ignores_unset_traits() {
        assert_eq!(average(&[Some(5), None, None, None, None, None, None]), "5.00");
        assert_eq!(
            average(&[Some(1), Some(2), Some(3), Some(4), Some(5), None, None]),
            "3.00"
        );
    }

    #[test]
    fn test_average_rounds_to_two_places() {
        assert_eq!(average(&[Some(3), Some(4), Some(4)]), "3.67");
        assert_eq!(average(&[Some(2), Some(3)]), "2.50");
    }

    #[test]
    fn test_average_skips_not_observed_marks() {
        assert_eq!(average(&[Some(NOT_OBSERVED), Some(4), None]), "4.00");
        assert_eq!(average(&[Some(NOT_OBSERVED); 7]), "0.00");
    }

    #[test]
    fn test_member_average_uses_variant_traits() {
        let mut report = Report::new(ReportType::Eval);
        if let ReportKind::Eval(extra) = &mut report.kind {
            extra.prof_knowledge = Some(4);
            extra.leadership = Some(5);
        }
        assert_eq!(report.member_average(), "4.50");
        assert!(report.has_observed_traits());
        assert!(!Report::new(ReportType::Fitrep).has_observed_traits());
    }
}
