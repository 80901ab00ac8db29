//! SA physical presence test.

use super::{ResidencyFacts, RuleTrace};
use crate::warnings::Warning;
use rust_decimal::Decimal;

const PRESENCE_DAYS: u32 = 91;
const AVERAGING_YEARS: usize = 5;

/// Resident only if this year's days exceed 91 *and* the six-year average
/// (current year plus five preceding) exceeds 91. Missing prior years count
/// as zero days, which pushes the average toward non-residence.
pub fn sa_physical_presence(
    facts: &ResidencyFacts,
    trace: &mut Vec<RuleTrace>,
    warnings: &mut Vec<Warning>,
) -> bool {
    if facts.days_in_sa <= PRESENCE_DAYS {
        trace.push(RuleTrace::new(
            "sa presence: current year",
            format!("non-resident ({} days, needs more than {})", facts.days_in_sa, PRESENCE_DAYS),
        ));
        return false;
    }
    trace.push(RuleTrace::new(
        "sa presence: current year",
        format!("{} days, passes", facts.days_in_sa),
    ));

    if facts.sa_days_prior_years.len() < AVERAGING_YEARS {
        warnings.push(Warning::MissingPriorYearDayCounts {
            supplied: facts.sa_days_prior_years.len(),
        });
    }

    // Exact decimal average over six years; day counts of 366 from a leap
    // year of assessment are ordinary inputs here.
    let prior: u32 = facts
        .sa_days_prior_years
        .iter()
        .take(AVERAGING_YEARS)
        .sum();
    let total = Decimal::from(facts.days_in_sa + prior);
    let average = total / Decimal::from(AVERAGING_YEARS as u32 + 1);
    let resident = average > Decimal::from(PRESENCE_DAYS);
    trace.push(RuleTrace::new(
        "sa presence: six-year average",
        format!(
            "{} (average {}, needs more than {})",
            if resident { "resident" } else { "non-resident" },
            average.round_dp(2),
            PRESENCE_DAYS,
        ),
    ));
    resident
}

#[cfg(test)]
mod tests {
    use super::super::facts;
    use super::*;

    fn run(f: &ResidencyFacts) -> (bool, Vec<RuleTrace>, Vec<Warning>) {
        let mut trace = Vec::new();
        let mut warnings = Vec::new();
        let resident = sa_physical_presence(f, &mut trace, &mut warnings);
        (resident, trace, warnings)
    }

    #[test]
    fn current_year_test_fails_short() {
        let mut f = facts();
        f.days_in_sa = 91;
        f.sa_days_prior_years = vec![200; 5];
        let (resident, trace, _) = run(&f);
        assert!(!resident);
        // Average never evaluated.
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn average_test_fails_despite_current_year() {
        // 95 days this year but an average of 80: non-resident.
        let mut f = facts();
        f.days_in_sa = 95;
        f.sa_days_prior_years = vec![77, 77, 77, 77, 77];
        let (resident, trace, _) = run(&f);
        assert!(!resident);
        assert!(trace.last().unwrap().outcome.contains("non-resident"));
        // (95 + 385) / 6 = 80
        assert!(trace.last().unwrap().outcome.contains("80"));
    }

    #[test]
    fn both_tests_pass() {
        let mut f = facts();
        f.days_in_sa = 120;
        f.sa_days_prior_years = vec![100, 95, 92, 120, 110];
        let (resident, _, warnings) = run(&f);
        assert!(resident);
        assert!(warnings.is_empty());
    }

    #[test]
    fn leap_year_day_count_in_average() {
        // A 366-day year of assessment spent entirely in SA.
        let mut f = facts();
        f.days_in_sa = 366;
        f.sa_days_prior_years = vec![92, 92, 92, 92, 92];
        let (resident, trace, _) = run(&f);
        assert!(resident);
        // (366 + 460) / 6 = 137.666... reported to two places.
        assert!(trace.last().unwrap().outcome.contains("137.67"));
    }

    #[test]
    fn average_exactly_91_is_not_enough() {
        let mut f = facts();
        f.days_in_sa = 96;
        f.sa_days_prior_years = vec![90, 90, 90, 90, 90];
        // (96 + 450) / 6 = 91 exactly; the test needs more than 91.
        let (resident, _, _) = run(&f);
        assert!(!resident);
    }

    #[test]
    fn missing_prior_years_warn_and_count_as_zero() {
        let mut f = facts();
        f.days_in_sa = 200;
        f.sa_days_prior_years = vec![300, 300];
        let (resident, _, warnings) = run(&f);
        // (200 + 600 + 0 + 0 + 0) / 6 = 133.33: resident, but flagged.
        assert!(resident);
        assert_eq!(
            warnings,
            vec![Warning::MissingPriorYearDayCounts { supplied: 2 }]
        );
    }

    #[test]
    fn extra_history_beyond_five_years_ignored() {
        let mut f = facts();
        f.days_in_sa = 95;
        // Six prior years supplied; only the first five count.
        f.sa_days_prior_years = vec![77, 77, 77, 77, 77, 365];
        let (resident, _, _) = run(&f);
        assert!(!resident);
    }
}
