//! UK domicile and deemed domicile.

use super::{DomicileStatus, ResidencyFacts, RuleTrace};

const LONG_RESIDENCE_WINDOW: usize = 20;
const LONG_RESIDENCE_YEARS: usize = 15;

/// Declared domicile plus the deemed-domicile overlay.
///
/// Deemed domicile is purely additive: it widens the tax-liability scope
/// but never changes the declared domicile itself.
pub fn determine_domicile(facts: &ResidencyFacts, trace: &mut Vec<RuleTrace>) -> DomicileStatus {
    let uk_domiciled = facts
        .uk_domicile_of_choice
        .unwrap_or(facts.uk_domicile_of_origin);

    let resident_of_last_20 = facts
        .uk_resident_prior_years
        .iter()
        .take(LONG_RESIDENCE_WINDOW)
        .filter(|resident| **resident)
        .count();
    let long_residence = resident_of_last_20 >= LONG_RESIDENCE_YEARS;
    trace.push(RuleTrace::new(
        "domicile: long residence",
        if long_residence {
            format!("deemed domiciled (resident {resident_of_last_20} of last 20 years)")
        } else {
            format!("not met (resident {resident_of_last_20} of last 20 years)")
        },
    ));

    let recently_resident = facts
        .uk_resident_prior_years
        .iter()
        .take(2)
        .any(|resident| *resident);
    let returned_origin = facts.uk_domicile_of_origin && recently_resident;
    trace.push(RuleTrace::new(
        "domicile: origin with recent residence",
        if returned_origin {
            "deemed domiciled (uk origin, resident within last 2 years)".to_string()
        } else {
            "not met".to_string()
        },
    ));

    let deemed_domiciled = long_residence || returned_origin;
    trace.push(RuleTrace::new(
        "domicile: declared",
        if uk_domiciled { "uk" } else { "non-uk" },
    ));

    DomicileStatus {
        uk_domiciled,
        deemed_domiciled,
    }
}

#[cfg(test)]
mod tests {
    use super::super::facts;
    use super::*;

    fn run(f: &ResidencyFacts) -> DomicileStatus {
        let mut trace = Vec::new();
        determine_domicile(f, &mut trace)
    }

    #[test]
    fn fifteen_of_twenty_years_deems_domicile() {
        let mut f = facts();
        f.uk_domicile_of_origin = false;
        f.uk_resident_prior_years = vec![true; 15];
        let status = run(&f);
        assert!(status.deemed_domiciled);
        assert!(!status.uk_domiciled);
    }

    #[test]
    fn fourteen_of_twenty_is_not_deemed() {
        let mut f = facts();
        f.uk_resident_prior_years = vec![true; 14];
        assert!(!run(&f).deemed_domiciled);
    }

    #[test]
    fn years_beyond_twenty_ignored() {
        let mut f = facts();
        // 15 resident years, but only 10 fall within the last 20.
        let mut history = vec![false; 10];
        history.extend(vec![true; 15]);
        f.uk_resident_prior_years = history;
        assert!(!run(&f).deemed_domiciled);
    }

    #[test]
    fn origin_with_recent_residence_deems_domicile() {
        let mut f = facts();
        f.uk_domicile_of_origin = true;
        f.uk_domicile_of_choice = Some(false);
        f.uk_resident_prior_years = vec![false, true, false];
        let status = run(&f);
        assert!(status.deemed_domiciled);
        // The declared domicile of choice stands.
        assert!(!status.uk_domiciled);
    }

    #[test]
    fn origin_without_recent_residence_is_not_deemed() {
        let mut f = facts();
        f.uk_domicile_of_origin = true;
        f.uk_domicile_of_choice = Some(false);
        f.uk_resident_prior_years = vec![false, false, true];
        assert!(!run(&f).deemed_domiciled);
    }

    #[test]
    fn choice_displaces_origin() {
        let mut f = facts();
        f.uk_domicile_of_origin = false;
        f.uk_domicile_of_choice = Some(true);
        assert!(run(&f).uk_domiciled);

        f.uk_domicile_of_choice = None;
        assert!(!run(&f).uk_domiciled);
    }
}
