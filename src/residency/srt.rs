//! UK Statutory Residence Test.
//!
//! Three ordered stages: automatic overseas tests, automatic UK tests, then
//! the sufficient ties test, which always terminates.

use super::{ResidencyFacts, RuleTrace};

/// A named SRT rule: `Some(resident)` terminates, `None` falls through.
struct SrtRule {
    name: &'static str,
    test: fn(&ResidencyFacts) -> Option<bool>,
}

/// Automatic tests, in statutory order. Overseas tests run before UK tests.
const AUTOMATIC_RULES: &[SrtRule] = &[
    SrtRule {
        name: "srt: automatic overseas (fewer than 16 days)",
        test: |f| (f.days_in_uk < 16).then_some(false),
    },
    SrtRule {
        name: "srt: automatic overseas (arriver, fewer than 46 days)",
        test: |f| (is_arriver(f) && f.days_in_uk < 46).then_some(false),
    },
    SrtRule {
        name: "srt: automatic overseas (full-time work abroad)",
        test: |f| {
            (f.full_time_work_abroad && f.days_in_uk < 91 && f.uk_work_days <= 30)
                .then_some(false)
        },
    },
    SrtRule {
        name: "srt: automatic uk (183 days or more)",
        test: |f| (f.days_in_uk >= 183).then_some(true),
    },
    SrtRule {
        name: "srt: automatic uk (sole home in the uk)",
        test: |f| (f.sole_home_in_uk && f.days_at_uk_home >= 30).then_some(true),
    },
    SrtRule {
        name: "srt: automatic uk (full-time work in the uk)",
        test: |f| f.full_time_work_uk.then_some(true),
    },
];

/// Not UK resident in any of the three preceding tax years. Missing history
/// counts as non-resident.
fn is_arriver(facts: &ResidencyFacts) -> bool {
    !facts
        .uk_resident_prior_years
        .iter()
        .take(3)
        .any(|resident| *resident)
}

fn tie_count(facts: &ResidencyFacts, leaver: bool) -> u32 {
    let work_tie = facts.uk_work_days >= 40;
    [
        facts.family_tie,
        facts.accommodation_tie,
        work_tie,
        facts.ninety_day_tie,
        // The country tie applies to leavers only.
        leaver && facts.country_tie,
    ]
    .iter()
    .filter(|tie| **tie)
    .count() as u32
}

/// Ties needed at this day count; `None` means non-resident regardless of
/// ties.
fn ties_required(days: u32, arriver: bool) -> Option<u32> {
    if arriver {
        match days {
            46..=90 => Some(4),
            91..=120 => Some(3),
            121..=182 => Some(2),
            _ => None,
        }
    } else {
        match days {
            16..=45 => Some(4),
            46..=90 => Some(3),
            91..=120 => Some(2),
            121..=182 => Some(1),
            _ => None,
        }
    }
}

/// Evaluate the SRT. Always terminates: the sufficient ties test decides
/// whatever the automatic tests leave open.
pub fn uk_statutory_residence(facts: &ResidencyFacts, trace: &mut Vec<RuleTrace>) -> bool {
    for rule in AUTOMATIC_RULES {
        match (rule.test)(facts) {
            Some(resident) => {
                let outcome = if resident { "resident" } else { "non-resident" };
                trace.push(RuleTrace::new(rule.name, outcome));
                return resident;
            }
            None => trace.push(RuleTrace::new(rule.name, "not met")),
        }
    }

    let arriver = is_arriver(facts);
    let leaver = !arriver;
    let ties = tie_count(facts, leaver);
    let (resident, outcome) = match ties_required(facts.days_in_uk, arriver) {
        Some(required) => {
            let resident = ties >= required;
            (
                resident,
                format!(
                    "{} with {} ties ({} required at {} days, {})",
                    if resident { "resident" } else { "non-resident" },
                    ties,
                    required,
                    facts.days_in_uk,
                    if arriver { "arriver" } else { "leaver" },
                ),
            )
        }
        None => (
            false,
            format!("non-resident (day count {} below any ties band)", facts.days_in_uk),
        ),
    };
    trace.push(RuleTrace::new("srt: sufficient ties", outcome));
    resident
}
