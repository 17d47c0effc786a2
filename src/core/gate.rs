use crate::domain::model::{
    AggregatedReport, CounterSet, CoverageCounter, RuleOutcome, Scope, ThresholdRule,
    VerificationResult,
};

const SCALE: f64 = 1_000_000.0;

/// `covered / total >= minimum`, compared exactly with the minimum fixed to
/// six decimal places. Nothing to measure always passes.
pub fn meets_minimum(counter: CoverageCounter, minimum: f64) -> bool {
    let total = counter.total();
    if total == 0 {
        return true;
    }
    let minimum_ppm = (minimum * SCALE).round().max(0.0) as u128;
    counter.covered as u128 * SCALE as u128 >= minimum_ppm * total as u128
}

fn evaluate<'a>(
    scope: Scope,
    subject: &'a str,
    counters: &'a CounterSet,
    rules: &'a [ThresholdRule],
) -> impl Iterator<Item = RuleOutcome> + 'a {
    rules.iter().map(move |rule| {
        let counter = counters.get(rule.counter);
        let passed = meets_minimum(counter, rule.minimum);
        if passed {
            tracing::debug!(
                "{} rule passed for {}: {}/{} >= {:.2}",
                rule.counter,
                subject,
                counter.covered,
                counter.total(),
                rule.minimum
            );
        }
        RuleOutcome {
            scope,
            subject: subject.to_string(),
            rule: *rule,
            counter,
            passed,
        }
    })
}

/// Evaluates every rule against the bundle totals of `report`. With
/// `per_module`, the same rules are then applied to each module's own
/// counters, in module name order.
pub fn verify(report: &AggregatedReport, rules: &[ThresholdRule], per_module: bool) -> VerificationResult {
    let mut outcomes: Vec<RuleOutcome> =
        evaluate(Scope::Bundle, &report.name, &report.totals, rules).collect();

    if per_module {
        for module in report.modules.values() {
            outcomes.extend(evaluate(Scope::Module, &module.name, &module.counters, rules));
        }
    }

    VerificationResult {
        bundle: report.name.clone(),
        outcomes,
    }
}
