use std::collections::BTreeMap;

use super::*;

use crate::config::ScorePart;

impl Judge {
    pub(super) fn evaluation_step(&self, record: &mut PhaseRecord) {
        log::info!("---- evaluation step ----");

        match record.scores.clone() {
            Some(Scores::Plan(plan)) => {
                log::info!(".... scores evaluation ....");
                let (verdict, score, parts) = score_parts(&plan, &self.tests, &record.tests);
                log::info!("   = score {score}");
                record.verdict = verdict;
                record.score = Some(score);
                record.scores = Some(Scores::Results(parts));
            }
            _ => {
                log::info!(".... standard evaluation ....");
                let (verdict, info) = evaluate_tests(&self.tests, &record.tests);
                record.verdict = verdict;
                record.verdict_info = info;
            }
        }
    }
}

/// Most severe verdict among `tests`, in test order
fn evaluate_tests<'a, I>(
    tests: I,
    results: &BTreeMap<String, TestResult>,
) -> (Verdict, Option<String>)
where
    I: IntoIterator<Item = &'a String>,
{
    aggregate(
        tests
            .into_iter()
            .filter_map(|test| results.get(test))
            .map(|result| (result.verdict, result.verdict_info.as_deref())),
    )
}

/// Awards each part its points iff all of its tests are accepted
fn score_parts(
    plan: &[ScorePart],
    tests: &[String],
    results: &BTreeMap<String, TestResult>,
) -> (Verdict, String, Vec<PartScore>) {
    let mut achieved = 0;
    let mut total = 0;
    let mut parts = Vec::with_capacity(plan.len());

    for part in plan {
        total += part.points;
        let members: Vec<String> = tests
            .iter()
            .filter(|test| test.starts_with(&part.prefix))
            .cloned()
            .collect();
        let (verdict, verdict_info) = evaluate_tests(&members, results);
        let points = if verdict == Verdict::AC { part.points } else { 0 };
        achieved += points;
        parts.push(PartScore {
            part: part.part.clone(),
            prefix: part.prefix.clone(),
            tests: members,
            points,
            verdict,
            verdict_info,
        });
    }

    let verdict = if achieved == total {
        Verdict::AC
    } else {
        Verdict::SC
    };
    (verdict, format!("{achieved}/{total}"), parts)
}
