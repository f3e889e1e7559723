//! Candidate ranking.
//!
//! The lowest total weight wins. Ties go to the candidate with more exact
//! argument matches, then to a candidate that does not need the variadic
//! expansion.
//!
//! A candidate settles on its fixed or expanded form while it is scored
//! (the fixed form whenever both apply), so the variadic state compared
//! here is already the preferred one. Past that, a full tie keeps the
//! candidate the provider returned first, which keeps repeated resolutions
//! of the same call site stable.

use std::cmp::Ordering;

use crate::conversion::Conversion;

use super::CandidateScore;

/// The best candidate only matches through unchecked casts.
#[derive(Debug, Clone, PartialEq)]
pub struct Ambiguity {
    pub candidates: Vec<String>,
}

impl Ambiguity {
    pub fn describe(&self) -> String {
        self.candidates.join(", ")
    }
}

/// Select the best of the applicable candidates.
///
/// `has_lambda` disables the unchecked-cast ambiguity rule: a lambda
/// argument that compiled against a candidate is evidence enough.
pub fn find_best<T>(
    mut scored: Vec<(CandidateScore, T)>,
    has_lambda: bool,
) -> Result<Option<(CandidateScore, T)>, Ambiguity> {
    if scored.is_empty() {
        return Ok(None);
    }

    let mut best = 0;
    for index in 1..scored.len() {
        if is_better(&scored[index].0, &scored[best].0) {
            best = index;
        }
    }

    let winner = scored.swap_remove(best);
    if !has_lambda && winner.0.weight.0 >= Conversion::WEIGHT_UNCHECKED {
        let mut candidates = vec![winner.0.member.display_signature()];
        candidates.extend(
            scored
                .iter()
                .filter(|(s, _)| s.weight.0 >= Conversion::WEIGHT_UNCHECKED)
                .map(|(s, _)| s.member.display_signature()),
        );
        return Err(Ambiguity { candidates });
    }
    Ok(Some(winner))
}

fn is_better(candidate: &CandidateScore, incumbent: &CandidateScore) -> bool {
    match candidate.weight.cmp(&incumbent.weight) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => break_tie(candidate, incumbent),
    }
}

fn break_tie(candidate: &CandidateScore, incumbent: &CandidateScore) -> bool {
    if candidate.exact_count != incumbent.exact_count {
        return candidate.exact_count > incumbent.exact_count;
    }
    if candidate.uses_params != incumbent.uses_params {
        return !candidate.uses_params;
    }
    false
}
