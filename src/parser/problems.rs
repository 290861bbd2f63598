use crate::models::{CleanProblem, ProblemType, RawProblemEntry};

use super::normalize::{clean_count, clean_link, clean_problem_name};

const PLACEHOLDER_NAMES: &[&str] = &["", "n/a", "none", "null"];

/// Cleans one raw entry, or `None` when its name is a placeholder.
/// The caller's `problem_type` wins over whatever `type` the entry carries.
pub fn clean_problem(raw: &RawProblemEntry, problem_type: ProblemType) -> Option<CleanProblem> {
    let name = raw.problem_name.trim();
    let lowered = name.to_lowercase();
    if PLACEHOLDER_NAMES.contains(&lowered.as_str()) {
        return None;
    }

    Some(CleanProblem {
        problem_name: clean_problem_name(name),
        count: clean_count(raw.count.as_ref()),
        maude_link: clean_link(raw.maude_link.as_deref().unwrap_or("")),
        problem_type,
    })
}

/// Cleans a whole list, dropping rejects, ordered by count desc then name asc.
pub fn clean_problems(raw: &[RawProblemEntry], problem_type: ProblemType) -> Vec<CleanProblem> {
    let mut cleaned: Vec<CleanProblem> = raw
        .iter()
        .filter_map(|p| clean_problem(p, problem_type))
        .collect();
    cleaned.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.problem_name.cmp(&b.problem_name))
    });
    cleaned
}
