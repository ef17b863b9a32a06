use serde::Serialize;

/// One ranked remote resource eligible for probing during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// 1-based position in the source listing; lower ranks are probed first.
    pub rank: u32,
    /// Opaque resource locator (an absolute URL in the HTTP realization).
    pub identifier: String,
}

/// Builds the ranked candidate list from raw identifiers.
///
/// First-seen order is preserved, duplicates are dropped, and the list is
/// truncated at `cap`. Ranks are assigned 1..=n after deduplication.
pub fn collect_ranked<I>(identifiers: I, cap: usize) -> Vec<Candidate>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<Candidate> = Vec::new();
    for identifier in identifiers {
        if out.len() >= cap {
            break;
        }
        if out.iter().any(|c| c.identifier == identifier) {
            continue;
        }
        let rank = out.len() as u32 + 1;
        out.push(Candidate { rank, identifier });
    }
    out
}
