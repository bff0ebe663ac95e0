use serde::Serialize;

/// Grade for how quickly the target was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
    Instant,
    Devoted,
    Relentless,
    Tireless,
    Admiring,
    Romantic,
    Enthusiastic,
    Indifferent,
}

const TIERS: [(u64, Verdict); 7] = [
    (3, Verdict::Instant),
    (5, Verdict::Devoted),
    (10, Verdict::Relentless),
    (15, Verdict::Tireless),
    (20, Verdict::Admiring),
    (25, Verdict::Romantic),
    (30, Verdict::Enthusiastic),
];

impl Verdict {
    pub fn from_elapsed(secs: u64) -> Self {
        TIERS
            .iter()
            .find(|(limit, _)| secs < *limit)
            .map(|(_, v)| *v)
            .unwrap_or(Verdict::Indifferent)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Instant => "Found before you even looked",
            Verdict::Devoted => "You clearly know what you are after",
            Verdict::Relentless => "Your persistence shows",
            Verdict::Tireless => "Searching every corner, a fine attitude",
            Verdict::Admiring => "Tracking it down was the best part",
            Verdict::Romantic => "The hunt itself is the romance",
            Verdict::Enthusiastic => "There is real love in that search",
            Verdict::Indifferent => "Not much enthusiasm for the hunt today",
        }
    }
}
