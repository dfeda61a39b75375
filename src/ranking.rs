use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Number of entries kept on the leaderboard
pub const MAX_RANKINGS: usize = 10;

/// A single leaderboard record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    #[serde(alias = "time")]
    pub time_ms: u64,
    #[serde(alias = "date")]
    pub achieved_at: DateTime<Utc>,
}

impl RankingEntry {
    pub fn new(time_ms: u64, achieved_at: DateTime<Utc>) -> Self {
        Self {
            time_ms,
            achieved_at,
        }
    }
}

/// Top reaction times, fastest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rankings {
    entries: Vec<RankingEntry>,
}

impl Rankings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a leaderboard from arbitrary entries, restoring order and size.
    pub fn from_entries(entries: Vec<RankingEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .sorted_by_key(|e| e.time_ms)
                .take(MAX_RANKINGS)
                .collect(),
        }
    }

    /// Inserts a finished round. Returns the 1-based rank if it made the cut.
    pub fn insert(&mut self, entry: RankingEntry) -> Option<usize> {
        // entries are already sorted, so the stable position is after any equal times
        let pos = self.entries.partition_point(|e| e.time_ms <= entry.time_ms);
        if pos >= MAX_RANKINGS {
            return None;
        }
        self.entries.insert(pos, entry);
        self.entries.truncate(MAX_RANKINGS);
        Some(pos + 1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    pub fn best(&self) -> Option<&RankingEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankingEntry> {
        self.entries.iter()
    }
}

/// Qualitative label for a reaction time. Ordered from most to least favorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display)]
pub enum Rating {
    Superhuman,
    VeryFast,
    Fast,
    Average,
    KeepPracticing,
}

const RATING_THRESHOLDS: [(u64, Rating); 4] = [
    (200, Rating::Superhuman),
    (300, Rating::VeryFast),
    (400, Rating::Fast),
    (500, Rating::Average),
];

impl Rating {
    pub fn message(&self) -> &'static str {
        match self {
            Rating::Superhuman => "Superhuman!",
            Rating::VeryFast => "Very fast!",
            Rating::Fast => "Fast!",
            Rating::Average => "Average",
            Rating::KeepPracticing => "Keep practicing",
        }
    }
}

pub fn classify_time(time_ms: u64) -> Rating {
    RATING_THRESHOLDS
        .iter()
        .find(|(limit, _)| time_ms < *limit)
        .map(|(_, rating)| *rating)
        .unwrap_or(Rating::KeepPracticing)
}
