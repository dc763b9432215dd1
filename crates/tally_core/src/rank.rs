use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rank {
    pub name: &'static str,
    pub min_score: i64,
    pub color: &'static str,
}

/// Ordered by ascending `min_score`; the first entry is the floor for every score.
pub const RANKS: [Rank; 5] = [
    Rank {
        name: "Novice",
        min_score: 0,
        color: "gray",
    },
    Rank {
        name: "Rising Star",
        min_score: 50,
        color: "blue",
    },
    Rank {
        name: "Expert",
        min_score: 100,
        color: "green",
    },
    Rank {
        name: "Master",
        min_score: 200,
        color: "purple",
    },
    Rank {
        name: "Champion",
        min_score: 500,
        color: "yellow",
    },
];

pub fn rank_for_score(score: i64) -> &'static Rank {
    RANKS
        .iter()
        .rev()
        .find(|rank| score >= rank.min_score)
        .unwrap_or(&RANKS[0])
}
