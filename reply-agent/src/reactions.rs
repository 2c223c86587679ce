use crate::types::Reaction;

/// Number of reactions embedded in a reply prompt
pub const TOP_REACTIONS: usize = 4;

pub const REACTION_DELIMITER: &str = ", ";

/// Highest scoring reaction texts, best first. Ties keep feed order.
pub fn top_reactions(reactions: &[Reaction], k: usize) -> Vec<&str> {
    let mut ranked: Vec<&Reaction> = reactions.iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.into_iter().take(k).map(|r| r.text.as_str()).collect()
}

/// Top `k` reaction texts joined for prompt embedding; empty input gives ""
pub fn select(reactions: &[Reaction], k: usize) -> String {
    top_reactions(reactions, k).join(REACTION_DELIMITER)
}
