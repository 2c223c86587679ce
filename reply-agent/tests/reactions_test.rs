use reply_agent::llm_adapter::{build_request, SYSTEM_INSTRUCTION};
use reply_agent::reactions::{select, top_reactions, TOP_REACTIONS};
use reply_agent::{Item, Reaction};

fn reactions(pairs: &[(&str, i64)]) -> Vec<Reaction> {
    pairs.iter().map(|(text, score)| Reaction::new(*text, *score)).collect()
}

#[test]
fn test_select_orders_by_descending_score() {
    let input = reactions(&[("meh", 1), ("lol", 5), ("ouch", -3), ("nice", 2)]);
    assert_eq!(select(&input, TOP_REACTIONS), "lol, nice, meh, ouch");
}

#[test]
fn test_select_keeps_at_most_k() {
    let input = reactions(&[("a", 1), ("b", 9), ("c", 4), ("d", 7), ("e", 3), ("f", 8)]);
    let top = top_reactions(&input, TOP_REACTIONS);
    assert_eq!(top, vec!["b", "f", "d", "c"]);
}

#[test]
fn test_select_is_stable_on_ties() {
    let input = reactions(&[("first", 2), ("second", 2), ("big", 10), ("third", 2), ("fourth", 2)]);
    assert_eq!(select(&input, TOP_REACTIONS), "big, first, second, third");
}

#[test]
fn test_select_empty_input_is_empty_string() {
    assert_eq!(select(&[], TOP_REACTIONS), "");
    assert_eq!(select(&reactions(&[("only", 3)]), 0), "");
}

#[test]
fn test_prompt_embeds_title_body_and_top_reactions() {
    let item = Item::new("1", "Cats are liquid")
        .with_body("Proof inside")
        .with_reactions(reactions(&[("meh", 1), ("lol", 5)]));

    let request = build_request(&item, TOP_REACTIONS);

    assert_eq!(request.system_instruction, SYSTEM_INSTRUCTION);
    assert!(request.user_prompt.contains("Cats are liquid"));
    assert!(request.user_prompt.contains("Proof inside"));
    assert!(request.user_prompt.contains("lol, meh"));
    assert!(request.user_prompt.contains("Never be aggressive or offensive"));
}

#[test]
fn test_default_config_prompts_with_top_four() {
    assert_eq!(reply_agent::AgentConfig::default().top_reactions, TOP_REACTIONS);
    assert_eq!(TOP_REACTIONS, 4);
}
