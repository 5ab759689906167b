//! Nickname helpers: a random default and fallbacks when a nick is taken.

use rand::RngExt;

/// IRC servers commonly cap nicknames at nine characters.
pub const MAX_NICK_LEN: usize = 9;

const ADJECTIVES: &[&str] = &[
    "Rusty", "Neon", "Salty", "Lunar", "Tidal", "Frost", "Coral", "Dark", "Pixel", "Ghost",
    "Hyper", "Sandy", "Iron", "Cobalt", "Azure", "Hex",
];

const NOUNS: &[&str] = &[
    "Crab", "Squid", "Eel", "Ray", "Clam", "Shrimp", "Urchin", "Krill", "Seal", "Pike", "Reef",
    "Kelp", "Byte", "Node",
];

/// Random nickname like `NeonCrab42`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let adj = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let num: u8 = rng.random_range(0..100);
    format!("{}{}{}", adj, noun, num)
}

/// Next nickname to try after `nick` was rejected as in use: append `_`
/// while there is room, otherwise replace the last character with a digit.
pub fn alternate_nickname(nick: &str, attempt: usize) -> String {
    if nick.chars().count() < MAX_NICK_LEN {
        return format!("{}_", nick);
    }
    let mut base: String = nick.chars().take(MAX_NICK_LEN - 1).collect();
    base.push(char::from_digit((attempt % 10) as u32, 10).unwrap_or('0'));
    base
}
