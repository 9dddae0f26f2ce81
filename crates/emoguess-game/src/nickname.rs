use rand::seq::IndexedRandom;

const ADJECTIVES: &[&str] = &[
    "silly", "handsome", "angry", "sleepy", "brave", "fuzzy", "grumpy", "jolly", "sneaky", "wobbly",
];

const ANIMALS: &[&str] = &[
    "cat", "dog", "mouse", "otter", "panda", "llama", "badger", "walrus", "gecko", "puffin",
];

/// Random display name such as `SillyCat`.
pub fn generate() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("silly");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("cat");
    format!("{}{}", capitalize(adjective), capitalize(animal))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
