//! Text processing utilities.

/// True when `content` has no visible characters.
pub fn is_blank(content: &str) -> bool {
    content.chars().all(char::is_whitespace)
}

/// Title-case each whitespace separated word ("hello_world" is one word).
pub fn title_case(content: &str) -> String {
    content
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
