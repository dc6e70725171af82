use std::collections::HashSet;

/// Words that get a report rejected outright. Matched case-insensitively as
/// whole words, English and Portuguese.
const BANNED_WORDS: &[&str] = &[
    // en
    "fuck", "fucking", "fucker", "shit", "bullshit", "bitch", "bastard", "asshole", "dickhead",
    "motherfucker", "cunt", "wanker", "slut", "whore",
    // pt
    "porra", "caralho", "merda", "puta", "putaria", "cacete", "arrombado", "arrombada",
    "desgraçado", "desgraçada", "vagabundo", "vagabunda", "fdp", "vsf", "pqp", "cuzão", "otário",
    "otária", "babaca", "escroto", "escrota",
];

/// Rejects text containing any banned word.
#[derive(Debug, Clone)]
pub struct ProfanityFilter {
    words: HashSet<String>,
}

impl Default for ProfanityFilter {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl ProfanityFilter {
    /// Built-in list plus `extra` words (e.g. from configuration).
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = BANNED_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(
                extra
                    .into_iter()
                    .map(|w| w.as_ref().trim().to_lowercase())
                    .filter(|w| !w.is_empty()),
            )
            .collect();
        Self { words }
    }

    pub fn is_profane(&self, text: &str) -> bool {
        let plain = strip_tags(text).to_lowercase();
        plain
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .any(|w| self.words.contains(w))
    }
}

/// Replace HTML tags with spaces so markup cannot split or join words.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
