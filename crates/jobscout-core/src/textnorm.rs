//! Text normalization shared by scoring and the post-filter.
//!
//! Provider payloads mix cases and diacritics freely ("Zürich" vs
//! "Zurich", "café" vs "cafe"); everything that compares text first goes
//! through [`normalize`] so those variants coincide.

/// Lowercase and fold common Latin diacritics to ASCII.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' => out.push('a'),
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => out.push('e'),
            'ì' | 'í' | 'î' | 'ï' | 'ī' => out.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => out.push('o'),
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ű' => out.push('u'),
            'ý' | 'ÿ' => out.push('y'),
            'ñ' | 'ń' | 'ň' => out.push('n'),
            'ç' | 'ć' | 'č' => out.push('c'),
            'ś' | 'š' => out.push('s'),
            'ź' | 'ż' | 'ž' => out.push('z'),
            'ł' => out.push('l'),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'œ' => out.push_str("oe"),
            _ => out.push(c),
        }
    }
    out
}

/// Words that carry no signal for matching query terms against listings.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "for", "in", "is", "of", "on", "or",
    "the", "to", "with",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Split normalized text into significant words.
///
/// Tokens keep `+`, `#`, and interior dots so "c++", "c#", and "node.js"
/// survive; stop words and single characters are dropped.
pub fn extract_words(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#' || c == '.'))
        .map(|token| token.trim_matches('.'))
        .filter(|token| token.chars().count() >= 2 && !is_stop_word(token))
        .map(str::to_string)
        .collect()
}
