use serde::{Deserialize, Serialize};

/// How hard a phoneme typically is for learners to acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A target-language (English) phoneme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhonemeSymbol {
    pub symbol: &'static str,
    pub difficulty: Difficulty,
}

const fn phoneme(symbol: &'static str, difficulty: Difficulty) -> PhonemeSymbol {
    PhonemeSymbol { symbol, difficulty }
}

/// English phoneme inventory (General American).
pub const ALPHABET: &[PhonemeSymbol] = &[
    // Consonants
    phoneme("p", Difficulty::Easy),
    phoneme("b", Difficulty::Easy),
    phoneme("t", Difficulty::Easy),
    phoneme("d", Difficulty::Easy),
    phoneme("k", Difficulty::Easy),
    phoneme("ɡ", Difficulty::Easy),
    phoneme("f", Difficulty::Easy),
    phoneme("v", Difficulty::Medium),
    phoneme("θ", Difficulty::Hard),
    phoneme("ð", Difficulty::Hard),
    phoneme("s", Difficulty::Easy),
    phoneme("z", Difficulty::Medium),
    phoneme("ʃ", Difficulty::Medium),
    phoneme("ʒ", Difficulty::Hard),
    phoneme("h", Difficulty::Easy),
    phoneme("tʃ", Difficulty::Medium),
    phoneme("dʒ", Difficulty::Medium),
    phoneme("m", Difficulty::Easy),
    phoneme("n", Difficulty::Easy),
    phoneme("ŋ", Difficulty::Medium),
    phoneme("l", Difficulty::Medium),
    phoneme("ɹ", Difficulty::Hard),
    phoneme("w", Difficulty::Medium),
    phoneme("j", Difficulty::Easy),
    // Vowels
    phoneme("i", Difficulty::Easy),
    phoneme("ɪ", Difficulty::Hard),
    phoneme("eɪ", Difficulty::Easy),
    phoneme("ɛ", Difficulty::Medium),
    phoneme("æ", Difficulty::Hard),
    phoneme("ɑ", Difficulty::Medium),
    phoneme("ɔ", Difficulty::Medium),
    phoneme("oʊ", Difficulty::Easy),
    phoneme("ʊ", Difficulty::Hard),
    phoneme("u", Difficulty::Easy),
    phoneme("ʌ", Difficulty::Medium),
    phoneme("ə", Difficulty::Medium),
    phoneme("ɚ", Difficulty::Hard),
    phoneme("ɝ", Difficulty::Hard),
    phoneme("aɪ", Difficulty::Easy),
    phoneme("aʊ", Difficulty::Easy),
    phoneme("ɔɪ", Difficulty::Easy),
];

/// Acoustically confusable pairs. Membership lowers substitution cost only.
const SIMILARITY_GROUPS: &[&[&str]] = &[
    &["p", "b"],
    &["t", "d"],
    &["k", "ɡ"],
    &["f", "v"],
    &["θ", "ð"],
    &["s", "z"],
    &["ʃ", "ʒ"],
    &["tʃ", "dʒ"],
    &["v", "w"],
    &["l", "ɹ"],
    &["m", "n"],
    &["n", "ŋ"],
    &["i", "ɪ"],
    &["u", "ʊ"],
    &["ɛ", "æ"],
    &["ɛ", "eɪ"],
    &["ɑ", "ʌ"],
    &["ɑ", "ɔ"],
    &["ɔ", "oʊ"],
    &["ə", "ʌ"],
    &["ə", "ɚ"],
    &["ɚ", "ɝ"],
];

/// Look up a symbol in the alphabet.
pub fn lookup(symbol: &str) -> Option<&'static PhonemeSymbol> {
    ALPHABET.iter().find(|p| p.symbol == symbol)
}

pub fn is_known(symbol: &str) -> bool {
    lookup(symbol).is_some()
}

/// Acquisition difficulty; symbols outside the alphabet count as medium.
pub fn difficulty(symbol: &str) -> Difficulty {
    lookup(symbol)
        .map(|p| p.difficulty)
        .unwrap_or(Difficulty::Medium)
}

/// Whether two distinct symbols share a similarity group.
pub fn are_similar(a: &str, b: &str) -> bool {
    a != b
        && SIMILARITY_GROUPS
            .iter()
            .any(|group| group.contains(&a) && group.contains(&b))
}

/// Substitution cost used by the phoneme aligner: 0, 0.5 or 1.
pub fn substitution_cost(expected: &str, recognized: &str) -> f64 {
    if expected == recognized {
        0.0
    } else if are_similar(expected, recognized) {
        0.5
    } else {
        1.0
    }
}

/// Split an IPA transcription into alphabet symbols.
///
/// Stress and length marks are removed, common espeak-ng variants are mapped
/// onto the alphabet and anything that still does not match is dropped.
pub fn segment_ipa(ipa: &str) -> Vec<String> {
    let chars: Vec<char> = ipa.chars().flat_map(normalize_char).collect();

    let mut symbols = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if i + 1 < chars.len() {
            let pair: String = chars[i..i + 2].iter().collect();
            if is_known(&pair) {
                symbols.push(pair);
                i += 2;
                continue;
            }
        }

        let single = chars[i].to_string();
        if is_known(&single) {
            symbols.push(single);
        } else if let Some(mapped) = bare_vowel(chars[i]) {
            symbols.push(mapped.to_string());
        }
        i += 1;
    }
    symbols
}

/// Normalize symbols supplied by an upstream recognizer.
pub fn normalize_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
    symbols
        .iter()
        .flat_map(|s| segment_ipa(s.as_ref()))
        .collect()
}

fn normalize_char(ch: char) -> Vec<char> {
    match ch {
        'ˈ' | 'ˌ' | 'ː' | 'ˑ' | '_' | '-' | '\'' => vec![],
        c if c.is_whitespace() => vec![],
        // Combining diacritics (syllabic, nasalized, ...)
        '\u{0300}'..='\u{036f}' => vec![],
        'r' | 'ɻ' => vec!['ɹ'],
        'g' => vec!['ɡ'],
        'ɜ' => vec!['ɝ'],
        'ɐ' => vec!['ʌ'],
        'ᵻ' => vec!['ɪ'],
        'ɾ' => vec!['t'],
        'ɫ' => vec!['l'],
        'ɒ' => vec!['ɑ'],
        'ʧ' => vec!['t', 'ʃ'],
        'ʤ' => vec!['d', 'ʒ'],
        'ʍ' => vec!['w'],
        c => vec![c],
    }
}

fn bare_vowel(ch: char) -> Option<&'static str> {
    match ch {
        'e' => Some("ɛ"),
        'o' => Some("oʊ"),
        'a' => Some("æ"),
        'ɨ' => Some("ɪ"),
        'ʉ' => Some("u"),
        'ɯ' => Some("u"),
        _ => None,
    }
}
