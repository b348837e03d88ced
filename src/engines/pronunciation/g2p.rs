use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
#[cfg(feature = "espeak")]
use std::time::Instant;

#[cfg(feature = "espeak")]
use std::borrow::Cow;
#[cfg(feature = "espeak")]
use std::io::Write;
#[cfg(feature = "espeak")]
use std::path::PathBuf;
#[cfg(feature = "espeak")]
use std::process::{Command, Stdio};

use super::align::normalize_word;
use super::model::G2pError;
use super::phonemes;

/// Target language passed to external converters.
pub const TARGET_LANGUAGE: &str = "en";

/// Default per-call budget for an external converter.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// External grapheme-to-phoneme converter.
///
/// Implementations may be slow or fail; the [`G2pBridge`] bounds every call
/// with a timeout and falls back to the built-in rules.
pub trait G2pConverter: Send + Sync {
    /// Convert one word to a sequence of IPA symbols.
    fn convert(&self, word: &str, language: &str) -> Result<Vec<String>, G2pError>;

    /// Convert within `budget`. Converters that own external resources
    /// override this to release them once the budget is spent.
    fn convert_within(
        &self,
        word: &str,
        language: &str,
        budget: Duration,
    ) -> Result<Vec<String>, G2pError> {
        let _ = budget;
        self.convert(word, language)
    }

    /// Human-readable name of this converter.
    fn name(&self) -> &'static str;
}

/// Converts reference words to phoneme sequences.
///
/// Uses the external converter when one is attached and it answers in time,
/// otherwise the built-in dictionary and spelling rules. Never fails.
#[derive(Clone)]
pub struct G2pBridge {
    converter: Option<Arc<dyn G2pConverter>>,
    timeout: Duration,
}

impl Default for G2pBridge {
    fn default() -> Self {
        Self::fallback_only()
    }
}

impl std::fmt::Debug for G2pBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("G2pBridge")
            .field("converter", &self.converter.as_ref().map(|c| c.name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl G2pBridge {
    /// A bridge that only uses the built-in converter.
    pub fn fallback_only() -> Self {
        Self {
            converter: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A bridge that tries `converter` first, waiting at most `timeout` per word.
    pub fn with_converter(converter: Arc<dyn G2pConverter>, timeout: Duration) -> Self {
        Self {
            converter: Some(converter),
            timeout,
        }
    }

    /// Same converter, different per-word budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn converter_name(&self) -> Option<&'static str> {
        self.converter.as_ref().map(|c| c.name())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Convert a word to its phoneme sequence.
    pub fn to_phonemes(&self, word: &str) -> Vec<String> {
        let normalized = normalize_word(word);
        if normalized.is_empty() {
            return Vec::new();
        }

        if let Some(converter) = &self.converter {
            match convert_with_timeout(converter, &normalized, self.timeout) {
                Ok(symbols) => {
                    let symbols: Vec<String> = symbols
                        .into_iter()
                        .filter(|s| phonemes::is_known(s))
                        .collect();
                    if !symbols.is_empty() {
                        return symbols;
                    }
                    log::debug!(
                        "{} returned no usable phonemes for {normalized:?}, using fallback",
                        converter.name()
                    );
                }
                Err(e) => {
                    log::warn!("G2P conversion of {normalized:?} failed, using fallback: {e}");
                }
            }
        }

        fallback_phonemes(&normalized)
    }

    /// Convert several words, one bounded call per word.
    pub fn to_phonemes_batch<S: AsRef<str>>(&self, words: &[S]) -> Vec<Vec<String>> {
        words.iter().map(|w| self.to_phonemes(w.as_ref())).collect()
    }
}

fn convert_with_timeout(
    converter: &Arc<dyn G2pConverter>,
    word: &str,
    timeout: Duration,
) -> Result<Vec<String>, G2pError> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(converter);
    let owned_word = word.to_string();

    thread::Builder::new()
        .name("g2p-convert".to_string())
        .spawn(move || {
            // The receiver is gone if the call already timed out.
            let _ = tx.send(worker.convert_within(&owned_word, TARGET_LANGUAGE, timeout));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(G2pError::Timeout {
            converter: converter.name(),
            timeout,
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(G2pError::Disconnected(converter.name()))
        }
    }
}

/// Built-in converter: curated dictionary first, then spelling rules.
pub fn fallback_phonemes(word: &str) -> Vec<String> {
    let normalized = normalize_word(word);
    if let Some(symbols) = lexicon_lookup(&normalized) {
        return symbols.iter().map(|s| s.to_string()).collect();
    }
    rule_phonemes(&normalized)
}

fn lexicon_lookup(word: &str) -> Option<&'static [&'static str]> {
    LEXICON
        .iter()
        .find(|(entry, _)| *entry == word)
        .map(|(_, symbols)| *symbols)
}

const LEXICON: &[(&str, &[&str])] = &[
    ("a", &["ə"]),
    ("an", &["æ", "n"]),
    ("and", &["æ", "n", "d"]),
    ("are", &["ɑ", "ɹ"]),
    ("bad", &["b", "æ", "d"]),
    ("bath", &["b", "æ", "θ"]),
    ("beach", &["b", "i", "tʃ"]),
    ("because", &["b", "ɪ", "k", "ʌ", "z"]),
    ("bed", &["b", "ɛ", "d"]),
    ("bird", &["b", "ɝ", "d"]),
    ("birthday", &["b", "ɝ", "θ", "d", "eɪ"]),
    ("book", &["b", "ʊ", "k"]),
    ("both", &["b", "oʊ", "θ"]),
    ("brother", &["b", "ɹ", "ʌ", "ð", "ɚ"]),
    ("cap", &["k", "æ", "p"]),
    ("cat", &["k", "æ", "t"]),
    ("church", &["tʃ", "ɝ", "tʃ"]),
    ("clothes", &["k", "l", "oʊ", "ð", "z"]),
    ("coffee", &["k", "ɑ", "f", "i"]),
    ("come", &["k", "ʌ", "m"]),
    ("comfortable", &["k", "ʌ", "m", "f", "t", "ɚ", "b", "ə", "l"]),
    ("cup", &["k", "ʌ", "p"]),
    ("cut", &["k", "ʌ", "t"]),
    ("day", &["d", "eɪ"]),
    ("do", &["d", "u"]),
    ("does", &["d", "ʌ", "z"]),
    ("english", &["ɪ", "ŋ", "ɡ", "l", "ɪ", "ʃ"]),
    ("father", &["f", "ɑ", "ð", "ɚ"]),
    ("february", &["f", "ɛ", "b", "j", "u", "ɛ", "ɹ", "i"]),
    ("five", &["f", "aɪ", "v"]),
    ("food", &["f", "u", "d"]),
    ("fool", &["f", "u", "l"]),
    ("four", &["f", "ɔ", "ɹ"]),
    ("friend", &["f", "ɹ", "ɛ", "n", "d"]),
    ("full", &["f", "ʊ", "l"]),
    ("girl", &["ɡ", "ɝ", "l"]),
    ("go", &["ɡ", "oʊ"]),
    ("good", &["ɡ", "ʊ", "d"]),
    ("has", &["h", "æ", "z"]),
    ("have", &["h", "æ", "v"]),
    ("he", &["h", "i"]),
    ("hello", &["h", "ɛ", "l", "oʊ"]),
    ("help", &["h", "ɛ", "l", "p"]),
    ("how", &["h", "aʊ"]),
    ("i", &["aɪ"]),
    ("in", &["ɪ", "n"]),
    ("is", &["ɪ", "z"]),
    ("island", &["aɪ", "l", "ə", "n", "d"]),
    ("it", &["ɪ", "t"]),
    ("job", &["dʒ", "ɑ", "b"]),
    ("judge", &["dʒ", "ʌ", "dʒ"]),
    ("learn", &["l", "ɝ", "n"]),
    ("leave", &["l", "i", "v"]),
    ("led", &["l", "ɛ", "d"]),
    ("library", &["l", "aɪ", "b", "ɹ", "ɛ", "ɹ", "i"]),
    ("light", &["l", "aɪ", "t"]),
    ("like", &["l", "aɪ", "k"]),
    ("live", &["l", "ɪ", "v"]),
    ("long", &["l", "ɔ", "ŋ"]),
    ("look", &["l", "ʊ", "k"]),
    ("love", &["l", "ʌ", "v"]),
    ("man", &["m", "æ", "n"]),
    ("measure", &["m", "ɛ", "ʒ", "ɚ"]),
    ("men", &["m", "ɛ", "n"]),
    ("morning", &["m", "ɔ", "ɹ", "n", "ɪ", "ŋ"]),
    ("mother", &["m", "ʌ", "ð", "ɚ"]),
    ("night", &["n", "aɪ", "t"]),
    ("no", &["n", "oʊ"]),
    ("of", &["ʌ", "v"]),
    ("often", &["ɔ", "f", "ə", "n"]),
    ("one", &["w", "ʌ", "n"]),
    ("people", &["p", "i", "p", "ə", "l"]),
    ("please", &["p", "l", "i", "z"]),
    ("put", &["p", "ʊ", "t"]),
    ("red", &["ɹ", "ɛ", "d"]),
    ("rice", &["ɹ", "aɪ", "s"]),
    ("right", &["ɹ", "aɪ", "t"]),
    ("ring", &["ɹ", "ɪ", "ŋ"]),
    ("rural", &["ɹ", "ʊ", "ɹ", "ə", "l"]),
    ("school", &["s", "k", "u", "l"]),
    ("she", &["ʃ", "i"]),
    ("sheep", &["ʃ", "i", "p"]),
    ("ship", &["ʃ", "ɪ", "p"]),
    ("sing", &["s", "ɪ", "ŋ"]),
    ("speak", &["s", "p", "i", "k"]),
    ("squirrel", &["s", "k", "w", "ɝ", "ə", "l"]),
    ("tea", &["t", "i"]),
    ("thank", &["θ", "æ", "ŋ", "k"]),
    ("thanks", &["θ", "æ", "ŋ", "k", "s"]),
    ("than", &["ð", "æ", "n"]),
    ("that", &["ð", "æ", "t"]),
    ("the", &["ð", "ə"]),
    ("their", &["ð", "ɛ", "ɹ"]),
    ("then", &["ð", "ɛ", "n"]),
    ("there", &["ð", "ɛ", "ɹ"]),
    ("these", &["ð", "i", "z"]),
    ("they", &["ð", "eɪ"]),
    ("thing", &["θ", "ɪ", "ŋ"]),
    ("think", &["θ", "ɪ", "ŋ", "k"]),
    ("thirty", &["θ", "ɝ", "t", "i"]),
    ("this", &["ð", "ɪ", "s"]),
    ("those", &["ð", "oʊ", "z"]),
    ("thought", &["θ", "ɔ", "t"]),
    ("three", &["θ", "ɹ", "i"]),
    ("through", &["θ", "ɹ", "u"]),
    ("time", &["t", "aɪ", "m"]),
    ("to", &["t", "u"]),
    ("two", &["t", "u"]),
    ("usual", &["j", "u", "ʒ", "u", "ə", "l"]),
    ("van", &["v", "æ", "n"]),
    ("vegetable", &["v", "ɛ", "dʒ", "t", "ə", "b", "ə", "l"]),
    ("very", &["v", "ɛ", "ɹ", "i"]),
    ("vet", &["v", "ɛ", "t"]),
    ("vine", &["v", "aɪ", "n"]),
    ("vision", &["v", "ɪ", "ʒ", "ə", "n"]),
    ("walk", &["w", "ɔ", "k"]),
    ("was", &["w", "ʌ", "z"]),
    ("water", &["w", "ɔ", "t", "ɚ"]),
    ("we", &["w", "i"]),
    ("weather", &["w", "ɛ", "ð", "ɚ"]),
    ("wednesday", &["w", "ɛ", "n", "z", "d", "eɪ"]),
    ("wet", &["w", "ɛ", "t"]),
    ("what", &["w", "ʌ", "t"]),
    ("when", &["w", "ɛ", "n"]),
    ("where", &["w", "ɛ", "ɹ"]),
    ("who", &["h", "u"]),
    ("why", &["w", "aɪ"]),
    ("wine", &["w", "aɪ", "n"]),
    ("with", &["w", "ɪ", "ð"]),
    ("word", &["w", "ɝ", "d"]),
    ("work", &["w", "ɝ", "k"]),
    ("world", &["w", "ɝ", "l", "d"]),
    ("yellow", &["j", "ɛ", "l", "oʊ"]),
    ("yes", &["j", "ɛ", "s"]),
    ("you", &["j", "u"]),
    ("zoo", &["z", "u"]),
];

/// Letter groups, longest first. R-colored groups only apply before a consonant
/// or at the end of the word.
const LETTER_RULES: &[(&str, &[&str])] = &[
    ("tch", &["tʃ"]),
    ("igh", &["aɪ"]),
    ("dge", &["dʒ"]),
    ("th", &["θ"]),
    ("sh", &["ʃ"]),
    ("ch", &["tʃ"]),
    ("ph", &["f"]),
    ("ng", &["ŋ"]),
    ("nk", &["ŋ", "k"]),
    ("ck", &["k"]),
    ("wh", &["w"]),
    ("qu", &["k", "w"]),
    ("kn", &["n"]),
    ("wr", &["ɹ"]),
    ("ee", &["i"]),
    ("ea", &["i"]),
    ("oo", &["u"]),
    ("ou", &["aʊ"]),
    ("ow", &["oʊ"]),
    ("ai", &["eɪ"]),
    ("ay", &["eɪ"]),
    ("oi", &["ɔɪ"]),
    ("oy", &["ɔɪ"]),
    ("au", &["ɔ"]),
    ("aw", &["ɔ"]),
    ("er", &["ɚ"]),
    ("ir", &["ɝ"]),
    ("ur", &["ɝ"]),
    ("ar", &["ɑ", "ɹ"]),
    ("or", &["ɔ", "ɹ"]),
];

const R_COLORED: &[&str] = &["er", "ir", "ur", "ar", "or"];

fn is_vowel_letter(ch: u8) -> bool {
    matches!(ch, b'a' | b'e' | b'i' | b'o' | b'u' | b'y')
}

/// Spelling-rule conversion, applied left to right.
fn rule_phonemes(word: &str) -> Vec<String> {
    let mut letters: Vec<u8> = word
        .bytes()
        .filter(|b| b.is_ascii_lowercase())
        .collect();

    // Silent final e ("make", "time")
    if letters.len() > 2
        && letters.last() == Some(&b'e')
        && !is_vowel_letter(letters[letters.len() - 2])
    {
        letters.pop();
    }

    let mut symbols: Vec<String> = Vec::new();
    let mut i = 0;
    'outer: while i < letters.len() {
        let rest = &letters[i..];

        for (pattern, output) in LETTER_RULES {
            let pattern = pattern.as_bytes();
            if !rest.starts_with(pattern) {
                continue;
            }
            if R_COLORED.iter().any(|r| r.as_bytes() == pattern) {
                if let Some(&next) = rest.get(pattern.len()) {
                    if is_vowel_letter(next) {
                        continue;
                    }
                }
            }
            symbols.extend(output.iter().map(|s| s.to_string()));
            i += pattern.len();
            continue 'outer;
        }

        let ch = letters[i];
        // Doubled consonants sound once ("hello", "little")
        if i > 0 && letters[i - 1] == ch && !is_vowel_letter(ch) {
            i += 1;
            continue;
        }

        let next = letters.get(i + 1).copied();
        let is_last = i + 1 == letters.len();
        let single: &[&str] = match ch {
            b'a' if is_last && i > 0 => &["ə"],
            b'a' => &["æ"],
            b'b' => &["b"],
            b'c' if matches!(next, Some(b'e' | b'i' | b'y')) => &["s"],
            b'c' => &["k"],
            b'd' => &["d"],
            b'e' => &["ɛ"],
            b'f' => &["f"],
            b'g' => &["ɡ"],
            b'h' => &["h"],
            b'i' => &["ɪ"],
            b'j' => &["dʒ"],
            b'k' => &["k"],
            b'l' => &["l"],
            b'm' => &["m"],
            b'n' => &["n"],
            b'o' => &["ɑ"],
            b'p' => &["p"],
            b'q' => &["k"],
            b'r' => &["ɹ"],
            b's' => &["s"],
            b't' => &["t"],
            b'u' => &["ʌ"],
            b'v' => &["v"],
            b'w' => &["w"],
            b'x' => &["k", "s"],
            b'y' if i == 0 => &["j"],
            b'y' if is_last => &["i"],
            b'y' => &["ɪ"],
            b'z' => &["z"],
            _ => &[],
        };
        symbols.extend(single.iter().map(|s| s.to_string()));
        i += 1;
    }

    symbols
}

/// espeak-ng binary and data locations.
#[cfg(feature = "espeak")]
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// `None` uses `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// `None` uses the binary's compiled-in data directory.
    pub data_path: Option<PathBuf>,
}

/// Converter backed by the `espeak-ng` command.
///
/// Requires espeak-ng to be installed:
/// - **Linux**: `sudo apt-get install espeak-ng`
/// - **macOS**: `brew install espeak-ng`
#[cfg(feature = "espeak")]
#[derive(Debug, Clone, Default)]
pub struct EspeakConverter {
    config: EspeakConfig,
}

#[cfg(feature = "espeak")]
impl EspeakConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EspeakConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "espeak")]
impl G2pConverter for EspeakConverter {
    fn convert(&self, word: &str, language: &str) -> Result<Vec<String>, G2pError> {
        let output = run_espeak(&self.config, word, espeak_voice(language), None)?;
        Ok(phonemes::segment_ipa(&output))
    }

    fn convert_within(
        &self,
        word: &str,
        language: &str,
        budget: Duration,
    ) -> Result<Vec<String>, G2pError> {
        let output = run_espeak(&self.config, word, espeak_voice(language), Some(budget))?;
        Ok(phonemes::segment_ipa(&output))
    }

    fn name(&self) -> &'static str {
        "EspeakNG"
    }
}

#[cfg(feature = "espeak")]
fn espeak_voice(language: &str) -> &'static str {
    match language {
        "en-gb" => "en-gb",
        _ => "en-us",
    }
}

#[cfg(feature = "espeak")]
const ESPEAK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs espeak-ng on `input`. With a budget, a child still running at the
/// deadline is killed and reaped.
#[cfg(feature = "espeak")]
fn run_espeak(
    config: &EspeakConfig,
    input: &str,
    voice: &str,
    budget: Option<Duration>,
) -> Result<String, G2pError> {
    let bin = config
        .bin_path
        .as_deref()
        .map(|p| p.as_os_str().to_owned())
        .unwrap_or_else(|| "espeak-ng".into());

    let mut command = Command::new(bin);
    command.args(["--ipa", "--stdin", "-q", "-v", voice]);
    if let Some(data) = &config.data_path {
        command.arg(format!("--path={}", data.display()));
    }

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                G2pError::EspeakNotFound
            } else {
                G2pError::Io(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng reads stdin line by line; an unterminated last line can be
        // under-processed.
        let payload = canonicalize_espeak_stdin_payload(input);
        stdin.write_all(payload.as_bytes())?;
    }

    if let Some(budget) = budget {
        let deadline = Instant::now() + budget;
        while child.try_wait()?.is_none() {
            if Instant::now() >= deadline {
                // The child may exit between the poll and the kill.
                if let Err(e) = child.kill() {
                    log::debug!("espeak-ng kill after timeout: {e}");
                }
                child.wait()?;
                log::warn!("espeak-ng exceeded {budget:?}, killed");
                return Err(G2pError::Timeout {
                    converter: "EspeakNG",
                    timeout: budget,
                });
            }
            thread::sleep(ESPEAK_POLL_INTERVAL);
        }
    }

    let output = child.wait_with_output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(G2pError::Failed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(feature = "espeak")]
fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedConverter(Vec<&'static str>);

    impl G2pConverter for FixedConverter {
        fn convert(&self, _word: &str, _language: &str) -> Result<Vec<String>, G2pError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
        fn name(&self) -> &'static str {
            "Fixed"
        }
    }

    struct FailingConverter(AtomicUsize);

    impl G2pConverter for FailingConverter {
        fn convert(&self, _word: &str, _language: &str) -> Result<Vec<String>, G2pError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(G2pError::Failed("offline".to_string()))
        }
        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    struct SlowConverter;

    impl G2pConverter for SlowConverter {
        fn convert(&self, _word: &str, _language: &str) -> Result<Vec<String>, G2pError> {
            thread::sleep(Duration::from_millis(500));
            Ok(vec!["z".to_string()])
        }
        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    fn symbols(word: &str) -> Vec<String> {
        fallback_phonemes(word)
    }

    #[test]
    fn dictionary_words_use_curated_pronunciation() {
        assert_eq!(symbols("think"), vec!["θ", "ɪ", "ŋ", "k"]);
        assert_eq!(symbols("This"), vec!["ð", "ɪ", "s"]);
        assert_eq!(symbols("water,"), vec!["w", "ɔ", "t", "ɚ"]);
    }

    #[test]
    fn rules_handle_digraphs_left_to_right() {
        assert_eq!(symbols("tink"), vec!["t", "ɪ", "ŋ", "k"]);
        assert_eq!(symbols("dis"), vec!["d", "ɪ", "s"]);
        assert_eq!(symbols("shath"), vec!["ʃ", "æ", "θ"]);
        assert_eq!(symbols("chang"), vec!["tʃ", "æ", "ŋ"]);
    }

    #[test]
    fn r_colored_vowels_only_before_consonants() {
        assert_eq!(symbols("wery"), vec!["w", "ɛ", "ɹ", "i"]);
        assert_eq!(symbols("herd"), vec!["h", "ɚ", "d"]);
    }

    #[test]
    fn final_a_reduces_and_silent_e_is_dropped() {
        assert_eq!(symbols("wata"), vec!["w", "æ", "t", "ə"]);
        assert_eq!(symbols("mike"), vec!["m", "ɪ", "k"]);
    }

    #[test]
    fn unconvertible_characters_are_dropped() {
        assert_eq!(symbols("d1s"), vec!["d", "s"]);
        assert_eq!(symbols("dís"), vec!["d", "s"]);
        assert!(symbols("42").is_empty());
    }

    #[test]
    fn conversion_is_deterministic() {
        let bridge = G2pBridge::fallback_only();
        assert_eq!(bridge.to_phonemes("squeaky"), bridge.to_phonemes("squeaky"));
    }

    #[test]
    fn bridge_prefers_converter_output() {
        let bridge = G2pBridge::with_converter(
            Arc::new(FixedConverter(vec!["θ", "ɪ", "ŋ", "k", "ʁ"])),
            Duration::from_secs(1),
        );
        assert_eq!(bridge.to_phonemes("thing"), vec!["θ", "ɪ", "ŋ", "k"]);
    }

    #[test]
    fn bridge_falls_back_on_converter_error() {
        let converter = Arc::new(FailingConverter(AtomicUsize::new(0)));
        let bridge = G2pBridge::with_converter(converter.clone(), Duration::from_secs(1));
        assert_eq!(bridge.to_phonemes("think"), vec!["θ", "ɪ", "ŋ", "k"]);
        assert_eq!(converter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bridge_falls_back_on_timeout() {
        let bridge =
            G2pBridge::with_converter(Arc::new(SlowConverter), Duration::from_millis(20));
        assert_eq!(bridge.to_phonemes("this"), vec!["ð", "ɪ", "s"]);
    }

    #[test]
    fn bridge_falls_back_on_empty_output() {
        let bridge =
            G2pBridge::with_converter(Arc::new(FixedConverter(vec![])), Duration::from_secs(1));
        assert_eq!(bridge.to_phonemes("hello"), vec!["h", "ɛ", "l", "oʊ"]);
    }

    #[test]
    fn batch_preserves_word_order() {
        let bridge = G2pBridge::fallback_only();
        let batch = bridge.to_phonemes_batch(&["she", "zoo"]);
        assert_eq!(batch, vec![vec!["ʃ", "i"], vec!["z", "u"]]);
    }

    #[cfg(feature = "espeak")]
    #[test]
    fn appends_trailing_newline_for_espeak_stdin() {
        assert_eq!(canonicalize_espeak_stdin_payload("water"), "water\n");
        assert_eq!(canonicalize_espeak_stdin_payload("water\n"), "water\n");
    }

    #[cfg(feature = "espeak")]
    #[test]
    fn espeak_converts_think() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if Command::new("espeak-ng").arg("--version").output().is_err() {
            return;
        }

        let converter = EspeakConverter::new();
        let symbols = converter
            .convert("think", TARGET_LANGUAGE)
            .expect("espeak should succeed");
        assert_eq!(symbols.first().map(String::as_str), Some("θ"));
    }

    #[cfg(all(unix, feature = "espeak"))]
    #[test]
    fn hung_espeak_is_killed_at_the_deadline() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("espeak-ng");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter = EspeakConverter::with_config(EspeakConfig {
            bin_path: Some(script),
            data_path: None,
        });
        // A freshly written script can briefly fail to exec (ETXTBSY) while
        // another test thread is forking.
        let mut attempts = 0;
        let (start, result) = loop {
            let start = Instant::now();
            let result = converter.convert_within("hello", TARGET_LANGUAGE, Duration::from_millis(50));
            attempts += 1;
            match result {
                Err(G2pError::Io(_)) if attempts < 5 => thread::sleep(Duration::from_millis(20)),
                other => break (start, other),
            }
        };

        assert!(matches!(result, Err(G2pError::Timeout { converter: "EspeakNG", .. })));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
