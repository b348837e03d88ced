use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::PronunciationError;

/// Curated advice for a commonly mispronounced word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordTip {
    pub tip: String,
    pub phonetic: String,
    pub example: String,
}

/// Articulation guidance for one phoneme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonemeTip {
    /// Notation shown with the tip, e.g. `"/v/ vs /w/"`.
    pub phonetic: String,
    pub guidance: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TipFile {
    #[serde(default)]
    words: BTreeMap<String, WordTip>,
    #[serde(default)]
    phonemes: BTreeMap<String, PhonemeTip>,
    #[serde(default)]
    positive: Option<String>,
}

/// Tip content used by the feedback synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TipLibrary {
    words: BTreeMap<String, WordTip>,
    phonemes: BTreeMap<String, PhonemeTip>,
    positive: String,
}

impl Default for TipLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TipLibrary {
    /// Library with no word or phoneme content.
    pub fn empty() -> Self {
        Self {
            words: BTreeMap::new(),
            phonemes: BTreeMap::new(),
            positive: DEFAULT_POSITIVE.to_string(),
        }
    }

    pub fn builtin() -> Self {
        let mut library = Self::empty();
        for (word, tip, phonetic, example) in WORD_TIPS {
            library.words.insert(
                word.to_string(),
                WordTip {
                    tip: tip.to_string(),
                    phonetic: phonetic.to_string(),
                    example: example.to_string(),
                },
            );
        }
        for (phoneme, phonetic, guidance, examples) in PHONEME_TIPS {
            library.phonemes.insert(
                phoneme.to_string(),
                PhonemeTip {
                    phonetic: phonetic.to_string(),
                    guidance: guidance.to_string(),
                    examples: examples.iter().map(|e| e.to_string()).collect(),
                },
            );
        }
        library
    }

    /// Built-in content extended (or overridden) by a JSON file with optional
    /// `words`, `phonemes` and `positive` fields.
    pub fn load_json(path: &Path) -> Result<Self, PronunciationError> {
        let content = std::fs::read_to_string(path)?;
        let mut library = Self::builtin();
        library.merge_json_str(&content)?;
        log::info!(
            "Loaded tips from {} ({} words, {} phonemes)",
            path.display(),
            library.words.len(),
            library.phonemes.len()
        );
        Ok(library)
    }

    pub fn merge_json_str(&mut self, json: &str) -> Result<(), PronunciationError> {
        let file: TipFile = serde_json::from_str(json)?;
        for (word, tip) in file.words {
            if tip.tip.trim().is_empty() {
                return Err(PronunciationError::Tips(format!("empty tip for word {word:?}")));
            }
            self.words.insert(word.to_lowercase(), tip);
        }
        for (phoneme, tip) in file.phonemes {
            if tip.guidance.trim().is_empty() {
                return Err(PronunciationError::Tips(format!(
                    "empty guidance for phoneme {phoneme:?}"
                )));
            }
            self.phonemes.insert(phoneme, tip);
        }
        if let Some(positive) = file.positive {
            self.positive = positive;
        }
        Ok(())
    }

    pub fn word_tip(&self, word: &str) -> Option<&WordTip> {
        self.words.get(&word.to_lowercase())
    }

    pub fn phoneme_tip(&self, phoneme: &str) -> Option<&PhonemeTip> {
        self.phonemes.get(phoneme)
    }

    pub fn positive_message(&self) -> &str {
        &self.positive
    }
}

const DEFAULT_POSITIVE: &str =
    "Excellent! Every sound was clear. Try a longer phrase or speak a little faster to keep challenging yourself.";

const WORD_TIPS: &[(&str, &str, &str, &str)] = &[
    (
        "water",
        "Start with rounded lips for /w/, open to /ɔ/, then a soft American 't' that sounds almost like a quick 'd'. Finish with an r-colored vowel, not 'a'.",
        "/ˈwɔ.tɚ/",
        "Can I have a glass of water?",
    ),
    (
        "very",
        "Bite your lower lip gently with your top teeth for /v/; do not round your lips as for 'w'.",
        "/ˈvɛ.ɹi/",
        "Thank you very much.",
    ),
    (
        "think",
        "Put your tongue tip between your teeth and blow air for /θ/; it is not a 't'.",
        "/θɪŋk/",
        "I think so.",
    ),
    (
        "three",
        "Begin with /θ/ (tongue between teeth), then glide straight into /ɹ/ without a vowel in between.",
        "/θɹi/",
        "I have three brothers.",
    ),
    (
        "this",
        "Voice the /ð/: tongue between your teeth with your vocal cords buzzing. Keep /ɪ/ short.",
        "/ðɪs/",
        "Is this your bag?",
    ),
    (
        "the",
        "Use a voiced /ð/ with the tongue touching your top teeth, not a 'd'.",
        "/ðə/",
        "Close the door, please.",
    ),
    (
        "world",
        "Say /w/, then an r-colored /ɝ/, then touch /l/ before the final /d/: wur-ld.",
        "/wɝld/",
        "She travels around the world.",
    ),
    (
        "girl",
        "Hold the r-colored vowel /ɝ/ and finish with a clear /l/; there is no 'e' sound.",
        "/ɡɝl/",
        "The girl is reading.",
    ),
    (
        "comfortable",
        "Say it in three beats: KUMF-ter-bul. The middle 'or' is silent in natural speech.",
        "/ˈkʌmf.tɚ.bəl/",
        "This chair is comfortable.",
    ),
    (
        "vegetable",
        "Say it in three beats: VEJ-tuh-bul. Skip the second 'e'.",
        "/ˈvɛdʒ.tə.bəl/",
        "Eat a vegetable with every meal.",
    ),
    (
        "clothes",
        "One syllable: end with a voiced /ð/ flowing into /z/, not 'clo-thes'.",
        "/kloʊðz/",
        "Put your clothes away.",
    ),
    (
        "squirrel",
        "Start with /skw/, then an r-colored /ɝ/ and a light /əl/: SKWUR-ul.",
        "/ˈskwɝ.əl/",
        "A squirrel ran up the tree.",
    ),
    (
        "rural",
        "Keep your tongue curled back for both r sounds and relax into /əl/ at the end.",
        "/ˈɹʊɹ.əl/",
        "They live in a rural area.",
    ),
    (
        "thought",
        "Start with /θ/ and open into a long /ɔ/; the 'ugh' is silent.",
        "/θɔt/",
        "I thought about it.",
    ),
    (
        "through",
        "Blend /θ/ directly into /ɹ/, then round your lips for /u/; the 'gh' is silent.",
        "/θɹu/",
        "Walk through the park.",
    ),
    (
        "birthday",
        "Say BURTH-day: r-colored vowel first, then /θ/ before the /d/.",
        "/ˈbɝθ.deɪ/",
        "Happy birthday!",
    ),
    (
        "weather",
        "Round your lips for /w/ and voice the middle /ð/ with your tongue between your teeth.",
        "/ˈwɛ.ðɚ/",
        "The weather is nice today.",
    ),
    (
        "wednesday",
        "Two syllables: WENZ-day. The first 'd' is silent.",
        "/ˈwɛnz.deɪ/",
        "See you on Wednesday.",
    ),
    (
        "february",
        "Say FEB-roo-air-ee or FEB-yoo-air-ee; both are common.",
        "/ˈfɛb.ju.ɛɹ.i/",
        "My birthday is in February.",
    ),
    (
        "often",
        "The 't' is usually silent: OFF-en.",
        "/ˈɔ.fən/",
        "I often walk to work.",
    ),
    (
        "island",
        "The 's' is silent: EYE-lund.",
        "/ˈaɪ.lənd/",
        "They live on an island.",
    ),
    (
        "beach",
        "Stretch the long /i/ and smile slightly; a short vowel changes the word.",
        "/biːtʃ/",
        "Let's go to the beach.",
    ),
    (
        "sheep",
        "Hold a long, tense /i/ with spread lips; keep it different from 'ship'.",
        "/ʃiːp/",
        "The sheep are in the field.",
    ),
    (
        "work",
        "Use the r-colored vowel /ɝ/, the same as in 'bird'; it does not rhyme with 'fork'.",
        "/wɝk/",
        "I go to work by bus.",
    ),
    (
        "walk",
        "The 'l' is silent: WAWK, with an open /ɔ/.",
        "/wɔk/",
        "Let's walk to the park.",
    ),
];

const PHONEME_TIPS: &[(&str, &str, &str, &[&str])] = &[
    (
        "θ",
        "/θ/",
        "Place the tip of your tongue lightly between your teeth and blow air out without using your voice.",
        &["think", "three", "bath"],
    ),
    (
        "ð",
        "/ð/",
        "Place your tongue between your teeth as for /θ/, but turn your voice on so you feel a buzz.",
        &["this", "mother", "the"],
    ),
    (
        "v",
        "/v/ vs /w/",
        "For /v/, touch your top teeth to your lower lip and buzz. For /w/, round your lips without any teeth contact.",
        &["very", "vine", "wine"],
    ),
    (
        "w",
        "/w/ vs /v/",
        "For /w/, round your lips like saying 'oo' and glide open; your teeth should not touch your lip.",
        &["water", "wet", "wine"],
    ),
    (
        "ɹ",
        "/ɹ/",
        "Curl your tongue tip back slightly without touching the roof of your mouth, and round your lips a little.",
        &["red", "right", "rice"],
    ),
    (
        "l",
        "/l/ vs /ɹ/",
        "For /l/, press your tongue tip against the ridge behind your top teeth and let air flow around the sides.",
        &["light", "led", "long"],
    ),
    (
        "ɪ",
        "/ɪ/ vs /i/",
        "Keep /ɪ/ short and relaxed with your jaw slightly open; /i/ is longer with spread lips.",
        &["ship", "live", "sit"],
    ),
    (
        "i",
        "/i/ vs /ɪ/",
        "Smile slightly and hold /i/ longer and tenser than /ɪ/.",
        &["sheep", "leave", "beach"],
    ),
    (
        "æ",
        "/æ/",
        "Drop your jaw and spread your lips; /æ/ sits between 'e' and 'a'.",
        &["cat", "bad", "man"],
    ),
    (
        "ɛ",
        "/ɛ/ vs /æ/",
        "Open your mouth halfway for /ɛ/; open it wider and flatten your tongue for /æ/.",
        &["bed", "men", "red"],
    ),
    (
        "ʌ",
        "/ʌ/",
        "Relax your mouth and make a short, central 'uh' sound.",
        &["cup", "cut", "love"],
    ),
    (
        "ʊ",
        "/ʊ/ vs /u/",
        "Keep /ʊ/ short with loosely rounded lips; /u/ is longer with tight rounding.",
        &["book", "good", "full"],
    ),
    (
        "u",
        "/u/",
        "Round your lips tightly and hold the vowel longer than /ʊ/.",
        &["food", "school", "zoo"],
    ),
    (
        "ɚ",
        "/ɚ/",
        "Finish the syllable with your tongue pulled back as for /ɹ/; it is not a separate 'a' or 'e'.",
        &["water", "mother", "weather"],
    ),
    (
        "ɝ",
        "/ɝ/",
        "Hold one steady r-colored vowel with your tongue bunched back, as in 'bird'.",
        &["bird", "girl", "work"],
    ),
    (
        "ɔ",
        "/ɔ/",
        "Open your jaw and round your lips slightly for a long 'aw'.",
        &["walk", "thought", "long"],
    ),
    (
        "ɑ",
        "/ɑ/",
        "Open your mouth wide with your tongue low and back, as when a doctor asks you to say 'ah'.",
        &["father", "job", "coffee"],
    ),
    (
        "ʃ",
        "/ʃ/",
        "Round your lips and push air over the middle of your tongue for a smooth 'sh'.",
        &["she", "ship", "english"],
    ),
    (
        "ʒ",
        "/ʒ/",
        "Make /ʃ/ and add your voice; you should feel a buzz.",
        &["measure", "usual", "vision"],
    ),
    (
        "z",
        "/z/ vs /s/",
        "Make /s/ and turn your voice on; feel your throat vibrate.",
        &["zoo", "is", "please"],
    ),
    (
        "tʃ",
        "/tʃ/",
        "Start with your tongue stopping the air as for /t/, then release it into /ʃ/.",
        &["church", "beach", "chair"],
    ),
    (
        "dʒ",
        "/dʒ/",
        "Start with /d/ and release into a voiced /ʒ/.",
        &["judge", "job", "vegetable"],
    ),
    (
        "ŋ",
        "/ŋ/",
        "Raise the back of your tongue to the soft palate and let the sound come through your nose; do not add a hard 'g'.",
        &["sing", "ring", "morning"],
    ),
    (
        "h",
        "/h/",
        "Breathe out gently from your throat, like fogging a mirror; no scraping sound.",
        &["hello", "help", "how"],
    ),
    (
        "f",
        "/f/",
        "Touch your top teeth to your lower lip and blow air without using your voice.",
        &["five", "food", "coffee"],
    ),
    (
        "p",
        "/p/ vs /b/",
        "Press your lips together and release /p/ with a small puff of air; /b/ has voice and no puff.",
        &["people", "cup", "put"],
    ),
    (
        "n",
        "/n/ vs /l/",
        "Press your tongue tip to the ridge behind your teeth and let the air flow through your nose.",
        &["night", "no", "man"],
    ),
    (
        "oʊ",
        "/oʊ/",
        "Start with rounded lips and glide toward a tighter 'oo'.",
        &["go", "no", "both"],
    ),
];
