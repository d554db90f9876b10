// Lexicon sentiment — weighted word polarities with simple modifiers.
//
// Each known word contributes its polarity. An intensifier right before it
// scales the value; a negator within the two preceding tokens flips and
// damps it. The text's polarity is the mean over matched words.

use std::collections::HashMap;

use anyhow::Result;

use super::traits::SentimentScorer;

/// Word polarities, roughly on the scale of common adjective lexicons.
const POLARITIES: &[(&str, f64)] = &[
    ("amazing", 0.6),
    ("awesome", 1.0),
    ("beautiful", 0.85),
    ("best", 1.0),
    ("better", 0.5),
    ("brilliant", 0.9),
    ("clean", 0.37),
    ("cool", 0.35),
    ("easy", 0.43),
    ("effective", 0.6),
    ("excellent", 1.0),
    ("excited", 0.38),
    ("fantastic", 0.4),
    ("fast", 0.2),
    ("fine", 0.42),
    ("fun", 0.3),
    ("glad", 0.5),
    ("good", 0.7),
    ("great", 0.8),
    ("happy", 0.8),
    ("helpful", 0.5),
    ("impressive", 1.0),
    ("interesting", 0.5),
    ("love", 0.5),
    ("loved", 0.7),
    ("nice", 0.6),
    ("perfect", 1.0),
    ("powerful", 0.3),
    ("reliable", 0.5),
    ("smooth", 0.4),
    ("solid", 0.4),
    ("stable", 0.3),
    ("superb", 1.0),
    ("useful", 0.3),
    ("wonderful", 1.0),
    ("worth", 0.3),
    ("angry", -0.5),
    ("annoying", -0.8),
    ("awful", -1.0),
    ("bad", -0.7),
    ("boring", -1.0),
    ("broken", -0.4),
    ("buggy", -0.5),
    ("confusing", -0.3),
    ("crash", -0.5),
    ("difficult", -0.5),
    ("disappointed", -0.75),
    ("disappointing", -0.6),
    ("expensive", -0.5),
    ("fail", -0.5),
    ("failed", -0.5),
    ("frustrating", -0.4),
    ("hard", -0.29),
    ("hate", -0.8),
    ("horrible", -1.0),
    ("poor", -0.4),
    ("sad", -0.5),
    ("slow", -0.3),
    ("stupid", -0.8),
    ("terrible", -1.0),
    ("ugly", -0.7),
    ("unstable", -0.4),
    ("useless", -0.5),
    ("worse", -0.4),
    ("worst", -1.0),
    ("wrong", -0.5),
];

/// Multipliers applied to the word right after them.
const INTENSIFIERS: &[(&str, f64)] = &[
    ("absolutely", 1.4),
    ("barely", 0.5),
    ("extremely", 1.5),
    ("incredibly", 1.5),
    ("quite", 1.1),
    ("really", 1.3),
    ("slightly", 0.6),
    ("so", 1.2),
    ("somewhat", 0.7),
    ("super", 1.3),
    ("totally", 1.3),
    ("very", 1.3),
];

const NEGATORS: &[&str] = &[
    "aint", "cant", "didnt", "doesnt", "dont", "hardly", "isnt", "never", "no", "nor", "not",
    "nothing", "wasnt", "without", "wont",
];

/// How far back a negator reaches.
const NEGATION_WINDOW: usize = 2;

/// Factor applied to a negated word's polarity.
const NEGATION_FACTOR: f64 = -0.5;

pub struct LexiconSentiment {
    polarities: HashMap<&'static str, f64>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self {
            polarities: POLARITIES.iter().copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }
}

impl LexiconSentiment {
    fn score(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        let mut total = 0.0;
        let mut matched = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = self.polarities.get(token.as_str()) else {
                continue;
            };

            let mut value = base;
            if let Some(&mult) = i
                .checked_sub(1)
                .and_then(|prev| self.intensifiers.get(tokens[prev].as_str()))
            {
                value = (value * mult).clamp(-1.0, 1.0);
            }

            let window = i.saturating_sub(NEGATION_WINDOW)..i;
            if tokens[window].iter().any(|t| NEGATORS.contains(&t.as_str())) {
                value *= NEGATION_FACTOR;
            }

            total += value;
            matched += 1;
        }

        if matched == 0 {
            0.0
        } else {
            (total / matched as f64).clamp(-1.0, 1.0)
        }
    }
}

impl SentimentScorer for LexiconSentiment {
    fn polarity(&self, text: &str) -> Result<f64> {
        Ok(self.score(text))
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

/// Lower-case words with apostrophes folded in ("don't" -> "dont").
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect()
}
