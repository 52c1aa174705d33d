//! Deterministic rule-based bias scan. No model calls.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use crate::core::models::{clamp_unit, word_count};

/// Multiplier applied to match density (matches per word) before clamping.
pub const DENSITY_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalCategory {
    Political,
    Emotional,
    Linguistic,
    Loaded,
}

impl LexicalCategory {
    pub fn describe(self) -> &'static str {
        match self {
            LexicalCategory::Political => "politically charged terms",
            LexicalCategory::Emotional => "emotionally charged language",
            LexicalCategory::Linguistic => "absolutist or presumptive wording",
            LexicalCategory::Loaded => "loaded language",
        }
    }
}

static POLITICAL: Lazy<Regex> = Lazy::new(|| {
    build(&[
        "left-wing", "right-wing", "leftists?", "rightists?", "socialists?", "communists?",
        "fascists?", "radicals?", "extremists?", "propaganda", "esquerdistas?", "direitistas?",
        "comunistas?", "fascistas?", "socialistas?", "radicais", "extremistas?", "golpistas?",
        "petistas?", "bolsonaristas?", "militantes?",
    ])
});

static EMOTIONAL: Lazy<Regex> = Lazy::new(|| {
    build(&[
        "shocking", "outrageous", "devastating", "terrifying", "horrific", "horrible",
        "disgusting", "tragic", "catastrophic", "heartbreaking", "chocantes?", "revoltantes?",
        "devastador(?:a|es|as)?", "terríve(?:l|is)", "horríve(?:l|is)", "absurd[oa]s?",
        "escandalos[oa]s?", "trágic[oa]s?", "catastrófic[oa]s?", "assustador(?:a|es|as)?",
    ])
});

static LINGUISTIC: Lazy<Regex> = Lazy::new(|| {
    build(&[
        "always", "never", "everyone", "nobody", "obviously", "clearly", "undeniably",
        "so-called", "allegedly", "sempre", "nunca", "ninguém", "obviamente", "claramente",
        "indiscutivelmente", "supostamente", "evidentemente", "sem dúvida",
    ])
});

static LOADED: Lazy<Regex> = Lazy::new(|| {
    build(&[
        "regime", "thugs?", "scheme", "cover-up", "elites?", "mob", "invasion", "disaster",
        "esquemas?", "farsas?", "baderneir[oa]s?", "invasão", "desastres?", "quadrilhas?",
        "manobras?",
    ])
});

fn build(terms: &[&str]) -> Regex {
    let pattern = format!(r"(?i)\b(?:{})\b", terms.join("|"));
    // The term lists are fixed at compile time.
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid lexicon pattern {}: {}", pattern, e))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalHit {
    pub category: LexicalCategory,
    pub term: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LexicalScan {
    pub word_count: usize,
    pub political_matches: usize,
    pub emotional_matches: usize,
    pub linguistic_matches: usize,
    pub loaded_matches: usize,
    pub hits: Vec<LexicalHit>,
}

impl LexicalScan {
    fn density(&self, matches: usize) -> f64 {
        if self.word_count == 0 {
            return 0.0;
        }
        clamp_unit(matches as f64 / self.word_count as f64 * DENSITY_SCALE)
    }

    pub fn political(&self) -> f64 {
        self.density(self.political_matches)
    }

    pub fn emotional(&self) -> f64 {
        self.density(self.emotional_matches)
    }

    pub fn linguistic(&self) -> f64 {
        self.density(self.linguistic_matches)
    }

    /// Linguistic axis as seen by the detector: loaded terms count as
    /// linguistic bias since there is no separate loaded-language axis.
    pub fn linguistic_with_loaded(&self) -> f64 {
        self.density(self.linguistic_matches + self.loaded_matches)
    }

    pub fn total_matches(&self) -> usize {
        self.political_matches + self.emotional_matches + self.linguistic_matches + self.loaded_matches
    }

    /// Human-readable indicators, one per category that matched.
    pub fn indicators(&self) -> Vec<String> {
        let mut out = Vec::new();
        for category in [
            LexicalCategory::Political,
            LexicalCategory::Emotional,
            LexicalCategory::Linguistic,
            LexicalCategory::Loaded,
        ] {
            let mut terms: Vec<&str> = self
                .hits
                .iter()
                .filter(|h| h.category == category)
                .map(|h| h.term.as_str())
                .collect();
            if terms.is_empty() {
                continue;
            }
            let count = terms.len();
            terms.sort_unstable();
            terms.dedup();
            terms.truncate(5);
            out.push(format!(
                "{} ({} occurrence{}: {})",
                category.describe(),
                count,
                if count == 1 { "" } else { "s" },
                terms.join(", ")
            ));
        }
        out
    }
}

pub fn scan(text: &str) -> LexicalScan {
    let mut result = LexicalScan {
        word_count: word_count(text),
        ..LexicalScan::default()
    };
    if result.word_count == 0 {
        return result;
    }

    let sets: [(LexicalCategory, &Regex); 4] = [
        (LexicalCategory::Political, &POLITICAL),
        (LexicalCategory::Emotional, &EMOTIONAL),
        (LexicalCategory::Linguistic, &LINGUISTIC),
        (LexicalCategory::Loaded, &LOADED),
    ];

    for (category, re) in sets {
        let mut count = 0;
        for m in re.find_iter(text) {
            count += 1;
            result.hits.push(LexicalHit {
                category,
                term: m.as_str().to_lowercase(),
            });
        }
        match category {
            LexicalCategory::Political => result.political_matches = count,
            LexicalCategory::Emotional => result.emotional_matches = count,
            LexicalCategory::Linguistic => result.linguistic_matches = count,
            LexicalCategory::Loaded => result.loaded_matches = count,
        }
    }

    result
}
