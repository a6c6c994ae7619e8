//! Entity label normalization and classification.
//!
//! Every subject/object label passes through [`normalize_label`] before it is
//! stored or compared, so "Bone  Density" and "bone density" are the same
//! node. Predicates additionally snake_case. Node classes drive the stats
//! histogram; alias variants widen entity matching in queries.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Canonical form of an entity label: NFKC, lowercased, edge punctuation
/// trimmed, inner whitespace collapsed to single spaces.
pub fn normalize_label(raw: &str) -> String {
    let folded: String = raw.nfkc().collect::<String>().to_lowercase();
    let trimmed = folded.trim_matches(|c: char| c.is_whitespace() || is_edge_punct(c));
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a predicate: [`normalize_label`] plus snake_casing,
/// so "exposed to" and "Exposed-To" both become `exposed_to`.
pub fn normalize_predicate(raw: &str) -> String {
    normalize_label(raw)
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn is_edge_punct(c: char) -> bool {
    matches!(
        c,
        '.' | ',' | ';' | ':' | '!' | '?' | '"' | '\'' | '(' | ')' | '[' | ']' | '{' | '}'
    )
}

// ---------------------------------------------------------------------------
// Node classification
// ---------------------------------------------------------------------------

/// Coarse biological category of an entity label, for the stats histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeClass {
    Species,
    Condition,
    Measurement,
    Location,
    Substance,
    Process,
    Disease,
    Technology,
    Unknown,
}

impl NodeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Species => "species",
            Self::Condition => "condition",
            Self::Measurement => "measurement",
            Self::Location => "location",
            Self::Substance => "substance",
            Self::Process => "process",
            Self::Disease => "disease",
            Self::Technology => "technology",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for NodeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SPECIES_MARKERS: &[&str] = &[
    "mice", "mouse", "rat", "human", "astronaut", "arabidopsis", "plant", "seedling",
    "bacteria", "microbe", "yeast", "drosophila", "elegans", "cell", "organism", "crew",
];

const CONDITION_MARKERS: &[&str] = &[
    "microgravity", "gravity", "weightlessness", "radiation", "spaceflight",
    "hypoxia", "isolation", "confinement", "vacuum", "stress",
];

const MEASUREMENT_MARKERS: &[&str] = &[
    "density", "mass", "rate", "level", "count", "concentration", "expression",
    "volume", "length", "weight", "pressure",
];

const LOCATION_MARKERS: &[&str] = &[
    "space", "iss", "station", "orbit", "earth", "mars", "moon", "habitat", "module",
];

const SUBSTANCE_MARKERS: &[&str] = &[
    "protein", "calcium", "hormone", "enzyme", "gene", "dna", "rna", "mineral",
    "nutrient", "oxygen", "cytokine",
];

const PROCESS_MARKERS: &[&str] = &[
    "growth", "loss", "atrophy", "development", "metabolism", "repair", "response",
    "adaptation", "formation", "regeneration", "signaling", "resorption",
];

const DISEASE_MARKERS: &[&str] = &[
    "osteoporosis", "cancer", "disease", "syndrome", "dysfunction", "deficiency",
    "degeneration", "impairment",
];

const TECHNOLOGY_MARKERS: &[&str] = &[
    "centrifuge", "bioreactor", "device", "instrument", "sensor", "equipment",
    "countermeasure", "treadmill",
];

/// Classify a normalized label by its first matching marker family.
///
/// Order matters: "bone density loss" should read as a measurement-bearing
/// label before a process one, so measurement markers are checked ahead of
/// process markers; species and conditions outrank both.
pub fn classify(label: &str) -> NodeClass {
    let families: &[(&[&str], NodeClass)] = &[
        (SPECIES_MARKERS, NodeClass::Species),
        (CONDITION_MARKERS, NodeClass::Condition),
        (DISEASE_MARKERS, NodeClass::Disease),
        (MEASUREMENT_MARKERS, NodeClass::Measurement),
        (SUBSTANCE_MARKERS, NodeClass::Substance),
        (PROCESS_MARKERS, NodeClass::Process),
        (LOCATION_MARKERS, NodeClass::Location),
        (TECHNOLOGY_MARKERS, NodeClass::Technology),
    ];
    for (markers, class) in families {
        if markers.iter().any(|m| contains_word(label, m)) {
            return *class;
        }
    }
    NodeClass::Unknown
}

/// Whole-word containment: "iss" must not match inside "tissue".
fn contains_word(label: &str, word: &str) -> bool {
    label
        .split(|c: char| !c.is_alphanumeric())
        .any(|tok| tok == word)
}

// ---------------------------------------------------------------------------
// Alias variants
// ---------------------------------------------------------------------------

/// Match variants of a normalized label: article stripped, singular/plural
/// collapsed, hyphen and space forms interchanged. The label itself is always
/// the first variant.
pub fn alias_variants(label: &str) -> Vec<String> {
    let mut variants = vec![label.to_string()];
    let mut push = |v: String| {
        if !v.is_empty() && !variants.contains(&v) {
            variants.push(v);
        }
    };

    for article in ["the ", "a ", "an "] {
        if let Some(rest) = label.strip_prefix(article) {
            push(rest.to_string());
        }
    }
    if let Some(stem) = label.strip_suffix("es") {
        push(stem.to_string());
    }
    if let Some(stem) = label.strip_suffix('s') {
        push(stem.to_string());
    }
    if label.contains('-') {
        push(label.replace('-', " "));
        push(label.replace('-', ""));
    }
    if label.contains(' ') {
        push(label.replace(' ', "-"));
    }

    variants
}
