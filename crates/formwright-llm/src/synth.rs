//! Local value synthesis
//!
//! Produces a plausible value for one field from its semantic type, context
//! hint and the scenario, with no network dependency. This is the path every
//! field falls back to when the generative backend is throttled, failing, or
//! asked about a field it cannot handle.

use crate::field::{FieldDescriptor, PageContext, Scenario, SemanticType};
use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Chloe", "Daniel", "Emma", "Farid", "Grace", "Hiro", "Isla", "Jonas",
    "Keira", "Liam", "Maya", "Noah", "Olivia", "Priya",
];

const LAST_NAMES: &[&str] = &[
    "Anderson", "Brooks", "Carter", "Dubois", "Evans", "Fischer", "Garcia", "Hughes", "Ito",
    "Jensen", "Khan", "Lopez", "Martin", "Novak",
];

const STREETS: &[&str] = &[
    "Maple Avenue", "Oak Street", "Cedar Lane", "Harbor Road", "Hillcrest Drive", "Mill Street",
];

const CITIES: &[(&str, &str)] = &[
    ("Springfield", "IL"),
    ("Portland", "OR"),
    ("Austin", "TX"),
    ("Madison", "WI"),
    ("Boulder", "CO"),
];

const WORDS: &[&str] = &[
    "test", "sample", "form", "automation", "value", "entry", "quick", "check", "simple",
    "record",
];

const SPECIAL: &str = "!@#$%^&*";

/// Local generator of plausible field values.
///
/// Holds its own RNG behind a mutex so one instance can serve concurrent
/// generation calls. [`ValueSynthesizer::seeded`] gives reproducible output.
#[derive(Debug)]
pub struct ValueSynthesizer {
    rng: Mutex<StdRng>,
}

impl Default for ValueSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueSynthesizer {
    /// Create a synthesizer seeded from OS entropy
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a deterministic synthesizer
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Synthesize a value for `field` under `scenario`.
    ///
    /// Credentials displayed on the page take precedence for valid values.
    pub fn synthesize(
        &self,
        field: &FieldDescriptor,
        scenario: Scenario,
        page_context: Option<&PageContext>,
    ) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        match scenario {
            Scenario::Valid => {
                if let Some(value) = page_context.and_then(|c| c.credential_for(field)) {
                    return value.to_string();
                }
                valid_value(&mut rng, field)
            }
            Scenario::Invalid => invalid_value(&mut rng, field),
            Scenario::Edge => edge_value(&mut rng, field),
        }
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or("test")
}

fn valid_value(rng: &mut StdRng, field: &FieldDescriptor) -> String {
    let hint = field.keywords();
    match field.semantic_type {
        SemanticType::Email => {
            let first = pick(rng, FIRST_NAMES).to_lowercase();
            let last = pick(rng, LAST_NAMES).to_lowercase();
            format!("{}.{}{}@example.com", first, last, rng.gen_range(10..100))
        }
        SemanticType::Phone => format!(
            "+1-555-{:03}-{:04}",
            rng.gen_range(100..1000),
            rng.gen_range(0..10000)
        ),
        SemanticType::Name => {
            if hint.contains("first") || hint.contains("given") {
                pick(rng, FIRST_NAMES).to_string()
            } else if hint.contains("last") || hint.contains("surname") || hint.contains("family")
            {
                pick(rng, LAST_NAMES).to_string()
            } else {
                format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
            }
        }
        SemanticType::Address => address(rng),
        SemanticType::Date => {
            let today = Utc::now().date_naive();
            let days_back = if hint.contains("birth") || hint.contains("dob") {
                rng.gen_range(18 * 365..80 * 365)
            } else {
                rng.gen_range(0..365)
            };
            (today - ChronoDuration::days(days_back))
                .format("%Y-%m-%d")
                .to_string()
        }
        SemanticType::Number => {
            if hint.contains("age") {
                rng.gen_range(18..80).to_string()
            } else {
                rng.gen_range(1..=100).to_string()
            }
        }
        SemanticType::Boolean => "true".to_string(),
        SemanticType::File => "test_file.txt".to_string(),
        SemanticType::Text | SemanticType::Unknown => text_value(rng, &hint),
    }
}

fn text_value(rng: &mut StdRng, hint: &str) -> String {
    if hint.contains("password") || hint.contains("pwd") {
        password(rng)
    } else if hint.contains("user") || hint.contains("login") {
        format!("testuser{}", rng.gen_range(100..1000))
    } else if hint.contains("url") || hint.contains("website") || hint.contains("link") {
        format!("https://example.com/{}", pick(rng, WORDS))
    } else if hint.contains("comment") || hint.contains("feedback") {
        "This is a test comment for automated form testing.".to_string()
    } else if hint.contains("message") {
        "This is a test message for form automation testing.".to_string()
    } else if hint.contains("description") {
        "Brief description for testing purposes.".to_string()
    } else if hint.contains("bio") || hint.contains("about") {
        "Professional with experience in software testing.".to_string()
    } else if hint.contains("company") || hint.contains("organization") {
        format!("{} Labs", pick(rng, LAST_NAMES))
    } else {
        let words: Vec<&str> = (0..3).map(|_| pick(rng, WORDS)).collect();
        words.join(" ")
    }
}

fn address(rng: &mut StdRng) -> String {
    let (city, state) = CITIES.choose(rng).copied().unwrap_or(("Springfield", "IL"));
    format!(
        "{} {}, {}, {} {:05}",
        rng.gen_range(1..9999),
        pick(rng, STREETS),
        city,
        state,
        rng.gen_range(10000..99999)
    )
}

/// Password with upper, lower, digit and special characters, 12 long.
fn password(rng: &mut StdRng) -> String {
    let mut chars: Vec<char> = Vec::with_capacity(12);
    for _ in 0..2 {
        chars.push(rng.gen_range(b'A'..=b'Z') as char);
    }
    for _ in 0..6 {
        chars.push(rng.gen_range(b'a'..=b'z') as char);
    }
    for _ in 0..2 {
        chars.push(rng.gen_range(b'0'..=b'9') as char);
    }
    let special: Vec<char> = SPECIAL.chars().collect();
    for _ in 0..2 {
        chars.push(*special.choose(rng).unwrap_or(&'!'));
    }
    chars.shuffle(rng);
    chars.into_iter().collect()
}

fn invalid_value(rng: &mut StdRng, field: &FieldDescriptor) -> String {
    match field.semantic_type {
        SemanticType::Email => "invalid-email-format".to_string(),
        SemanticType::Phone => "not-a-phone-number".to_string(),
        SemanticType::Date => "2023-13-45".to_string(),
        SemanticType::Number => "not-a-number".to_string(),
        SemanticType::Boolean => "maybe".to_string(),
        SemanticType::File => "invalid_file.exe".to_string(),
        SemanticType::Name | SemanticType::Address | SemanticType::Text | SemanticType::Unknown => {
            if field.required {
                String::new()
            } else if rng.gen_bool(0.5) {
                "'; DROP TABLE users; --".to_string()
            } else {
                "<script>alert('XSS')</script>".to_string()
            }
        }
    }
}

fn edge_value(rng: &mut StdRng, field: &FieldDescriptor) -> String {
    match field.semantic_type {
        SemanticType::Email => format!("{}@example.com", "a".repeat(64)),
        SemanticType::Phone => "+999999999999999".to_string(),
        SemanticType::Name => "Zoë O'Brien-Łukasiewicz".to_string(),
        SemanticType::Address => {
            format!("{} {}", "9".repeat(10), "Long Street ".repeat(20).trim_end())
        }
        SemanticType::Date => "2024-02-29".to_string(),
        SemanticType::Number => {
            if rng.gen_bool(0.5) {
                "0".to_string()
            } else {
                i32::MAX.to_string()
            }
        }
        SemanticType::Boolean => "false".to_string(),
        SemanticType::File => "empty_file.txt".to_string(),
        SemanticType::Text | SemanticType::Unknown => "x".repeat(255),
    }
}
