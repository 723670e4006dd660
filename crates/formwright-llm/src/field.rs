//! Form field data model
//!
//! Fields arrive already extracted from the page by the navigation layer.
//! This module only describes them; nothing here touches the network.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Semantic type hint for a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// Email address
    Email,
    /// Telephone number
    Phone,
    /// Person name
    Name,
    /// Postal address
    Address,
    /// Calendar date
    Date,
    /// Numeric value
    Number,
    /// Free text
    Text,
    /// Checkbox / toggle
    Boolean,
    /// File upload
    File,
    /// Nothing could be inferred
    Unknown,
}

impl SemanticType {
    /// Infer a semantic type from a raw input type (`type="tel"`, `textarea`, ...)
    /// and the label/name text around the field.
    ///
    /// The input type wins when it is specific; otherwise label keywords decide.
    #[must_use]
    pub fn infer(input_type: &str, label: &str) -> Self {
        match input_type.trim().to_lowercase().as_str() {
            "email" => return Self::Email,
            "tel" | "phone" => return Self::Phone,
            "date" | "datetime-local" | "month" => return Self::Date,
            "number" | "range" => return Self::Number,
            "checkbox" => return Self::Boolean,
            "file" => return Self::File,
            _ => {}
        }

        let label = label.to_lowercase();
        let has = |keywords: &[&str]| keywords.iter().any(|k| label.contains(k));

        if has(&["email", "e-mail"]) {
            Self::Email
        } else if has(&["phone", "tel", "mobile"]) {
            Self::Phone
        } else if has(&["address", "street", "city", "zip", "postal"]) {
            Self::Address
        } else if has(&["date", "birth", "dob"]) {
            Self::Date
        } else if has(&["name", "first", "last", "full"]) {
            Self::Name
        } else if has(&["age", "year", "number", "amount", "quantity"]) {
            Self::Number
        } else if has(&["agree", "accept", "subscribe", "consent"]) {
            Self::Boolean
        } else if input_type.is_empty() {
            Self::Unknown
        } else {
            Self::Text
        }
    }

    /// Lowercase name used in prompts.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Name => "name",
            Self::Address => "address",
            Self::Date => "date",
            Self::Number => "number",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::File => "file",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected form field. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique within a form
    pub name: String,
    /// Semantic type hint
    pub semantic_type: SemanticType,
    /// Whether the form requires a value
    #[serde(default)]
    pub required: bool,
    /// Text scraped near the field (label, placeholder); may be empty
    #[serde(default)]
    pub context_hint: String,
}

impl FieldDescriptor {
    /// Create a new optional field with no context hint
    #[must_use]
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            required: false,
            context_hint: String::new(),
        }
    }

    /// Mark the field as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a context hint
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.context_hint = hint.into();
        self
    }

    /// Name and hint lowercased together, for keyword matching.
    pub(crate) fn keywords(&self) -> String {
        format!("{} {}", self.name, self.context_hint).to_lowercase()
    }

    /// Whether this field may be sent to a generative backend.
    ///
    /// File uploads need a binary payload, which text generation cannot produce.
    #[must_use]
    pub fn is_generatable(&self) -> bool {
        self.semantic_type != SemanticType::File
    }
}

/// Test scenario a set of values is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Realistic values a form should accept
    Valid,
    /// Values a form's validation should reject
    Invalid,
    /// Boundary values that sit at the limits of what is accepted
    Edge,
}

impl Scenario {
    /// Natural-language intent handed to the generative backend.
    #[must_use]
    pub fn intent(&self) -> &'static str {
        match self {
            Scenario::Valid => {
                "Generate realistic, well-formed values that a production form would accept. \
                 Keep values short and suitable for automated testing."
            }
            Scenario::Invalid => {
                "Generate values that the form's validation should reject: wrong formats \
                 (malformed emails, letters in phone numbers, impossible dates), and an \
                 empty string for required fields where emptiness is the clearest violation."
            }
            Scenario::Edge => {
                "Generate boundary values that sit at the edge of acceptance: very long \
                 strings, minimum and maximum numbers, leap-day dates, unicode and \
                 punctuation-heavy names."
            }
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Valid => f.write_str("valid"),
            Scenario::Invalid => f.write_str("invalid"),
            Scenario::Edge => f.write_str("edge"),
        }
    }
}

/// A credential displayed on the page (demo sites often print test logins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCredential {
    /// What the credential is: "username", "email", "password", ...
    pub kind: String,
    /// The displayed value
    pub value: String,
}

/// Credentials and instructions found on the page around a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    /// Displayed credentials
    #[serde(default)]
    pub credentials: Vec<PageCredential>,
    /// Free-text instructions ("use the test card 4242...")
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl PageContext {
    /// Whether the context carries anything worth sending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty() && self.instructions.is_empty()
    }

    /// Find a displayed credential matching a field, if any.
    ///
    /// Username-like credentials match username/user/login/email fields;
    /// password credentials match password fields.
    #[must_use]
    pub fn credential_for(&self, field: &FieldDescriptor) -> Option<&str> {
        let key = field.keywords();
        self.credentials.iter().find_map(|cred| {
            let kind = cred.kind.to_lowercase();
            let is_user = kind.contains("user") || kind.contains("email") || kind.contains("login");
            if kind.contains("password") {
                key.contains("password").then_some(cred.value.as_str())
            } else if is_user
                && ["username", "user", "login", "email"]
                    .iter()
                    .any(|k| key.contains(k))
                && !key.contains("password")
            {
                Some(cred.value.as_str())
            } else {
                None
            }
        })
    }
}

/// One consolidated generation request: every field of one form, one scenario.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fields in form order
    pub fields: Vec<FieldDescriptor>,
    /// Page context, if any was detected
    pub page_context: Option<PageContext>,
    /// Scenario the values are for
    pub scenario: Scenario,
}

impl GenerationRequest {
    /// Names of the required fields in the request
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }
}

/// Field name → generated value, as returned by a backend.
pub type GenerationResponse = HashMap<String, String>;

/// Where a value in a [`crate::GenerationOutcome`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Produced by the generative backend
    Generated,
    /// Produced by local synthesis
    Fallback,
}
