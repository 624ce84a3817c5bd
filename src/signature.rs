//! Declarative prompt templates ("signatures") with typed input and output
//! fields.
//!
//! A [`Signature`] names what goes in and what must come out; a
//! [`Predictor`] renders it into chat messages and parses the reply. The
//! wire format delimits every field with a `[[ ## name ## ]]` marker line
//! and ends the reply with `[[ ## completed ## ]]`, so several output
//! fields (e.g. `reasoning` followed by `extracted_data`) can be recovered
//! from one free-text completion.
//!
//! ```rust
//! use edgequake_doc2json::signature::{Inputs, Predictor, Signature};
//!
//! let sig = Signature::parse("sentence -> sentiment: bool").unwrap();
//! let predictor = Predictor::predict(sig);
//! let messages = predictor
//!     .messages(&Inputs::new().text("sentence", "a charming and affecting journey"))
//!     .unwrap();
//! assert_eq!(messages.len(), 2);
//!
//! let prediction = predictor
//!     .parse("[[ ## sentiment ## ]]\nTrue\n\n[[ ## completed ## ]]")
//!     .unwrap();
//! assert_eq!(prediction.get_bool("sentiment"), Some(true));
//! ```

use crate::error::ExtractError;
use edgequake_llm::{ChatMessage, ImageData};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Output field prepended by [`Strategy::ChainOfThought`].
pub const REASONING_FIELD: &str = "reasoning";

const COMPLETED_MARKER: &str = "[[ ## completed ## ]]";

static RE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[ ## ([A-Za-z_][A-Za-z0-9_]*) ## \]\]").unwrap());

static RE_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// The type of a signature field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Text,
    Integer,
    Bool,
    Image,
}

impl FieldKind {
    fn type_name(self) -> &'static str {
        match self {
            FieldKind::Text => "str",
            FieldKind::Integer => "int",
            FieldKind::Bool => "bool",
            FieldKind::Image => "Image",
        }
    }

    fn from_type_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "str" | "string" | "text" => Some(FieldKind::Text),
            "int" | "integer" => Some(FieldKind::Integer),
            "bool" | "boolean" => Some(FieldKind::Bool),
            "image" | "dspy.image" => Some(FieldKind::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub desc: Option<String>,
}

/// Instructions plus ordered input and output fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub instructions: String,
    pub inputs: Vec<Field>,
    pub outputs: Vec<Field>,
}

impl Signature {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.inputs.push(Field {
            name: name.into(),
            kind,
            desc: None,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, kind: FieldKind, desc: Option<&str>) -> Self {
        self.outputs.push(Field {
            name: name.into(),
            kind,
            desc: desc.map(str::to_string),
        });
        self
    }

    /// Parse the shorthand form `"a, b: int -> c: bool"`.
    ///
    /// Field types default to `str`; accepted types are `str`, `int`,
    /// `bool`, and (inputs only) `image`.
    pub fn parse(shorthand: &str) -> Result<Self, ExtractError> {
        let invalid = |detail: &str| ExtractError::InvalidSignature {
            signature: shorthand.to_string(),
            detail: detail.to_string(),
        };

        let (lhs, rhs) = shorthand
            .split_once("->")
            .ok_or_else(|| invalid("expected 'inputs -> outputs'"))?;
        if rhs.contains("->") {
            return Err(invalid("more than one '->'"));
        }

        let parse_side = |side: &str, what: &str| -> Result<Vec<Field>, ExtractError> {
            let mut fields = Vec::new();
            for item in side.split(',') {
                let (name, kind) = match item.split_once(':') {
                    Some((n, t)) => (
                        n.trim(),
                        FieldKind::from_type_name(t)
                            .ok_or_else(|| invalid(&format!("unknown type '{}'", t.trim())))?,
                    ),
                    None => (item.trim(), FieldKind::Text),
                };
                if !RE_IDENT.is_match(name) {
                    return Err(invalid(&format!("bad {what} field name '{name}'")));
                }
                if fields.iter().any(|f: &Field| f.name == name) {
                    return Err(invalid(&format!("duplicate {what} field '{name}'")));
                }
                fields.push(Field {
                    name: name.to_string(),
                    kind,
                    desc: None,
                });
            }
            Ok(fields)
        };

        let inputs = parse_side(lhs, "input")?;
        let outputs = parse_side(rhs, "output")?;
        if outputs.iter().any(|f| f.kind == FieldKind::Image) {
            return Err(invalid("image outputs are not supported"));
        }

        let instructions = format!(
            "Given the fields {}, produce the fields {}.",
            backticked(&inputs),
            backticked(&outputs)
        );
        Ok(Self {
            instructions,
            inputs,
            outputs,
        })
    }
}

fn backticked(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| format!("`{}`", f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Inputs ───────────────────────────────────────────────────────────────

/// A value bound to an input field.
#[derive(Clone)]
pub enum InputValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    Images(Vec<ImageData>),
}

/// Ordered input bindings for one predictor call.
#[derive(Clone, Default)]
pub struct Inputs {
    values: Vec<(String, InputValue)>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, InputValue::Text(value.into()))
    }

    pub fn integer(self, name: impl Into<String>, value: i64) -> Self {
        self.with(name, InputValue::Integer(value))
    }

    pub fn boolean(self, name: impl Into<String>, value: bool) -> Self {
        self.with(name, InputValue::Bool(value))
    }

    pub fn image(self, name: impl Into<String>, value: ImageData) -> Self {
        self.with(name, InputValue::Images(vec![value]))
    }

    pub fn images(self, name: impl Into<String>, values: Vec<ImageData>) -> Self {
        self.with(name, InputValue::Images(values))
    }

    fn with(mut self, name: impl Into<String>, value: InputValue) -> Self {
        let name = name.into();
        self.values.retain(|(n, _)| *n != name);
        self.values.push((name, value));
        self
    }

    fn get(&self, name: &str) -> Option<&InputValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

// ── Predictor ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    Predict,
    ChainOfThought,
}

/// A signature bound to an execution strategy.
#[derive(Debug, Clone)]
pub struct Predictor {
    signature: Signature,
    strategy: Strategy,
}

impl Predictor {
    pub fn predict(signature: Signature) -> Self {
        Self {
            signature,
            strategy: Strategy::Predict,
        }
    }

    pub fn chain_of_thought(signature: Signature) -> Self {
        Self {
            signature,
            strategy: Strategy::ChainOfThought,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Output fields in the order the model must emit them.
    pub fn output_fields(&self) -> Vec<Field> {
        let mut fields = Vec::with_capacity(self.signature.outputs.len() + 1);
        if self.strategy == Strategy::ChainOfThought {
            fields.push(Field {
                name: REASONING_FIELD.to_string(),
                kind: FieldKind::Text,
                desc: Some("Think step by step in order to produce the remaining fields.".into()),
            });
        }
        fields.extend(self.signature.outputs.iter().cloned());
        fields
    }

    /// Render the system and user messages for `inputs`.
    pub fn messages(&self, inputs: &Inputs) -> Result<Vec<ChatMessage>, ExtractError> {
        let outputs = self.output_fields();
        let mut user = String::new();
        let mut images: Vec<ImageData> = Vec::new();

        for field in &self.signature.inputs {
            let rendered = match (field.kind, inputs.get(&field.name)) {
                (FieldKind::Text, Some(InputValue::Text(s))) => s.clone(),
                (FieldKind::Integer, Some(InputValue::Integer(n))) => n.to_string(),
                (FieldKind::Bool, Some(InputValue::Bool(b))) => b.to_string(),
                (FieldKind::Image, Some(InputValue::Images(list))) if !list.is_empty() => {
                    let first = images.len() + 1;
                    images.extend(list.iter().cloned());
                    if list.len() == 1 {
                        format!("[attached image {first}]")
                    } else {
                        format!("[attached images {first}-{}]", images.len())
                    }
                }
                _ => {
                    return Err(ExtractError::MissingInput {
                        field: field.name.clone(),
                        expected: field.kind.type_name().to_string(),
                    })
                }
            };
            let _ = write!(user, "[[ ## {} ## ]]\n{}\n\n", field.name, rendered);
        }

        let _ = write!(
            user,
            "Respond with the corresponding output fields, starting with the field {}, \
             and then ending with the marker for `{COMPLETED_MARKER}`.",
            outputs
                .iter()
                .map(|f| format!("`[[ ## {} ## ]]`{}", f.name, format_hint(f.kind)))
                .collect::<Vec<_>>()
                .join(", then ")
        );

        Ok(vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user_with_images(user, images),
        ])
    }

    fn system_prompt(&self) -> String {
        let outputs = self.output_fields();
        let mut s = String::from("Your input fields are:\n");
        for (i, f) in self.signature.inputs.iter().enumerate() {
            let _ = writeln!(s, "{}. {}", i + 1, describe(f));
        }
        s.push_str("Your output fields are:\n");
        for (i, f) in outputs.iter().enumerate() {
            let _ = writeln!(s, "{}. {}", i + 1, describe(f));
        }
        s.push_str(
            "All interactions will be structured in the following way, \
             with the appropriate values filled in.\n\n",
        );
        for f in self.signature.inputs.iter().chain(outputs.iter()) {
            let _ = write!(s, "[[ ## {0} ## ]]\n{{{0}}}\n\n", f.name);
        }
        s.push_str(COMPLETED_MARKER);
        let _ = write!(
            s,
            "\nIn adhering to this structure, your objective is: \n        {}",
            self.signature.instructions
        );
        s
    }

    /// Recover output fields from a completion.
    ///
    /// A reply with no markers at all is accepted as the value of the only
    /// non-reasoning output field, when there is exactly one.
    pub fn parse(&self, content: &str) -> Result<Prediction, ExtractError> {
        let sections = split_sections(content);
        let outputs = self.output_fields();
        let mut prediction = Prediction::default();

        if sections.is_empty() {
            let answers: Vec<&Field> = outputs
                .iter()
                .filter(|f| f.name != REASONING_FIELD)
                .collect();
            if let [only] = answers.as_slice() {
                let value = content.trim();
                if value.is_empty() {
                    return Err(ExtractError::MalformedResponse {
                        detail: "empty completion".into(),
                    });
                }
                prediction.fields.insert(only.name.clone(), value.to_string());
                return Ok(prediction);
            }
            return Err(ExtractError::MalformedResponse {
                detail: "no field markers in completion".into(),
            });
        }

        for field in &outputs {
            match sections.get(field.name.as_str()) {
                Some(value) if field.name == REASONING_FIELD => {
                    prediction.reasoning = Some(value.clone());
                }
                Some(value) => {
                    prediction.fields.insert(field.name.clone(), value.clone());
                }
                None if field.name == REASONING_FIELD => {}
                None => {
                    return Err(ExtractError::MalformedResponse {
                        detail: format!("missing output field '{}'", field.name),
                    })
                }
            }
        }
        Ok(prediction)
    }
}

fn describe(f: &Field) -> String {
    match f.desc {
        Some(ref d) => format!("`{}` ({}): {}", f.name, f.kind.type_name(), d),
        None => format!("`{}` ({})", f.name, f.kind.type_name()),
    }
}

fn format_hint(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Integer => " (must be formatted as a valid integer)",
        FieldKind::Bool => " (must be formatted as true or false)",
        FieldKind::Text | FieldKind::Image => "",
    }
}

/// Map each marker name to the trimmed text up to the next marker.
/// The first occurrence of a name wins.
fn split_sections(content: &str) -> BTreeMap<&str, String> {
    let mut sections = BTreeMap::new();
    let markers: Vec<_> = RE_MARKER.captures_iter(content).collect();
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(content.len());
        sections
            .entry(name.as_str())
            .or_insert_with(|| content[whole.end()..end].trim().to_string());
    }
    sections.remove("completed");
    sections
}

// ── Prediction ───────────────────────────────────────────────────────────

/// Output values of one predictor call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Prediction {
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Prediction {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)?.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name)?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_output_sig() -> Signature {
        Signature::new("Summarise.")
            .input("text", FieldKind::Text)
            .output("title", FieldKind::Text, None)
            .output("pages", FieldKind::Integer, Some("page count"))
    }

    #[test]
    fn parse_shorthand_with_types() {
        let sig = Signature::parse("text, page: int -> sentiment: bool").unwrap();
        assert_eq!(sig.inputs.len(), 2);
        assert_eq!(sig.inputs[1].kind, FieldKind::Integer);
        assert_eq!(sig.outputs[0].kind, FieldKind::Bool);
        assert!(sig.instructions.contains("`text`, `page`"));
    }

    #[test]
    fn parse_shorthand_rejects_bad_forms() {
        assert!(Signature::parse("no arrow").is_err());
        assert!(Signature::parse("a -> b -> c").is_err());
        assert!(Signature::parse("a b -> c").is_err());
        assert!(Signature::parse("a -> c: float").is_err());
        assert!(Signature::parse("a -> pic: image").is_err());
        assert!(Signature::parse("a, a -> c").is_err());
    }

    #[test]
    fn system_prompt_lists_fields_and_objective() {
        let p = Predictor::chain_of_thought(two_output_sig());
        let prompt = p.system_prompt();
        assert!(prompt.contains("1. `text` (str)"));
        assert!(prompt.contains("1. `reasoning` (str)"));
        assert!(prompt.contains("3. `pages` (int): page count"));
        assert!(prompt.contains("[[ ## title ## ]]\n{title}"));
        assert!(prompt.trim_end().ends_with("Summarise."));
    }

    #[test]
    fn image_range_label_is_ascii() {
        let sig = Signature::new("Read.")
            .input("page_images", FieldKind::Image)
            .output("text", FieldKind::Text, None);
        let img = ImageData::new("AAAA", "image/png");
        let msgs = Predictor::predict(sig)
            .messages(&Inputs::new().images("page_images", vec![img.clone(), img]))
            .unwrap();
        let user = &msgs[1].content;
        assert!(user.contains("[attached images 1-2]"), "{user}");
        assert!(user.is_ascii());
    }

    #[test]
    fn messages_require_every_input() {
        let p = Predictor::predict(two_output_sig());
        let err = p.messages(&Inputs::new()).unwrap_err();
        assert!(matches!(err, ExtractError::MissingInput { ref field, .. } if field == "text"));

        let err = p
            .messages(&Inputs::new().integer("text", 3))
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingInput { .. }));
    }

    #[test]
    fn parse_reads_each_marker() {
        let p = Predictor::chain_of_thought(two_output_sig());
        let reply = "[[ ## reasoning ## ]]\nIt is short.\n\n[[ ## title ## ]]\nHello\n\n\
                     [[ ## pages ## ]]\n 3 \n\n[[ ## completed ## ]]";
        let pred = p.parse(reply).unwrap();
        assert_eq!(pred.reasoning.as_deref(), Some("It is short."));
        assert_eq!(pred.get("title"), Some("Hello"));
        assert_eq!(pred.get_int("pages"), Some(3));
    }

    #[test]
    fn parse_missing_output_is_malformed() {
        let p = Predictor::predict(two_output_sig());
        let err = p.parse("[[ ## title ## ]]\nHello").unwrap_err();
        assert!(matches!(err, ExtractError::MalformedResponse { .. }));
    }

    #[test]
    fn parse_unmarked_reply_fills_single_output() {
        let sig = Signature::parse("document_text -> extracted_data").unwrap();
        let pred = Predictor::chain_of_thought(sig)
            .parse("  {\"a\": 1}\n")
            .unwrap();
        assert_eq!(pred.get("extracted_data"), Some("{\"a\": 1}"));
        assert!(pred.reasoning.is_none());
    }

    #[test]
    fn first_marker_occurrence_wins() {
        let sig = Signature::parse("q -> answer").unwrap();
        let pred = Predictor::predict(sig)
            .parse("[[ ## answer ## ]] one [[ ## answer ## ]] two")
            .unwrap();
        assert_eq!(pred.get("answer"), Some("one"));
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let mut pred = Prediction::default();
        pred.fields.insert("s".into(), "True".into());
        assert_eq!(pred.get_bool("s"), Some(true));
        pred.fields.insert("s".into(), "maybe".into());
        assert_eq!(pred.get_bool("s"), None);
    }
}
