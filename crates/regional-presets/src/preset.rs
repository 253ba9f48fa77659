//! Preset records and their CSV row format
//!
//! One preset per line:
//!
//! ```text
//! Horizontal-7,Horizontal,"1,1,1,1,1,1,1","0.2",True,False,False
//! ```
//!
//! Ratio fields are quoted since they contain commas.

use crate::{PresetError, Result};
use regional_core::{DivideMode, GenerationRequest};
use serde::{Deserialize, Serialize};

/// Name of the preset recording the most recent generation
pub const LAST_RUN: &str = "lastrun";

/// Header line of a preset file
pub const HEADER: &str =
    r#""name","mode","divide ratios","baseratios","use base","usecom","usencom""#;

/// Minimum fields for a row to be read as a preset
const MIN_FIELDS: usize = 6;

/// Saved regional prompting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub mode: DivideMode,
    pub ratios: String,
    pub base_ratios: String,
    pub use_base: bool,
    pub use_common: bool,
    pub use_common_negative: bool,
}

impl Preset {
    /// Presets available without a preset file
    pub fn builtin() -> Vec<Preset> {
        vec![
            Preset::simple("Vertical-3", DivideMode::Vertical, "1,1,1"),
            Preset::simple("Horizontal-3", DivideMode::Horizontal, "1,1,1"),
            Preset {
                base_ratios: "0.2".into(),
                use_base: true,
                ..Preset::simple("Horizontal-7", DivideMode::Horizontal, "1,1,1,1,1,1,1")
            },
        ]
    }

    fn simple(name: &str, mode: DivideMode, ratios: &str) -> Self {
        Self {
            name: name.into(),
            mode,
            ratios: ratios.into(),
            base_ratios: String::new(),
            use_base: false,
            use_common: false,
            use_common_negative: false,
        }
    }

    /// Capture the settings of a request under `name`
    pub fn from_request(name: impl Into<String>, request: &GenerationRequest) -> Self {
        Self {
            name: name.into(),
            mode: request.mode,
            ratios: request.ratios.clone(),
            base_ratios: request.base_ratios.clone(),
            use_base: request.use_base,
            use_common: request.use_common,
            use_common_negative: request.use_common_negative,
        }
    }

    /// Copy the settings into a request, leaving its prompts and size alone
    pub fn apply(&self, request: &mut GenerationRequest) {
        request.mode = self.mode;
        request.ratios = self.ratios.clone();
        request.base_ratios = self.base_ratios.clone();
        request.use_base = self.use_base;
        request.use_common = self.use_common;
        request.use_common_negative = self.use_common_negative;
    }

    /// Reject names that cannot round-trip through a preset row
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.name.contains([',', '"', '\n', '\r']) {
            return Err(PresetError::InvalidName(self.name.clone()));
        }
        Ok(())
    }

    /// Render as a preset row, without line terminator
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.name,
            self.mode,
            quote(&self.ratios),
            quote(&self.base_ratios),
            format_bool(self.use_base),
            format_bool(self.use_common),
            format_bool(self.use_common_negative)
        )
    }

    /// Parse a preset row
    ///
    /// Returns `Ok(None)` for rows with too few fields and for the header.
    /// `line` is only used in error messages.
    pub fn from_row(row: &str, line: usize) -> Result<Option<Self>> {
        let fields = split_row(row);
        if fields.len() < MIN_FIELDS || fields[0] == "name" {
            return Ok(None);
        }
        let mode = fields[1]
            .parse::<DivideMode>()
            .map_err(|e| PresetError::InvalidRow {
                line,
                reason: e.to_string(),
            })?;
        Ok(Some(Self {
            name: fields[0].clone(),
            mode,
            ratios: fields[2].clone(),
            base_ratios: fields[3].clone(),
            use_base: parse_bool(&fields[4]),
            use_common: parse_bool(&fields[5]),
            use_common_negative: fields.get(6).map(|f| parse_bool(f)).unwrap_or(false),
        }))
    }
}

/// `true`, `True` and `TRUE` are true; anything else is false
pub fn parse_bool(text: &str) -> bool {
    matches!(text.trim(), "true" | "True" | "TRUE")
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Split one row on commas outside double quotes
///
/// Quotes are removed and a doubled quote inside a quoted field is a
/// literal quote.
pub fn split_row(row: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = row.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}
