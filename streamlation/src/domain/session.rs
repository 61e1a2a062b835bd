//! The translation session: the unit of coordination.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

static SESSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{8,64}$").expect("valid session id pattern"));

static LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}$").expect("valid language pattern"));

/// Upper bound on the configurable latency tolerance, in milliseconds.
pub const MAX_LATENCY_TOLERANCE_MS: u32 = 60_000;

/// A user request to translate one media source into one target language.
///
/// Immutable once persisted; deleted only to roll back a failed enqueue or
/// by operator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TranslationSession {
    /// Opaque identifier, `[A-Za-z0-9_-]{8,64}`.
    pub id: String,
    pub source: SourceSpec,
    /// Two-letter lowercase language code.
    pub target_language: String,
    #[serde(default)]
    pub options: SessionOptions,
}

/// The media source of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub uri: String,
}

/// Ingestion strategy for a media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Playlist,
    FramedTcp,
    Dash,
    File,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Playlist => "playlist",
            SourceKind::FramedTcp => "framed-tcp",
            SourceKind::Dash => "dash",
            SourceKind::File => "file",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "playlist" => Ok(SourceKind::Playlist),
            "framed-tcp" => Ok(SourceKind::FramedTcp),
            "dash" => Ok(SourceKind::Dash),
            "file" => Ok(SourceKind::File),
            other => Err(Error::decode(format!("unknown source type '{other}'"))),
        }
    }
}

/// Per-session processing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SessionOptions {
    pub enable_dubbing: bool,
    pub latency_tolerance_ms: u32,
    pub model_profile: ModelProfile,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            enable_dubbing: false,
            latency_tolerance_ms: 5_000,
            model_profile: ModelProfile::CpuBasic,
        }
    }
}

/// Model resource profile a session is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelProfile {
    CpuBasic,
    CpuAdvanced,
    GpuAccelerated,
}

impl ModelProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProfile::CpuBasic => "cpu-basic",
            ModelProfile::CpuAdvanced => "cpu-advanced",
            ModelProfile::GpuAccelerated => "gpu-accelerated",
        }
    }
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpu-basic" => Ok(ModelProfile::CpuBasic),
            "cpu-advanced" => Ok(ModelProfile::CpuAdvanced),
            "gpu-accelerated" => Ok(ModelProfile::GpuAccelerated),
            other => Err(Error::decode(format!("unknown model profile '{other}'"))),
        }
    }
}

/// True when `id` matches the session identifier pattern.
pub(crate) fn is_valid_session_id(id: &str) -> bool {
    SESSION_ID_RE.is_match(id)
}

impl TranslationSession {
    /// Validate the payload beyond what deserialization enforces.
    ///
    /// Source type allowlisting, model profile membership, and
    /// unknown-field rejection are already enforced by the serde
    /// definitions; this checks the value-level constraints.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_session_id(&self.id) {
            return Err(Error::validation(
                "id must match [A-Za-z0-9_-]{8,64}".to_string(),
            ));
        }
        if Url::parse(&self.source.uri).is_err() {
            return Err(Error::validation(format!(
                "source.uri '{}' is not a valid URI",
                self.source.uri
            )));
        }
        if !LANGUAGE_RE.is_match(&self.target_language) {
            return Err(Error::validation(
                "targetLanguage must be a two-letter lowercase code".to_string(),
            ));
        }
        if self.options.latency_tolerance_ms > MAX_LATENCY_TOLERANCE_MS {
            return Err(Error::validation(format!(
                "latencyToleranceMs must be within [0, {MAX_LATENCY_TOLERANCE_MS}]"
            )));
        }
        Ok(())
    }
}
