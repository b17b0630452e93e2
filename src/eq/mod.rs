// 🎚️ EQ Profile Formats
// Stateless text ↔ typed-profile converters, each with its own validator
//
// Parsing is best-effort and never rejects a readable text; semantic problems
// only surface through validate().

pub mod fixed_band;
pub mod graphic;

pub use fixed_band::{FixedBand, FixedBandEq, FixedBandEqParser};
pub use graphic::{GraphicBand, GraphicEq, GraphicEqParser};

use crate::error::{CatalogError, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// A best-effort parse and the malformed units it skipped
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub profile: T,
    pub diagnostics: Vec<String>,
}

/// EqFormat - one community EQ text format
pub trait EqFormat {
    type Profile;

    /// Parse raw text (never fails)
    fn parse(&self, text: &str) -> Parsed<Self::Profile>;

    /// Report every semantic problem; empty means the profile is safe to apply
    fn validate(&self, profile: &Self::Profile) -> Vec<String>;

    /// Parse a file given by explicit path
    ///
    /// A missing path is a hard error; anything readable parses.
    fn parse_file(&self, path: &Path) -> Result<Parsed<Self::Profile>> {
        let (text, lossy) = read_profile_text(path)?;
        let mut parsed = self.parse(&text);

        if lossy {
            let msg = format!(
                "{}: invalid UTF-8 replaced with U+FFFD",
                path.display()
            );
            warn!("{}", msg);
            parsed.diagnostics.insert(0, msg);
        }

        Ok(parsed)
    }
}

/// Read a profile file, distinguishing "not there" from other I/O failures
///
/// Invalid UTF-8 is decoded lossily; the flag reports whether that happened.
pub fn read_profile_text(path: &Path) -> Result<(String, bool)> {
    if !path.is_file() {
        return Err(CatalogError::ProfileNotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok((text, false)),
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
    }
}

/// Which format a profile file is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Graphic,
    FixedBand,
}

impl ProfileKind {
    /// File-name suffix used in the results tree
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ProfileKind::Graphic => "GraphicEQ.txt",
            ProfileKind::FixedBand => "FixedBandEQ.txt",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Graphic => write!(f, "graphic"),
            ProfileKind::FixedBand => write!(f, "fixed"),
        }
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "graphic" | "graphiceq" => Ok(ProfileKind::Graphic),
            "fixed" | "fixedband" | "fixed-band" | "parametric" => Ok(ProfileKind::FixedBand),
            other => Err(format!("Unknown profile format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_missing_path_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope GraphicEQ.txt");

        let result = GraphicEqParser::new().parse_file(&missing);
        assert!(matches!(result, Err(CatalogError::ProfileNotFound(p)) if p == missing));
    }

    #[test]
    fn test_parse_file_reads_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("HD 600 FixedBandEQ.txt");
        fs::write(&path, "Preamp: -6.2 dB\nFilter 1: ON PK Fc 31 Hz Gain 5.8 dB Q 1.41\n").unwrap();

        let parsed = FixedBandEqParser::new().parse_file(&path).unwrap();
        assert_eq!(parsed.profile.preamp, -6.2);
        assert_eq!(parsed.profile.bands.len(), 1);
    }

    #[test]
    fn test_parse_file_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DT 990 GraphicEQ.txt");
        fs::write(
            &path,
            b"GraphicEQ: 20 -1.0; 40 -2.0\nName: Beyerdynamic DT 990 \xC9dition\n".as_slice(),
        )
        .unwrap();

        let parsed = GraphicEqParser::new().parse_file(&path).unwrap();

        assert_eq!(parsed.profile.bands.len(), 2);
        assert_eq!(parsed.diagnostics.len(), 1, "{:?}", parsed.diagnostics);
        assert!(parsed.diagnostics[0].contains("invalid UTF-8"));
        assert_eq!(
            parsed.profile.metadata.get("Name").map(String::as_str),
            Some("Beyerdynamic DT 990 \u{FFFD}dition")
        );
    }

    #[test]
    fn test_profile_kind_from_str() {
        assert_eq!("graphic".parse::<ProfileKind>().unwrap(), ProfileKind::Graphic);
        assert_eq!("Fixed".parse::<ProfileKind>().unwrap(), ProfileKind::FixedBand);
        assert!("biquad".parse::<ProfileKind>().is_err());
        assert_eq!(ProfileKind::FixedBand.file_suffix(), "FixedBandEQ.txt");
    }
}
