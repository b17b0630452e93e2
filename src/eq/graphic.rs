// 📈 Graphic EQ format
//
//   GraphicEQ: 20 -3.1; 21 -3.0; 22 -2.9; ...
//
// One header line of "frequency gain" pairs; any other "key: value" line is metadata.

use super::{EqFormat, Parsed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const GRAPHIC_EQ_PREFIX: &str = "GraphicEQ:";

/// Guard band for a single correction point
pub const MAX_GRAPHIC_GAIN_DB: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphicBand {
    pub frequency: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphicEq {
    pub bands: Vec<GraphicBand>,
    pub metadata: BTreeMap<String, String>,
}

impl GraphicEq {
    /// Render the band list as a single GraphicEQ line
    pub fn to_line(&self) -> String {
        let pairs: Vec<String> = self
            .bands
            .iter()
            .map(|b| format!("{} {:.1}", b.frequency.round() as i64, b.gain))
            .collect();
        format!("{} {}", GRAPHIC_EQ_PREFIX, pairs.join("; "))
    }

    /// Full file: the GraphicEQ line followed by metadata lines
    pub fn to_file_string(&self) -> String {
        let mut out = self.to_line();
        out.push('\n');
        for (key, value) in &self.metadata {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        out
    }
}

fn header_rest(line: &str) -> Option<&str> {
    let head = line.get(..GRAPHIC_EQ_PREFIX.len())?;
    if head.eq_ignore_ascii_case(GRAPHIC_EQ_PREFIX) {
        Some(&line[GRAPHIC_EQ_PREFIX.len()..])
    } else {
        None
    }
}

fn parse_pair(pair: &str) -> Result<GraphicBand, String> {
    let tokens: Vec<&str> = pair.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(format!("expected 'frequency gain', got '{}'", pair));
    }

    let number = |token: &str| -> Result<f64, String> {
        token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("non-numeric value '{}'", token))
    };

    Ok(GraphicBand {
        frequency: number(tokens[0])?,
        gain: number(tokens[1])?,
    })
}

/// Graphic EQ parser + validator
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphicEqParser;

impl GraphicEqParser {
    pub fn new() -> Self {
        GraphicEqParser
    }
}

impl EqFormat for GraphicEqParser {
    type Profile = GraphicEq;

    fn parse(&self, text: &str) -> Parsed<GraphicEq> {
        let mut profile = GraphicEq::default();
        let mut diagnostics = Vec::new();
        let mut seen_header = false;

        for (idx, raw) in text.lines().enumerate() {
            let line_number = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = header_rest(line) {
                if seen_header {
                    diagnostics.push(format!(
                        "Line {}: extra GraphicEQ line ignored",
                        line_number
                    ));
                    continue;
                }
                seen_header = true;

                for pair in rest.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                    match parse_pair(pair) {
                        Ok(band) => profile.bands.push(band),
                        Err(e) => diagnostics.push(format!(
                            "Line {}: skipping malformed pair: {}",
                            line_number, e
                        )),
                    }
                }
                continue;
            }

            match line.split_once(':') {
                Some((key, value)) if !key.trim().is_empty() => {
                    profile
                        .metadata
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
                _ => diagnostics.push(format!(
                    "Line {}: unrecognized line ignored",
                    line_number
                )),
            }
        }

        for d in &diagnostics {
            warn!("GraphicEQ: {}", d);
        }

        Parsed {
            profile,
            diagnostics,
        }
    }

    fn validate(&self, profile: &GraphicEq) -> Vec<String> {
        let mut errors = Vec::new();

        if profile.bands.is_empty() {
            errors.push("No bands".to_string());
        }

        let mut previous: Option<f64> = None;
        for (idx, band) in profile.bands.iter().enumerate() {
            let n = idx + 1;

            if band.frequency <= 0.0 {
                errors.push(format!(
                    "Band {}: frequency {} Hz must be positive",
                    n, band.frequency
                ));
            }

            if band.gain.abs() > MAX_GRAPHIC_GAIN_DB {
                errors.push(format!(
                    "Band {}: gain {:.1} dB outside ±{} dB",
                    n, band.gain, MAX_GRAPHIC_GAIN_DB
                ));
            }

            if let Some(prev) = previous {
                if band.frequency == prev {
                    errors.push(format!(
                        "Band {}: duplicate frequency {} Hz",
                        n, band.frequency
                    ));
                } else if band.frequency < prev {
                    errors.push(format!(
                        "Band {}: frequency {} Hz not ascending (previous {} Hz)",
                        n, band.frequency, prev
                    ));
                }
            }
            previous = Some(band.frequency);
        }

        errors
    }
}
