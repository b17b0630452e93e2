// 🎛️ Fixed 10-band EQ format (peaking filters + preamp)
//
//   Preamp: -6.2 dB
//   Filter 1: ON PK Fc 31 Hz Gain 5.8 dB Q 1.41
//   Filter 2: OFF PK Fc 62 Hz Gain -0.4 dB Q 1.41
//
// Q is part of the grammar but the format's bandwidth is fixed, so it is not kept.

use super::{EqFormat, Parsed};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_BANDS: usize = 10;
pub const MAX_PREAMP_DB: f64 = 20.0;
pub const MAX_BAND_GAIN_DB: f64 = 20.0;
pub const MAX_FREQUENCY_HZ: f64 = 24000.0;

/// Bandwidth written on export
pub const FIXED_Q: f64 = 1.41;

const NUMBER: &str = r"[-+]?(?:\d+(?:\.\d*)?|\.\d+)";

static PREAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^preamp\s*:\s*({})\s*(?:db)?\s*$", NUMBER))
        .expect("preamp pattern is valid")
});

static FILTER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^filter\b").expect("filter prefix pattern is valid"));

static FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^filter\s*(\d+)?\s*:\s*(on|off)\s+pk\s+fc\s+({n})\s*hz\s+gain\s+({n})\s*db(?:\s+q\s+({n}))?",
        n = NUMBER
    ))
    .expect("filter pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedBand {
    pub frequency: f64,
    pub gain: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FixedBandEq {
    pub preamp: f64,
    pub bands: Vec<FixedBand>,
}

impl FixedBandEq {
    /// Render back to the Preamp/Filter text format
    pub fn to_text(&self) -> String {
        let mut out = format!("Preamp: {:.1} dB\n", self.preamp);
        for (idx, band) in self.bands.iter().enumerate() {
            out.push_str(&format!(
                "Filter {}: {} PK Fc {} Hz Gain {:.1} dB Q {:.2}\n",
                idx + 1,
                if band.enabled { "ON" } else { "OFF" },
                band.frequency,
                band.gain,
                FIXED_Q
            ));
        }
        out
    }

    pub fn enabled_bands(&self) -> impl Iterator<Item = &FixedBand> {
        self.bands.iter().filter(|b| b.enabled)
    }
}

/// Fixed-band EQ parser + validator
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedBandEqParser;

impl FixedBandEqParser {
    pub fn new() -> Self {
        FixedBandEqParser
    }
}

impl EqFormat for FixedBandEqParser {
    type Profile = FixedBandEq;

    fn parse(&self, text: &str) -> Parsed<FixedBandEq> {
        let mut profile = FixedBandEq::default();
        let mut diagnostics = Vec::new();
        let mut seen_preamp = false;

        for (idx, raw) in text.lines().enumerate() {
            let line_number = idx + 1;
            let line = raw.trim();

            if let Some(caps) = PREAMP_RE.captures(line) {
                if seen_preamp {
                    diagnostics.push(format!("Line {}: extra Preamp line ignored", line_number));
                    continue;
                }
                // The pattern only admits plain decimals
                profile.preamp = caps[1].parse().unwrap_or(0.0);
                seen_preamp = true;
                continue;
            }

            if !FILTER_LINE_RE.is_match(line) {
                // Unknown header lines are expected
                continue;
            }

            match FILTER_RE.captures(line) {
                Some(caps) => profile.bands.push(FixedBand {
                    enabled: caps[2].eq_ignore_ascii_case("on"),
                    frequency: caps[3].parse().unwrap_or(0.0),
                    gain: caps[4].parse().unwrap_or(0.0),
                }),
                None => diagnostics.push(format!(
                    "Line {}: dropping filter line without ON|OFF PK Fc/Gain: '{}'",
                    line_number, line
                )),
            }
        }

        for d in &diagnostics {
            warn!("FixedBandEQ: {}", d);
        }

        Parsed {
            profile,
            diagnostics,
        }
    }

    fn validate(&self, profile: &FixedBandEq) -> Vec<String> {
        let mut errors = Vec::new();

        if profile.bands.len() > MAX_BANDS {
            errors.push(format!(
                "Too many bands: {} (max {})",
                profile.bands.len(),
                MAX_BANDS
            ));
        }

        if !profile.preamp.is_finite() || profile.preamp.abs() > MAX_PREAMP_DB {
            errors.push(format!(
                "Preamp {:.1} dB outside ±{} dB",
                profile.preamp, MAX_PREAMP_DB
            ));
        }

        for (idx, band) in profile.bands.iter().enumerate() {
            let n = idx + 1;

            if !(band.frequency > 0.0 && band.frequency <= MAX_FREQUENCY_HZ) {
                errors.push(format!(
                    "Band {}: frequency {} Hz outside (0, {}] Hz",
                    n, band.frequency, MAX_FREQUENCY_HZ
                ));
            }

            if band.enabled && !(band.gain.abs() <= MAX_BAND_GAIN_DB) {
                errors.push(format!(
                    "Band {}: gain {:.1} dB outside ±{} dB",
                    n, band.gain, MAX_BAND_GAIN_DB
                ));
            }
        }

        errors
    }
}
