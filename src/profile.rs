// 📂 Profile resolution - Entry → EQ profile / measurement files
//
// results/<source>/<form>/<label>/<label> GraphicEQ.txt
// results/<source>/<form>/<label>/<label> FixedBandEQ.txt
// <source root>/data/<form>/<label>.csv

use crate::crawler::MEASUREMENT_EXTENSION;
use crate::eq::{EqFormat, FixedBandEq, FixedBandEqParser, GraphicEq, GraphicEqParser, ProfileKind};
use crate::error::{CatalogError, Result};
use crate::search::Entry;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// What the playback side receives: the profile plus everything it needs to decide
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile<T> {
    pub path: PathBuf,
    pub profile: T,
    /// Malformed units skipped while parsing
    pub diagnostics: Vec<String>,
    /// Validation problems; empty means safe to apply
    pub errors: Vec<String>,
}

impl<T> LoadedProfile<T> {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse + validate a profile file with any format
pub fn load_profile<F: EqFormat>(format: &F, path: &Path) -> Result<LoadedProfile<F::Profile>> {
    let parsed = format.parse_file(path)?;
    let errors = format.validate(&parsed.profile);

    Ok(LoadedProfile {
        path: path.to_path_buf(),
        profile: parsed.profile,
        diagnostics: parsed.diagnostics,
        errors,
    })
}

pub struct ProfileLocator {
    results_root: PathBuf,
}

impl ProfileLocator {
    pub fn new(results_root: &Path) -> Self {
        ProfileLocator {
            results_root: results_root.to_path_buf(),
        }
    }

    /// Directory holding every profile for one entry
    pub fn profile_dir(&self, entry: &Entry) -> PathBuf {
        self.results_root
            .join(&entry.source)
            .join(&entry.form)
            .join(&entry.label)
    }

    pub fn profile_path(&self, entry: &Entry, kind: ProfileKind) -> PathBuf {
        self.profile_dir(entry)
            .join(format!("{} {}", entry.label, kind.file_suffix()))
    }

    /// Which profile kinds actually exist on disk for an entry
    pub fn available_kinds(&self, entry: &Entry) -> Vec<ProfileKind> {
        [ProfileKind::Graphic, ProfileKind::FixedBand]
            .into_iter()
            .filter(|&kind| self.profile_path(entry, kind).is_file())
            .collect()
    }

    pub fn load_graphic_eq(&self, entry: &Entry) -> Result<LoadedProfile<GraphicEq>> {
        load_profile(
            &GraphicEqParser::new(),
            &self.profile_path(entry, ProfileKind::Graphic),
        )
    }

    pub fn load_fixed_band_eq(&self, entry: &Entry) -> Result<LoadedProfile<FixedBandEq>> {
        load_profile(
            &FixedBandEqParser::new(),
            &self.profile_path(entry, ProfileKind::FixedBand),
        )
    }
}

/// Measurement CSV for an entry inside its source's dataset root
pub fn measurement_path(source_root: &Path, entry: &Entry) -> PathBuf {
    source_root
        .join("data")
        .join(&entry.form)
        .join(format!("{}.{}", entry.label, MEASUREMENT_EXTENSION))
}

/// Read (frequency, response) pairs from a measurement CSV
///
/// Uses the `frequency` column and the first other numeric column.
/// Rows that don't parse are skipped.
pub fn read_frequency_response(path: &Path) -> anyhow::Result<Vec<(f64, f64)>> {
    if !path.is_file() {
        return Err(CatalogError::ProfileNotFound(path.to_path_buf()).into());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open measurement: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();

    let freq_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("frequency"))
        .ok_or_else(|| anyhow::anyhow!("No 'frequency' column in {}", path.display()))?;

    let mut points = Vec::new();
    let mut value_col: Option<usize> = None;

    for (line_num, result) in reader.records().enumerate() {
        let record = result.with_context(|| {
            format!("Failed to parse CSV line {} in {}", line_num + 2, path.display())
        })?;

        let Some(frequency) = record.get(freq_col).and_then(|v| v.parse::<f64>().ok()) else {
            continue;
        };

        // First numeric non-frequency column of the first data row decides
        let col = match value_col {
            Some(col) => col,
            None => {
                let Some(col) = (0..record.len())
                    .filter(|&i| i != freq_col)
                    .find(|&i| record[i].parse::<f64>().is_ok())
                else {
                    continue;
                };
                value_col = Some(col);
                col
            }
        };

        if let Some(value) = record.get(col).and_then(|v| v.parse::<f64>().ok()) {
            points.push((frequency, value));
        }
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry() -> Entry {
        Entry::new("Sennheiser HD 600", "oratory1990", "GRAS 43AG-7", "over-ear")
    }

    #[test]
    fn test_profile_paths() {
        let locator = ProfileLocator::new(Path::new("/results"));

        assert_eq!(
            locator.profile_path(&entry(), ProfileKind::Graphic),
            PathBuf::from("/results/oratory1990/over-ear/Sennheiser HD 600/Sennheiser HD 600 GraphicEQ.txt")
        );
        assert_eq!(
            measurement_path(Path::new("/m/oratory1990"), &entry()),
            PathBuf::from("/m/oratory1990/data/over-ear/Sennheiser HD 600.csv")
        );
    }

    #[test]
    fn test_load_graphic_eq_with_validation() {
        let dir = TempDir::new().unwrap();
        let locator = ProfileLocator::new(dir.path());
        let path = locator.profile_path(&entry(), ProfileKind::Graphic);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "GraphicEQ: 20 -1.0; 20 -1.5; 40 x\n").unwrap();

        let loaded = locator.load_graphic_eq(&entry()).unwrap();

        assert_eq!(loaded.profile.bands.len(), 2);
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.errors.len(), 1);
        assert!(!loaded.is_valid());
        assert_eq!(locator.available_kinds(&entry()), vec![ProfileKind::Graphic]);
    }

    #[test]
    fn test_load_fixed_band_eq() {
        let dir = TempDir::new().unwrap();
        let locator = ProfileLocator::new(dir.path());
        let path = locator.profile_path(&entry(), ProfileKind::FixedBand);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "Preamp: -6.2 dB\nFilter 1: ON PK Fc 31 Hz Gain 5.8 dB Q 1.41\n").unwrap();

        let loaded = locator.load_fixed_band_eq(&entry()).unwrap();
        assert!(loaded.is_valid());
        assert_eq!(loaded.profile.preamp, -6.2);
        assert_eq!(loaded.path, path);
    }

    #[test]
    fn test_missing_profile_is_not_found() {
        let dir = TempDir::new().unwrap();
        let locator = ProfileLocator::new(dir.path());

        let result = locator.load_fixed_band_eq(&entry());
        assert!(matches!(result, Err(CatalogError::ProfileNotFound(_))));
        assert!(locator.available_kinds(&entry()).is_empty());
    }

    #[test]
    fn test_read_frequency_response() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("HD 600.csv");
        fs::write(
            &path,
            "frequency,raw,smoothed\n20.0,1.5,1.4\nbad,row,here\n1000.0,0.0,0.1\n20000, -3.25 ,-3.0\n",
        )
        .unwrap();

        let points = read_frequency_response(&path).unwrap();
        assert_eq!(points, vec![(20.0, 1.5), (1000.0, 0.0), (20000.0, -3.25)]);
    }

    #[test]
    fn test_read_frequency_response_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_frequency_response(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.downcast_ref::<CatalogError>().is_some());
    }
}
