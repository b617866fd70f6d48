//! Plain-text parameter persistence.
//!
//! One `key=value` line per parameter. The algorithm choice is stored under
//! its own name, every other parameter under `Algorithm_Name:Param_Name`
//! (spaces replaced by underscores). Values are normalized to `[0, 1]`.

use std::collections::BTreeMap;
use std::path::Path;

use crate::algorithms::AlgorithmRegistry;
use crate::error::SettingsError;
use crate::params::ParameterBank;

/// Parsed settings, keyed by sanitized parameter key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, f64>,
}

/// Replace spaces so keys survive the line format.
pub fn sanitize_key(name: &str) -> String {
    name.replace(' ', "_")
}

/// Key for parameter `param` of algorithm `algorithm`.
pub fn param_key(algorithm: &str, param: &str) -> String {
    format!("{}:{}", sanitize_key(algorithm), sanitize_key(param))
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings text. Lines without `=` or with a non-numeric value
    /// are skipped.
    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::debug!("settings line {}: no '=', skipped", n + 1);
                continue;
            };
            match value.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    values.insert(key.trim().to_string(), v);
                }
                _ => log::debug!("settings line {}: bad value {:?}, skipped", n + 1, value),
            }
        }
        Self { values }
    }

    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Write the settings file, replacing any previous contents.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, normalized: f64) {
        self.values.insert(key.into(), normalized);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize with six decimal places per value.
    pub fn to_text(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={:.6}\n", k, v))
            .collect()
    }

    /// Capture the algorithm choice and every registered algorithm's
    /// parameters from the bank.
    pub fn capture(bank: &ParameterBank, registry: &AlgorithmRegistry) -> Self {
        let mut settings = Self::new();
        let choice = registry.choice_param();
        if let (Some(spec), Some(v)) = (bank.spec(choice), bank.get_normalized(choice)) {
            settings.insert(sanitize_key(&spec.name), v);
        }
        for (algorithm, range) in registry.iter() {
            for index in range.indices() {
                if let (Some(spec), Some(v)) = (bank.spec(index), bank.get_normalized(index)) {
                    settings.insert(param_key(algorithm.name(), &spec.name), v);
                }
            }
        }
        settings
    }

    /// Write every known key back into the bank. Unknown keys are ignored.
    /// Returns the number of parameters restored.
    pub fn apply(&self, bank: &mut ParameterBank, registry: &AlgorithmRegistry) -> usize {
        let mut restored = 0;
        let choice = registry.choice_param();
        let choice_key = bank.spec(choice).map(|s| sanitize_key(&s.name));
        if let Some(v) = choice_key.and_then(|k| self.get(&k)) {
            if bank.set_normalized(choice, v).is_some() {
                restored += 1;
            }
        }
        for (algorithm, range) in registry.iter() {
            for index in range.indices() {
                let Some(key) = bank.spec(index).map(|s| param_key(algorithm.name(), &s.name))
                else {
                    continue;
                };
                if let Some(v) = self.get(&key) {
                    if bank.set_normalized(index, v).is_some() {
                        restored += 1;
                    }
                }
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_malformed_lines() {
        let settings = Settings::parse(
            "Algorithm=0.500000\n\
             garbage line\n\
             Amp_Slice:Floor_(dB)=abc\n\
             \n\
             Amp_Slice:On_Threshold_(dB)= 0.25 \n",
        );
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get("Algorithm"), Some(0.5));
        assert_eq!(settings.get("Amp_Slice:On_Threshold_(dB)"), Some(0.25));
    }

    #[test]
    fn test_keys_are_sanitized() {
        assert_eq!(
            param_key("Amp Slice", "Floor (dB)"),
            "Amp_Slice:Floor_(dB)"
        );
    }

    #[test]
    fn test_to_text_uses_six_decimals() {
        let mut settings = Settings::new();
        settings.insert("Algorithm", 1.0);
        assert_eq!(settings.to_text(), "Algorithm=1.000000\n");
    }

    #[test]
    fn test_capture_and_apply_round_trip() {
        let mut bank = ParameterBank::new();
        let registry = AlgorithmRegistry::with_builtins(&mut bank);
        let floor = registry.range(0).unwrap().global(6).unwrap();
        bank.set(floor, -40.0);
        bank.set(registry.choice_param(), 1.0);

        let settings = Settings::capture(&bank, &registry);
        assert_eq!(settings.len(), bank.len());
        assert_eq!(settings.get("Algorithm"), Some(1.0));

        let mut fresh_bank = ParameterBank::new();
        let fresh = AlgorithmRegistry::with_builtins(&mut fresh_bank);
        let restored = Settings::parse(&settings.to_text()).apply(&mut fresh_bank, &fresh);
        assert_eq!(restored, fresh_bank.len());
        assert_eq!(fresh_bank.get(floor), Some(-40.0));
        assert_eq!(fresh_bank.get(fresh.choice_param()), Some(1.0));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.ini");

        let mut settings = Settings::new();
        settings.insert("Algorithm", 0.0);
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("missing.ini")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
