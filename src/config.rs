use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Template file shipped next to real inputs; never processed
pub const SAMPLE_FILE_NAME: &str = "Sample.csv";

/// Column holding the person identifier in input and rewritten files
pub const IDENTIFIER_COLUMN: &str = "person_guid";

/// Separator between items of list-valued fields (roles, groups, authorities)
pub const LIST_SEPARATOR: char = '!';

/// Delimiter used for the unresolved-logins audit file
pub const AUDIT_DELIMITER: u8 = b';';

/// `cim:Name.NameType` reference for the short display name of a person
pub const ABBREVIATION_NAME_TYPE: &str = "00000002-0000-0000-c000-0000006d746c";

/// Fixed `md:FullModel` identifier of the energy document
pub const ENERGY_MODEL_ID: &str = "energy";

pub const DEFAULT_INPUT_ENCODING: &str = "windows-1251";
pub const DEFAULT_DELIMITER: &str = ";";
pub const DEFAULT_ACCESS_SUFFIX: &str = ".sysconfig.xml";
pub const DEFAULT_ENERGY_SUFFIX: &str = ".energy.xml";
pub const DEFAULT_AUDIT_FILE: &str = "not_in_AD.csv";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_ACCESS_MODEL_VERSION: &str = "2025-03-04(11.7.1.7)";
pub const DEFAULT_ENERGY_MODEL_VERSION: &str = "1.0";
pub const DEFAULT_ACCESS_MODEL_ID: &str = "a1aa400b-15b3-473a-b9c0-64d1c86d321f";

/// Run configuration, constructed once at startup and passed by reference.
///
/// Every field has a default so a partial `config.json` is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub directory: DirectorySettings,
    pub input: InputSettings,
    pub output: OutputSettings,
    pub xml: XmlSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// Whether directory mode is allowed at all
    pub enabled: bool,
    /// LDAP URL of the domain controller, e.g. `ldap://dc01.corp.local`
    pub url: String,
    /// Search base for person and domain lookups
    pub base_dn: String,
    /// Bind account used for the simple bind
    pub bind_user: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Fallback encoding label when no byte-order mark is present
    pub encoding: String,
    /// Preferred field delimiter
    pub delimiter: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_INPUT_ENCODING.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Encoding of the rewritten input files
    pub csv_encoding: String,
    pub access_xml_suffix: String,
    pub energy_xml_suffix: String,
    /// Name of the unresolved-logins audit file
    pub audit_file: String,
    pub log_dir: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            csv_encoding: DEFAULT_INPUT_ENCODING.to_string(),
            access_xml_suffix: DEFAULT_ACCESS_SUFFIX.to_string(),
            energy_xml_suffix: DEFAULT_ENERGY_SUFFIX.to_string(),
            audit_file: DEFAULT_AUDIT_FILE.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XmlSettings {
    pub access_model_version: String,
    pub energy_model_version: String,
    pub access_model_id: String,
}

impl Default for XmlSettings {
    fn default() -> Self {
        Self {
            access_model_version: DEFAULT_ACCESS_MODEL_VERSION.to_string(),
            energy_model_version: DEFAULT_ENERGY_MODEL_VERSION.to_string(),
            access_model_id: DEFAULT_ACCESS_MODEL_ID.to_string(),
        }
    }
}

impl AppConfig {
    /// Parses and validates a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid configuration JSON: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists; otherwise falls back to built-in defaults
    /// unless the caller insists on the file being present.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if path.exists() {
            return Self::from_file(path);
        }
        if required {
            bail!("Configuration file not found: {}", path.display());
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if encoding_rs::Encoding::for_label(self.input.encoding.as_bytes()).is_none() {
            bail!("Unknown input encoding: {}", self.input.encoding);
        }
        match encoding_rs::Encoding::for_label(self.output.csv_encoding.as_bytes()) {
            None => bail!("Unknown output encoding: {}", self.output.csv_encoding),
            // UTF-16 and replacement labels can only be decoded, never written back
            Some(enc) if enc.output_encoding() != enc => bail!(
                "Output encoding {} cannot be written; use a single-byte encoding or utf-8",
                enc.name()
            ),
            Some(_) => {}
        }
        self.delimiter()?;
        if self.output.access_xml_suffix.is_empty() || self.output.energy_xml_suffix.is_empty() {
            bail!("Output XML suffixes must not be empty");
        }
        if self.output.access_xml_suffix == self.output.energy_xml_suffix {
            bail!("Access and energy XML suffixes must differ");
        }
        if self.output.audit_file.trim().is_empty() {
            bail!("Audit file name must not be empty");
        }
        Ok(())
    }

    /// Preferred delimiter as a single byte.
    pub fn delimiter(&self) -> Result<u8> {
        match self.input.delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => bail!(
                "Delimiter must be a single ASCII character, got {:?}",
                self.input.delimiter
            ),
        }
    }

    pub fn input_encoding(&self) -> &'static encoding_rs::Encoding {
        encoding_rs::Encoding::for_label(self.input.encoding.as_bytes())
            .unwrap_or(encoding_rs::WINDOWS_1251)
    }

    pub fn output_encoding(&self) -> &'static encoding_rs::Encoding {
        encoding_rs::Encoding::for_label(self.output.csv_encoding.as_bytes())
            .unwrap_or(encoding_rs::WINDOWS_1251)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delimiter().unwrap(), b';');
        assert_eq!(config.input_encoding(), encoding_rs::WINDOWS_1251);
        assert!(!config.directory.enabled);
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"directory": {{"enabled": true, "url": "ldap://dc"}}, "output": {{"audit_file": "missing.csv"}}}}"#
        )?;

        let config = AppConfig::from_file(file.path())?;
        assert!(config.directory.enabled);
        assert_eq!(config.directory.url, "ldap://dc");
        assert_eq!(config.output.audit_file, "missing.csv");
        assert_eq!(config.output.energy_xml_suffix, DEFAULT_ENERGY_SUFFIX);
        assert_eq!(config.xml.energy_model_version, DEFAULT_ENERGY_MODEL_VERSION);
        Ok(())
    }

    #[test]
    fn invalid_json_is_rejected() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{{not json")?;
        assert!(AppConfig::from_file(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn missing_file_uses_defaults_unless_required() {
        let path = Path::new("definitely/not/here/config.json");
        assert!(AppConfig::load(path, false).is_ok());
        assert!(AppConfig::load(path, true).is_err());
    }

    #[test]
    fn rejects_bad_delimiter_and_encoding() {
        let mut config = AppConfig::default();
        config.input.delimiter = ";;".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.input.encoding = "klingon-8".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.output.energy_xml_suffix = config.output.access_xml_suffix.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_output_encodings_that_cannot_be_written() {
        for label in ["utf-16", "utf-16be", "utf-16le"] {
            let mut config = AppConfig::default();
            config.output.csv_encoding = label.to_string();
            assert!(config.validate().is_err(), "{} accepted", label);
        }

        let mut config = AppConfig::default();
        config.output.csv_encoding = "utf-8".to_string();
        assert!(config.validate().is_ok());
    }
}
