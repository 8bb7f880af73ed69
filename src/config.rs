//! Pipeline configuration: dataset manifest, relation declarations and paths.
//!
//! Configuration is read once at startup from the process environment (a
//! `.env` file is honoured) and passed by reference into each stage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

pub const ZIP_FILE_URL: &str = "ZIP_FILE_URL";
pub const RAW_DATA_PATH: &str = "RAW_DATA_PATH";
pub const PROCESSED_DATA_PATH: &str = "PROCESSED_DATA_PATH";

/// Stem of the merged output file under the processed root.
pub const MERGED_FILE_NAME: &str = "merged";

/// Extension shared by every raw and processed table.
pub const TABLE_EXTENSION: &str = "csv";

/// The tables shipped in the Home Credit archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetFile {
    ApplicationTest,
    ApplicationTrain,
    Bureau,
    BureauBalance,
    CreditCardBalance,
    InstallmentsPayments,
    PosCashBalance,
    PreviousApplication,
    SampleSubmission,
}

impl DatasetFile {
    /// All tables, in manifest order.
    pub const ALL: [DatasetFile; 9] = [
        DatasetFile::ApplicationTest,
        DatasetFile::ApplicationTrain,
        DatasetFile::Bureau,
        DatasetFile::BureauBalance,
        DatasetFile::CreditCardBalance,
        DatasetFile::InstallmentsPayments,
        DatasetFile::PosCashBalance,
        DatasetFile::PreviousApplication,
        DatasetFile::SampleSubmission,
    ];

    /// Environment variable overriding this table's file name.
    pub fn env_var(self) -> &'static str {
        match self {
            DatasetFile::ApplicationTest => "APPLICATION_TEST_FILE_NAME",
            DatasetFile::ApplicationTrain => "APPLICATION_TRAIN_FILE_NAME",
            DatasetFile::Bureau => "BUREAU_FILE_NAME",
            DatasetFile::BureauBalance => "BUREAU_BALANCE_FILE_NAME",
            DatasetFile::CreditCardBalance => "CREDIT_CARD_BALANCE_FILE_NAME",
            DatasetFile::InstallmentsPayments => "INSTALLMENTS_PAYMENTS_FILE_NAME",
            DatasetFile::PosCashBalance => "POS_CASH_BALANCE_FILE_NAME",
            DatasetFile::PreviousApplication => "PREVIOUS_APPLICATION_FILE_NAME",
            DatasetFile::SampleSubmission => "SAMPLE_SUBMISSION_FILE_NAME",
        }
    }

    /// File stem used by the Kaggle archive.
    pub fn default_name(self) -> &'static str {
        match self {
            DatasetFile::ApplicationTest => "application_test",
            DatasetFile::ApplicationTrain => "application_train",
            DatasetFile::Bureau => "bureau",
            DatasetFile::BureauBalance => "bureau_balance",
            DatasetFile::CreditCardBalance => "credit_card_balance",
            DatasetFile::InstallmentsPayments => "installments_payments",
            DatasetFile::PosCashBalance => "POS_CASH_balance",
            DatasetFile::PreviousApplication => "previous_application",
            DatasetFile::SampleSubmission => "sample_submission",
        }
    }
}

/// Ordered set of named tables the pipeline expects at each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<(DatasetFile, String)>,
}

impl Manifest {
    /// Manifest with the Kaggle file names.
    pub fn kaggle_defaults() -> Self {
        Self {
            entries: DatasetFile::ALL
                .iter()
                .map(|f| (*f, f.default_name().to_string()))
                .collect(),
        }
    }

    /// Override the file name of one table.
    pub fn with_name(mut self, file: DatasetFile, name: impl Into<String>) -> Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(f, _)| *f == file) {
            Some(entry) => entry.1 = name,
            None => self.entries.push((file, name)),
        }
        self
    }

    pub fn name(&self, file: DatasetFile) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == file)
            .map(|(_, n)| n.as_str())
    }

    /// File names in manifest order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, n)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a subordinate table folds into the merged table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Subordinate file name (stem, no extension).
    pub file_name: String,
    /// Join keys, present in both the merged and the subordinate table.
    pub keys: Vec<String>,
}

impl Relation {
    pub fn new(file_name: impl Into<String>, keys: &[&str]) -> Self {
        Self {
            file_name: file_name.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Home Credit relations, in join order, resolved against a manifest.
pub fn default_relations(manifest: &Manifest) -> Vec<Relation> {
    let declared: [(DatasetFile, &[&str]); 6] = [
        (DatasetFile::Bureau, &["SK_ID_CURR"]),
        (DatasetFile::BureauBalance, &["SK_ID_BUREAU"]),
        (DatasetFile::PreviousApplication, &["SK_ID_CURR"]),
        (DatasetFile::PosCashBalance, &["SK_ID_PREV", "SK_ID_CURR"]),
        (DatasetFile::InstallmentsPayments, &["SK_ID_PREV", "SK_ID_CURR"]),
        (DatasetFile::CreditCardBalance, &["SK_ID_PREV", "SK_ID_CURR"]),
    ];

    declared
        .iter()
        .filter_map(|(file, keys)| manifest.name(*file).map(|name| Relation::new(name, keys)))
        .collect()
}

/// Everything a pipeline run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub zip_file_url: String,
    pub raw_root: PathBuf,
    pub processed_root: PathBuf,
    pub manifest: Manifest,
    /// Base table of the merge (application test in the Kaggle manifest).
    pub base_file: String,
    pub relations: Vec<Relation>,
}

impl PipelineConfig {
    /// Build the configuration from the process environment.
    ///
    /// A `.env` file in the working directory or any parent is loaded first;
    /// variables already set in the environment take precedence.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PipelineError::Configuration(key.to_string()))
        };

        let zip_file_url = required(ZIP_FILE_URL)?;
        let raw_root = PathBuf::from(required(RAW_DATA_PATH)?);
        let processed_root = PathBuf::from(required(PROCESSED_DATA_PATH)?);

        let manifest = DatasetFile::ALL
            .iter()
            .fold(Manifest::kaggle_defaults(), |manifest, file| {
                match lookup(file.env_var()).filter(|v| !v.trim().is_empty()) {
                    Some(name) => manifest.with_name(*file, name),
                    None => manifest,
                }
            });

        Ok(Self::new(zip_file_url, raw_root, processed_root, manifest))
    }

    /// Build the configuration from a variable map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Configuration with the default base table and relations for `manifest`.
    pub fn new(
        zip_file_url: impl Into<String>,
        raw_root: impl Into<PathBuf>,
        processed_root: impl Into<PathBuf>,
        manifest: Manifest,
    ) -> Self {
        let base_file = manifest
            .name(DatasetFile::ApplicationTest)
            .unwrap_or(DatasetFile::ApplicationTest.default_name())
            .to_string();
        let relations = default_relations(&manifest);

        Self {
            zip_file_url: zip_file_url.into(),
            raw_root: raw_root.into(),
            processed_root: processed_root.into(),
            manifest,
            base_file,
            relations,
        }
    }

    pub fn raw_path(&self, name: &str) -> PathBuf {
        table_path(&self.raw_root, name)
    }

    pub fn processed_path(&self, name: &str) -> PathBuf {
        table_path(&self.processed_root, name)
    }

    pub fn merged_path(&self) -> PathBuf {
        table_path(&self.processed_root, MERGED_FILE_NAME)
    }
}

/// `<root>/<name>.csv`
pub fn table_path(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{}.{}", name, TABLE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (ZIP_FILE_URL.to_string(), "http://example.test/home-credit.zip".to_string()),
            (RAW_DATA_PATH.to_string(), "/data/raw".to_string()),
            (PROCESSED_DATA_PATH.to_string(), "/data/processed".to_string()),
        ])
    }

    #[test]
    fn test_from_map_uses_kaggle_defaults() {
        let config = PipelineConfig::from_map(&base_vars()).unwrap();

        assert_eq!(config.manifest.len(), 9);
        assert_eq!(config.base_file, "application_test");
        assert_eq!(config.relations.len(), 6);
        assert_eq!(config.relations[0].file_name, "bureau");
        assert_eq!(config.relations[1].keys, vec!["SK_ID_BUREAU"]);
    }

    #[test]
    fn test_missing_required_variable() {
        for key in [ZIP_FILE_URL, RAW_DATA_PATH, PROCESSED_DATA_PATH] {
            let mut vars = base_vars();
            vars.remove(key);
            match PipelineConfig::from_map(&vars) {
                Err(PipelineError::Configuration(name)) => assert_eq!(name, key),
                other => panic!("expected configuration error for {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_empty_required_variable_is_missing() {
        let mut vars = base_vars();
        vars.insert(RAW_DATA_PATH.to_string(), "  ".to_string());
        assert!(matches!(
            PipelineConfig::from_map(&vars),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_file_name_override_flows_into_relations() {
        let mut vars = base_vars();
        vars.insert("BUREAU_FILE_NAME".to_string(), "bureau_v2".to_string());
        vars.insert("APPLICATION_TEST_FILE_NAME".to_string(), "app_test".to_string());

        let config = PipelineConfig::from_map(&vars).unwrap();

        assert_eq!(config.base_file, "app_test");
        assert_eq!(config.relations[0].file_name, "bureau_v2");
        assert_eq!(config.manifest.name(DatasetFile::Bureau), Some("bureau_v2"));
    }

    #[test]
    fn test_paths() {
        let config = PipelineConfig::from_map(&base_vars()).unwrap();

        assert_eq!(config.raw_path("bureau"), PathBuf::from("/data/raw/bureau.csv"));
        assert_eq!(
            config.processed_path("bureau"),
            PathBuf::from("/data/processed/bureau.csv")
        );
        assert_eq!(config.merged_path(), PathBuf::from("/data/processed/merged.csv"));
    }
}
