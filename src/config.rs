use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_DEBOUNCE_MS: u64 = 750;
const DEFAULT_SCORING_CONCURRENCY: usize = 4;

/// Default maximum token length fed to the embedding model
const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 128;

/// Feed-facing settings, owned by the external settings surface.
///
/// A snapshot of this struct is immutable for the duration of one pipeline
/// pass; the reconciler is the only place a new snapshot is installed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Hide promoted/ad items
    #[serde(default = "default_filter_ads")]
    pub filter_ads: bool,

    /// Substrings (or `r/…/` patterns) matched against display names
    #[serde(default)]
    pub flags_to_hide: Vec<String>,

    /// Words (or `r/…/` patterns) matched against display names
    #[serde(default)]
    pub words_to_hide: Vec<String>,

    /// Re-rank visible items by relevance to the interest keywords
    #[serde(default)]
    pub enable_reordering: bool,

    /// Keywords whose mean embedding forms the interest profile
    #[serde(default)]
    pub interest_keywords: Vec<String>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            filter_ads: true,
            flags_to_hide: Vec::new(),
            words_to_hide: Vec::new(),
            enable_reordering: false,
            interest_keywords: Vec::new(),
        }
    }
}

fn default_filter_ads() -> bool {
    true
}

/// Configuration for the local embedding model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Path to the ONNX model file
    #[serde(default)]
    pub model_path: String,

    /// Path to the HuggingFace tokenizer.json
    #[serde(default)]
    pub tokenizer_path: String,

    /// Token sequences are truncated/padded to this length
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            tokenizer_path: String::new(),
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
        }
    }
}

fn default_max_sequence_length() -> usize {
    DEFAULT_MAX_SEQUENCE_LENGTH
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedSettings,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Maximum number of concurrent scoring tasks
    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,

    /// Quiescence window for coalescing mutation bursts
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

fn default_scoring_concurrency() -> usize {
    DEFAULT_SCORING_CONCURRENCY
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Config {
    fn validate(&mut self) {
        if self.scoring_concurrency == 0 {
            self.scoring_concurrency = 1
        }

        if self.embedding.max_sequence_length == 0 {
            panic!("embedding.max_sequence_length must be greater than 0");
        }

        if self.debounce_ms == 0 {
            panic!("debounce_ms must be greater than 0");
        }
    }

    pub fn load() -> Self {
        let base_path = default_base_path();
        Self::load_with(&base_path.to_string_lossy())
    }

    pub fn load_with(base_path: &str) -> Self {
        let config_path = Path::new(base_path).join("config.yaml");

        // create new if does not exist
        if !config_path.exists() {
            std::fs::create_dir_all(base_path).expect("cannot create config directory");
            std::fs::write(
                &config_path,
                serde_yml::to_string(&Self::default()).unwrap().as_bytes(),
            )
            .expect("cannot write default config");
        }

        let config_str =
            std::fs::read_to_string(&config_path).expect("config file is not readable");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let config_path = Path::new(&self.base_path).join("config.yaml");

        let config_str = serde_yml::to_string(&self).unwrap();
        std::fs::write(config_path, config_str.as_bytes()).expect("cannot write config");
    }
}

fn default_base_path() -> PathBuf {
    let home = homedir::my_home()
        .ok()
        .flatten()
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("xfilter")
}
