use crate::config::{Config, ExtractionConfig};

/// Previously saved documents shown to the inference backend as examples.
const DEFAULT_REFERENCE_EXAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub reference_examples: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extraction: config.extraction.clone(),
            reference_examples: DEFAULT_REFERENCE_EXAMPLES,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
