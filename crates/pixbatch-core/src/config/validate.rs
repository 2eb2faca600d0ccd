//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::{Config, TransformConfig};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == Some(0) {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.processing.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.supported_formats must not be empty".into(),
            ));
        }
        if self.pipeline.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.buffer_size must be > 0".into(),
            ));
        }
        self.transform.validate("transform")?;
        if self.output.jpeg_quality == 0 || self.output.jpeg_quality > 100 {
            return Err(ConfigError::ValidationError(
                "output.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.stress.iterations == 0 {
            return Err(ConfigError::ValidationError(
                "stress.iterations must be >= 1".into(),
            ));
        }
        if !self.stress.blur_radius.is_finite() || self.stress.blur_radius < 0.0 {
            return Err(ConfigError::ValidationError(
                "stress.blur_radius must be a finite value >= 0".into(),
            ));
        }
        Ok(())
    }
}

impl TransformConfig {
    /// Range-check the chain parameters. `section` prefixes the key in errors.
    pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.resize.0 == 0 || self.resize.1 == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{section}.resize dimensions must be > 0"
            )));
        }
        let factors = [
            ("blur_radius", self.blur_radius),
            ("sharpen_factor", self.sharpen_factor),
            ("contrast_factor", self.contrast_factor),
            ("brightness_factor", self.brightness_factor),
        ];
        for (key, value) in factors {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.{key} must be a finite value >= 0"
                )));
            }
        }
        if self.iteration_count == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{section}.iteration_count must be >= 1"
            )));
        }
        Ok(())
    }
}
