use thiserror::Error;

/// Failures while loading or validating locomotion configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("`{0}` must be finite")]
    NonFinite(String),

    #[error("`{0}` must not be negative")]
    Negative(String),

    #[error("`{name}` range is inverted ({min} > {max})")]
    InvertedRange { name: String, min: f32, max: f32 },

    #[error("curve `{0}` has no keys")]
    EmptyCurve(String),

    #[error("curve `{0}` keys are not sorted by time")]
    UnsortedCurve(String),

    #[error("`{0}` must be greater than zero")]
    NotPositive(String),
}

/// A configured name could not be resolved against the skeleton.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RigError {
    #[error("bone `{0}` does not exist on the skeleton")]
    MissingBone(String),

    #[error("animation curve `{0}` does not exist on the skeleton")]
    MissingCurve(String),
}
