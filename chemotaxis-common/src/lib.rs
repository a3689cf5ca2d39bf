pub mod config;
pub mod diffusion;
pub mod error;
pub mod model_params;
pub mod report;
pub mod sensitivity;
pub mod special;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{ChemotaxisConfig, FieldConfig, GridConfig, SensitivityConfig, SensitivityKind, PopulationConfig, OutputConfig};
pub use diffusion::{concentration, Concentration, ConcentrationGrid, ConcentrationQuery, DiffusionField, SecretionEvent};
pub use error::{ModelError, ModelResult};
pub use model_params::ModelParams;
pub use report::{RepetitionSummary, RunReport};
pub use sensitivity::{BetaSensitivity, LogisticSensitivity, SensitivityDistribution, SensitivityShapeParams, SensitivityThreshold, ThresholdDistribution, MIN_BETA_SHAPE};
pub use vecmath::{Vec3, arange, linspace};
