//! Solver configuration
//!
//! ```toml
//! solver_type = "rosenbrock"
//! vector_width = 4
//! species = ["O3", "NO", "NO2"]
//! user_defined_rate_parameters = ["PHOTO.NO2", "LOSS.O3"]
//! ```

use crate::errors::{MusicaError, MusicaResult};
use crate::ordering::{NameIndexOrdering, OrderingKind};
use crate::partition::VectorWidth;
use crate::solver::SolverType;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    #[serde(default)]
    pub solver_type: SolverType,
    /// Overrides the solver type's vector width; zero or negative disables partitioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_width: Option<i64>,
    /// Species names, in slot order
    pub species: Vec<String>,
    /// User-defined rate parameter names, in slot order
    #[serde(default)]
    pub user_defined_rate_parameters: Vec<String>,
}

impl SolverConfig {
    pub fn from_toml_str(text: &str) -> MusicaResult<Self> {
        let config: SolverConfig =
            toml::from_str(text).map_err(|e| MusicaError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> MusicaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MusicaError::InvalidConfiguration(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Vector width after applying the override
    pub fn vector_width(&self) -> VectorWidth {
        self.vector_width
            .map_or_else(|| self.solver_type.default_vector_width(), VectorWidth::from_raw)
    }

    pub fn species_ordering(&self) -> MusicaResult<NameIndexOrdering> {
        NameIndexOrdering::from_names(OrderingKind::Species, self.species.iter().cloned())
    }

    pub fn rate_parameters_ordering(&self) -> MusicaResult<NameIndexOrdering> {
        NameIndexOrdering::from_names(
            OrderingKind::RateParameter,
            self.user_defined_rate_parameters.iter().cloned(),
        )
    }

    /// Check that species and parameter names are unique
    pub fn validate(&self) -> MusicaResult<()> {
        self.species_ordering()?;
        self.rate_parameters_ordering()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    #[test]
    fn test_from_toml_str() {
        let config = SolverConfig::from_toml_str(
            r#"
solver_type = "backward_euler"
vector_width = 3
species = ["O3", "NO"]
user_defined_rate_parameters = ["LOSS.O3"]
"#,
        )
        .unwrap();

        assert_eq!(config.solver_type, SolverType::BackwardEuler);
        assert_eq!(
            config.vector_width(),
            VectorWidth::Lanes(NonZeroUsize::new(3).unwrap())
        );
        assert_eq!(config.species, vec!["O3", "NO"]);
        assert_eq!(config.rate_parameters_ordering().unwrap().index_of("LOSS.O3"), Ok(0));
    }

    #[test]
    fn test_defaults() {
        let config = SolverConfig::from_toml_str(r#"species = ["A"]"#).unwrap();
        assert_eq!(config.solver_type, SolverType::Rosenbrock);
        assert_eq!(config.vector_width(), SolverType::Rosenbrock.default_vector_width());
        assert!(config.user_defined_rate_parameters.is_empty());
    }

    #[test]
    fn test_standard_order_is_unpartitioned() {
        let config = SolverConfig::from_toml_str(
            r#"
solver_type = "rosenbrock_standard_order"
species = ["A"]
"#,
        )
        .unwrap();
        assert_eq!(config.vector_width(), VectorWidth::Unpartitioned);
    }

    #[test]
    fn test_duplicate_species_rejected() {
        let result = SolverConfig::from_toml_str(r#"species = ["A", "B", "A"]"#);
        assert!(matches!(result, Err(MusicaError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = SolverConfig::from_toml_str(
            r#"
species = ["A"]
grid_cells = 4
"#,
        );
        assert!(matches!(result, Err(MusicaError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_serde_roundtrip_json() {
        let config = SolverConfig {
            solver_type: SolverType::RosenbrockStandardOrder,
            vector_width: None,
            species: vec!["A".to_string(), "B".to_string()],
            user_defined_rate_parameters: vec!["EMIS.A".to_string()],
        };
        let json = serde_json::to_string(&config).expect("Serialization failed");
        let restored: SolverConfig = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(restored, config);
    }

    #[test]
    fn test_missing_file() {
        let result = SolverConfig::from_file("/nonexistent/solver.toml");
        assert!(matches!(result, Err(MusicaError::InvalidConfiguration(_))));
    }
}
