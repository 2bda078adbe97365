//! Migration plan configuration
//!
//! Plans live in the shared `config.toml` as `[[plans]]` entries. With no
//! config file, or a file without plans, the default plan runs.

use std::path::Path;

use lms_common::config::load_toml_section;
use serde::Deserialize;
use tracing::{info, warn};

use crate::reclassify::MigrationPlan;

#[derive(Debug, Default, Deserialize)]
struct PlansFile {
    #[serde(default)]
    plans: Vec<MigrationPlan>,
}

/// Load configured plans
///
/// A missing file falls back to the default plan. A file that exists but
/// cannot be parsed is an error, so a misconfigured plan never silently
/// becomes the default one.
pub fn load_plans(config_path: Option<&Path>) -> lms_common::Result<Vec<MigrationPlan>> {
    let file = match config_path {
        Some(path) if path.exists() => load_toml_section::<PlansFile>(path)?,
        Some(path) => {
            warn!("Config file {} not found", path.display());
            PlansFile::default()
        }
        None => PlansFile::default(),
    };

    if file.plans.is_empty() {
        info!("No plans configured, using default plan");
        return Ok(vec![MigrationPlan::default_plan()]);
    }

    info!("Loaded {} migration plan(s)", file.plans.len());
    Ok(file.plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclassify::MatchKey;
    use lms_common::Category;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_no_config_uses_default_plan() {
        let plans = load_plans(None).unwrap();
        assert_eq!(plans, vec![MigrationPlan::default_plan()]);
    }

    #[test]
    fn test_missing_config_file_uses_default_plan() {
        let plans = load_plans(Some(Path::new("/nonexistent/lms/config.toml"))).unwrap();
        assert_eq!(plans, vec![MigrationPlan::default_plan()]);
    }

    #[test]
    fn test_config_without_plans_uses_default_plan() {
        let file = write_config("port = 5790\n");
        let plans = load_plans(Some(file.path())).unwrap();
        assert_eq!(plans, vec![MigrationPlan::default_plan()]);
    }

    #[test]
    fn test_configured_plans_replace_default() {
        let file = write_config(
            r#"
            database_path = "/tmp/lms.db"

            [[plans]]
            training_name = "Foundation of Service"
            from = "Assigned"
            to = "Mandatory"

            [[plans]]
            training_name = "Safety Basics"
            from = "Mandatory"
            to = "Assigned"
            match_key = "definition"
            "#,
        );

        let plans = load_plans(Some(file.path())).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].source, Category::Mandatory);
        assert_eq!(plans[1].match_key, MatchKey::Definition);
    }

    #[test]
    fn test_malformed_plan_is_an_error() {
        let file = write_config(
            r#"
            [[plans]]
            training_name = "Foundation of Service"
            from = "Optional"
            to = "Mandatory"
            "#,
        );

        assert!(load_plans(Some(file.path())).is_err());
    }
}
