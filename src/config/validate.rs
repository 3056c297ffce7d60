// src/config/validate.rs

//! The validation gate between raw and validated graph files.

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::{GatedagError, Result};
use crate::graph::validate_jobs;

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = GatedagError;

    fn try_from(raw: RawGraphFile) -> Result<Self> {
        if raw.execution.name.trim().is_empty() {
            return Err(GatedagError::Config(
                "execution.name must not be empty".to_string(),
            ));
        }
        if raw.execution.max_parallel == 0 {
            return Err(GatedagError::Config(
                "execution.max_parallel must be at least 1".to_string(),
            ));
        }
        if raw.job.is_empty() {
            return Err(GatedagError::Config(
                "graph file defines no jobs".to_string(),
            ));
        }

        let file = GraphFile::new_unchecked(raw.execution, raw.job);
        validate_jobs(&file.jobs())?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml: &str) -> RawGraphFile {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn accepts_valid_file() {
        let file = GraphFile::try_from(raw(
            r#"
            [execution]
            name = "ok"

            [job.a]
            config = { cmd = "true" }

            [job.b]
            depends_on = ["a"]
            config = { cmd = "true" }
            "#,
        ));
        assert!(file.is_ok());
    }

    #[test]
    fn rejects_empty_name_and_zero_parallelism() {
        let err = GraphFile::try_from(raw(
            r#"
            [execution]
            name = ""

            [job.a]
            config = { cmd = "true" }
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, GatedagError::Config(_)));

        let err = GraphFile::try_from(raw(
            r#"
            [execution]
            name = "x"
            max_parallel = 0

            [job.a]
            config = { cmd = "true" }
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, GatedagError::Config(_)));
    }

    #[test]
    fn rejects_dangling_dependency() {
        let err = GraphFile::try_from(raw(
            r#"
            [execution]
            name = "x"

            [job.a]
            depends_on = ["missing"]
            config = { cmd = "true" }
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, GatedagError::GraphInvalid(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn rejects_cycle() {
        let err = GraphFile::try_from(raw(
            r#"
            [execution]
            name = "x"

            [job.a]
            depends_on = ["b"]
            config = { cmd = "true" }

            [job.b]
            depends_on = ["a"]
            config = { cmd = "true" }
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, GatedagError::GraphInvalid(_)));
    }

    #[test]
    fn rejects_empty_job_table() {
        let err = GraphFile::try_from(raw(
            r#"
            [execution]
            name = "x"
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, GatedagError::Config(_)));
    }
}
