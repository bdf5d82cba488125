//! Runtime configuration: the one piece of this core that genuinely comes
//! from process arguments rather than being a fixed constant.

use std::path::PathBuf;

use clap::Parser;

use crate::paths::{project_paths, ProjectPaths};

#[derive(Debug, Clone, Parser)]
#[command(name = "forge-runtime", about = "Forge orchestration core daemon")]
pub struct RuntimeConfig {
    /// Root directory of the project to drive.
    #[arg(long, env = "FORGE_PROJECT_DIR")]
    pub project_dir: PathBuf,

    /// Identifier of the project row to drive.
    #[arg(long, env = "FORGE_PROJECT_ID")]
    pub project_id: String,

    /// Command used to launch a worker process.
    #[arg(long, env = "FORGE_WORKER_CMD", default_value = "claude")]
    pub worker_cmd: String,

    /// Extra arguments passed to the worker command.
    #[arg(long = "worker-arg", env = "FORGE_WORKER_ARGS", value_delimiter = ',')]
    pub worker_args: Vec<String>,
}

impl RuntimeConfig {
    pub fn paths(&self) -> ProjectPaths {
        project_paths(&self.project_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        RuntimeConfig::command().debug_assert();
    }

    #[test]
    fn paths_are_derived_from_project_dir() {
        let config = RuntimeConfig {
            project_dir: PathBuf::from("/srv/demo"),
            project_id: "proj1".into(),
            worker_cmd: "claude".into(),
            worker_args: vec![],
        };
        assert_eq!(
            config.paths().db_path,
            PathBuf::from("/srv/demo/.forge-core/orchestrator.db")
        );
    }
}
