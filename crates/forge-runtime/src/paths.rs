//! On-disk layout for an initialized project.

use std::path::{Path, PathBuf};

use forge_common::constants::{
    BRIEFS_DIR, DB_FILENAME, LOGS_DIR, PLANS_DIR, PROJECT_HIDDEN_DIR, REPORTING_SOCKET_FILENAME,
};

/// Resolved paths under `<project_dir>/.forge-core/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub project_dir: PathBuf,
    pub hidden_dir: PathBuf,
    pub db_path: PathBuf,
    pub briefs_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub plans_dir: PathBuf,
    pub reporting_socket: PathBuf,
}

pub fn project_paths(project_dir: impl AsRef<Path>) -> ProjectPaths {
    let project_dir = project_dir.as_ref().to_path_buf();
    let hidden_dir = project_dir.join(PROJECT_HIDDEN_DIR);
    ProjectPaths {
        db_path: hidden_dir.join(DB_FILENAME),
        briefs_dir: hidden_dir.join(BRIEFS_DIR),
        logs_dir: hidden_dir.join(LOGS_DIR),
        plans_dir: hidden_dir.join(PLANS_DIR),
        reporting_socket: hidden_dir.join(REPORTING_SOCKET_FILENAME),
        hidden_dir,
        project_dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_under_hidden_dir() {
        let paths = project_paths("/srv/myproject");
        assert_eq!(
            paths.db_path,
            PathBuf::from("/srv/myproject/.forge-core/orchestrator.db")
        );
        assert_eq!(
            paths.briefs_dir,
            PathBuf::from("/srv/myproject/.forge-core/briefs")
        );
        assert_eq!(
            paths.reporting_socket,
            PathBuf::from("/srv/myproject/.forge-core/reporting.sock")
        );
    }
}
