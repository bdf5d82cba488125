//! Project bootstrap: creates `.forge-core/`, the store, copies the PRD/
//! bootstrap documents to the project root, and writes the reporting
//! channel's config file.

use std::path::{Path, PathBuf};

use forge_common::constants::REPORTING_CHANNEL_CONFIG_FILENAME;
use forge_common::errors::{CoreError, CoreResult};
use serde::Serialize;

use crate::paths::{project_paths, ProjectPaths};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct InitResult {
    pub project_id: String,
    pub paths: ProjectPaths,
    pub prd_dest: PathBuf,
    pub bootstrap_dest: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReportingChannelConfig<'a> {
    socket_path: &'a str,
}

/// Creates the project's hidden directory structure, initializes the
/// store, copies the PRD (and optional bootstrap doc) into the project
/// root, creates the project record, and writes the reporting-channel
/// config. Fails if the project was already initialized.
pub fn initialize_project(
    project_dir: &Path,
    project_name: &str,
    prd_path: &Path,
    bootstrap_path: Option<&Path>,
) -> CoreResult<InitResult> {
    let paths = project_paths(project_dir);

    if paths.hidden_dir.exists() {
        return Err(CoreError::InvalidInput(format!(
            "project already initialized at {}",
            paths.hidden_dir.display()
        )));
    }

    std::fs::create_dir_all(&paths.hidden_dir)?;
    std::fs::create_dir_all(&paths.briefs_dir)?;
    std::fs::create_dir_all(&paths.logs_dir)?;
    std::fs::create_dir_all(&paths.plans_dir)?;

    let store = Store::open(&paths.db_path)?;

    let prd_dest = project_dir.join("prd.md");
    if prd_path.canonicalize().ok() != prd_dest.canonicalize().ok() {
        std::fs::copy(prd_path, &prd_dest)?;
    }

    let bootstrap_dest = match bootstrap_path {
        Some(source) => {
            let dest = project_dir.join("bootstrap.md");
            if source.canonicalize().ok() != dest.canonicalize().ok() {
                std::fs::copy(source, &dest)?;
            }
            Some(dest)
        }
        None => None,
    };

    let project_id = uuid::Uuid::new_v4().to_string();
    store.create_project(
        &project_id,
        project_name,
        &project_dir.to_string_lossy(),
        &prd_dest.to_string_lossy(),
        bootstrap_dest.as_ref().map(|p| p.to_string_lossy()).as_deref(),
        None,
    )?;

    write_reporting_channel_config(project_dir, &paths)?;

    Ok(InitResult {
        project_id,
        paths,
        prd_dest,
        bootstrap_dest,
    })
}

fn write_reporting_channel_config(project_dir: &Path, paths: &ProjectPaths) -> CoreResult<()> {
    let config = ReportingChannelConfig {
        socket_path: &paths.reporting_socket.to_string_lossy(),
    };
    let body = serde_json::to_string_pretty(&config)
        .map_err(|e| CoreError::Infrastructure(anyhow::Error::new(e)))?;
    std::fs::write(project_dir.join(REPORTING_CHANNEL_CONFIG_FILENAME), body)?;
    Ok(())
}
