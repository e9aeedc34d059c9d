use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Rendered digests, one file per run.
    pub reports_dir: PathBuf,
}

pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;
    let reports_dir = ensure_dir(&data_dir.join("reports").to_string_lossy())?;

    let write_test = reports_dir.join(".write-test");
    fs::write(&write_test, b"ok")
        .with_context(|| format!("{} is not writable", reports_dir.display()))?;
    fs::remove_file(&write_test)?;
    Ok(ResolvedPaths {
        logs_dir,
        data_dir,
        reports_dir,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {}", path))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(&dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o755);
            let _ = fs::set_permissions(&dir, perms);
        }
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}
