use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::MarkerError;

pub trait SearchTool: Send + Sync {
    fn search(&self, model: &Path, proteins: &Path, report: &Path) -> Result<(), MarkerError>;
}

#[derive(Debug, Clone)]
pub struct Hmmsearch {
    program: Option<PathBuf>,
    threads: usize,
}

impl Hmmsearch {
    pub fn new(program: Option<PathBuf>, threads: usize) -> Self {
        Self {
            program: program.or_else(|| find_in_path("hmmsearch")),
            threads: threads.max(1),
        }
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    pub fn version(&self) -> Option<String> {
        let program = self.program.as_ref()?;
        let output = Command::new(program).arg("-h").output().ok()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .find(|line| line.starts_with("# HMMER"))
            .map(|line| line.trim_start_matches('#').trim().to_string())
    }

    fn require_program(&self) -> Result<&PathBuf, MarkerError> {
        self.program
            .as_ref()
            .ok_or_else(|| MarkerError::MissingTool("hmmsearch".to_string()))
    }

    fn args(&self, model: &Path, proteins: &Path, report: &Path) -> Vec<String> {
        vec![
            "--noali".to_string(),
            "--cpu".to_string(),
            self.threads.to_string(),
            "--domtblout".to_string(),
            report.to_string_lossy().to_string(),
            model.to_string_lossy().to_string(),
            proteins.to_string_lossy().to_string(),
        ]
    }
}

impl SearchTool for Hmmsearch {
    fn search(&self, model: &Path, proteins: &Path, report: &Path) -> Result<(), MarkerError> {
        let program = self.require_program()?;
        let args = self.args(model, proteins, report);
        debug!(program = %program.display(), ?args, "running search");
        let output = Command::new(program)
            .args(&args)
            .output()
            .map_err(|err| MarkerError::ExternalTool(format!("{}: {err}", program.display())))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", program.display(), output.status)
        } else {
            stderr
        };
        Err(MarkerError::ExternalTool(message))
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
