//! Runs the external translator and collects the SAS+ text it writes.
//!
//! The translator is blocking and has no timeout: a hung translator hangs
//! the caller.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use crate::error::{Error, Result};

static NEXT_SAS_FILE: AtomicUsize = AtomicUsize::new(0);

pub fn require_file(kind: &'static str, path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::MissingInput {kind, path: path.to_path_buf()})
    }
}

/// The output file of one translator run. Removed on drop, whether or not
/// it was read successfully.
struct SasFile {
    path: PathBuf
}

impl SasFile {
    fn reserve(dir: &Path) -> Self {
        let id = NEXT_SAS_FILE.fetch_add(1, Ordering::Relaxed);
        SasFile {path: dir.join(format!("{}-{}.sas", std::process::id(), id))}
    }
}

impl Drop for SasFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not remove translator output");
            }
        }
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct Grounder {
    pub program: PathBuf,
    /// Arguments placed before `--sas-file`, e.g. the script when `program` is an interpreter.
    pub leading_args: Vec<OsString>,
    pub work_dir: PathBuf
}

impl Default for Grounder {
    fn default() -> Self {
        Grounder {program: PathBuf::from("translate.py"), leading_args: Vec::new(), work_dir: std::env::temp_dir()}
    }
}

impl Grounder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Grounder {program: program.into(), ..Grounder::default()}
    }

    pub fn with_leading_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn translate(&self, domain: &Path, problem: &Path) -> Result<String> {
        require_file("domain", domain)?;
        require_file("problem", problem)?;
        let sas = SasFile::reserve(&self.work_dir);
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args).arg("--sas-file").arg(&sas.path).arg(domain).arg(problem);
        debug!(command = ?command, "running translator");
        let output = command.output()?;
        if !output.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(Error::Tool {status: output.status, output: diagnostics.trim().to_string()});
        }
        Ok(fs::read_to_string(&sas.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sas-grounding-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn file_names_are_unique() {
        let dir = scratch("names");
        let a = SasFile::reserve(&dir);
        let b = SasFile::reserve(&dir);
        assert_ne!(a.path, b.path);
        assert!(a.path.starts_with(&dir));
    }

    #[test]
    fn guard_removes_file() {
        let dir = scratch("guard");
        let path = {
            let sas = SasFile::reserve(&dir);
            fs::write(&sas.path, "begin_goal\n0\nend_goal\n").unwrap();
            sas.path.clone()
        };
        assert!(!path.exists());
    }

    #[test]
    fn missing_inputs_are_reported_first() {
        let grounder = Grounder::new("/definitely/not/a/translator");
        let dir = scratch("missing");
        let domain = dir.join("domain.pddl");
        fs::write(&domain, "(define (domain d))").unwrap();
        match grounder.translate(&domain, &dir.join("problem.pddl")) {
            Err(Error::MissingInput {kind, ..}) => assert_eq!(kind, "problem"),
            other => panic!("unexpected {:?}", other)
        }
        match grounder.translate(&dir.join("nope.pddl"), &domain) {
            Err(Error::MissingInput {kind, ..}) => assert_eq!(kind, "domain"),
            other => panic!("unexpected {:?}", other)
        }
    }
}
