//! Rule reference resolution.
//!
//! # Responsibilities
//! - Parse a configured reference (`builtin:<name>` or a program path)
//! - Resolve it to something implementing [`Rule`] on every call
//! - Distinguish "cannot load" from "loaded but not callable"
//!
//! # Design Decisions
//! - Nothing is cached: a program edited on disk is picked up by the next upload
//! - Compiled-in rules are looked up in a fixed table; embedders can register more
//! - A reference that resolves to nothing callable is reported, not raised

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::rules::builtin;
use crate::rules::contract::{LoadError, Rule};
use crate::rules::program::ProgramRule;

const BUILTIN_PREFIX: &str = "builtin:";

/// Where a rule's implementation lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// Compiled-in rule, looked up by name.
    Builtin(String),
    /// External executable invoked with the staged file path.
    Program(PathBuf),
}

impl RuleSource {
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        match reference.strip_prefix(BUILTIN_PREFIX) {
            Some(name) => RuleSource::Builtin(name.trim().to_string()),
            None => RuleSource::Program(PathBuf::from(reference)),
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Builtin(name) => write!(f, "{BUILTIN_PREFIX}{name}"),
            RuleSource::Program(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Result of resolving a reference that did not fail to load.
pub enum Resolved {
    /// A callable rule.
    Ready(Arc<dyn Rule>),
    /// The reference points at something that cannot be run.
    Misconfigured(String),
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Ready(_) => f.write_str("Ready"),
            Resolved::Misconfigured(reason) => f.debug_tuple("Misconfigured").field(reason).finish(),
        }
    }
}

/// Resolves rule references to callables.
#[derive(Clone, Default)]
pub struct RuleLoader {
    registered: HashMap<String, Arc<dyn Rule>>,
}

impl RuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an additional in-process rule reachable as `builtin:<name>`.
    /// Registered rules shadow shipped ones of the same name.
    pub fn with_rule(mut self, name: impl Into<String>, rule: Arc<dyn Rule>) -> Self {
        self.registered.insert(name.into(), rule);
        self
    }

    /// Resolve a configured reference.
    pub async fn resolve(&self, reference: &str) -> Result<Resolved, LoadError> {
        match RuleSource::parse(reference) {
            RuleSource::Builtin(name) => Ok(self
                .registered
                .get(&name)
                .cloned()
                .or_else(|| builtin::builtin(&name))
                .map(Resolved::Ready)
                .unwrap_or_else(|| Resolved::Misconfigured(format!("unknown built-in rule '{name}'")))),
            RuleSource::Program(path) => resolve_program(path).await,
        }
    }
}

async fn resolve_program(path: PathBuf) -> Result<Resolved, LoadError> {
    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(LoadError::NotFound(path)),
        Err(source) => return Err(LoadError::Io { path, source }),
    };

    if !meta.is_file() {
        return Ok(Resolved::Misconfigured(format!("{} is not a regular file", path.display())));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Ok(Resolved::Misconfigured(format!("{} is not executable", path.display())));
        }
    }

    Ok(Resolved::Ready(Arc::new(ProgramRule::new(path))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            RuleSource::parse("builtin:processed_header"),
            RuleSource::Builtin("processed_header".into())
        );
        assert_eq!(
            RuleSource::parse(" /opt/rules/orca.sh "),
            RuleSource::Program(PathBuf::from("/opt/rules/orca.sh"))
        );
        assert_eq!(RuleSource::parse("builtin:x").to_string(), "builtin:x");
    }

    #[tokio::test]
    async fn test_unknown_builtin_is_misconfigured() {
        let resolved = RuleLoader::new().resolve("builtin:does_not_exist").await.unwrap();
        assert!(matches!(resolved, Resolved::Misconfigured(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_load_failure() {
        let err = RuleLoader::new().resolve("/nonexistent/rule.sh").await.unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_directory_is_misconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = RuleLoader::new()
            .resolve(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert!(matches!(resolved, Resolved::Misconfigured(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_program_edits_take_effect_without_reload() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("rule.sh");
        let target = dir.path().join("part.gcode");
        tokio::fs::write(&target, "G1\n").await.unwrap();

        let write_script = |body: &str| {
            std::fs::write(&script, format!("#!/bin/sh\nprintf '{body}' >> \"$1\"\n")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        };
        let loader = RuleLoader::new();
        let reference = script.to_str().unwrap();

        write_script("; one\\n");
        match loader.resolve(reference).await.unwrap() {
            Resolved::Ready(rule) => rule.process(&target).await.unwrap(),
            other => panic!("expected ready rule, got {other:?}"),
        }

        write_script("; two\\n");
        match loader.resolve(reference).await.unwrap() {
            Resolved::Ready(rule) => rule.process(&target).await.unwrap(),
            other => panic!("expected ready rule, got {other:?}"),
        }

        let content = tokio::fs::read_to_string(&target).await.unwrap();
        assert_eq!(content, "G1\n; one\n; two\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_executable_program_is_misconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("rule.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();

        let resolved = RuleLoader::new().resolve(script.to_str().unwrap()).await.unwrap();
        assert!(matches!(resolved, Resolved::Misconfigured(_)));
    }
}
