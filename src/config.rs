use crate::registry::{PredicateRegistry, PredicateSpec};
use crate::uri::SourceUri;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SemstoreConfig {
    pub database: Option<String>,
    pub rdf_store: Option<String>,
    pub base_uri: Option<String>,
    pub autosync: Option<bool>,
    pub prefetch_limit: Option<usize>,
    pub predicates: Option<HashMap<String, PredicateFlags>>,
}

impl SemstoreConfig {
    /// Resolve a command-line identifier into a full source URI.
    ///
    /// URI-shaped input passes through unchanged; a plain name is minted
    /// under the configured `base_uri` namespace.
    pub fn resolve_uri(&self, raw: &str) -> anyhow::Result<String> {
        if SourceUri::looks_like_uri(raw) {
            return Ok(raw.to_string());
        }
        let Some(base) = self.base_uri.as_deref() else {
            anyhow::bail!(
                "'{raw}' is not a URI; set base_uri in the config to mint local names"
            );
        };
        Ok(SourceUri::local(base, raw)?.into_string())
    }
}

/// Per-predicate flags as they appear in the config file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PredicateFlags {
    #[serde(default)]
    pub single_valued: bool,
    #[serde(default)]
    pub reference_only: bool,
    #[serde(default)]
    pub owned_dependent: bool,
}

impl PredicateFlags {
    pub fn to_spec(&self) -> PredicateSpec {
        let mut spec = PredicateSpec::new();
        if self.single_valued {
            spec = spec.single_valued();
        }
        if self.reference_only {
            spec = spec.reference_only();
        }
        if self.owned_dependent {
            spec = spec.owned_dependent();
        }
        spec
    }
}

/// Build a predicate registry from the config's predicate table
pub fn registry_from(config: &SemstoreConfig) -> PredicateRegistry {
    let mut registry = PredicateRegistry::new();
    if let Some(predicates) = &config.predicates {
        for (predicate, flags) in predicates {
            registry.register(predicate.clone(), flags.to_spec());
        }
    }
    registry
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("semstore.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".semstore").join("semstore.db")
}

pub fn default_rdf_path_in(base: &Path) -> PathBuf {
    base.join(".semstore").join("triples.jsonl")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SemstoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SemstoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SemstoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".semstore/";

    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if existing.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
    }

    let mut content = String::new();
    if gitignore_path.exists() {
        content.push_str(&std::fs::read_to_string(&gitignore_path)?);
        if !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("semstore.toml");

        let mut predicates = HashMap::new();
        predicates.insert(
            "http://example.org/title".to_string(),
            PredicateFlags {
                single_valued: true,
                ..Default::default()
            },
        );
        let config = SemstoreConfig {
            database: Some("data/store.db".to_string()),
            autosync: Some(false),
            predicates: Some(predicates),
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.database.as_deref(), Some("data/store.db"));
        assert_eq!(loaded.autosync, Some(false));

        let registry = registry_from(&loaded);
        assert!(registry.is_single_valued("http://example.org/title"));
        assert!(!registry.is_owned("http://example.org/title"));
    }

    #[test]
    fn test_resolve_uri_mints_under_base() {
        let config = SemstoreConfig {
            base_uri: Some("http://example.org/local".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_uri("http://other.org/x").unwrap(),
            "http://other.org/x"
        );
        assert_eq!(
            config.resolve_uri("Moby Dick").unwrap(),
            "http://example.org/local/Moby%20Dick"
        );
    }

    #[test]
    fn test_resolve_uri_requires_base_for_names() {
        let config = SemstoreConfig::default();
        assert!(config.resolve_uri("just-a-name").is_err());
        assert_eq!(
            config.resolve_uri("urn:isbn:0-486-27557-4").unwrap(),
            "urn:isbn:0-486-27557-4"
        );
    }

    #[test]
    fn test_load_missing_config_is_none() {
        let dir = tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }
}
