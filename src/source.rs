//! Design-side input.
//!
//! The design tool client lives outside this crate; it only has to produce
//! [`ComponentRecord`]s. [`JsonComponentSource`] reads them from disk.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SpcError};
use crate::types::ComponentRecord;

#[async_trait::async_trait]
pub trait DesignSource: Send + Sync {
    /// Components of `file_ref`, narrowed to `node_ref` and its descendants
    /// when given.
    async fn fetch_components(
        &self,
        file_ref: &str,
        node_ref: Option<&str>,
    ) -> Result<Vec<ComponentRecord>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ComponentFile {
    List(Vec<ComponentRecord>),
    Wrapped { components: Vec<ComponentRecord> },
}

/// Reads `file_ref` as a path to a JSON array of components, or an object
/// with a `components` array. Relative paths resolve against `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct JsonComponentSource {
    base_dir: Option<PathBuf>,
}

impl JsonComponentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn resolve(&self, file_ref: &str) -> PathBuf {
        let path = Path::new(file_ref);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn parse(json: &str) -> Result<Vec<ComponentRecord>> {
        let file: ComponentFile = serde_json::from_str(json).map_err(|e| {
            SpcError::design_source(format!(
                "expected a JSON array of components or {{\"components\": [...]}}: {e}"
            ))
        })?;
        Ok(match file {
            ComponentFile::List(list) => list,
            ComponentFile::Wrapped { components } => components,
        })
    }
}

#[async_trait::async_trait]
impl DesignSource for JsonComponentSource {
    async fn fetch_components(
        &self,
        file_ref: &str,
        node_ref: Option<&str>,
    ) -> Result<Vec<ComponentRecord>> {
        let path = self.resolve(file_ref);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            SpcError::design_source(format!("cannot read {}: {e}", path.display()))
        })?;
        let components = Self::parse(&content)?;
        let total = components.len();
        let selected = filter_by_node(components, node_ref);
        debug!(
            path = %path.display(),
            total,
            selected = selected.len(),
            "loaded design components"
        );
        if let (Some(node), true) = (node_ref, selected.is_empty()) {
            return Err(SpcError::design_source(format!(
                "no components under node '{node}' in {}",
                path.display()
            )));
        }
        Ok(selected)
    }
}

/// Keep components whose id equals `node_ref` or is nested under it
/// (`node_ref` followed by `;`, `/` or `:`).
pub fn filter_by_node(components: Vec<ComponentRecord>, node_ref: Option<&str>) -> Vec<ComponentRecord> {
    let Some(node) = node_ref.map(str::trim).filter(|n| !n.is_empty()) else {
        return components;
    };
    components
        .into_iter()
        .filter(|c| {
            c.id == node
                || c
                    .id
                    .strip_prefix(node)
                    .is_some_and(|rest| rest.starts_with([';', '/', ':']))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const COMPONENTS: &str = r#"[
        {"id": "1:2", "name": "Header", "type": "FRAME"},
        {"id": "1:2;3:4", "name": "Title", "type": "TEXT"},
        {"id": "1:20", "name": "Footer", "type": "FRAME"}
    ]"#;

    #[test]
    fn parses_array_and_wrapped_forms() {
        assert_eq!(JsonComponentSource::parse(COMPONENTS).expect("array").len(), 3);
        let wrapped = format!(r#"{{"components": {COMPONENTS}}}"#);
        assert_eq!(JsonComponentSource::parse(&wrapped).expect("wrapped").len(), 3);
        assert!(matches!(
            JsonComponentSource::parse(r#"{"nodes": []}"#),
            Err(SpcError::DesignSource(_))
        ));
    }

    #[test]
    fn node_filter_keeps_subtree_only() {
        let all = JsonComponentSource::parse(COMPONENTS).expect("array");
        let ids: Vec<String> = filter_by_node(all, Some("1:2"))
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["1:2".to_string(), "1:2;3:4".to_string()]);
    }

    #[tokio::test]
    async fn reads_components_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(COMPONENTS.as_bytes()).expect("write");
        let path = file.path().to_string_lossy().to_string();

        let source = JsonComponentSource::new();
        let all = source.fetch_components(&path, None).await.expect("read");
        assert_eq!(all.len(), 3);

        let err = source
            .fetch_components(&path, Some("9:9"))
            .await
            .expect_err("unknown node");
        assert!(err.to_string().contains("9:9"));
    }

    #[tokio::test]
    async fn missing_file_is_design_source_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = JsonComponentSource::with_base_dir(dir.path());
        let err = source
            .fetch_components("components.json", None)
            .await
            .expect_err("missing");
        assert!(matches!(err, SpcError::DesignSource(_)));
    }
}
