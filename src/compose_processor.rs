use anyhow::{anyhow, bail, Context, Result};
use serde_yaml::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Processing of docker-compose files before deployment
pub struct ComposeProcessor;

impl ComposeProcessor {
    /// Parses compose content; the result must be a mapping.
    pub fn parse(content: &str) -> Result<Value> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|e| anyhow!("Invalid YAML format: {}", e))?;
        if !value.is_mapping() {
            bail!("Invalid compose file: top level must be a mapping");
        }
        Ok(value)
    }

    /// Extracts the images referenced by a YAML structure
    pub fn extract_images(value: &Value) -> Vec<String> {
        let mut images_found = Vec::new();
        Self::extract_images_from_yaml(value, &mut images_found);
        images_found
    }

    fn extract_images_from_yaml(value: &Value, images: &mut Vec<String>) {
        match value {
            Value::Mapping(mapping) => {
                for (key, val) in mapping {
                    if key.as_str() == Some("image") {
                        if let Some(image_name) = val.as_str().filter(|name| !name.is_empty()) {
                            images.push(image_name.to_string());
                        }
                    } else {
                        Self::extract_images_from_yaml(val, images);
                    }
                }
            }
            Value::Sequence(sequence) => {
                for item in sequence {
                    Self::extract_images_from_yaml(item, images);
                }
            }
            _ => {}
        }
    }

    /// Path of the file written for a project.
    pub fn compose_path(compose_dir: &Path, project_name: &str) -> PathBuf {
        compose_dir.join(format!("{project_name}-docker-compose.yml"))
    }

    /// Writes the normalized YAML to `<compose_dir>/<project>-docker-compose.yml`.
    pub fn save(compose_dir: &Path, project_name: &str, value: &Value) -> Result<PathBuf> {
        fs::create_dir_all(compose_dir)
            .with_context(|| format!("Failed to create {}", compose_dir.display()))?;

        let content = serde_yaml::to_string(value)?;
        let compose_path = Self::compose_path(compose_dir, project_name);

        let mut file = fs::File::create(&compose_path)
            .with_context(|| format!("Failed to create {}", compose_path.display()))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        Ok(compose_path)
    }

    /// Removes the compose file, and its directory once nothing else is in it.
    pub fn cleanup(compose_path: &Path) {
        if compose_path.exists() {
            if let Err(e) = fs::remove_file(compose_path) {
                tracing::warn!("Could not remove {}: {}", compose_path.display(), e);
            }
        }

        if let Some(dir) = compose_path.parent() {
            let is_empty = fs::read_dir(dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty {
                if let Err(e) = fs::remove_dir(dir) {
                    tracing::warn!("Could not remove {}: {}", dir.display(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
services:
  web:
    image: nginx:latest
    ports:
      - "8080:80"
  db:
    image: postgres:16
    environment:
      POSTGRES_PASSWORD: example
  worker:
    build: .
"#;

    #[test]
    fn extracts_service_images() {
        let value = ComposeProcessor::parse(COMPOSE).unwrap();
        let mut images = ComposeProcessor::extract_images(&value);
        images.sort();
        assert_eq!(images, vec!["nginx:latest", "postgres:16"]);
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let err = ComposeProcessor::parse("services: [unclosed").unwrap_err();
        assert!(err.to_string().starts_with("Invalid YAML format"));
        assert!(ComposeProcessor::parse("- just\n- a list\n").is_err());
    }

    #[test]
    fn save_then_cleanup_removes_file_and_empty_dir() {
        let root = tempfile::tempdir().unwrap();
        let compose_dir = root.path().join("docker_compose_files");
        let value = ComposeProcessor::parse(COMPOSE).unwrap();

        let path = ComposeProcessor::save(&compose_dir, "shop", &value).unwrap();
        assert_eq!(path, compose_dir.join("shop-docker-compose.yml"));
        let written = ComposeProcessor::parse(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, value);

        ComposeProcessor::cleanup(&path);
        assert!(!path.exists());
        assert!(!compose_dir.exists());
    }

    #[test]
    fn cleanup_keeps_directory_with_other_projects() {
        let root = tempfile::tempdir().unwrap();
        let value = ComposeProcessor::parse(COMPOSE).unwrap();

        let first = ComposeProcessor::save(root.path(), "one", &value).unwrap();
        let second = ComposeProcessor::save(root.path(), "two", &value).unwrap();

        ComposeProcessor::cleanup(&first);
        assert!(!first.exists());
        assert!(second.exists());
        assert!(root.path().exists());
    }
}
