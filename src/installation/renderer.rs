//! Job template rendering.
//!
//! Templates may reference properties with `<%= p("dotted.name") %>`. A
//! property is looked up in the manifest properties first, then in the job's
//! property defaults.

use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::target::InstallationTarget;
use crate::error::{DeployError, InstallationError, Result};
use crate::release::Job;

const OPEN_TAG: &str = "<%=";
const CLOSE_TAG: &str = "%>";

/// Renders job templates into an installation target.
#[derive(Debug, Default)]
pub struct JobRenderer;

impl JobRenderer {
    /// Creates a new renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders every template of `job` into `<target>/jobs/<job>/`.
    ///
    /// Returns the rendered job directory.
    ///
    /// # Errors
    ///
    /// Returns a render error if a template path is absolute or leaves its
    /// directory, if a template cannot be read or written, or if it refers to
    /// a property that has neither a value nor a default.
    pub async fn render(
        &self,
        job: &Job,
        properties: &Value,
        target: &InstallationTarget,
    ) -> Result<PathBuf> {
        let job_dir = target.jobs_path().join(&job.name);
        let templates_dir = job.templates_dir();

        for (src, dst) in &job.templates {
            let render_error = |message: String| {
                DeployError::Installation(InstallationError::Render {
                    job: job.name.clone(),
                    template: src.clone(),
                    message,
                })
            };

            if !is_contained(src) {
                return Err(render_error(format!(
                    "template source '{src}' escapes the job templates directory"
                )));
            }
            if !is_contained(dst) {
                return Err(render_error(format!(
                    "template destination '{dst}' escapes the job directory"
                )));
            }

            let source = tokio::fs::read_to_string(templates_dir.join(src))
                .await
                .map_err(|e| render_error(format!("failed to read template: {e}")))?;
            let rendered = render_template(&source, |name| lookup_property(job, properties, name))
                .map_err(render_error)?;

            let output = job_dir.join(dst);
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| render_error(format!("failed to create {}: {e}", parent.display())))?;
            }
            tokio::fs::write(&output, rendered)
                .await
                .map_err(|e| render_error(format!("failed to write {}: {e}", output.display())))?;

            if dst.starts_with("bin/") {
                make_executable(&output)
                    .await
                    .map_err(|e| render_error(format!("failed to set permissions: {e}")))?;
            }

            debug!("Rendered '{src}' of job '{}' to {}", job.name, output.display());
        }

        Ok(job_dir)
    }
}

/// Whether `path` is relative and stays below the directory it is joined to.
fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    path.components().next().is_some()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Resolves `name` against manifest properties, then job defaults.
fn lookup_property(job: &Job, properties: &Value, name: &str) -> Option<Value> {
    let mut current = properties;
    let mut found = true;
    for segment in name.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => {
                found = false;
                break;
            }
        }
    }

    if found {
        return Some(current.clone());
    }

    job.properties
        .get(name)
        .and_then(|definition| definition.default.clone())
}

/// Substitutes every `<%= p("name") %>` tag in `source`.
fn render_template<F>(source: &str, lookup: F) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<Value>,
{
    let mut output = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find(OPEN_TAG) {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN_TAG.len()..];
        let end = after_open
            .find(CLOSE_TAG)
            .ok_or_else(|| String::from("unterminated template tag"))?;

        let expression = after_open[..end].trim();
        let name = parse_property_call(expression)
            .ok_or_else(|| format!("unsupported template expression '{expression}'"))?;
        let value = lookup(name).ok_or_else(|| format!("Can't find property '{name}'"))?;

        match value {
            Value::String(s) => output.push_str(&s),
            other => output.push_str(&other.to_string()),
        }

        rest = &after_open[end + CLOSE_TAG.len()..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Extracts `name` from `p("name")` or `p('name')`.
fn parse_property_call(expression: &str) -> Option<&str> {
    let inner = expression.strip_prefix("p(")?.strip_suffix(')')?.trim();
    inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
