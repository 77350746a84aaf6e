//! Tera rendering engine for the sync tool configuration.
//!
//! The embedded template can be replaced by dropping a file with the same name
//! (`sync_config.conf.tera`) into a user template directory.

use std::path::Path;

use tera::Tera;

use crate::context::ConfigContext;
use crate::error::RenderError;

/// Name of the sync tool config template.
pub const SYNC_CONFIG_TEMPLATE: &str = "sync_config.conf.tera";

const EMBEDDED: &str = include_str!("templates/sync_config.conf.tera");

/// The override in `dir`, if one exists.
fn user_override(dir: &Path) -> Result<Option<String>, RenderError> {
    let path = dir.join(SYNC_CONFIG_TEMPLATE);
    if !path.is_file() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|source| RenderError::Io { path, source })
}

/// Tera-based engine holding the one sync config template.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Use `<user_template_dir>/sync_config.conf.tera` when present, else the embedded template.
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let source = match user_template_dir {
            Some(dir) => user_override(dir)?,
            None => None,
        };
        let mut tera = Tera::default();
        // Credentials are written verbatim.
        tera.autoescape_on(vec![]);
        tera.add_raw_template(SYNC_CONFIG_TEMPLATE, source.as_deref().unwrap_or(EMBEDDED))?;
        Ok(Self { tera })
    }

    /// Render the two-profile sync tool configuration. Line endings are LF.
    pub fn render_sync_config(&self, ctx: &ConfigContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let content = self.tera.render(SYNC_CONFIG_TEMPLATE, &tera_ctx)?;
        Ok(content.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProfileCtx;

    fn ctx() -> ConfigContext {
        let p = |name: &str, key: &str| ProfileCtx {
            name: name.into(),
            provider: "IBMCOS".into(),
            access_key_id: key.into(),
            secret_access_key: format!("{key}-secret"),
            endpoint: format!("{}.example", name.to_lowercase()),
        };
        ConfigContext {
            profiles: vec![p("SOURCE", "a"), p("DESTINATION", "c")],
        }
    }

    #[test]
    fn engine_new_succeeds() {
        TemplateEngine::new(None).expect("embedded templates must parse");
    }

    #[test]
    fn renders_both_sections_in_order() {
        let out = TemplateEngine::new(None).unwrap().render_sync_config(&ctx()).unwrap();
        let src = out.find("[SOURCE]").expect("source section");
        let dst = out.find("[DESTINATION]").expect("destination section");
        assert!(src < dst);
        assert!(out.contains("env_auth = false"));
        assert!(out.contains("secret_access_key = c-secret"));
    }

    #[test]
    fn special_characters_are_not_escaped() {
        let mut c = ctx();
        c.profiles[0].secret_access_key = "a&b<c>\"d'/+=".into();
        let out = TemplateEngine::new(None).unwrap().render_sync_config(&c).unwrap();
        assert!(out.contains("secret_access_key = a&b<c>\"d'/+="));
    }

    #[test]
    fn user_template_overrides_embedded() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SYNC_CONFIG_TEMPLATE),
            "{% for p in profiles %}{{ p.name }};{% endfor %}",
        )
        .unwrap();
        let engine = TemplateEngine::new(Some(dir.path())).unwrap();
        assert_eq!(engine.render_sync_config(&ctx()).unwrap(), "SOURCE;DESTINATION;");
    }

    #[test]
    fn missing_user_dir_falls_back_to_embedded() {
        let engine = TemplateEngine::new(Some(Path::new("/nonexistent/offsite-templates"))).unwrap();
        assert!(engine.render_sync_config(&ctx()).unwrap().contains("[SOURCE]"));
    }
}
