use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

pub const WELCOME: &str = "welcome";
pub const DRINK_LIST: &str = "drink_list";
pub const DRINK_SELECTOR: &str = "drink_selector";
pub const ERROR: &str = "error";

/// Served when even the error page can not be rendered.
pub static TEMPLATE_ERROR_PAGE: &str = include_str!("../templates/template_error.html");

/// The compiled page templates. Built once at startup and shared by all requests.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}

impl Templates {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_partial("layout", include_str!("../templates/layout.hbs"))?;
        registry.register_template_string(WELCOME, include_str!("../templates/welcome.hbs"))?;
        registry
            .register_template_string(DRINK_LIST, include_str!("../templates/drink_list.hbs"))?;
        registry.register_template_string(
            DRINK_SELECTOR,
            include_str!("../templates/drink_selector.hbs"),
        )?;
        registry.register_template_string(ERROR, include_str!("../templates/error.hbs"))?;
        Ok(Self { registry })
    }

    /// A registry without any templates, so that every render fails.
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self {
            registry: Handlebars::new(),
        }
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, RenderError> {
        self.registry.render(name, data)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Templates, DRINK_SELECTOR, ERROR, WELCOME};

    #[test]
    fn error_page_escapes_message() {
        let templates = Templates::new().unwrap();

        let page = templates
            .render(
                ERROR,
                &json!({"title": "Not Found", "status": 404, "message": "<b>nope</b>"}),
            )
            .unwrap();

        assert!(page.contains("<title>Not Found</title>"));
        assert!(page.contains("&lt;b&gt;nope&lt;/b&gt;"));
    }

    #[test]
    fn welcome_shows_start_form_without_event() {
        let templates = Templates::new().unwrap();

        let page = templates.render(WELCOME, &json!({"event": null})).unwrap();

        assert!(page.contains("action=\"/start_event\""));
        assert!(!page.contains("action=\"/stop_event\""));
    }

    #[test]
    fn missing_fields_fail_in_strict_mode() {
        let templates = Templates::new().unwrap();

        assert!(templates.render(DRINK_SELECTOR, &json!({})).is_err());
    }

    #[test]
    fn unknown_templates_fail() {
        assert!(Templates::empty().render(WELCOME, &json!({})).is_err());
    }
}
