//! Jinja-compatible engine backed by minijinja.

use super::{Partials, Renderer};
use crate::error::BuildError;
use minijinja::{AutoEscape, Environment};
use serde_json::Value;

pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    /// Build an environment with every partial registered for `{% include %}`.
    pub fn new(partials: &Partials) -> Result<Self, BuildError> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        for (name, source) in partials.iter() {
            env.add_template_owned(name.to_owned(), source.to_owned())
                .map_err(|err| BuildError::Render {
                    name: name.to_owned(),
                    message: format!("{err:#}"),
                })?;
        }
        Ok(Self { env })
    }
}

impl Renderer for JinjaRenderer {
    fn render_source(&self, name: &str, source: &str, context: &Value) -> Result<String, BuildError> {
        self.env
            .render_named_str(name, source, context)
            .map_err(|err| BuildError::Render {
                name: name.to_owned(),
                message: format!("{err:#}"),
            })
    }
}
