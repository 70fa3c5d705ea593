//! Server-side page rendering
//!
//! Tera templates are embedded from `templates/` at build time, so the
//! binary carries its own pages. Every page gets the same standard
//! variables (`title`, `notices`, `is_authenticated`, `username`, `year`)
//! on top of whatever the handler supplies.

mod error;

pub use error::ViewError;

use crate::models::{GroupedNotices, Movie, DEFAULT_MOVIE_IMAGE, MAX_YEARS_AHEAD, MIN_YEAR};
use anyhow::Result;
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as _;
use tera::{Context as TeraContext, Tera};

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct Templates;

/// Variables every page receives
#[derive(Debug, Clone, Serialize)]
pub struct PageVars {
    pub title: String,
    pub notices: GroupedNotices,
    pub is_authenticated: bool,
    pub username: Option<String>,
    /// Current year, for the footer
    pub year: i32,
}

impl PageVars {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notices: GroupedNotices::default(),
            is_authenticated: false,
            username: None,
            year: chrono::Utc::now().year(),
        }
    }

    pub fn with_user(mut self, username: impl Into<String>) -> Self {
        self.is_authenticated = true;
        self.username = Some(username.into());
        self
    }

    pub fn with_notices(mut self, notices: GroupedNotices) -> Self {
        self.notices = notices;
        self
    }
}

pub struct ViewEngine {
    tera: Tera,
}

impl ViewEngine {
    /// Load every embedded template
    pub fn new() -> Result<Self> {
        let mut templates = Vec::new();
        for name in Templates::iter() {
            let Some(file) = Templates::get(&name) else {
                continue;
            };
            let content = String::from_utf8(file.data.into_owned()).map_err(|e| ViewError::Load {
                name: name.to_string(),
                message: e.to_string(),
            })?;
            templates.push((name.to_string(), content));
        }
        Ok(Self::from_templates(templates)?)
    }

    /// Build an engine from `(name, source)` pairs
    pub fn from_templates<I>(templates: I) -> Result<Self, ViewError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut tera = Tera::default();
        let templates: Vec<(String, String)> = templates.into_iter().collect();
        tera.add_raw_templates(templates).map_err(|e| ViewError::Load {
            name: "templates".to_string(),
            message: error_chain(&e),
        })?;
        tracing::debug!("Loaded {} template(s)", tera.get_template_names().count());
        Ok(Self { tera })
    }

    #[cfg(test)]
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// Render a template with an explicit context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, ViewError> {
        self.tera
            .render(template, context)
            .map_err(|e| ViewError::Render(format!("Failed to render '{}': {}", template, error_chain(&e))))
    }

    /// Render a page with the standard variables merged into `context`
    pub fn render_page(
        &self,
        template: &str,
        vars: &PageVars,
        mut context: TeraContext,
    ) -> Result<String, ViewError> {
        context.insert("title", &vars.title);
        context.insert("notices", &vars.notices);
        context.insert("is_authenticated", &vars.is_authenticated);
        context.insert("username", &vars.username);
        context.insert("year", &vars.year);
        self.render(template, &context)
    }

    /// Render `error.html`, falling back to a built-in page if that fails.
    ///
    /// Never fails, so it is safe to call while handling another error.
    pub fn render_error_page(&self, vars: &PageVars, message: &str) -> String {
        let mut context = TeraContext::new();
        context.insert("message", message);
        match self.render_page("error.html", vars, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render error template: {}", e);
                Self::simple_error_page(&vars.title, message)
            }
        }
    }

    /// Minimal standalone error page
    pub fn simple_error_page(title: &str, message: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; background: #f5f5f5; }}
        .error-box {{ background: white; border-left: 4px solid #e74c3c; padding: 20px; border-radius: 4px; }}
        h1 {{ color: #e74c3c; margin-top: 0; }}
    </style>
</head>
<body>
    <div class="error-box">
        <h1>{title}</h1>
        <p>{message}</p>
        <p><a href="/">Back to home</a></p>
    </div>
</body>
</html>"#,
            title = tera::escape_html(title),
            message = tera::escape_html(message),
        )
    }
}

/// Genres offered as checkboxes on the movie forms
pub const GENRE_OPTIONS: &[&str] = &[
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "Horror",
    "Musical",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Thriller",
    "War",
    "Western",
];

/// Context for `movies/add.html` and `movies/edit.html`.
///
/// Genres already on the movie but missing from [`GENRE_OPTIONS`] are
/// appended so an edit never silently drops them.
pub fn movie_form_context(action: &str, submit_label: &str, movie: Option<&Movie>) -> TeraContext {
    let current_year = chrono::Utc::now().year();
    let mut genres: Vec<String> = GENRE_OPTIONS.iter().map(|g| g.to_string()).collect();
    if let Some(movie) = movie {
        for genre in &movie.genres {
            if !genres.contains(genre) {
                genres.push(genre.clone());
            }
        }
    }

    let mut context = TeraContext::new();
    context.insert("form_action", action);
    context.insert("submit_label", submit_label);
    context.insert("genre_options", &genres);
    context.insert("min_year", &MIN_YEAR);
    context.insert("max_year", &(current_year + MAX_YEARS_AHEAD));
    context.insert("default_image", DEFAULT_MOVIE_IMAGE);
    context.insert("movie", &movie);
    context
}

fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}
