//! Localized error messages
//!
//! Handlers never put raw store errors in front of the client. They pick a
//! message code (see [`codes`]) and render it through a [`Localizer`] in the
//! caller's language, falling back to [`codes::DEFAULT_MESSAGE`] and finally
//! to the literal `"error"`.
//!
//! [`MessageCatalog`] is the bundled implementation: one JSON object per
//! locale mapping message codes to templates. Templates interpolate
//! `{Key}` (or `{{.Key}}`) placeholders from the supplied data.
//!
//! ```
//! use crudkit::i18n::{localize, MessageCatalog};
//!
//! let catalog = MessageCatalog::new("en").with_messages(
//!     "en",
//!     [("exception:failed-to-create-record", "Could not create {Table}")],
//! );
//! let message = localize(
//!     Some(&catalog),
//!     "en",
//!     "exception:failed-to-create-record",
//!     &[("Table", "things".to_string())],
//! );
//! assert_eq!(message, "Could not create things");
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use axum::http::StatusCode;

use crate::error::{Error, Result};

/// Message codes used by the CRUD handlers
pub mod codes {
    pub const COULD_NOT_COUNT_RECORDS: &str = "exception:could-not-count-records";
    pub const COULD_NOT_FETCH_RECORDS: &str = "exception:could-not-fetch-records";
    pub const FAILED_TO_FETCH_ONE_RECORD: &str = "exception:failed-to-fetch-one-record";
    pub const FAILED_TO_CREATE_RECORD: &str = "exception:failed-to-create-record";
    pub const FAILED_TO_UPDATE_RECORD: &str = "exception:failed-to-update-record";
    pub const FAILED_TO_DELETE_RECORD: &str = "exception:failed-to-delete-record";
    pub const DEFAULT_MESSAGE: &str = "exception:default-message";
}

/// Language used when the request does not name one
pub const DEFAULT_LANGUAGE: &str = "en";

/// Last-resort message when nothing else resolves
pub const FALLBACK_MESSAGE: &str = "error";

/// Template data: placeholder name and its value
pub type MessageData<'a> = [(&'a str, String)];

/// Renders message codes in a language
pub trait Localizer: Send + Sync {
    /// Rendered message, or `None` if `code` is unknown for `lang`
    fn localize(&self, lang: &str, code: &str, data: &MessageData<'_>) -> Option<String>;
}

/// Render `code`, falling back to the default message and then to `"error"`
pub fn localize(
    localizer: Option<&dyn Localizer>,
    lang: &str,
    code: &str,
    data: &MessageData<'_>,
) -> String {
    let Some(localizer) = localizer else {
        return FALLBACK_MESSAGE.to_string();
    };
    localizer
        .localize(lang, code, data)
        .or_else(|| localizer.localize(lang, codes::DEFAULT_MESSAGE, data))
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

/// HTTP status for a message code
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        codes::COULD_NOT_FETCH_RECORDS => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Language tag from an `Accept-Language` header
///
/// Quality values are ignored: of the first `;`-separated group, the last
/// comma-separated tag wins. An empty header yields [`DEFAULT_LANGUAGE`].
pub fn language_from_header(header: &str) -> String {
    let first_group = header.split(';').next().unwrap_or_default();
    let tags: Vec<&str> = first_group.split(',').collect();
    if tags.first().map_or(true, |tag| tag.is_empty()) {
        return DEFAULT_LANGUAGE.to_string();
    }
    tags.last()
        .map(|tag| tag.trim().to_lowercase())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// Per-locale message templates
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    default_locale: String,
    locales: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into().to_lowercase(),
            locales: HashMap::new(),
        }
    }

    /// Add templates for `locale`, replacing existing codes
    pub fn with_messages<K, V>(
        mut self,
        locale: &str,
        messages: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.locales
            .entry(locale.to_lowercase())
            .or_default()
            .extend(messages.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Load every `{locale}.json` file in `dir`
    ///
    /// Each file must be a flat JSON object of code to template.
    pub fn load_dir(dir: impl AsRef<Path>, default_locale: &str) -> Result<Self> {
        let mut catalog = Self::new(default_locale);
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let messages: HashMap<String, String> =
                serde_json::from_str(&fs::read_to_string(&path)?)?;
            tracing::debug!(
                locale,
                messages = messages.len(),
                "Loaded message catalog"
            );
            catalog = catalog.with_messages(locale, messages);
        }
        if catalog.locales.is_empty() {
            return Err(Error::Internal(format!(
                "no message catalogs found in {}",
                dir.as_ref().display()
            )));
        }
        Ok(catalog)
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }

    fn template(&self, lang: &str, code: &str) -> Option<&str> {
        let lang = lang.to_lowercase();
        let primary = lang.split('-').next().unwrap_or_default();
        let template = [lang.as_str(), primary, self.default_locale.as_str()]
            .into_iter()
            .find_map(|locale| self.locales.get(locale)?.get(code))
            .map(String::as_str);
        template
    }
}

impl Localizer for MessageCatalog {
    fn localize(&self, lang: &str, code: &str, data: &MessageData<'_>) -> Option<String> {
        self.template(lang, code).map(|template| render(template, data))
    }
}

fn render(template: &str, data: &MessageData<'_>) -> String {
    let mut message = template.to_string();
    for (key, value) in data {
        message = message
            .replace(&format!("{{{{.{}}}}}", key), value)
            .replace(&format!("{{{}}}", key), value);
    }
    message
}
