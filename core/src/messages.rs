use std::collections::HashMap;
use thiserror::Error;

/// Locale-keyed message catalog backing every user-facing error message.
///
/// Bundles are flat `key = "text"` TOML documents embedded at compile time
/// and parsed once at startup. The catalog is read-only afterwards and safe
/// to share across request workers.
#[derive(Debug)]
pub struct MessageCatalog {
    default_locale: String,
    bundles: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("message bundle for locale '{locale}' is not valid TOML: {source}")]
    InvalidBundle {
        locale: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("default locale '{0}' has no message bundle")]
    MissingDefaultLocale(String),
}

const BUNDLE_PT_BR: &str = include_str!("../messages/pt-BR.toml");
const BUNDLE_EN: &str = include_str!("../messages/en.toml");

impl MessageCatalog {
    /// Catalog built from the bundles shipped inside the binary.
    /// Default locale is `pt-BR`, matching the wire contract of the API.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_bundles("pt-BR", &[("pt-BR", BUNDLE_PT_BR), ("en", BUNDLE_EN)])
    }

    pub fn from_bundles(
        default_locale: &str,
        bundles: &[(&str, &str)],
    ) -> Result<Self, CatalogError> {
        let mut parsed = HashMap::new();
        for (locale, raw) in bundles {
            let messages: HashMap<String, String> =
                toml::from_str(raw).map_err(|source| CatalogError::InvalidBundle {
                    locale: (*locale).to_string(),
                    source,
                })?;
            parsed.insert(normalize(locale), messages);
        }

        let default_locale = normalize(default_locale);
        if !parsed.contains_key(&default_locale) {
            return Err(CatalogError::MissingDefaultLocale(default_locale));
        }

        Ok(Self {
            default_locale,
            bundles: parsed,
        })
    }

    /// Resolve `key` for `locale`, falling back exact locale → bare language →
    /// default locale. Returns `None` only when no bundle carries the key.
    pub fn message(&self, locale: &str, key: &str) -> Option<&str> {
        let locale = normalize(locale);

        if let Some(text) = self.lookup(&locale, key) {
            return Some(text);
        }
        if let Some((language, _)) = locale.split_once('-') {
            if let Some(text) = self.lookup(language, key) {
                return Some(text);
            }
        }
        self.lookup(&self.default_locale, key)
    }

    /// Like [`message`](Self::message) but falls back to `fallback` for keys
    /// absent from every bundle (used for per-field validation descriptors).
    pub fn message_or<'a>(&'a self, locale: &str, key: &str, fallback: &'a str) -> &'a str {
        self.message(locale, key).unwrap_or(fallback)
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.bundles
            .get(locale)
            .and_then(|bundle| bundle.get(key))
            .map(String::as_str)
    }
}

fn normalize(locale: &str) -> String {
    locale.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MessageCatalog {
        MessageCatalog::embedded().unwrap()
    }

    #[test]
    fn resolves_default_locale_key() {
        assert_eq!(
            catalog().message("pt-BR", "recurso.nao-encontrado"),
            Some("Recurso não encontrado")
        );
    }

    #[test]
    fn locale_matching_is_case_insensitive() {
        assert_eq!(
            catalog().message("PT-br", "mensagem.invalida"),
            Some("Mensagem inválida")
        );
    }

    #[test]
    fn region_falls_back_to_bare_language() {
        // No en-US bundle exists; en-US must hit the "en" bundle.
        assert_eq!(
            catalog().message("en-US", "recurso.nao-encontrado"),
            Some("Resource not found")
        );
    }

    #[test]
    fn unknown_locale_falls_back_to_default() {
        assert_eq!(
            catalog().message("de", "recurso.operacao-nao-permitida"),
            Some("Operação não permitida")
        );
    }

    #[test]
    fn unknown_key_yields_none_and_fallback() {
        let catalog = catalog();
        assert_eq!(catalog.message("pt-BR", "no.such.key"), None);
        assert_eq!(catalog.message_or("pt-BR", "no.such.key", "nome"), "nome");
    }

    #[test]
    fn missing_default_bundle_is_rejected() {
        let err = MessageCatalog::from_bundles("pt-BR", &[("en", "\"k\" = \"v\"")]);
        assert!(matches!(err, Err(CatalogError::MissingDefaultLocale(_))));
    }
}
