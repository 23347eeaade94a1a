use serde::Serialize;
use std::error::Error;
use utoipa::ToSchema;

/// One element of the error array every classified failure renders to.
/// `mensagem_usuario` is localized and safe to display; `mensagem_desenvolvedor`
/// carries diagnostic detail and is never meant for end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorEntry {
    /// Localized, display-ready message resolved through the message catalog
    #[serde(rename = "mensagemUsuario")]
    pub user_message: String,
    /// Diagnostic detail (root cause, field descriptor, parse failure)
    #[serde(rename = "mensagemDesenvolvedor")]
    pub developer_message: String,
}

impl ErrorEntry {
    pub fn new(user_message: impl Into<String>, developer_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            developer_message: developer_message.into(),
        }
    }
}

/// Message of the deepest cause in a failure's `source()` chain.
///
/// Storage-level constraint violations arrive wrapped several layers deep;
/// the innermost error carries the specific diagnostic (which constraint,
/// which value), so that is the one surfaced to developers.
pub fn root_cause_message(err: &(dyn Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
