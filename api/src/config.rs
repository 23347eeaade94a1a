/// Security settings, read once at startup from the environment.
///
/// Mirrors the single in-memory OAuth2 client of the original deployment:
/// one confidential client, password + refresh_token grants.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// HMAC key for signing/verifying access tokens (`MONETA_JWT_SECRET`)
    pub jwt_secret: String,
    /// Client id expected in HTTP Basic auth on /oauth/token (`MONETA_CLIENT_ID`)
    pub client_id: String,
    /// Client secret expected in HTTP Basic auth (`MONETA_CLIENT_SECRET`)
    pub client_secret: String,
    /// Access token validity in seconds (`MONETA_ACCESS_TOKEN_VALIDITY`)
    pub access_token_validity_secs: i64,
    /// Refresh token validity in seconds (`MONETA_REFRESH_TOKEN_VALIDITY`)
    pub refresh_token_validity_secs: i64,
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: env_or("MONETA_JWT_SECRET", "moneta-dev-only-secret"),
            client_id: env_or("MONETA_CLIENT_ID", "angular"),
            client_secret: env_or("MONETA_CLIENT_SECRET", "@ngul@r0"),
            access_token_validity_secs: env_i64_or("MONETA_ACCESS_TOKEN_VALIDITY", 1800),
            refresh_token_validity_secs: env_i64_or("MONETA_REFRESH_TOKEN_VALIDITY", 86_400),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_i64_or(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_client_setup() {
        let config = SecurityConfig::from_env();
        assert_eq!(config.access_token_validity_secs, 1800);
        assert_eq!(config.refresh_token_validity_secs, 86_400);
        assert!(!config.client_id.is_empty());
    }
}
