//! Service-account authentication for the Google Sheets API.
//!
//! The flow is the two-legged OAuth variant: build an RS256-signed JWT
//! assertion from the service-account key and exchange it at the key's
//! `token_uri` for a short-lived bearer token.
//!
//! The key JSON arrives through the `GOOGLE_SERVICE_ACCOUNT_JSON`
//! environment variable; the private key is never logged.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

use super::WriteError;

/// Environment variable carrying the service-account key JSON.
pub const SERVICE_ACCOUNT_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_TTL_SECS: i64 = 3600;

/// The fields of a Google service-account key this job needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service-account identity, the JWT issuer.
    pub client_email: String,
    /// PKCS#8 PEM private key. May carry escaped `\n` sequences when passed
    /// through an environment variable.
    pub private_key: String,
    /// OAuth token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Read and parse the key from `GOOGLE_SERVICE_ACCOUNT_JSON`.
    pub fn from_env() -> Result<Self, WriteError> {
        let raw = std::env::var(SERVICE_ACCOUNT_ENV).map_err(|_| {
            WriteError::Configuration(format!(
                "missing environment variable: {SERVICE_ACCOUNT_ENV}"
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            WriteError::Authentication(format!("invalid service-account key JSON: {e}"))
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// RS256 signer for the service account's JWT assertions.
pub struct SheetsAuth {
    client_email: String,
    token_uri: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for SheetsAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsAuth")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

impl SheetsAuth {
    /// Build a signer from a parsed service-account key.
    pub fn new(key: &ServiceAccountKey) -> Result<Self, WriteError> {
        // Keys passed through env vars often arrive with literal "\n".
        let pem = key.private_key.replace("\\n", "\n");
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| WriteError::Signing(format!("failed to parse private key: {e}")))?;
        Ok(Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// The OAuth token endpoint this signer targets.
    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Build the signed JWT assertion for the current moment.
    pub fn build_assertion(&self) -> String {
        self.build_assertion_at(chrono::Utc::now().timestamp())
    }

    /// Build the signed JWT assertion with an explicit issue time. The
    /// explicit-time variant exists for tests.
    pub fn build_assertion_at(&self, issued_at: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let claims = Claims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + TOKEN_TTL_SECS,
        };
        // Claims serialization cannot fail: plain strings and integers.
        let claims_json = serde_json::to_vec(&claims).unwrap_or_default();
        let signing_input = format!("{header}.{}", URL_SAFE_NO_PAD.encode(claims_json));

        let signature = self.signing_key.sign(signing_input.as_bytes());
        format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    /// Exchange a fresh assertion for a bearer access token.
    pub async fn fetch_token(&self, client: &reqwest::Client) -> Result<String, WriteError> {
        let assertion = self.build_assertion();
        let resp = client
            .post(&self.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(WriteError::Authentication(format!(
                "token exchange failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| WriteError::Malformed(format!("token response decode failed: {e}")))?;
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};

    fn test_pem() -> String {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
    }

    fn test_key(pem: String) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "robot@example.iam.gserviceaccount.com".to_string(),
            private_key: pem,
            token_uri: "https://oauth2.example.com/token".to_string(),
        }
    }

    #[test]
    fn assertion_has_three_segments_with_expected_claims() {
        let auth = SheetsAuth::new(&test_key(test_pem())).unwrap();
        let assertion = auth.build_assertion_at(1_754_000_000);

        let segments: Vec<&str> = assertion.split('.').collect();
        assert_eq!(segments.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["typ"], "JWT");

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[1]).unwrap()).unwrap();
        assert_eq!(claims["iss"], "robot@example.iam.gserviceaccount.com");
        assert_eq!(claims["aud"], "https://oauth2.example.com/token");
        assert_eq!(claims["scope"], SHEETS_SCOPE);
        assert_eq!(claims["iat"], 1_754_000_000_i64);
        assert_eq!(claims["exp"], 1_754_000_000_i64 + TOKEN_TTL_SECS);

        assert!(!URL_SAFE_NO_PAD.decode(segments[2]).unwrap().is_empty());
    }

    #[test]
    fn escaped_newlines_in_pem_are_normalized() {
        let pem = test_pem().replace('\n', "\\n");
        assert!(SheetsAuth::new(&test_key(pem)).is_ok());
    }

    #[test]
    fn invalid_pem_is_a_signing_error() {
        let err = SheetsAuth::new(&test_key("not a pem".to_string())).unwrap_err();
        assert!(matches!(err, WriteError::Signing(_)));
    }

    #[test]
    fn missing_env_var_is_a_configuration_error() {
        std::env::remove_var(SERVICE_ACCOUNT_ENV);
        let err = ServiceAccountKey::from_env().unwrap_err();
        assert!(matches!(err, WriteError::Configuration(_)));
        assert!(err.to_string().contains(SERVICE_ACCOUNT_ENV));
    }

    #[test]
    fn token_uri_defaults_when_absent_from_key_json() {
        let key: ServiceAccountKey = serde_json::from_str(
            r#"{"client_email": "robot@example.com", "private_key": "pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let auth = SheetsAuth::new(&test_key(test_pem())).unwrap();
        let debug = format!("{auth:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("PRIVATE KEY"));
    }
}
