//! Upstream credential handling.
//!
//! The credential is resolved once at startup and moved into the direct
//! transport. It has no `Display` or `Serialize` impl and its `Debug`
//! output is redacted, so it cannot end up in logs or response bodies by
//! accident.

/// Credential variables, checked in this order when `upstream.api_key_env`
/// is not set.
pub const CREDENTIAL_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

const REDACTED: &str = "[REDACTED]";

/// Secret used to authenticate against the generative model API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the secret in `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, REDACTED)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(")?;
        f.write_str(REDACTED)?;
        f.write_str(")")
    }
}

/// A credential plus the name of the variable it came from.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub credential: Credential,
    pub source: String,
}

/// Variables consulted for a given `api_key_env` setting, in order.
pub fn candidate_variables(api_key_env: Option<&str>) -> Vec<String> {
    match api_key_env {
        Some(name) => vec![name.to_string()],
        None => CREDENTIAL_ENV_VARS.iter().map(|v| v.to_string()).collect(),
    }
}

/// Resolve the credential using `lookup` for variable access.
///
/// Blank values are skipped, so an exported-but-empty variable does not
/// shadow a later one.
pub fn resolve_credential<F>(api_key_env: Option<&str>, lookup: F) -> Option<ResolvedCredential>
where
    F: Fn(&str) -> Option<String>,
{
    candidate_variables(api_key_env)
        .into_iter()
        .find_map(|name| {
            let value = lookup(&name)?;
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some(ResolvedCredential {
                    credential: Credential::new(value),
                    source: name,
                })
            }
        })
}

/// Resolve the credential from the process environment.
pub fn resolve_from_env(api_key_env: Option<&str>) -> Option<ResolvedCredential> {
    resolve_credential(api_key_env, |name| std::env::var(name).ok())
}
