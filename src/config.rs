use crate::{
    config::date_locale::DateLocaleConfig,
    error::{
        BadEnvVarSnafu, InvalidApiUrlSnafu, InvalidHostRewriteSnafu, ParseNumberSnafu,
        PortalResult,
    },
};
use secrecy::SecretString;
use snafu::{OptionExt, ResultExt};
use std::{env::VarError, sync::Arc, time::Duration};

pub mod date_locale;

const DEFAULT_SERVER_IP: &str = "127.0.0.1:8080";
const DEFAULT_ADMIN: &str = "admin";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    api_config: Arc<ApiConfig>,
    admin_credentials: Arc<AdminCredentials>,
    date_locale: Arc<DateLocaleConfig>,
    server_ip: String,
    upload_limit_bytes: usize,
}

impl RuntimeConfiguration {
    pub fn new() -> PortalResult<Self> {
        Self::from_lookup(|name| dotenvy::var(name))
    }

    /// Builds the configuration from any `dotenvy::var`-shaped lookup, which keeps tests off the process env.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Result<String, dotenvy::Error>,
    ) -> PortalResult<Self> {
        let env = EnvReader(lookup);

        Ok(Self {
            api_config: Arc::new(ApiConfig::new(&env)?),
            admin_credentials: Arc::new(AdminCredentials {
                user: env.optional("PORTAL_ADMIN_USER")?.unwrap_or_else(|| DEFAULT_ADMIN.to_string()),
                password: SecretString::from(
                    env.optional("PORTAL_ADMIN_PASSWORD")?
                        .unwrap_or_else(|| DEFAULT_ADMIN.to_string()),
                ),
            }),
            date_locale: Arc::new(DateLocaleConfig::new(
                env.optional("PORTAL_TIMEZONE")?.unwrap_or_else(|| "UTC".to_string()),
                env.optional("PORTAL_LOCALE")?.unwrap_or_else(|| "en-GB".to_string()),
                env.optional("PORTAL_HOUR_CYCLE")?.unwrap_or_else(|| "h23".to_string()),
                env.optional("PORTAL_CALENDAR")?.unwrap_or_else(|| "gregorian".to_string()),
            )?),
            server_ip: env
                .optional("PORTAL_SERVER_IP")?
                .unwrap_or_else(|| DEFAULT_SERVER_IP.to_string()),
            upload_limit_bytes: env
                .optional_number("PORTAL_UPLOAD_LIMIT_BYTES")?
                .unwrap_or(DEFAULT_UPLOAD_LIMIT),
        })
    }

    pub fn api_config(&self) -> Arc<ApiConfig> {
        self.api_config.clone()
    }

    pub fn admin_credentials(&self) -> Arc<AdminCredentials> {
        self.admin_credentials.clone()
    }

    pub fn date_locale(&self) -> Arc<DateLocaleConfig> {
        self.date_locale.clone()
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    pub const fn upload_limit_bytes(&self) -> usize {
        self.upload_limit_bytes
    }
}

struct EnvReader<F>(F);

impl<F: Fn(&'static str) -> Result<String, dotenvy::Error>> EnvReader<F> {
    fn required(&self, name: &'static str) -> PortalResult<String> {
        (self.0)(name).context(BadEnvVarSnafu { name })
    }

    fn optional(&self, name: &'static str) -> PortalResult<Option<String>> {
        match (self.0)(name) {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(dotenvy::Error::EnvVar(VarError::NotPresent)) => Ok(None),
            Err(source) => Err(source).context(BadEnvVarSnafu { name }),
        }
    }

    fn optional_number<N: std::str::FromStr<Err = std::num::ParseIntError>>(
        &self,
        name: &'static str,
    ) -> PortalResult<Option<N>> {
        self.optional(name)?
            .map(|raw| raw.trim().parse().context(ParseNumberSnafu { name }))
            .transpose()
    }
}

#[derive(Debug)]
pub struct ApiConfig {
    base_url: String,
    timeout: Duration,
    download_host_rewrite: Option<(String, String)>,
}

impl ApiConfig {
    fn new<F: Fn(&'static str) -> Result<String, dotenvy::Error>>(
        env: &EnvReader<F>,
    ) -> PortalResult<Self> {
        let base_url = env.required("PORTAL_API_URL")?;
        snafu::ensure!(
            reqwest::Url::parse(&base_url).is_ok(),
            InvalidApiUrlSnafu { url: base_url }
        );

        let download_host_rewrite = env
            .optional("PORTAL_DOWNLOAD_HOST_REWRITE")?
            .map(|provided| {
                provided
                    .split_once('=')
                    .filter(|(from, _)| !from.is_empty())
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .context(InvalidHostRewriteSnafu { provided: provided.clone() })
            })
            .transpose()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(
                env.optional_number("PORTAL_API_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            download_host_rewrite,
        })
    }

    #[cfg(test)]
    pub fn for_tests(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(5),
            download_host_rewrite: Some(("minio-school".into(), "localhost".into())),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Links handed out by the API point at hosts only reachable inside its own network.
    pub fn rewrite_download_link(&self, link: &str) -> String {
        match &self.download_host_rewrite {
            Some((from, to)) => link.replacen(from.as_str(), to, 1),
            None => link.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct AdminCredentials {
    pub user: String,
    pub password: SecretString,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(
        vars: &[(&'static str, &'static str)],
    ) -> impl Fn(&'static str) -> Result<String, dotenvy::Error> {
        let vars: HashMap<_, _> = vars.iter().copied().collect();
        move |name| {
            vars.get(name)
                .map(ToString::to_string)
                .ok_or(dotenvy::Error::EnvVar(VarError::NotPresent))
        }
    }

    #[test]
    fn defaults_fill_everything_but_the_api_url() {
        let config =
            RuntimeConfiguration::from_lookup(lookup(&[("PORTAL_API_URL", "http://api:8000/")]))
                .unwrap();

        assert_eq!(config.api_config().base_url(), "http://api:8000");
        assert_eq!(config.api_config().timeout(), Duration::from_secs(30));
        assert_eq!(config.server_ip(), "127.0.0.1:8080");
        assert_eq!(config.admin_credentials().user, "admin");
        assert_eq!(config.upload_limit_bytes(), 20 * 1024 * 1024);
        assert_eq!(
            config.api_config().rewrite_download_link("http://minio-school:9000/r.xlsx"),
            "http://minio-school:9000/r.xlsx"
        );
    }

    #[test]
    fn missing_api_url_is_an_error() {
        let err = RuntimeConfiguration::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, crate::error::PortalError::BadEnvVar { name: "PORTAL_API_URL", .. }));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(
            RuntimeConfiguration::from_lookup(lookup(&[("PORTAL_API_URL", "not a url")])).is_err()
        );
        assert!(
            RuntimeConfiguration::from_lookup(lookup(&[
                ("PORTAL_API_URL", "http://api"),
                ("PORTAL_API_TIMEOUT_SECS", "soon"),
            ]))
            .is_err()
        );
        assert!(
            RuntimeConfiguration::from_lookup(lookup(&[
                ("PORTAL_API_URL", "http://api"),
                ("PORTAL_DOWNLOAD_HOST_REWRITE", "no-equals-sign"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn date_display_settings_come_from_env() {
        let err = RuntimeConfiguration::from_lookup(lookup(&[
            ("PORTAL_API_URL", "http://api"),
            ("PORTAL_HOUR_CYCLE", "h25"),
        ]))
        .unwrap_err();
        assert!(matches!(err, crate::error::PortalError::InvalidHourCycle { .. }));

        let err = RuntimeConfiguration::from_lookup(lookup(&[
            ("PORTAL_API_URL", "http://api"),
            ("PORTAL_CALENDAR", "lunar"),
        ]))
        .unwrap_err();
        assert!(matches!(err, crate::error::PortalError::InvalidCalendarAlgorithm { .. }));

        assert!(
            RuntimeConfiguration::from_lookup(lookup(&[
                ("PORTAL_API_URL", "http://api"),
                ("PORTAL_HOUR_CYCLE", "h12"),
                ("PORTAL_CALENDAR", "buddhist"),
            ]))
            .is_ok()
        );
    }

    #[test]
    fn host_rewrite_applies_to_download_links() {
        let config = RuntimeConfiguration::from_lookup(lookup(&[
            ("PORTAL_API_URL", "http://api"),
            ("PORTAL_DOWNLOAD_HOST_REWRITE", "minio-school=localhost"),
        ]))
        .unwrap();

        assert_eq!(
            config
                .api_config()
                .rewrite_download_link("http://minio-school:9000/reports/a.xlsx"),
            "http://localhost:9000/reports/a.xlsx"
        );
    }
}
