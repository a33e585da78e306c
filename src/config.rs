use url::Url;

/// Fixed analyzer timeout used when `SCORING_TIMEOUT_SECS` is not set.
pub const DEFAULT_SCORING_TIMEOUT_SECS: u64 = 300;

/// The session stores three keys; a smaller cache evicts the scoring result.
pub const MIN_SESSION_CACHE_CAPACITY: u64 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the external risk analyzer. `None` runs the offline model.
    pub scoring_api_url: Option<String>,
    pub scoring_timeout_secs: u64,
    pub session_cache_capacity: u64,
    pub upload_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            scoring_api_url: None,
            scoring_timeout_secs: DEFAULT_SCORING_TIMEOUT_SECS,
            session_cache_capacity: 64,
            upload_limit_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            scoring_api_url: std::env::var("SCORING_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| validate_base_url(&url))
                .transpose()?,
            scoring_timeout_secs: std::env::var("SCORING_TIMEOUT_SECS")
                .ok()
                .map(|secs| {
                    secs.parse::<u64>()
                        .ok()
                        .filter(|s| *s > 0)
                        .ok_or_else(|| {
                            anyhow::anyhow!("SCORING_TIMEOUT_SECS must be a positive integer")
                        })
                })
                .transpose()?
                .unwrap_or(defaults.scoring_timeout_secs),
            session_cache_capacity: std::env::var("SESSION_CACHE_CAPACITY")
                .ok()
                .map(|cap| parse_session_capacity(&cap))
                .transpose()?
                .unwrap_or(defaults.session_cache_capacity),
            upload_limit_bytes: std::env::var("UPLOAD_LIMIT_MB")
                .ok()
                .map(|mb| {
                    mb.parse::<usize>()
                        .map(|mb| mb * 1024 * 1024)
                        .map_err(|_| anyhow::anyhow!("UPLOAD_LIMIT_MB must be a valid number"))
                })
                .transpose()?
                .unwrap_or(defaults.upload_limit_bytes),
        };

        tracing::debug!("Server Port: {}", config.port);
        match config.scoring_api_url {
            Some(ref url) => tracing::info!("Scoring API URL configured: {}", url),
            None => tracing::warn!("SCORING_API_URL not set, using the offline scoring model"),
        }
        tracing::debug!("Scoring timeout: {}s", config.scoring_timeout_secs);

        Ok(config)
    }
}

pub fn parse_session_capacity(value: &str) -> anyhow::Result<u64> {
    let capacity = value
        .trim()
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("SESSION_CACHE_CAPACITY must be a valid number"))?;
    if capacity < MIN_SESSION_CACHE_CAPACITY {
        anyhow::bail!(
            "SESSION_CACHE_CAPACITY must be at least {}",
            MIN_SESSION_CACHE_CAPACITY
        );
    }
    Ok(capacity)
}

/// Checks that `url` is an absolute http(s) URL and strips any trailing slash.
pub fn validate_base_url(url: &str) -> anyhow::Result<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| anyhow::anyhow!("SCORING_API_URL is not a valid URL: {}", e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("SCORING_API_URL must start with http:// or https://");
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_base_url() {
        assert_eq!(
            validate_base_url("http://localhost:8000/").unwrap(),
            "http://localhost:8000"
        );
        assert!(validate_base_url("ftp://analyzer.local").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn test_session_capacity_must_hold_every_key() {
        assert!(parse_session_capacity("0").is_err());
        assert!(parse_session_capacity("2").is_err());
        assert!(parse_session_capacity("many").is_err());
        assert_eq!(parse_session_capacity("3").unwrap(), 3);
        assert_eq!(parse_session_capacity(" 64 ").unwrap(), 64);
    }

    #[test]
    fn test_default_timeout_is_five_minutes() {
        assert_eq!(Config::default().scoring_timeout_secs, 300);
    }
}
