use crate::config::types::{
    BoardEntry, Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteConfig, UserAgentConfig,
};
use crate::extract::Ruleset;
use crate::site::{BoardPath, SiteBase};
use crate::ConfigError;
use std::collections::{HashMap, HashSet};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_boards(&config.boards)?;
    Ok(())
}

/// Validates the site section
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    SiteBase::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    Ruleset::from_id(&config.ruleset, &config.site_name)?;

    if config.site_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "site-name cannot be empty".to_string(),
        ));
    }

    if let Some(path) = &config.member_list_path {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "member-list-path must be an absolute path, got '{}'",
                path
            )));
        }
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_workers < 1 || config.max_concurrent_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-workers must be between 1 and 64, got {}",
            config.max_concurrent_workers
        )));
    }

    if config.max_pages_per_traversal < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages-per-traversal must be >= 1, got {}",
            config.max_pages_per_traversal
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.pages_dir, Some(dir) if dir.is_empty()) {
        return Err(ConfigError::Validation(
            "pages-dir cannot be empty when set".to_string(),
        ));
    }

    if matches!(&config.summary_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates board entries and their parent relationships
fn validate_boards(boards: &[BoardEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in boards {
        if BoardPath::parse(&entry.path).is_none() {
            return Err(ConfigError::InvalidBoardPath(format!(
                "'{}' does not end in _b<number>/",
                entry.path
            )));
        }

        if !seen.insert(entry.path.trim()) {
            return Err(ConfigError::Validation(format!(
                "Board '{}' is configured twice",
                entry.path
            )));
        }
    }

    let parents: HashMap<&str, Option<&str>> = boards
        .iter()
        .map(|b| (b.path.trim(), b.parent.as_deref().map(str::trim)))
        .collect();

    for entry in boards {
        let Some(parent) = entry.parent.as_deref().map(str::trim) else {
            continue;
        };

        if !parents.contains_key(parent) {
            return Err(ConfigError::Validation(format!(
                "Parent '{}' of board '{}' is not a configured board",
                parent, entry.path
            )));
        }

        // Walk up the chain; revisiting the start means a cycle
        let mut current = Some(parent);
        let mut steps = 0;
        while let Some(path) = current {
            if path == entry.path.trim() || steps > boards.len() {
                return Err(ConfigError::Validation(format!(
                    "Board '{}' is its own ancestor",
                    entry.path
                )));
            }
            current = parents.get(path).copied().flatten();
            steps += 1;
        }
    }

    Ok(())
}
