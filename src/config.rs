use std::path::Path;

/// Name given to the instance configured through the un-suffixed variables.
/// It is never shown in labels.
pub const DEFAULT_INSTANCE: &str = "Default";

const DEFAULT_ENV_FILE: &str = "/opt/apps/compose/.env";

/// One configured endpoint of a service family.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInstance {
    pub name: String,
    pub url: String,
    pub credential: String,
    pub enabled: bool,
}

impl ServiceInstance {
    /// Disabled or credential-less instances are excluded without a network call.
    pub fn is_pollable(&self) -> bool {
        self.enabled && !self.credential.is_empty()
    }

    pub fn label(&self, family: &str) -> String {
        if self.name == DEFAULT_INSTANCE {
            family.to_string()
        } else {
            format!("{} ({})", family, self.name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub repo: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub plex: Vec<ServiceInstance>,
    pub jellyfin: Vec<ServiceInstance>,
    pub sonarr: Vec<ServiceInstance>,
    pub radarr: Vec<ServiceInstance>,
    pub organizr: Vec<ServiceInstance>,
    pub tank_mount: String,
    pub update: UpdateConfig,
}

/// Per-family variable layout: prefix, credential suffix and default URL.
struct FamilyKeys {
    prefix: &'static str,
    credential: &'static str,
    default_url: &'static str,
}

const PLEX: FamilyKeys = FamilyKeys { prefix: "PLEX", credential: "TOKEN", default_url: "http://localhost:32400" };
const JELLYFIN: FamilyKeys = FamilyKeys { prefix: "JELLYFIN", credential: "TOKEN", default_url: "http://localhost:8096" };
const SONARR: FamilyKeys = FamilyKeys { prefix: "SONARR", credential: "API_KEY", default_url: "http://localhost:8989" };
const RADARR: FamilyKeys = FamilyKeys { prefix: "RADARR", credential: "API_KEY", default_url: "http://localhost:7878" };
const ORGANIZR: FamilyKeys = FamilyKeys { prefix: "ORGANIZR", credential: "API_KEY", default_url: "http://localhost" };

impl Config {
    /// Loads the env file (if any) and then reads the process environment.
    pub fn load() -> Config {
        let env_file = std::env::var("ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
        load_env_file(Path::new(&env_file));
        Config::from_env()
    }

    pub fn from_env() -> Config {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Config {
            plex: family_instances(&PLEX, &get),
            jellyfin: family_instances(&JELLYFIN, &get),
            sonarr: family_instances(&SONARR, &get),
            radarr: family_instances(&RADARR, &get),
            organizr: family_instances(&ORGANIZR, &get),
            tank_mount: get_or("TANK_MOUNT", "/mnt/tank"),
            update: UpdateConfig {
                repo: get_or("MOTD_UPDATE_REPO", "motd-rs/motd"),
                api_base: get_or("MOTD_UPDATE_API", "https://api.github.com")
                    .trim_end_matches('/')
                    .to_string(),
            },
        }
    }

    /// True when at least one instance of any family would be polled.
    pub fn has_media_services(&self) -> bool {
        [&self.plex, &self.jellyfin, &self.sonarr, &self.radarr, &self.organizr]
            .iter()
            .any(|instances| instances.iter().any(ServiceInstance::is_pollable))
    }
}

fn family_instances<G>(keys: &FamilyKeys, get: &G) -> Vec<ServiceInstance>
where
    G: Fn(&str) -> Option<String>,
{
    let read = |var_prefix: &str, name: &str, default_url: &str| ServiceInstance {
        name: name.to_string(),
        url: get(&format!("{}_URL", var_prefix))
            .unwrap_or_else(|| default_url.to_string())
            .trim_end_matches('/')
            .to_string(),
        credential: get(&format!("{}_{}", var_prefix, keys.credential)).unwrap_or_default(),
        enabled: get(&format!("{}_ENABLED", var_prefix))
            .map(|v| parse_flag(&v))
            .unwrap_or(true),
    };

    let mut instances = vec![read(keys.prefix, DEFAULT_INSTANCE, keys.default_url)];

    if let Some(list) = get(&format!("{}_INSTANCES", keys.prefix)) {
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let var_prefix = format!("{}_{}", keys.prefix, env_segment(name));
            // Extra instances have no implicit localhost URL.
            instances.push(read(&var_prefix, name, ""));
        }
    }

    instances
}

fn env_segment(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn load_env_file(path: &Path) {
    if !path.is_file() {
        return;
    }
    match dotenvy::from_path_override(path) {
        Ok(()) => tracing::debug!("loaded environment from {}", path.display()),
        Err(e) => tracing::warn!("failed to read {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn default_instance_uses_builtin_url() {
        let config = config_from(&[]);
        assert_eq!(config.plex.len(), 1);
        assert_eq!(config.plex[0].name, DEFAULT_INSTANCE);
        assert_eq!(config.plex[0].url, "http://localhost:32400");
        assert!(!config.plex[0].is_pollable());
        assert!(!config.has_media_services());
    }

    #[test]
    fn named_instances_are_read_in_order() {
        let config = config_from(&[
            ("SONARR_API_KEY", "main"),
            ("SONARR_INSTANCES", "anime, 4k"),
            ("SONARR_ANIME_URL", "http://anime:8989/"),
            ("SONARR_ANIME_API_KEY", "a"),
            ("SONARR_4K_URL", "http://uhd:8989"),
            ("SONARR_4K_API_KEY", "b"),
            ("SONARR_4K_ENABLED", "false"),
        ]);

        let names: Vec<_> = config.sonarr.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Default", "anime", "4k"]);
        assert_eq!(config.sonarr[1].url, "http://anime:8989");
        assert!(config.sonarr[1].is_pollable());
        assert!(!config.sonarr[2].is_pollable());
        assert!(config.has_media_services());
    }

    #[test]
    fn label_hides_default_name() {
        let mut instance = ServiceInstance {
            name: DEFAULT_INSTANCE.to_string(),
            url: String::new(),
            credential: "k".to_string(),
            enabled: true,
        };
        assert_eq!(instance.label("Radarr"), "Radarr");
        instance.name = "kids".to_string();
        assert_eq!(instance.label("Radarr"), "Radarr (kids)");
    }

    #[test]
    fn enabled_flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("OFF"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn env_file_overrides_process_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "MOTD_ENV_FILE_OVERRIDE_URL=http://from-file:1\n").unwrap();
        std::env::set_var("MOTD_ENV_FILE_OVERRIDE_URL", "http://from-process:1");

        load_env_file(&path);
        assert_eq!(
            std::env::var("MOTD_ENV_FILE_OVERRIDE_URL").unwrap(),
            "http://from-file:1"
        );

        load_env_file(&dir.path().join("absent.env"));
        assert_eq!(
            std::env::var("MOTD_ENV_FILE_OVERRIDE_URL").unwrap(),
            "http://from-file:1"
        );
        std::env::remove_var("MOTD_ENV_FILE_OVERRIDE_URL");
    }

    #[test]
    fn update_api_is_trimmed() {
        let config = config_from(&[("MOTD_UPDATE_API", "http://mirror.local/")]);
        assert_eq!(config.update.api_base, "http://mirror.local");
        assert_eq!(config.update.repo, "motd-rs/motd");
    }
}
