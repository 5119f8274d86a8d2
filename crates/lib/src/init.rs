//! Initialize the configuration directory: create ~/.parley, a default config, and the bundled language packs.
//!
//! Layout mirrors `crates/lib/config/`: `config/lang/` → `~/.parley/lang/`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;
use crate::survey::BUNDLED_PACKS;

const DEFAULT_CONFIG: &str = r#"{
  "channels": {
    "telegram": {},
    "vk": {}
  },
  "survey": {
    "language": "en",
    "recordsPath": "records.jsonl"
  }
}
"#;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` from the default template if missing.
/// - Extracts the bundled language packs into `lang` if it does not exist, so they can be copied and edited.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config::config_dir(config_path);
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let lang_dir = config_dir.join("lang");
    if !lang_dir.exists() {
        std::fs::create_dir_all(&lang_dir)
            .with_context(|| format!("creating language pack directory {}", lang_dir.display()))?;
        if let Err(e) = BUNDLED_PACKS.extract(&lang_dir) {
            anyhow::bail!(
                "extracting bundled language packs to {}: {}",
                lang_dir.display(),
                e
            );
        }
        log::info!("extracted bundled language packs to {}", lang_dir.display());
    } else {
        log::debug!("language pack directory already exists at {}, skipping", lang_dir.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::LanguagePack;

    #[test]
    fn init_writes_config_and_packs() {
        let dir = std::env::temp_dir().join(format!("parley-init-test-{}", uuid::Uuid::new_v4()));
        let config_path = dir.join("config.json");
        let created = init_config_dir(&config_path).unwrap();
        assert_eq!(created, dir);

        let (config, _) = config::load_config(Some(config_path.clone())).unwrap();
        assert_eq!(config.survey.language.as_deref(), Some("en"));
        let pack = LanguagePack::load(&dir.join("lang").join("ru.yaml")).unwrap();
        assert_eq!(pack, LanguagePack::bundled("ru").unwrap());

        std::fs::write(&config_path, "{}").unwrap();
        init_config_dir(&config_path).unwrap();
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "{}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
