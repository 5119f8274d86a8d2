//! Language packs: every question text and option label of the survey.
//!
//! Packs are YAML. `en` and `ru` are bundled into the binary; a pack file on
//! disk can replace them (see `survey.languagePack` in the config).

use anyhow::{Context, Result};
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub static BUNDLED_PACKS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/config/lang");

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePack {
    /// The only text the entry state reacts to.
    pub start_command: String,
    pub start_hint: String,
    pub welcome: String,
    pub go_to_survey: String,
    pub confirm: String,
    pub thanks: String,
    pub questions: Questions,
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questions {
    pub name: String,
    pub age: String,
    pub city: String,
    pub request: String,
    pub health: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub yes: String,
    pub no: String,
    pub cancel: String,
    pub submit: String,
    pub change_name: String,
    pub change_age: String,
    pub change_city: String,
    pub change_request: String,
    pub change_health: String,
    pub change_contact: String,
}

impl LanguagePack {
    pub fn from_yaml(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// A pack compiled into the binary (`en`, `ru`).
    pub fn bundled(language: &str) -> Result<Self> {
        let file = BUNDLED_PACKS
            .get_file(format!("{}.yaml", language))
            .with_context(|| format!("no bundled language pack named {:?}", language))?;
        let s = file
            .contents_utf8()
            .with_context(|| format!("bundled language pack {:?} is not UTF-8", language))?;
        Self::from_yaml(s).with_context(|| format!("parsing bundled language pack {:?}", language))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading language pack from {}", path.display()))?;
        Self::from_yaml(&s).with_context(|| format!("parsing language pack from {}", path.display()))
    }

    /// Names of the bundled packs.
    pub fn bundled_names() -> Vec<String> {
        let mut names: Vec<String> = BUNDLED_PACKS
            .files()
            .filter_map(|f| {
                let path = f.path();
                if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                    path.file_stem().and_then(|s| s.to_str()).map(String::from)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }
}
