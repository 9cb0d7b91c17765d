//! Research profiles.
//!
//! A profile fixes everything that differs between research runs: the
//! artifact column schema, where artifacts live, the name of the combined
//! dataset, and the default filters and timeout.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Fixed, versioned column schema of an artifact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSchema {
    pub name: &'static str,
    pub version: u32,
    columns: &'static [&'static str],
}

impl ArtifactSchema {
    pub const fn new(name: &'static str, version: u32, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            version,
            columns,
        }
    }

    /// Canonical column order.
    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    /// Comma-joined header line, as the worker must write it.
    pub fn header_line(&self) -> String {
        self.columns.join(",")
    }

    /// Required columns absent from `header`, in canonical order.
    pub fn missing_columns<S: AsRef<str>>(&self, header: &[S]) -> Vec<&'static str> {
        let present: HashSet<&str> = header.iter().map(|h| h.as_ref()).collect();
        self.columns
            .iter()
            .copied()
            .filter(|c| !present.contains(c))
            .collect()
    }
}

pub const EMULATORS_SCHEMA: ArtifactSchema = ArtifactSchema::new(
    "emulators",
    1,
    &[
        "platform",
        "emulator_name",
        "supported_os",
        "homepage",
        "winget_id",
        "homebrew_formula",
        "flatpak_id",
        "retroarch_core",
        "save_directory",
        "save_extensions",
        "notes",
    ],
);

pub const ROM_SOURCES_SCHEMA: ArtifactSchema = ArtifactSchema::new(
    "rom_sources",
    1,
    &[
        "platform",
        "source_name",
        "url",
        "content_type",
        "set_format",
        "download_method",
        "size",
        "requires_login",
        "requires_bios",
        "bios_included",
        "bios_source",
        "recommended",
        "notes",
    ],
);

/// Platforms that are not emulation targets and have no ROM sets.
const NON_ROM_PLATFORMS: &[&str] = &[
    "Windows",
    "Linux",
    "Sony Playstation 5",
    "Microsoft Xbox Series X/S",
    "Android",
    "Apple iOS",
    "Apple Mac OS",
    "Web Browser",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Emulators,
    #[default]
    RomSources,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emulators => "emulators",
            Self::RomSources => "rom_sources",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "emulators" => Ok(Self::Emulators),
            "rom_sources" | "rom-sources" => Ok(Self::RomSources),
            other => Err(CoreError::UnknownProfile(other.to_string())),
        }
    }

    pub fn profile(&self) -> &'static ResearchProfile {
        match self {
            Self::Emulators => &EMULATORS,
            Self::RomSources => &ROM_SOURCES,
        }
    }
}

impl std::str::FromStr for ProfileKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchProfile {
    pub kind: ProfileKind,
    pub schema: ArtifactSchema,
    /// Artifact store directory, relative to the working directory.
    pub output_dir: &'static str,
    /// File name of the combined dataset inside the store.
    pub combined_file: &'static str,
    pub timeout_secs: u64,
    pub min_weight: i64,
    pub skip: &'static [&'static str],
}

impl ResearchProfile {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub const EMULATORS: ResearchProfile = ResearchProfile {
    kind: ProfileKind::Emulators,
    schema: EMULATORS_SCHEMA,
    output_dir: "emulator_details",
    combined_file: "all_emulators.csv",
    timeout_secs: 300,
    min_weight: 0,
    skip: &[],
};

pub const ROM_SOURCES: ResearchProfile = ResearchProfile {
    kind: ProfileKind::RomSources,
    schema: ROM_SOURCES_SCHEMA,
    output_dir: "rom_sources",
    combined_file: "all_rom_sources.csv",
    timeout_secs: 600,
    min_weight: 10,
    skip: NON_ROM_PLATFORMS,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_line_matches_columns() {
        assert_eq!(
            EMULATORS_SCHEMA.header_line(),
            "platform,emulator_name,supported_os,homepage,winget_id,homebrew_formula,flatpak_id,retroarch_core,save_directory,save_extensions,notes"
        );
        assert_eq!(ROM_SOURCES_SCHEMA.columns().len(), 13);
    }

    #[test]
    fn test_missing_columns_in_canonical_order() {
        let header = vec!["notes", "platform", "url", "extra"];
        let missing = ROM_SOURCES_SCHEMA.missing_columns(&header);
        assert_eq!(missing.first(), Some(&"source_name"));
        assert!(!missing.contains(&"platform"));
        assert!(!missing.contains(&"url"));
        assert_eq!(missing.len(), 10);
    }

    #[test]
    fn test_superset_header_has_nothing_missing() {
        let mut header: Vec<String> = EMULATORS_SCHEMA
            .columns()
            .iter()
            .map(|c| c.to_string())
            .collect();
        header.reverse();
        header.push("confidence".to_string());
        assert!(EMULATORS_SCHEMA.missing_columns(&header).is_empty());
    }

    #[test]
    fn test_profile_kind_parse() {
        assert_eq!(ProfileKind::parse("emulators").unwrap(), ProfileKind::Emulators);
        assert_eq!(ProfileKind::parse("rom-sources").unwrap(), ProfileKind::RomSources);
        assert!(ProfileKind::parse("bios").is_err());
    }

    #[test]
    fn test_profile_defaults() {
        let rom = ProfileKind::RomSources.profile();
        assert_eq!(rom.timeout(), Duration::from_secs(600));
        assert_eq!(rom.min_weight, 10);
        assert!(rom.skip.contains(&"Web Browser"));

        let emu = ProfileKind::Emulators.profile();
        assert_eq!(emu.combined_file, "all_emulators.csv");
        assert!(emu.skip.is_empty());
    }

    #[test]
    fn test_profile_kind_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            profile: ProfileKind,
        }
        let parsed: Wrapper = toml::from_str("profile = \"emulators\"").unwrap();
        assert_eq!(parsed.profile, ProfileKind::Emulators);
    }
}
