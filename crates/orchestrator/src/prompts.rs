use std::path::Path;

use research_core::{ProfileKind, ResearchProfile, Subject};

const WIKI_BASE: &str = "https://emulation.gametechwiki.com";

/// Catalog names whose wiki page title is not a plain underscore rewrite.
const WIKI_PAGE_NAMES: &[(&str, &str)] = &[
    ("Nintendo Entertainment System", "Nintendo_Entertainment_System"),
    ("Super Nintendo Entertainment System", "Super_Nintendo_Entertainment_System"),
    ("Sony Playstation", "PlayStation"),
    ("Sony Playstation 2", "PlayStation_2"),
    ("Sony Playstation 3", "PlayStation_3"),
    ("Sony Playstation 4", "PlayStation_4"),
    ("Sony Playstation 5", "PlayStation_5"),
    ("Sony PSP", "PlayStation_Portable"),
    ("Sony Playstation Vita", "PlayStation_Vita"),
    ("Sega Dreamcast", "Dreamcast"),
    ("Sega Master System", "Master_System"),
    ("Sega Game Gear", "Master_System/Game_Gear"),
    ("Microsoft Xbox", "Xbox"),
    ("Microsoft Xbox 360", "Xbox_360"),
    ("Microsoft Xbox One", "Xbox_One"),
    ("NEC TurboGrafx-16", "PC_Engine_(TurboGrafx-16)"),
    ("NEC TurboGrafx-CD", "PC_Engine_(TurboGrafx-16)"),
    ("Commodore Amiga", "Amiga"),
    ("SNK Neo Geo AES", "Neo_Geo"),
    ("SNK Neo Geo MVS", "Neo_Geo"),
    ("SNK Neo Geo CD", "Neo_Geo"),
    ("SNK Neo Geo Pocket", "Neo_Geo_Pocket"),
    ("SNK Neo Geo Pocket Color", "Neo_Geo_Pocket"),
];

/// Wiki page title used to look up a platform's emulator page.
pub fn wiki_page_name(subject: &Subject) -> String {
    WIKI_PAGE_NAMES
        .iter()
        .find(|(name, _)| *name == subject.as_str())
        .map(|(_, page)| page.to_string())
        .unwrap_or_else(|| subject.as_str().replace([' ', '-'], "_"))
}

pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Instructions handed to the worker for one subject. The worker must
    /// write its CSV to `output_path`.
    pub fn build(profile: &ResearchProfile, subject: &Subject, output_path: &Path) -> String {
        match profile.kind {
            ProfileKind::Emulators => Self::emulators(profile, subject, output_path),
            ProfileKind::RomSources => Self::rom_sources(profile, subject, output_path),
        }
    }

    fn emulators(profile: &ResearchProfile, subject: &Subject, output_path: &Path) -> String {
        format!(
            r#"Research the recommended emulators for the "{platform}" platform using the Emulation General Wiki.

## Where to look
Start at {wiki_base}/index.php/{page}_emulators and follow links from there.
Recommended emulators are marked with checkmarks, green cells, or "Recommended".

## For each recommended emulator collect
- Name and official homepage
- Supported operating systems (Windows, Linux, macOS, Android, iOS)
- Package identifiers: winget ID, Homebrew formula or cask, Flatpak app ID
- libretro/RetroArch core name, if one exists
- Default save directory (Linux convention) and save file extensions

## Output
Write a CSV file to: `{output_path}`

The first line MUST be exactly:
{header}

- `platform` is always "{platform}"
- Separate multiple values inside one field with semicolons
- Leave unknown fields empty (never "N/A" or "unknown")
- Quote fields that contain commas
- One row per emulator
- If no recommended emulators exist, write one row with platform "{platform}" and notes "No recommended emulators found""#,
            platform = subject,
            wiki_base = WIKI_BASE,
            page = wiki_page_name(subject),
            output_path = output_path.display(),
            header = profile.schema.header_line(),
        )
    }

    fn rom_sources(profile: &ResearchProfile, subject: &Subject, output_path: &Path) -> String {
        format!(
            r#"Research download sources for ROM sets, BIOS files, firmware and keys for the "{platform}" platform.

## Where to look
archive.org collections, myrient (No-Intro, Redump, TOSEC sets), pleasuredome,
retro-exo, cdromance, Vimm's Lair, edgeemulation, the r/roms megathread, and the
No-Intro / Redump / TOSEC dat sites. Visit each URL to confirm it works for this platform.

## For each source collect
- Source name and the exact URL for this platform
- content_type: full_set, individual, bios_only or mixed
- set_format: No-Intro, Redump, TOSEC, GoodTools, or empty
- download_method: direct, torrent, usenet, or empty
- Approximate size, whether a login is required
- Whether the platform needs BIOS files, whether they are included, and where to get them
- Whether this is a recommended primary source

## Output
Write a CSV file to: `{output_path}`

The first line MUST be exactly:
{header}

- `platform` is always "{platform}"
- yes/no fields use lowercase `yes` or `no`
- Separate multiple values inside one field with semicolons
- Leave unknown fields empty (never "N/A" or "unknown")
- Quote fields that contain commas
- One row per source; mark the best full-set source and the best BIOS source as recommended
- If no sources exist, write one row with platform "{platform}" and notes "No sources found""#,
            platform = subject,
            output_path = output_path.display(),
            header = profile.schema.header_line(),
        )
    }
}
