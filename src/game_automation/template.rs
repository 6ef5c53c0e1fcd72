//! Template assets: loading, naming, and priority

use std::io;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

/// The error type for template asset loading.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template directory {dir:?}: {source}")]
    DirectoryRead { dir: PathBuf, source: io::Error },

    #[error("failed to decode template {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("no entry templates found in {dir:?}")]
    NoEntryTemplates { dir: PathBuf },
}

/// A named marker image, loaded once per session.
#[derive(Debug, Clone)]
pub struct Template {
    /// File name, e.g. "20-1.png".
    pub name: String,
    /// Leading digits of the file name; 0 when absent. Higher is more
    /// urgent to act on.
    pub priority: i32,
    pub image: RgbaImage,
}

impl Template {
    pub fn from_file(path: &Path) -> TemplateResult<Self> {
        let image = image::open(path)
            .map_err(|source| TemplateError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let priority = parse_priority(&name);

        Ok(Self {
            name,
            priority,
            image,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Priority is the leading integer of a template name: "20.png" and
/// "20-1.png" both map to 20, anything without leading digits to 0.
pub fn parse_priority(name: &str) -> i32 {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// All marker templates for one automation session, grouped by the screen
/// phase they identify.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    /// Clickable entry buttons, sorted by priority descending. Required.
    pub entry: Vec<Template>,
    /// Lobby ("waiting") marker, visible after a successful entry click.
    pub lobby: Vec<Template>,
    /// Return button used to leave the lobby or the post-game screen.
    pub back: Vec<Template>,
    /// Marker visible while a game is running.
    pub in_game: Vec<Template>,
    /// Exit button shown when the game has finished.
    pub exit: Vec<Template>,
    /// Search flow markers, one step each.
    pub search_open: Vec<Template>,
    pub search_select: Vec<Template>,
    pub search_verify: Vec<Template>,
}

impl TemplateSet {
    /// Load every template category from the assets directory.
    ///
    /// Only the entry category is fatal when missing: without entry markers
    /// the bot has nothing to act on. Every other category logs a warning
    /// and stays empty, which simply means its transitions never fire.
    pub fn load(assets_dir: &Path) -> TemplateResult<Self> {
        let entry_dir = assets_dir.join("entry");
        let mut entry = load_directory(&entry_dir)?;
        if entry.is_empty() {
            return Err(TemplateError::NoEntryTemplates { dir: entry_dir });
        }
        // Highest priority first so the ROI fast path probes the most
        // urgent template before the rest.
        entry.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));

        let set = Self {
            entry,
            lobby: load_single_optional(&assets_dir.join("entry/verify/in.png")),
            back: load_single_optional(&assets_dir.join("entry/verify/out.png")),
            in_game: load_dir_optional(&assets_dir.join("ingame")),
            exit: load_dir_optional(&assets_dir.join("exit")),
            search_open: load_dir_optional(&assets_dir.join("search/step1")),
            search_select: load_dir_optional(&assets_dir.join("search/step2")),
            search_verify: load_dir_optional(&assets_dir.join("search/verify")),
        };

        log::info!(
            "loaded templates: entry={} lobby={} back={} ingame={} exit={} search={}/{}/{}",
            set.entry.len(),
            set.lobby.len(),
            set.back.len(),
            set.in_game.len(),
            set.exit.len(),
            set.search_open.len(),
            set.search_select.len(),
            set.search_verify.len()
        );
        Ok(set)
    }
}

/// PNG files directly inside `dir`, sorted by name. Subdirectories (e.g.
/// `entry/verify/`) are not descended into. Also used by the offline match
/// debugger on flat template directories.
pub fn load_directory(dir: &Path) -> TemplateResult<Vec<Template>> {
    let entries = std::fs::read_dir(dir).map_err(|source| TemplateError::DirectoryRead {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        match Template::from_file(&path) {
            Ok(template) => templates.push(template),
            Err(e) => log::warn!("skipping template: {e}"),
        }
    }
    Ok(templates)
}

fn load_dir_optional(dir: &Path) -> Vec<Template> {
    match load_directory(dir) {
        Ok(templates) => templates,
        Err(e) => {
            log::warn!("optional template category unavailable: {e}");
            Vec::new()
        }
    }
}

fn load_single_optional(path: &Path) -> Vec<Template> {
    match Template::from_file(path) {
        Ok(template) => vec![template],
        Err(e) => {
            log::warn!("optional template unavailable: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "screen-auto-run-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, rgb: [u8; 3]) {
        let img = RgbaImage::from_pixel(6, 6, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority("20.png"), 20);
        assert_eq!(parse_priority("20-1.png"), 20);
        assert_eq!(parse_priority("5.png"), 5);
        assert_eq!(parse_priority("cover.png"), 0);
        assert_eq!(parse_priority(""), 0);
    }

    #[test]
    fn test_load_sorts_entry_by_priority_descending() {
        let dir = test_dir("load-sorted");
        let entry = dir.join("entry");
        std::fs::create_dir_all(&entry).unwrap();
        write_png(&entry.join("5.png"), [10, 10, 10]);
        write_png(&entry.join("20.png"), [20, 20, 20]);
        write_png(&entry.join("20-1.png"), [30, 30, 30]);

        let set = TemplateSet::load(&dir).unwrap();
        let priorities: Vec<i32> = set.entry.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![20, 20, 5]);
        assert_eq!(set.entry[0].name, "20-1.png");

        // Optional categories are simply empty.
        assert!(set.lobby.is_empty());
        assert!(set.search_open.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_ignores_verify_subdirectory_for_entry() {
        let dir = test_dir("load-subdir");
        let entry = dir.join("entry");
        let verify = entry.join("verify");
        std::fs::create_dir_all(&verify).unwrap();
        write_png(&entry.join("10.png"), [10, 10, 10]);
        write_png(&verify.join("in.png"), [40, 40, 40]);
        write_png(&verify.join("out.png"), [50, 50, 50]);

        let set = TemplateSet::load(&dir).unwrap();
        assert_eq!(set.entry.len(), 1);
        assert_eq!(set.lobby.len(), 1);
        assert_eq!(set.lobby[0].name, "in.png");
        assert_eq!(set.back.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_entry_directory_is_fatal() {
        let dir = test_dir("load-missing");
        assert!(matches!(
            TemplateSet::load(&dir),
            Err(TemplateError::DirectoryRead { .. })
        ));

        let entry = dir.join("entry");
        std::fs::create_dir_all(&entry).unwrap();
        assert!(matches!(
            TemplateSet::load(&dir),
            Err(TemplateError::NoEntryTemplates { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
