//! Configuration loading and parsing.
//!
//! Parses `nvgrid.toml` (or an override path provided by the binary). Every
//! section and key is optional; absent keys take their defaults and unknown
//! keys are ignored so older binaries keep reading newer files. A missing or
//! unparsable file yields the default configuration.
//!
//! Parsed values are kept verbatim in [`Config::file`]. [`Config::apply_limits`]
//! clamps them into the ranges the renderer supports and records each
//! adjustment on the `config` target.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "nvgrid.toml";

const PLACEMENT_TIMEOUT_MS: (u64, u64) = (1, 100);
const CURSOR_DURATION_MS: (u64, u64) = (0, 1000);
const MAX_BORDER_FADE_PX: u8 = 16;
const MINIMAP_SCALE: (f32, f32) = (0.05, 1.0);
const MIN_GLYPH_CACHE: usize = 16;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CursorConfig {
    pub animate: bool,
    pub duration_ms: u64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            animate: true,
            duration_ms: 80,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub draw_borders: bool,
    pub border_fade_px: u8,
    pub glyph_cache_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            draw_borders: true,
            border_fade_px: 4,
            glyph_cache_capacity: 4096,
        }
    }
}

/// Cell metrics used when no real font is loaded (headless replay).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FontConfig {
    pub cell_width: f32,
    pub line_height: f32,
    pub ascent: f32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            cell_width: 8.0,
            line_height: 16.0,
            ascent: 12.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub placement_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placement_timeout_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MinimapConfig {
    pub enabled: bool,
    pub scale: f32,
    pub sync_timeout_ms: u64,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scale: 0.25,
            sync_timeout_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub cursor: CursorConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub font: FontConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub minimap: MinimapConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // file contents as read
    pub file: ConfigFile,    // parsed (or default) data, clamped by apply_limits
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("nvgrid").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            file,
        }),
        Err(e) => {
            tracing::warn!(
                target: "config",
                path = %path.display(),
                error = %e,
                "config_parse_failed"
            );
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Clamp every bounded value into its supported range. Returns the number
    /// of values that changed.
    pub fn apply_limits(&mut self) -> usize {
        let mut clamped_count = 0;
        let f = &mut self.file;

        let raw = f.engine.placement_timeout_ms;
        let clamped = raw.clamp(PLACEMENT_TIMEOUT_MS.0, PLACEMENT_TIMEOUT_MS.1);
        if clamped != raw {
            info!(target: "config", raw, clamped, "placement_timeout_clamped");
            f.engine.placement_timeout_ms = clamped;
            clamped_count += 1;
        }

        let raw = f.cursor.duration_ms;
        let clamped = raw.clamp(CURSOR_DURATION_MS.0, CURSOR_DURATION_MS.1);
        if clamped != raw {
            info!(target: "config", raw, clamped, "cursor_duration_clamped");
            f.cursor.duration_ms = clamped;
            clamped_count += 1;
        }

        let raw = f.render.border_fade_px;
        let clamped = raw.min(MAX_BORDER_FADE_PX);
        if clamped != raw {
            info!(target: "config", raw, clamped, "border_fade_clamped");
            f.render.border_fade_px = clamped;
            clamped_count += 1;
        }

        let raw = f.render.glyph_cache_capacity;
        let clamped = raw.max(MIN_GLYPH_CACHE);
        if clamped != raw {
            info!(target: "config", raw, clamped, "glyph_cache_capacity_clamped");
            f.render.glyph_cache_capacity = clamped;
            clamped_count += 1;
        }

        let raw = f.minimap.scale;
        let clamped = if raw.is_finite() {
            raw.clamp(MINIMAP_SCALE.0, MINIMAP_SCALE.1)
        } else {
            MinimapConfig::default().scale
        };
        if clamped != raw {
            info!(target: "config", raw, clamped, "minimap_scale_clamped");
            f.minimap.scale = clamped;
            clamped_count += 1;
        }

        let defaults = FontConfig::default();
        let font = &mut f.font;
        for (name, value, fallback) in [
            ("cell_width", &mut font.cell_width, defaults.cell_width),
            ("line_height", &mut font.line_height, defaults.line_height),
        ] {
            if !(value.is_finite() && *value > 0.0) {
                info!(target: "config", key = name, raw = *value, clamped = fallback, "font_metric_reset");
                *value = fallback;
                clamped_count += 1;
            }
        }
        if !(font.ascent.is_finite() && (0.0..=font.line_height).contains(&font.ascent)) {
            let clamped = font.line_height * 0.75;
            info!(target: "config", raw = font.ascent, clamped, "font_ascent_clamped");
            font.ascent = clamped;
            clamped_count += 1;
        }

        clamped_count
    }

    pub fn placement_timeout(&self) -> Duration {
        Duration::from_millis(self.file.engine.placement_timeout_ms)
    }

    pub fn cursor_duration(&self) -> Duration {
        Duration::from_millis(self.file.cursor.duration_ms)
    }

    pub fn minimap_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.file.minimap.sync_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn load_str(content: &str) -> Config {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), content).unwrap();
        load_from(Some(tmp.path().to_path_buf())).unwrap()
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.file.cursor.animate);
        assert_eq!(cfg.placement_timeout(), Duration::from_millis(20));
        assert!(!cfg.file.minimap.enabled);
    }

    #[test]
    fn parses_sections_and_keeps_other_defaults() {
        let cfg = load_str(
            "[cursor]\nanimate = false\n[render]\nborder_fade_px = 2\n[minimap]\nenabled = true\nscale = 0.5\n",
        );
        assert!(!cfg.file.cursor.animate);
        assert_eq!(cfg.file.cursor.duration_ms, 80);
        assert_eq!(cfg.file.render.border_fade_px, 2);
        assert!(cfg.file.render.draw_borders);
        assert!(cfg.file.minimap.enabled);
        assert_eq!(cfg.file.minimap.scale, 0.5);
        assert_eq!(cfg.file.font, FontConfig::default());
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let cfg = load_str("[cursor\nanimate = ");
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.file, ConfigFile::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = load_str("[cursor]\nblink = true\nduration_ms = 120\n[future]\nx = 1\n");
        assert_eq!(cfg.file.cursor.duration_ms, 120);
    }

    #[test]
    fn limits_clamp_out_of_range_values() {
        let mut cfg = load_str(
            "[engine]\nplacement_timeout_ms = 5000\n[cursor]\nduration_ms = 9000\n[render]\nborder_fade_px = 40\n[minimap]\nscale = 0.0\n",
        );
        assert_eq!(cfg.apply_limits(), 4);
        assert_eq!(cfg.placement_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.cursor_duration(), Duration::from_millis(1000));
        assert_eq!(cfg.file.render.border_fade_px, 16);
        assert_eq!(cfg.file.minimap.scale, 0.05);
        assert_eq!(cfg.apply_limits(), 0);
    }

    #[test]
    fn zero_placement_timeout_is_raised_to_minimum() {
        let mut cfg = load_str("[engine]\nplacement_timeout_ms = 0\n");
        cfg.apply_limits();
        assert_eq!(cfg.file.engine.placement_timeout_ms, 1);
    }

    #[test]
    fn bad_font_metrics_reset() {
        let mut cfg = load_str("[font]\ncell_width = -3.0\nline_height = 20.0\nascent = 30.0\n");
        assert_eq!(cfg.apply_limits(), 2);
        assert_eq!(cfg.file.font.cell_width, 8.0);
        assert_eq!(cfg.file.font.ascent, 15.0);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let mut cfg = load_str("[render]\nborder_fade_px = 99\n");
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        with_default(subscriber, || {
            cfg.apply_limits();
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("border_fade_clamped"));
        assert!(log_output.contains("raw=99"));
        assert!(log_output.contains("clamped=16"));
        assert_eq!(cfg.file.render.border_fade_px, 16);
    }
}
