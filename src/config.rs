use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::{Color, Modifier, Style};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use supports_color::Stream;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read `config.toml` from this directory, or defaults when it is absent.
    pub fn load(&self) -> Result<AppConfig> {
        let config_path = self.config_path("config.toml");
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        let user: AppConfig = toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        let mut config = AppConfig::default();
        config.merge(user);
        config.validate()?;
        Ok(config)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: String,
    pub loading: LoadingConfig,
    pub display: DisplayConfig,
    pub behavior: BehaviorConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

/// How sources are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    pub delimiter: char,
    pub quote_char: char,
    pub header: bool,
    /// `utf-8` or `latin-1`
    pub encoding: String,
    /// `strict` or `replace`
    pub encoding_errors: String,
    /// Joins a parent sheet name and a child key when diving into nested values.
    pub subsheet_sep: String,
}

/// Glyphs and sizes used by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub sheet_name_fmt: String,
    pub visible_none: String,
    pub function_error: String,
    pub histogram: String,
    pub histogram_width: usize,
    pub left_more: String,
    pub right_more: String,
    pub column_sep: String,
    pub ellipsis: String,
    pub status_sep: String,
    pub key_sep: String,
    pub edit_pad: String,
    pub newline: String,
    pub unprintable: String,
    pub wrong_type: String,
    pub error: String,
    /// Upper bound for auto-sized columns, as a fraction of the screen (1/N).
    pub max_width_divisor: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BehaviorConfig {
    pub readonly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ThemeConfig {
    pub colors: ColorConfig,
}

/// Style strings: modifiers (`bold`, `reverse`, `underline`, `dim`,
/// `italic`, `normal`) plus at most one color.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub default: String,
    pub header: String,
    pub cur_hdr: String,
    pub cur_row: String,
    pub cur_col: String,
    pub key_cols: String,
    pub status_line: String,
    pub selected_row: String,
    pub column_sep: String,
    pub edit_cell: String,
    pub wrong_type: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            loading: LoadingConfig::default(),
            display: DisplayConfig::default(),
            behavior: BehaviorConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_char: '"',
            header: true,
            encoding: "utf-8".to_string(),
            encoding_errors: "strict".to_string(),
            subsheet_sep: "~".to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            sheet_name_fmt: "{}| ".to_string(),
            visible_none: String::new(),
            function_error: "¿".to_string(),
            histogram: "*".to_string(),
            histogram_width: 80,
            left_more: "<".to_string(),
            right_more: ">".to_string(),
            column_sep: "|".to_string(),
            ellipsis: "…".to_string(),
            status_sep: " | ".to_string(),
            key_sep: "/".to_string(),
            edit_pad: "_".to_string(),
            newline: "\\n".to_string(),
            unprintable: ".".to_string(),
            wrong_type: "~".to_string(),
            error: "!".to_string(),
            max_width_divisor: 2,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            default: "normal".to_string(),
            header: "bold".to_string(),
            cur_hdr: "reverse".to_string(),
            cur_row: "reverse".to_string(),
            cur_col: "bold".to_string(),
            key_cols: "yellow".to_string(),
            status_line: "bold".to_string(),
            selected_row: "green".to_string(),
            column_sep: "blue".to_string(),
            edit_cell: "normal".to_string(),
            wrong_type: "magenta".to_string(),
            error: "red".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        ConfigManager::new(app_name)?.load()
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        self.loading = other.loading;
        self.display = other.display;
        self.behavior.readonly |= other.behavior.readonly;
        self.theme.colors.merge(other.theme.colors);
        self.debug.enabled |= other.debug.enabled;
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        match self.loading.encoding.to_lowercase().as_str() {
            "utf-8" | "utf8" | "latin-1" | "latin1" | "iso-8859-1" => {}
            other => return Err(eyre!("Unsupported encoding: {}", other)),
        }
        match self.loading.encoding_errors.as_str() {
            "strict" | "replace" | "ignore" => {}
            other => {
                return Err(eyre!(
                    "Invalid encoding_errors: {}. Must be 'strict', 'replace' or 'ignore'",
                    other
                ))
            }
        }
        if self.display.histogram_width == 0 {
            return Err(eyre!("histogram_width must be greater than 0"));
        }
        if self.display.max_width_divisor == 0 {
            return Err(eyre!("max_width_divisor must be greater than 0"));
        }

        let parser = StyleParser::new();
        for (name, value) in self.theme.colors.entries() {
            parser
                .parse(value)
                .map_err(|e| eyre!("theme color {}: {}", name, e))?;
        }

        Ok(())
    }

    /// Flattened `section.key = value` pairs, for the options sheet.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(toml::Value::Table(table)) = toml::Value::try_from(self) {
            flatten_table("", &table, &mut out);
        }
        out
    }
}

fn flatten_table(prefix: &str, table: &toml::map::Map<String, toml::Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in table {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(t) => flatten_table(&name, t, out),
            toml::Value::String(s) => out.push((name, s.clone())),
            other => out.push((name, other.to_string())),
        }
    }
}

impl ColorConfig {
    fn entries(&self) -> [(&'static str, &String); 12] {
        [
            ("default", &self.default),
            ("header", &self.header),
            ("cur_hdr", &self.cur_hdr),
            ("cur_row", &self.cur_row),
            ("cur_col", &self.cur_col),
            ("key_cols", &self.key_cols),
            ("status_line", &self.status_line),
            ("selected_row", &self.selected_row),
            ("column_sep", &self.column_sep),
            ("edit_cell", &self.edit_cell),
            ("wrong_type", &self.wrong_type),
            ("error", &self.error),
        ]
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();
        macro_rules! merge_fields {
            ($($field:ident),*) => {
                $(
                    if other.$field != default.$field {
                        self.$field = other.$field;
                    }
                )*
            };
        }
        merge_fields!(
            default,
            header,
            cur_hdr,
            cur_row,
            cur_col,
            key_cols,
            status_line,
            selected_row,
            column_sep,
            edit_cell,
            wrong_type,
            error
        );
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse a color string (hex, `indexed(n)`, or named)
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();

        if trimmed.starts_with('#') && trimmed.len() == 7 {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.convert_rgb_to_terminal_color(r, g, b));
        }

        let lower = trimmed.to_lowercase();
        if let Some(num_str) = lower
            .strip_prefix("indexed(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let num = num_str.parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        match lower.as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" | "brown" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),
            "gray" | "grey" | "bright_black" => Ok(Color::Indexed(8)),
            "bright_red" => Ok(Color::Indexed(9)),
            "bright_green" => Ok(Color::Indexed(10)),
            "bright_yellow" => Ok(Color::Indexed(11)),
            "bright_blue" => Ok(Color::Indexed(12)),
            "bright_magenta" => Ok(Color::Indexed(13)),
            "bright_cyan" => Ok(Color::Indexed(14)),
            "bright_white" => Ok(Color::Indexed(15)),
            "reset" | "default" => Ok(Color::Reset),
            _ => Err(eyre!(
                "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                 bright variants (bright_red, etc.), indexed(n), or hex colors (#ff0000)",
                trimmed
            )),
        }
    }

    fn convert_rgb_to_terminal_color(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses style strings such as `"bold red"` or `"reverse"`.
#[derive(Default)]
pub struct StyleParser {
    colors: ColorParser,
}

impl StyleParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, s: &str) -> Result<Style> {
        let mut style = Style::default();
        for word in s.split_whitespace() {
            style = match word.to_lowercase().as_str() {
                "normal" => style,
                "bold" => style.add_modifier(Modifier::BOLD),
                "reverse" | "reversed" => style.add_modifier(Modifier::REVERSED),
                "underline" => style.add_modifier(Modifier::UNDERLINED),
                "dim" => style.add_modifier(Modifier::DIM),
                "italic" => style.add_modifier(Modifier::ITALIC),
                "blink" => style.add_modifier(Modifier::SLOW_BLINK),
                color => style.fg(self.colors.parse(color)?),
            };
        }
        Ok(style)
    }
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let channel = |range: std::ops::Range<usize>, name: &str| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(|| eyre!("Invalid {} component in hex color: {}", name, s))
    };
    Ok((channel(1..3, "red")?, channel(3..5, "green")?, channel(5..7, "blue")?))
}

/// Convert RGB to nearest 256-color palette index (xterm palette)
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 10 {
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        if gray < 8 {
            return 16;
        } else if gray > 247 {
            return 231;
        } else {
            return 232 + ((gray - 8) * 24 / 240) as u8;
        }
    }

    let r_idx = (r as u16 * 5 / 255) as u8;
    let g_idx = (g as u16 * 5 / 255) as u8;
    let b_idx = (b as u16 * 5 / 255) as u8;

    16 + 36 * r_idx + 6 * g_idx + b_idx
}

/// Convert RGB to nearest basic ANSI color (8 colors)
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }

    match (r > 128, g > 128, b > 128) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Parsed theme styles, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub styles: HashMap<String, Style>,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = StyleParser::new();
        let mut styles = HashMap::new();
        for (name, value) in config.colors.entries() {
            styles.insert(name.to_string(), parser.parse(value)?);
        }
        Ok(Self { styles })
    }

    /// Style by name; unknown names render unstyled.
    pub fn get(&self, name: &str) -> Style {
        self.styles.get(name).copied().unwrap_or_default()
    }

    pub fn get_optional(&self, name: &str) -> Option<Style> {
        self.styles.get(name).copied()
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parser_modifiers_and_color() {
        let parser = StyleParser::new();
        let style = parser.parse("bold reverse").unwrap();
        assert!(style.add_modifier.contains(Modifier::BOLD));
        assert!(style.add_modifier.contains(Modifier::REVERSED));
        if std::env::var("NO_COLOR").is_err() {
            assert!(parser.parse("sparkly").is_err());
        }
        assert_eq!(parser.parse("normal").unwrap(), Style::default());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#ff8000").unwrap(), (255, 128, 0));
        assert!(parse_hex("#zz0000").is_err());
    }

    #[test]
    fn test_flatten_contains_sections() {
        let flat = AppConfig::default().flatten();
        assert!(flat
            .iter()
            .any(|(k, v)| k == "loading.delimiter" && v == ","));
        assert!(flat.iter().any(|(k, _)| k == "theme.colors.cur_row"));
    }
}
