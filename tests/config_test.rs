use clap::Parser;
use ratatui::style::{Color, Modifier};
use sheetstack::config::{rgb_to_256_color, rgb_to_basic_ansi, ColorParser, StyleParser};
use sheetstack::{apply_args, AppConfig, ConfigManager, Theme};
use sheetstack_cli::Args;
use tempfile::TempDir;

fn manager() -> (TempDir, ConfigManager) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ConfigManager::with_dir(dir.path().join("sheetstack"));
    (dir, manager)
}

fn no_color() -> bool {
    std::env::var("NO_COLOR").is_ok()
}

#[test]
fn test_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.version, "0.1");
    assert_eq!(config.loading.delimiter, ',');
    assert!(config.loading.header);
    assert_eq!(config.loading.subsheet_sep, "~");
    assert_eq!(config.display.sheet_name_fmt, "{}| ");
    assert_eq!(config.display.column_sep, "|");
    assert_eq!(config.display.histogram, "*");
    assert!(!config.behavior.readonly);
    assert!(!config.debug.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_loads_defaults() {
    let (_dir, manager) = manager();
    let config = manager.load().unwrap();
    assert_eq!(config.display.status_sep, AppConfig::default().display.status_sep);
}

#[test]
fn test_generated_config_round_trips() {
    let (_dir, manager) = manager();
    let path = manager.write_default_config(false).unwrap();
    assert!(path.exists());
    assert!(manager.write_default_config(false).is_err());
    assert!(manager.write_default_config(true).is_ok());

    let loaded = manager.load().unwrap();
    let default = AppConfig::default();
    assert_eq!(loaded.version, default.version);
    assert_eq!(loaded.flatten(), default.flatten());
}

#[test]
fn test_partial_user_config_merges() {
    let (_dir, manager) = manager();
    manager.ensure_config_dir().unwrap();
    std::fs::write(
        manager.config_path("config.toml"),
        r#"
[loading]
delimiter = ";"

[behavior]
readonly = true

[theme.colors]
cur_row = "bold"
"#,
    )
    .unwrap();
    let config = manager.load().unwrap();
    assert_eq!(config.loading.delimiter, ';');
    assert_eq!(config.loading.quote_char, '"');
    assert!(config.behavior.readonly);
    assert_eq!(config.theme.colors.cur_row, "bold");
    assert_eq!(config.theme.colors.key_cols, "yellow");
}

#[test]
fn test_invalid_values_rejected() {
    let (_dir, manager) = manager();
    manager.ensure_config_dir().unwrap();
    let path = manager.config_path("config.toml");

    std::fs::write(&path, "version = \"2.0\"\n").unwrap();
    assert!(manager.load().unwrap_err().to_string().contains("Unsupported config version"));

    std::fs::write(&path, "[loading]\nencoding = \"ebcdic\"\n").unwrap();
    assert!(manager.load().unwrap_err().to_string().contains("Unsupported encoding"));

    std::fs::write(&path, "[display]\nhistogram_width = 0\n").unwrap();
    assert!(manager.load().is_err());

    std::fs::write(&path, "[loading\n").unwrap();
    assert!(manager.load().unwrap_err().to_string().contains("Failed to parse"));

    if !no_color() {
        std::fs::write(&path, "[theme.colors]\nerror = \"sparkly\"\n").unwrap();
        assert!(manager.load().unwrap_err().to_string().contains("theme color error"));
    }
}

#[test]
fn test_color_parser() {
    if no_color() {
        return;
    }
    let parser = ColorParser::new();
    assert_eq!(parser.parse("red").unwrap(), Color::Red);
    assert_eq!(parser.parse("Bright_Blue").unwrap(), Color::Indexed(12));
    assert_eq!(parser.parse("indexed(200)").unwrap(), Color::Indexed(200));
    assert!(parser.parse("indexed(300)").is_err());
    assert!(parser.parse("#ff0000").is_ok());
    assert!(parser.parse("#ff00").is_err());
}

#[test]
fn test_rgb_fallbacks() {
    assert_eq!(rgb_to_256_color(0, 0, 0), 16);
    assert_eq!(rgb_to_256_color(255, 255, 255), 231);
    assert_eq!(rgb_to_256_color(255, 0, 0), 196);
    assert_eq!(rgb_to_basic_ansi(200, 20, 20), Color::Red);
    assert_eq!(rgb_to_basic_ansi(20, 20, 200), Color::Blue);
    assert_eq!(rgb_to_basic_ansi(250, 250, 250), Color::White);
}

#[test]
fn test_theme_from_config() {
    let mut config = AppConfig::default();
    config.theme.colors.selected_row = "underline green".into();
    let theme = Theme::from_config(&config.theme).unwrap();
    let style = theme.get("selected_row");
    assert!(style.add_modifier.contains(Modifier::UNDERLINED));
    if !no_color() {
        assert_eq!(style.fg, Some(Color::Green));
    }
    assert!(theme.get("cur_row").add_modifier.contains(Modifier::REVERSED));
    assert!(theme.get_optional("nonexistent").is_none());

    let style = StyleParser::new().parse("dim italic").unwrap();
    assert!(style.add_modifier.contains(Modifier::DIM | Modifier::ITALIC));
}

#[test]
fn test_command_line_overrides() {
    let args = Args::parse_from([
        "sheetstack",
        "--delimiter",
        ";",
        "--no-header",
        "--encoding",
        "latin-1",
        "--readonly",
        "data.csv",
    ]);
    let mut config = AppConfig::default();
    apply_args(&mut config, &args);
    assert_eq!(config.loading.delimiter, ';');
    assert!(!config.loading.header);
    assert_eq!(config.loading.encoding, "latin-1");
    assert!(config.behavior.readonly);
    assert!(!config.debug.enabled);
    assert!(config.validate().is_ok());
    assert_eq!(args.paths.len(), 1);
}
