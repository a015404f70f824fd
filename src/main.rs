use std::io::stdout;
use std::path::PathBuf;
use std::sync::mpsc::channel;

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use ratatui::DefaultTerminal;
use sheetstack::{apply_args, logging, App, AppConfig, AppEvent, CacheManager, ConfigManager, APP_NAME};
use sheetstack_cli::Args;
use tracing::{info, warn};

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(mut terminal: DefaultTerminal, mut app: App) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let size = terminal.size()?;
    app.event(&AppEvent::Resize(size.width, size.height));
    render(&mut terminal, &mut app)?;

    loop {
        match crossterm::event::read()? {
            Event::Key(key) => tx.send(AppEvent::Key(key))?,
            Event::Mouse(mouse) => tx.send(AppEvent::Mouse(mouse))?,
            Event::Resize(cols, rows) => tx.send(AppEvent::Resize(cols, rows))?,
            _ => continue,
        }

        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Exit => return Ok(()),
                AppEvent::Crash(msg) => return Err(eyre!(msg)),
                event => {
                    if let Some(next) = app.event(&event) {
                        tx.send(next)?;
                    }
                }
            }
        }

        render(&mut terminal, &mut app)?;
    }
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
            }
            Err(_e) => println!("No cache to clear"),
        }
        return Ok(Some(()));
    }

    if args.generate_config {
        let config = ConfigManager::new(APP_NAME)?;
        match config.write_default_config(args.force) {
            Ok(path) => println!("Wrote default configuration to {}", path.display()),
            Err(e) => {
                eprintln!("Error writing configuration: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(Some(()));
    }

    Ok(None)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let mut config = AppConfig::load(APP_NAME)?;
    apply_args(&mut config, &args);
    config.validate()?;

    let cache = CacheManager::new(APP_NAME)?;
    let _log_guard = logging::init(&cache, config.debug.enabled);
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let mut app = App::new(config, cache)?;
    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths.clone()
    };
    for path in &paths {
        app.open(path, args.format)?;
    }

    let terminal = ratatui::init();
    execute!(stdout(), EnableMouseCapture)?;
    let result = run(terminal, app);
    if let Err(e) = execute!(stdout(), DisableMouseCapture) {
        warn!(error = %e, "could not disable mouse capture");
    }
    ratatui::restore();
    info!(ok = result.is_ok(), "exiting");
    result
}
