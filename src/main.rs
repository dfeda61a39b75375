use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use flinch::{
    app::{App, Control, TICK_RATE_MS},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    runtime::{CrosstermEventSource, FixedTicker, FlinchEventSource, Runner, Ticker},
    store::{FileRankingStore, MemoryRankingStore, RankingStore},
    ui::rankings_table,
};
use log::{error, info, LevelFilter};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::{File, OpenOptions},
    io::{self, stdin, BufRead, Write},
    path::{Path, PathBuf},
    time::Duration,
};

/// reaction-time tui: wait for the cue, hit the key, beat your top 10
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Wait for the screen to turn green, then hit space as fast as you can. Your ten fastest reactions are kept on a local leaderboard."
)]
pub struct Cli {
    /// disable the terminal bell for this run
    #[clap(long)]
    no_bell: bool,

    /// path of the rankings file to use instead of the default
    #[clap(long, value_name = "PATH")]
    rankings: Option<PathBuf>,

    /// keep rankings in memory only; nothing is written to disk
    #[clap(long, conflicts_with = "rankings")]
    ephemeral: bool,

    /// print the leaderboard and exit
    #[clap(long)]
    list: bool,

    /// clear the leaderboard and exit
    #[clap(long, conflicts_with = "list")]
    clear: bool,

    /// do not ask for confirmation when clearing
    #[clap(short = 'y', long, requires = "clear")]
    yes: bool,
}

impl Cli {
    /// Apply command line overrides on top of the persisted config
    fn apply_to(&self, mut config: Config) -> Config {
        if self.no_bell {
            config.bell = false;
        }
        config
    }

    fn ranking_store(&self) -> Box<dyn RankingStore> {
        if self.ephemeral {
            Box::new(MemoryRankingStore::new())
        } else if let Some(path) = &self.rankings {
            Box::new(FileRankingStore::with_path(path))
        } else {
            Box::new(FileRankingStore::new())
        }
    }
}

/// Opens the log file, reporting on stderr when logging has to be disabled
fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("flinch: logging disabled, cannot open {}: {}", path.display(), e);
            None
        }
    }
}

fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn).parse_default_env();

    // the terminal belongs to the tui, so logs go to a file
    match open_log_file(&AppDirs::log_path()) {
        Some(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.filter_level(LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}

/// Asks a yes/no question on stdin; anything but y/yes is a no
fn confirm<R: BufRead, W: Write>(question: &str, input: &mut R, out: &mut W) -> io::Result<bool> {
    write!(out, "{} [y/N] ", question)?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn clear_rankings(cli: &Cli, store: &dyn RankingStore) -> Result<(), Box<dyn Error>> {
    let confirmed = cli.yes
        || confirm(
            "Clear all rankings?",
            &mut stdin().lock(),
            &mut io::stdout(),
        )?;
    if confirmed {
        store.clear()?;
        info!("rankings cleared from the command line");
        println!("Rankings cleared");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let config = cli.apply_to(FileConfigStore::new().load());
    let store = cli.ranking_store();

    if cli.list {
        println!("{}", rankings_table(&store.load(), config.show_dates));
        return Ok(());
    }

    if cli.clear {
        return clear_rankings(&cli, store.as_ref());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    info!("starting");
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let mut app = App::new(config, store, runner.sender());
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!("exited with error: {}", e);
    }
    result
}

fn start_tui<B: Backend + Write, E: FlinchEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui(app, f))?;

    loop {
        if app.on_event(runner.step()) == Control::Quit {
            break;
        }

        let bells = app.take_bells();
        if bells > 0 {
            let backend = terminal.backend_mut();
            for _ in 0..bells {
                backend.write_all(b"\x07")?;
            }
            Write::flush(backend)?;
        }

        terminal.draw(|f| ui(app, f))?;
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}
