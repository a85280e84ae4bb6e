mod app_logic;
mod core;

use crate::app_logic::{
    PickerServices, PickerSession, SessionReply, TREE_MOUNT_POINT, UserCommand,
};
use crate::core::{
    ClipboardSinkOperations, CoreRepositoryLister, CoreSettingsManager, CoreTikTokenCounter,
    FileClipboardSink, LocalFileContentSource, RepositoryListingOperations, StdoutClipboardSink,
    TextMountHost, checkout_label,
};
use clap::Parser;
use glob::Pattern;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const LOG_FILENAME: &str = "repo_picker.log";

#[derive(Parser, Debug)]
#[command(name = "repo_picker")]
#[command(about = "Pick files from a repository checkout and copy their contents as prompt context")]
struct Cli {
    /// Repository checkout to list
    #[arg(default_value = ".")]
    checkout: PathBuf,

    /// Write copied bundles to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Glob selecting the initial set of nodes
    #[arg(long)]
    select: Option<String>,

    /// Only list paths matching this glob (directories containing matches are kept)
    #[arg(long)]
    only: Option<String>,

    /// Log debug output to the terminal as well as the log file
    #[arg(long)]
    verbose: bool,
}

/*
 * Terminal logging at Warn (Debug with --verbose) plus a Debug-level log file in
 * the config directory when there is one. Logging failures are reported but
 * never stop the picker.
 */
fn init_logging(config_dir: Option<&Path>, verbose: bool) {
    let term_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(dir) = config_dir {
        match File::create(dir.join(LOG_FILENAME)) {
            Ok(file) => {
                loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file))
            }
            Err(e) => eprintln!("Could not create log file in {dir:?}: {e}"),
        }
    }
    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn run(
    cli: Cli,
    settings_manager: Arc<CoreSettingsManager>,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = CoreRepositoryLister::new().list_entries(&cli.checkout)?;
    let label = checkout_label(&cli.checkout);

    let clipboard: Arc<dyn ClipboardSinkOperations> = match &cli.output {
        Some(path) => Arc::new(FileClipboardSink::new(path)),
        None => Arc::new(StdoutClipboardSink::new()),
    };
    let services = PickerServices {
        settings_manager,
        content_source: Arc::new(LocalFileContentSource::new(&cli.checkout)),
        clipboard,
        token_counter: Arc::new(CoreTikTokenCounter::new()),
    };

    let mut host = TextMountHost::new().with_mount_point(TREE_MOUNT_POINT);
    let only = cli.only.as_deref().map(Pattern::new).transpose()?;
    let mut session =
        PickerSession::start_filtered(&mut host, &label, &entries, services, only.as_ref())?;
    if let Some(glob) = &cli.select {
        session.select_matching(glob)?;
    }
    println!("{}", session.render());
    println!("Type 'help' for commands.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<UserCommand>() {
            Ok(command) => match session.handle_command(command) {
                Ok(SessionReply::Message(message)) => println!("{message}"),
                Ok(SessionReply::Quit) => break,
                Err(e) => println!("{e}"),
            },
            Err(e) => println!("{e}"),
        }
    }
    log::debug!("Main: Picker session ended.");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings_manager = Arc::new(CoreSettingsManager::new());
    init_logging(settings_manager.config_dir(), cli.verbose);
    log::debug!("Main: Starting repo_picker for {:?}.", cli.checkout);

    match run(cli, settings_manager) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Main: {e}");
            eprintln!("repo_picker: {e}");
            ExitCode::FAILURE
        }
    }
}
