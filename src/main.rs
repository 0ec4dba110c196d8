use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::Level;
use visual_debugger::debugger::Session;
use visual_debugger::{executor, SessionConfig};

const USAGE: &str = "usage: visual-debugger <executable> [--cwd DIR] [--config FILE] [--auto] \
[--snapshots FILE] [--memlog FILE] [--verbose]";

#[derive(Debug, Default)]
struct Args {
    executable: PathBuf,
    cwd: Option<PathBuf>,
    config: Option<PathBuf>,
    auto: bool,
    snapshots: Option<PathBuf>,
    memlog: Option<PathBuf>,
    verbose: bool,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut executable = None;
    let mut raw = raw.into_iter();

    while let Some(arg) = raw.next() {
        let mut value = |flag: &str| {
            raw.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--cwd" => args.cwd = Some(value("--cwd")?),
            "--config" => args.config = Some(value("--config")?),
            "--snapshots" => args.snapshots = Some(value("--snapshots")?),
            "--memlog" => args.memlog = Some(value("--memlog")?),
            "--auto" => args.auto = true,
            "--verbose" | "-v" => args.verbose = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ if executable.is_none() => executable = Some(PathBuf::from(&arg)),
            _ => return Err(format!("unexpected argument {}", arg)),
        }
    }

    args.executable = executable.ok_or_else(|| USAGE.to_string())?;
    Ok(args)
}

fn init_logging(config: &SessionConfig, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::WARN)
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if args.snapshots.is_some() {
        config.snapshot_path = args.snapshots.clone();
    }
    if args.memlog.is_some() {
        config.memlog_path = args.memlog.clone();
    }
    init_logging(&config, args.verbose);

    let cwd = match &args.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let session = Session::start(&args.executable, &cwd, config)?;

    if args.auto {
        eprintln!("Starting automated session...");
        let snapshots = executor::run_automated_session(&session)?;
        for snapshot in &snapshots {
            let names: Vec<&str> = snapshot
                .frames
                .iter()
                .map(|f| f.function_name.as_str())
                .collect();
            match snapshot.current_line {
                Some(line) => println!("#{} line {}: {}", snapshot.sequence, line, names.join(" <- ")),
                None => println!("#{} (no line): {}", snapshot.sequence, names.join(" <- ")),
            }
        }
        print!("{}", session.program_state().describe());
        io::stdout().flush()?;
    } else {
        eprintln!("Starting in interactive mode...");
        session.on_output(|text| {
            print!("{}", text);
            let _ = io::stdout().flush();
        });
        executor::run_interactive(&session, io::stdin().lock())?;
    }

    session.kill();
    Ok(())
}
