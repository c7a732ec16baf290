mod policy;

use crate::policy::LocalDomains;
use anyhow::{anyhow, Context, Result};
use getopts::Options;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use smtpd_embedded::Server;
use std::env;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;

const DEFAULT_WORKING_DIR: &str = ".";
const DEFAULT_ADDRESS: &str = "127.0.0.1:8025";

// Command line option names
const OPT_HELP: &str = "help";
const OPT_ADDRESS: &str = "address";
const OPT_LOG: &str = "log";
const OPT_SERVER: &str = "server";
const OPT_THREADS: &str = "threads";
const OPT_TIMEOUT: &str = "timeout";
const OPT_DOMAIN: &str = "domain";

fn setup_logger(log_dir: &str) -> Result<()> {
    let log_path = Path::new(log_dir);
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let datetime = now.format(format_description!(
        "[year][month][day][hour][minute][second]"
    ))?;
    let filename = format!("smtp-{}.log", datetime);
    let filepath = log_path.join(&filename);
    let file = File::create(&filepath)
        .with_context(|| format!("Cannot create log file {}", filepath.display()))?;
    let file_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Trace, file_config, file),
    ];
    CombinedLogger::init(loggers).map_err(|err| anyhow!("Cannot initialize logger: {}", err))
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();
    opts.optflag("h", OPT_HELP, "print this help menu");
    opts.optopt("a", OPT_ADDRESS, "the address to listen on", "ADDRESS");
    opts.optopt("l", OPT_LOG, "the directory to write logs to", "LOG_DIR");
    opts.optopt("s", OPT_SERVER, "the name of the mailserver", "SERVER");
    opts.optopt("t", OPT_THREADS, "maximum number of concurrent sessions", "NUM");
    opts.optopt(
        "",
        OPT_TIMEOUT,
        "client read and write timeout, 0 to wait forever",
        "SECONDS",
    );
    opts.optmulti(
        "d",
        OPT_DOMAIN,
        "accept recipients in this domain, can be repeated",
        "DOMAIN",
    );
    let matches = opts
        .parse(&args[1..])
        .map_err(|err| anyhow!("Error parsing command line: {}", err))?;
    if matches.opt_present(OPT_HELP) {
        print_usage(&args[0], &opts);
        return Ok(());
    }
    let log_directory = matches
        .opt_str(OPT_LOG)
        .unwrap_or_else(|| DEFAULT_WORKING_DIR.to_owned());
    setup_logger(&log_directory)?;
    let addr = matches
        .opt_str(OPT_ADDRESS)
        .unwrap_or_else(|| DEFAULT_ADDRESS.to_owned());
    let handler = LocalDomains::new(matches.opt_strs(OPT_DOMAIN));
    let mut server = Server::new(handler);
    server
        .with_addr(&addr)
        .with_context(|| format!("Cannot listen on {}", addr))?;
    if let Some(name) = matches.opt_str(OPT_SERVER) {
        server.with_name(name);
    }
    if let Some(threads) = matches.opt_str(OPT_THREADS) {
        let threads = threads
            .parse::<u32>()
            .with_context(|| format!("Invalid number of threads: {}", threads))?;
        server.with_num_threads(threads);
    }
    if let Some(timeout) = matches.opt_str(OPT_TIMEOUT) {
        let seconds = timeout
            .parse::<u64>()
            .with_context(|| format!("Invalid timeout: {}", timeout))?;
        let timeout = if seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(seconds))
        };
        server.with_read_timeout(timeout).with_write_timeout(timeout);
    }
    server.serve_forever()?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
