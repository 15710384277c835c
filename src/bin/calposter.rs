extern crate calposter as lib;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use flexi_logger::{Duplicate, FileSpec, Logger};
use lib::config::Config;
use lib::error::{Error, ErrorKind};
use lib::fetch::HttpFetcher;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "calposter",
    about = "Renders a monthly calendar poster with weather, events and holidays."
)]
pub struct Args {
    #[structopt(
        name = "CONFIG",
        short = "c",
        long = "config",
        help = "path to config file",
        parse(from_os_str)
    )]
    pub configfile: Option<PathBuf>,

    #[structopt(long = "log-file", help = "path to log file", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    #[structopt(
        short = "o",
        long = "output",
        help = "where to write the PNG, overrides the config",
        parse(from_os_str)
    )]
    pub output: Option<PathBuf>,

    #[structopt(
        long = "date",
        help = "render as if today were this day (YYYY-MM-DD)",
        parse(try_from_str = parse_date)
    )]
    pub date: Option<NaiveDate>,

    #[structopt(long = "offline", help = "skip weather, event and holiday downloads")]
    pub offline: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

fn now_in(tz: &Tz, date: Option<NaiveDate>) -> Result<DateTime<Tz>, Error> {
    match date {
        Some(date) => date
            .and_hms_opt(12, 0, 0)
            .and_then(|noon| tz.from_local_datetime(&noon).earliest())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Timezone,
                    &format!("Noon of {} does not exist in {}", date, tz.name()),
                )
            }),
        None => Ok(Utc::now().with_timezone(tz)),
    }
}

fn go_offline(config: &mut Config) {
    config.weather.api_key = None;
    config.events.feed_url = None;
    config.holidays.feed_url = None;
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::from_args();

    const DEFAULT_LOG_LEVEL: &'static str = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let mut logger = Logger::try_with_env_or_str(DEFAULT_LOG_LEVEL)?;

    if let Some(log_file) = args.log_file {
        logger = logger
            .log_to_file(FileSpec::try_from(log_file)?)
            .duplicate_to_stderr(Duplicate::Warn)
            .print_message();
    }

    logger.start()?;

    std::panic::set_hook(Box::new(move |info| {
        eprintln!("calposter ran into a fatal error!");
        eprintln!("{}", info);
        eprintln!("{:?}", backtrace::Backtrace::new());
    }));

    let mut config = lib::config::load_suitable_config(args.configfile.as_deref())?;

    if let Some(output) = args.output {
        config.output = output;
    }
    if args.offline {
        log::info!("Offline mode, external sources disabled");
        go_offline(&mut config);
    }

    let now = now_in(&config.timezone, args.date)?;
    let fetch = HttpFetcher::new()?;

    lib::composer::render(&config, &fetch, now)?;

    Ok(())
}
