use crate::config::{self, RunConfig};
use crate::errors::AppError;
use argparse::{ArgumentParser, Store, StoreOption, StoreTrue};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Snapshot,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "snapshot" => Ok(OutputFormat::Snapshot),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(AppError::Config(format!("unknown format: {}", other))),
        }
    }
}

pub struct CliArgs {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub config: Option<PathBuf>,
    pub format: String,
    pub out: Option<PathBuf>,
    pub watch: bool,
    pub tz: Option<String>,
    pub log_level: String,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            config: None,
            format: "json".into(),
            out: None,
            watch: false,
            tz: None,
            log_level: "essential".into(),
        }
    }
}

pub fn parse_cli() -> CliArgs {
    let mut args = CliArgs::default();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Test station dashboard -> slot status JSON/CSV");
        ap.refer(&mut args.url)
            .add_option(&["-u", "--url"], StoreOption, "Station page URL");
        ap.refer(&mut args.host)
            .add_option(&["--host"], StoreOption, "Station IP address (with --port)");
        ap.refer(&mut args.port)
            .add_option(&["--port"], StoreOption, "Station port, e.g. 8080");
        ap.refer(&mut args.config)
            .add_option(&["-c", "--config"], StoreOption, "JSON config with a list of testers");
        ap.refer(&mut args.format)
            .add_option(&["-f", "--format"], Store, "Output: json|snapshot|csv");
        ap.refer(&mut args.out)
            .add_option(&["-o", "--out"], StoreOption, "Output path (default stdout)");
        ap.refer(&mut args.watch)
            .add_option(&["-w", "--watch"], StoreTrue, "Repeat every refreshInterval until Ctrl-C");
        ap.refer(&mut args.tz)
            .add_option(&["--tz"], StoreOption, "Timezone for snapshot timestamps (IANA name)");
        ap.refer(&mut args.log_level)
            .add_option(&["--log"], Store, "Log level (essential|debug|trace|warn|error)");
        ap.parse_args_or_exit();
    }
    args
}

/// Ask for the station address on the terminal.
pub fn prompt_target<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<String, AppError> {
    let mut ask = |label: &str| -> Result<String, AppError> {
        write!(output, "{}", label)?;
        output.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        let v = line.trim().to_string();
        if v.is_empty() {
            return Err(AppError::Config(format!("no value for '{}'", label.trim())));
        }
        Ok(v)
    };
    let host = ask("Enter the IP address of the target server: ")?;
    let port = ask("Enter the port number (e.g., 8080): ")?;
    Ok(config::url_from_host_port(&host, &port))
}

/// Config file, then --url, then --host/--port, then the prompt.
pub fn resolve_config(args: &CliArgs) -> Result<RunConfig, AppError> {
    if let Some(path) = &args.config {
        return RunConfig::load(path);
    }
    let url = match (&args.url, &args.host, &args.port) {
        (Some(u), _, _) => u.clone(),
        (None, Some(h), Some(p)) => config::url_from_host_port(h, p),
        (None, Some(_), None) | (None, None, Some(_)) => {
            return Err(AppError::Config("--host and --port go together".into()));
        }
        (None, None, None) => {
            let stdin = io::stdin();
            prompt_target(stdin.lock(), io::stderr())?
        }
    };
    let cfg = RunConfig::single(&url);
    let problems = cfg.validate();
    if !problems.is_empty() {
        return Err(AppError::Config(problems.join(", ")));
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_builds_url() {
        let mut shown = Vec::new();
        let url = prompt_target("10.0.0.7\n8080\n".as_bytes(), &mut shown).unwrap();
        assert_eq!(url, "http://10.0.0.7:8080");
        assert!(String::from_utf8(shown).unwrap().contains("port number"));
    }

    #[test]
    fn prompt_rejects_blank_answer() {
        assert!(prompt_target("\n".as_bytes(), Vec::new()).is_err());
    }

    #[test]
    fn host_and_port_flags() {
        let args = CliArgs { host: Some("10.1.1.1".into()), port: Some("9000".into()), ..CliArgs::default() };
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.testers[0].url, "http://10.1.1.1:9000");

        let half = CliArgs { host: Some("10.1.1.1".into()), ..CliArgs::default() };
        assert!(matches!(resolve_config(&half), Err(AppError::Config(_))));
    }

    #[test]
    fn format_names() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
