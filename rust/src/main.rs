use std::env;
use std::fs;
use std::io;
use std::process;

use chrono::{DateTime, Utc};
use cridlib::{ApiConfig, Crid, CridGenerator, RabeApi, canonicalize_show, parse_clock, parse_crid};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq)]
struct GetOpts {
    at: Option<DateTime<Utc>>,
    fragment: Option<String>,
    config: Option<String>,
    json: bool,
}

const ENV_OVERRIDES: [&str; 3] = ["CRID_SONGTICKER_URL", "CRID_ARCHIVE_URL", "CRID_LIBRETIME_URL"];

fn print_help() {
    eprintln!(concat!(
        "crid - RaBe CRID generator and parser\n\n",
        "Usage:\n",
        "  crid get [--at <rfc3339|clock>] [--fragment <extra>] [--config <file.json>] [--json]\n",
        "  crid parse <crid> [--json]\n",
        "  crid validate <crid>\n",
        "  crid canonicalize <show name>\n\n",
        "Environment:\n",
        "  CRID_SONGTICKER_URL, CRID_ARCHIVE_URL, CRID_LIBRETIME_URL override endpoints\n",
        "  RUST_LOG sets the log filter (default: warn)\n",
    ));
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

/// Accepts RFC 3339 (`1993-03-01T13:12:00Z`) or a clock code (`19930301T131200.00Z`).
fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_clock(s))
        .ok_or_else(|| format!("invalid timestamp: {s}"))
}

fn parse_get_flags(args: &[String]) -> Result<GetOpts, String> {
    let mut opts = GetOpts::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--json" => {
                opts.json = true;
                i += 1;
            }
            "--at" => {
                if i + 1 >= args.len() {
                    return Err("missing value for --at".to_string());
                }
                opts.at = Some(parse_instant(&args[i + 1])?);
                i += 2;
            }
            "--fragment" => {
                if i + 1 >= args.len() {
                    return Err("missing value for --fragment".to_string());
                }
                opts.fragment = Some(args[i + 1].clone());
                i += 2;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    return Err("missing value for --config".to_string());
                }
                opts.config = Some(args[i + 1].clone());
                i += 2;
            }
            _ => return Err(format!("unknown flag: {}", args[i])),
        }
    }

    Ok(opts)
}

fn apply_env_overrides(
    mut config: ApiConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ApiConfig {
    for key in ENV_OVERRIDES {
        let Some(value) = lookup(key).filter(|v| !v.is_empty()) else {
            continue;
        };
        match key {
            "CRID_SONGTICKER_URL" => config.songticker_url = value,
            "CRID_ARCHIVE_URL" => config.archive_url = value,
            _ => config.libretime_url = value,
        }
    }
    config
}

fn load_config(path: Option<&str>) -> Result<ApiConfig, String> {
    let config = match path {
        Some(path) => {
            let data = fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            ApiConfig::from_json(&data).map_err(|e| format!("{path}: {e}"))?
        }
        None => ApiConfig::default(),
    };
    Ok(apply_env_overrides(config, |key| env::var(key).ok()))
}

fn crid_json(crid: &Crid) -> serde_json::Value {
    json!({
        "crid": crid.to_string(),
        "scheme": crid.scheme(),
        "authority": crid.authority(),
        "version": crid.version().as_str(),
        "show": crid.show(),
        "start": crid.start().map(|ts| ts.to_rfc3339()),
        "fragment": crid.extra_fragment(),
    })
}

fn print_crid(crid: &Crid, json_out: bool) -> Result<(), String> {
    if json_out {
        println!(
            "{}",
            serde_json::to_string(&crid_json(crid)).map_err(|e| e.to_string())?
        );
    } else {
        println!("crid={crid}");
        println!("version={}", crid.version());
        println!("show={}", crid.show().unwrap_or_default());
        println!(
            "start={}",
            crid.start().map(|ts| ts.to_rfc3339()).unwrap_or_default()
        );
        println!("fragment={}", crid.extra_fragment().unwrap_or_default());
    }
    Ok(())
}

fn run_get(args: &[String]) -> Result<(), String> {
    let opts = parse_get_flags(args)?;
    let config = load_config(opts.config.as_deref())?;
    let api = RabeApi::new(config).map_err(|e| e.to_string())?;
    let crid = CridGenerator::new(api)
        .get(opts.at, opts.fragment.as_deref())
        .map_err(|e| e.to_string())?;

    if opts.json {
        print_crid(&crid, true)
    } else {
        println!("{crid}");
        Ok(())
    }
}

fn run_parse(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err("parse requires a crid".to_string());
    }

    let mut json_out = false;
    for arg in &args[1..] {
        match arg.as_str() {
            "--json" => json_out = true,
            other => return Err(format!("unknown flag: {other}")),
        }
    }

    let crid = parse_crid(&args[0]).map_err(|e| e.to_string())?;
    print_crid(&crid, json_out)
}

fn run_validate(args: &[String]) -> Result<(), String> {
    let [raw] = args else {
        return Err("validate requires exactly one crid".to_string());
    };

    match parse_crid(raw) {
        Ok(_) => {
            println!("true");
            Ok(())
        }
        Err(err) => {
            println!("false");
            Err(err.to_string())
        }
    }
}

fn run_canonicalize(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err("canonicalize requires a show name".to_string());
    }
    println!("{}", canonicalize_show(&args.join(" ")));
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        process::exit(2);
    }

    if args[0] == "-h" || args[0] == "--help" || args[0] == "help" {
        print_help();
        return;
    }

    init_tracing();

    let cmd = args[0].as_str();
    let rest = &args[1..];

    let res = match cmd {
        "get" => run_get(rest),
        "parse" => run_parse(rest),
        "validate" => run_validate(rest),
        "canonicalize" => run_canonicalize(rest),
        _ => Err(format!("unknown command: {}", cmd)),
    };

    if let Err(err) = res {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_instant() {
        let expected = Utc.with_ymd_and_hms(1993, 3, 1, 13, 12, 0).unwrap();
        assert_eq!(parse_instant("1993-03-01T13:12:00Z").unwrap(), expected);
        assert_eq!(parse_instant("1993-03-01T14:12:00+01:00").unwrap(), expected);
        assert_eq!(parse_instant("19930301T131200.00Z").unwrap(), expected);
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn test_parse_get_flags() {
        let opts = parse_get_flags(&strings(&[
            "--at",
            "1993-03-01T13:12:00Z",
            "--fragment",
            "myid=1234",
            "--json",
        ]))
        .unwrap();
        assert_eq!(
            opts.at,
            Some(Utc.with_ymd_and_hms(1993, 3, 1, 13, 12, 0).unwrap())
        );
        assert_eq!(opts.fragment.as_deref(), Some("myid=1234"));
        assert!(opts.json);
        assert_eq!(opts.config, None);
    }

    #[test]
    fn test_parse_get_flags_errors() {
        assert!(parse_get_flags(&strings(&["--at"])).is_err());
        assert!(parse_get_flags(&strings(&["--fragment"])).is_err());
        assert!(parse_get_flags(&strings(&["--bogus"])).is_err());
        assert_eq!(parse_get_flags(&[]).unwrap(), GetOpts::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = apply_env_overrides(ApiConfig::default(), |key| match key {
            "CRID_ARCHIVE_URL" => Some("http://localhost:8080/broadcasts/".to_string()),
            "CRID_LIBRETIME_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.archive_url, "http://localhost:8080/broadcasts/");
        assert_eq!(config.songticker_url, cridlib::SONGTICKER_URL);
        assert_eq!(config.libretime_url, cridlib::LIBRETIME_LIVE_INFO_URL);
    }

    #[test]
    fn test_crid_json() {
        let crid = parse_crid("crid://rabe.ch/v1/test#t=clock=19930301T131200.00Z&myid=1234")
            .unwrap();
        let value = crid_json(&crid);
        assert_eq!(value["show"], "test");
        assert_eq!(value["version"], "v1");
        assert_eq!(value["start"], "1993-03-01T13:12:00+00:00");
        assert_eq!(value["fragment"], "myid=1234");

        let generic = crid_json(&parse_crid("crid://rabe.ch/v1").unwrap());
        assert!(generic["show"].is_null());
        assert!(generic["start"].is_null());
    }

    #[test]
    fn test_validate_and_parse_commands() {
        assert!(run_validate(&strings(&["crid://rabe.ch/v1/test"])).is_ok());
        assert!(run_validate(&strings(&["crid://rabe.ch/vX/test"])).is_err());
        assert!(run_validate(&[]).is_err());
        assert!(run_parse(&strings(&["crid://rabe.ch/v1", "--json"])).is_ok());
        assert!(run_parse(&strings(&["crid://rabe.ch/v1", "--yaml"])).is_err());
        assert!(run_canonicalize(&[]).is_err());
    }
}
