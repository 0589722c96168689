//! Command line parsing.

use std::path::PathBuf;

use anyhow::{bail, Context};
use lumen_app::AppConfig;

/// What the command line asked for.
#[derive(Debug, Clone)]
pub enum Command {
    Run(AppConfig),
    Help,
}

/// Parse arguments, excluding the program name.
pub fn parse_args<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut config = AppConfig::new("Lumen Viewer");
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--width" => config.width = parse_dimension(&arg, args.next())?,
            "--height" => config.height = parse_dimension(&arg, args.next())?,
            "--vsync" => config.vsync = true,
            "--no-vsync" => config.vsync = false,
            "--validation" => config.validation = true,
            "--no-validation" => config.validation = false,
            "-m" | "--model" => config.model_path = Some(parse_path(&arg, args.next())?),
            "-t" | "--texture" => config.texture_path = Some(parse_path(&arg, args.next())?),
            other => bail!("unknown argument `{other}` (see --help)"),
        }
    }

    Ok(Command::Run(config))
}

fn parse_dimension(flag: &str, value: Option<String>) -> anyhow::Result<u32> {
    let value = value.with_context(|| format!("{flag} needs a value"))?;
    let parsed: u32 = value
        .parse()
        .with_context(|| format!("{flag}: `{value}` is not a number"))?;
    if parsed == 0 {
        bail!("{flag} must be positive");
    }
    Ok(parsed)
}

fn parse_path(flag: &str, value: Option<String>) -> anyhow::Result<PathBuf> {
    value
        .map(PathBuf::from)
        .with_context(|| format!("{flag} needs a path"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Command> {
        parse_args(args.iter().map(|s| (*s).to_string()))
    }

    fn config(args: &[&str]) -> AppConfig {
        match parse(args).unwrap() {
            Command::Run(config) => config,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn defaults_without_arguments() {
        let config = config(&[]);
        assert_eq!(config.title, "Lumen Viewer");
        assert!(config.model_path.is_none());
        assert!(config.texture_path.is_none());
    }

    #[test]
    fn parses_every_flag() {
        let config = config(&[
            "--width",
            "1024",
            "--height",
            "768",
            "--no-vsync",
            "--validation",
            "--model",
            "room.obj",
            "-t",
            "room.png",
        ]);
        assert_eq!((config.width, config.height), (1024, 768));
        assert!(!config.vsync);
        assert!(config.validation);
        assert_eq!(config.model_path, Some(PathBuf::from("room.obj")));
        assert_eq!(config.texture_path, Some(PathBuf::from("room.png")));
    }

    #[test]
    fn help_wins() {
        assert!(matches!(parse(&["--vsync", "-h"]).unwrap(), Command::Help));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--width"]).is_err());
        assert!(parse(&["--width", "wide"]).is_err());
        assert!(parse(&["--height", "0"]).is_err());
        assert!(parse(&["--model"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
    }
}
