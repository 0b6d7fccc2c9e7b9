//! calctable - evaluate unit-aware formulas with uncertainty from the command line

mod error;

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use calctable_core::{DataTable, EngineConfig};
use calctable_engine::engine::{Value, format_number};
use calctable_engine::{Quantity, UnitError};
use directories::ProjectDirs;

use error::CliError;

/// Column holding the evaluated formula. `=` keeps it clear of user names.
const RESULT_COLUMN: &str = "=result";

fn print_usage() {
    eprintln!("Usage: calctable -c FORMULA [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <FORMULA>       Formula to evaluate, e.g. '{{d}} / {{t}}'");
    eprintln!("  --bind <NAME=VALUE[:UNIT]>    Value for {{NAME}} (can be repeated)");
    eprintln!("  --sigma <NAME=DELTA>          Uncertainty of a bound value (can be repeated)");
    eprintln!("  --const <NAME=VALUE[:UNIT]>   Constant usable as a bare NAME (can be repeated)");
    eprintln!("  -p, --precision <DIGITS>      Significant digits in the output");
    eprintln!("  --config <FILE>               Engine config (TOML)");
    eprintln!("  --no-config                   Ignore the user config file");
    eprintln!("  -h, --help                    Print help");
}

/// `NAME=VALUE[:UNIT]`
struct Assignment {
    name: String,
    value: f64,
    unit: Option<String>,
}

#[derive(Default)]
struct Options {
    formula: Option<String>,
    bindings: Vec<Assignment>,
    sigmas: Vec<Assignment>,
    constants: Vec<Assignment>,
    precision: Option<usize>,
    config_file: Option<PathBuf>,
    no_config: bool,
}

fn parse_assignment(
    flag: &'static str,
    arg: &str,
    allow_unit: bool,
) -> Result<Assignment, CliError> {
    let expected = if allow_unit {
        "NAME=VALUE[:UNIT]"
    } else {
        "NAME=VALUE"
    };
    let bad = || CliError::BadArgument {
        flag,
        arg: arg.to_string(),
        expected,
    };

    let (name, rest) = arg.split_once('=').ok_or_else(bad)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(bad());
    }
    let (value, unit) = match rest.split_once(':') {
        Some((value, unit)) if allow_unit => (value, Some(unit.trim().to_string())),
        Some(_) => return Err(bad()),
        None => (rest, None),
    };
    let value: f64 = value.trim().parse().map_err(|_| bad())?;
    Ok(Assignment {
        name: name.to_string(),
        value,
        unit: unit.filter(|u| !u.is_empty()),
    })
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>, CliError> {
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = |name: &'static str| -> Result<&str, CliError> {
            i += 1;
            args.get(i)
                .map(String::as_str)
                .ok_or(CliError::MissingValue(name))
        };
        match flag {
            "-h" | "--help" => return Ok(None),
            "-c" | "--command" => options.formula = Some(value("--command")?.to_string()),
            "--bind" => {
                let arg = value("--bind")?;
                options.bindings.push(parse_assignment("--bind", arg, true)?);
            }
            "--sigma" => {
                let arg = value("--sigma")?;
                options.sigmas.push(parse_assignment("--sigma", arg, false)?);
            }
            "--const" => {
                let arg = value("--const")?;
                options.constants.push(parse_assignment("--const", arg, true)?);
            }
            "-p" | "--precision" => {
                let arg = value("--precision")?;
                let digits = arg.parse().map_err(|_| CliError::BadArgument {
                    flag: "--precision",
                    arg: arg.to_string(),
                    expected: "a number of digits",
                })?;
                options.precision = Some(digits);
            }
            "--config" => options.config_file = Some(PathBuf::from(value("--config")?)),
            "--no-config" => options.no_config = true,
            arg if arg.starts_with('-') => return Err(CliError::UnknownOption(arg.to_string())),
            arg => return Err(CliError::UnexpectedArgument(arg.to_string())),
        }
        i += 1;
    }

    if options.formula.is_none() {
        return Err(CliError::NoFormula);
    }
    Ok(Some(options))
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "calctable")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// An explicit `--config` must load; the user config file falls back to
/// defaults with a warning.
fn load_config(options: &Options) -> anyhow::Result<EngineConfig> {
    if let Some(path) = &options.config_file {
        return EngineConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }
    if options.no_config {
        return Ok(EngineConfig::default());
    }
    match user_config_path() {
        Some(path) if path.exists() => Ok(load_user_config(&path)),
        _ => Ok(EngineConfig::default()),
    }
}

fn load_user_config(path: &Path) -> EngineConfig {
    EngineConfig::load(path).unwrap_or_else(|err| {
        eprintln!("Warning: {}; using defaults", err);
        EngineConfig::default()
    })
}

/// Evaluate the formula as a one-row table and render `value [± delta] [unit]`.
fn evaluate(options: &Options, config: EngineConfig) -> anyhow::Result<String> {
    let Some(formula) = options.formula.as_deref() else {
        bail!(CliError::NoFormula);
    };
    // allow spreadsheet-style "=formula"
    let formula = formula.strip_prefix('=').unwrap_or(formula);
    let precision = options.precision.unwrap_or(config.default_precision);
    let suffix = config.uncertainty_suffix.clone();

    let mut table = DataTable::with_config(config);
    if !options.constants.is_empty() {
        let constants = options
            .constants
            .iter()
            .map(|c| Ok((c.name.clone(), Quantity::parse(c.value, c.unit.as_deref())?)))
            .collect::<Result<HashMap<String, Quantity>, UnitError>>()?;
        table.set_constants(Box::new(constants));
    }

    for binding in &options.bindings {
        table.add_data_column(
            &binding.name,
            binding.unit.as_deref(),
            vec![Value::Number(binding.value)],
        )?;
    }
    if table.row_count() == 0 {
        table.resize_rows(1)?;
    }

    for sigma in &options.sigmas {
        if table.column(&sigma.name).is_none() {
            bail!("--sigma {}: no --bind for '{}'", sigma.name, sigma.name);
        }
        let column = format!("sigma {}", sigma.name);
        table.add_uncertainty_column(&column, &sigma.name)?;
        table.set_cell(&column, 0, Value::Number(sigma.value))?;
    }

    let propagate = !options.sigmas.is_empty();
    table.add_calculated_column(RESULT_COLUMN, formula, propagate)?;

    let result = table
        .column(RESULT_COLUMN)
        .context("result column missing")?;
    let value = match result.values().first() {
        Some(Value::Number(v)) => *v,
        Some(Value::Error(e)) => bail!("{}", e.message),
        _ => bail!("Formula produced no value"),
    };

    let mut line = format_number(value, precision);
    if propagate {
        let delta_column = format!("{}{}", RESULT_COLUMN, suffix);
        match table.column_values(&delta_column)?.first() {
            Some(Value::Number(delta)) => {
                line.push_str(" ± ");
                line.push_str(&format_number(*delta, precision));
            }
            Some(Value::Error(e)) => bail!("{}", e.message),
            _ => {}
        }
    }
    if let Some(unit) = result.unit() {
        line.push(' ');
        line.push_str(&unit.format());
    }
    Ok(line)
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    let config = match load_config(&options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    match evaluate(&options, config) {
        Ok(line) => println!("{}", line),
        Err(e) => {
            println!("#ERR: {}", e);
            std::process::exit(1);
        }
    }
}
