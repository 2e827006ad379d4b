use anyhow::Result;

use crate::config::DEFAULT_RETENTION_DAYS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Scan {
        network_id: i64,
    },
    ScanAll,
    Discovered {
        network_id: Option<i64>,
    },
    Promote {
        discovered_id: i64,
        name: String,
        datacenter_id: Option<i64>,
    },
    Purge {
        days: Option<i64>,
    },
    Help,
    Version,
}

pub fn version_text() -> String {
    format!("rackscan {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
rackscan - network discovery for infrastructure inventory

Usage:
  rackscan scan --network <ID>
  rackscan scan-all
  rackscan discovered [--network <ID>]
  rackscan promote <DISCOVERED_ID> --name <NAME> [--datacenter <ID>]
  rackscan purge [--days <N>]
  rackscan --help
  rackscan --version

Options:
  -n, --network <ID>      Network to scan or list
      --name <NAME>       Promote: name of the new device
      --datacenter <ID>   Promote: datacenter for the new device
      --days <N>          Purge: retention window in days (default: {default_days})
  -h, --help              Show this help text
  -V, --version           Show version

Environment:
  RACKSCAN_DB_PATH        Database file (default: platform data directory)
  RUST_LOG                Log filter (default: info)",
        version = version_text(),
        default_days = DEFAULT_RETENTION_DAYS
    )
}

fn parse_id_arg(flag: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>().ok().filter(|v| *v > 0).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid value for {}: '{}'. Expected a positive integer.\n\n{}",
            flag,
            raw,
            usage_text()
        )
    })
}

/// Splits `--flag=value`; `None` if `arg` is not that flag
fn inline_value<'a>(arg: &'a str, flag: &str) -> Option<&'a str> {
    arg.strip_prefix(flag).and_then(|rest| rest.strip_prefix('='))
}

fn missing_value(flag: &str) -> anyhow::Error {
    anyhow::anyhow!("Missing value for {}.\n\n{}", flag, usage_text())
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut network: Option<i64> = None;
    let mut name: Option<String> = None;
    let mut datacenter: Option<i64> = None;
    let mut days: Option<i64> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "scan" | "scan-all" | "discovered" | "promote" | "purge" if command.is_none() => {
                command = Some(arg.to_string());
            }
            "scan" | "scan-all" | "discovered" | "promote" | "purge" => {
                return Err(anyhow::anyhow!(
                    "Multiple commands provided. Use only one command.\n\n{}",
                    usage_text()
                ));
            }
            "-n" | "--network" => {
                let value = iter.next().ok_or_else(|| missing_value("--network"))?;
                network = Some(parse_id_arg("--network", value.as_ref())?);
            }
            "--name" => {
                let value = iter.next().ok_or_else(|| missing_value("--name"))?;
                name = Some(value.as_ref().to_string());
            }
            "--datacenter" => {
                let value = iter.next().ok_or_else(|| missing_value("--datacenter"))?;
                datacenter = Some(parse_id_arg("--datacenter", value.as_ref())?);
            }
            "--days" => {
                let value = iter.next().ok_or_else(|| missing_value("--days"))?;
                days = Some(parse_id_arg("--days", value.as_ref())?);
            }
            _ if inline_value(arg, "--network").is_some() => {
                let value = inline_value(arg, "--network").unwrap_or_default();
                if value.is_empty() {
                    return Err(missing_value("--network"));
                }
                network = Some(parse_id_arg("--network", value)?);
            }
            _ if inline_value(arg, "--name").is_some() => {
                let value = inline_value(arg, "--name").unwrap_or_default();
                if value.is_empty() {
                    return Err(missing_value("--name"));
                }
                name = Some(value.to_string());
            }
            _ if inline_value(arg, "--datacenter").is_some() => {
                let value = inline_value(arg, "--datacenter").unwrap_or_default();
                if value.is_empty() {
                    return Err(missing_value("--datacenter"));
                }
                datacenter = Some(parse_id_arg("--datacenter", value)?);
            }
            _ if inline_value(arg, "--days").is_some() => {
                let value = inline_value(arg, "--days").unwrap_or_default();
                if value.is_empty() {
                    return Err(missing_value("--days"));
                }
                days = Some(parse_id_arg("--days", value)?);
            }
            _ if arg.starts_with('-') => {
                return Err(anyhow::anyhow!(
                    "Unknown argument: {arg}\n\n{}",
                    usage_text()
                ));
            }
            _ => positional.push(arg.to_string()),
        }
    }

    let Some(command) = command else {
        if positional.is_empty() && network.is_none() && name.is_none() {
            return Ok(CliCommand::Help);
        }
        return Err(anyhow::anyhow!("No command provided.\n\n{}", usage_text()));
    };

    if command != "promote" && !positional.is_empty() {
        return Err(anyhow::anyhow!(
            "Unknown argument: {}\n\n{}",
            positional[0],
            usage_text()
        ));
    }
    if command != "promote" && (name.is_some() || datacenter.is_some()) {
        return Err(anyhow::anyhow!(
            "--name/--datacenter are only valid with promote.\n\n{}",
            usage_text()
        ));
    }
    if command != "purge" && days.is_some() {
        return Err(anyhow::anyhow!(
            "--days is only valid with purge.\n\n{}",
            usage_text()
        ));
    }

    match command.as_str() {
        "scan" => {
            let network_id = network.ok_or_else(|| {
                anyhow::anyhow!("scan requires --network <ID>.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Scan { network_id })
        }
        "scan-all" => {
            if network.is_some() {
                return Err(anyhow::anyhow!(
                    "--network is not valid with scan-all.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::ScanAll)
        }
        "discovered" => Ok(CliCommand::Discovered {
            network_id: network,
        }),
        "promote" => {
            if network.is_some() {
                return Err(anyhow::anyhow!(
                    "--network is not valid with promote.\n\n{}",
                    usage_text()
                ));
            }
            let raw_id = match positional.as_slice() {
                [id] => id,
                [] => {
                    return Err(anyhow::anyhow!(
                        "promote requires <DISCOVERED_ID>.\n\n{}",
                        usage_text()
                    ))
                }
                [_, extra, ..] => {
                    return Err(anyhow::anyhow!(
                        "Unknown argument: {extra}\n\n{}",
                        usage_text()
                    ))
                }
            };
            let discovered_id = parse_id_arg("<DISCOVERED_ID>", raw_id)?;
            let name = name.ok_or_else(|| {
                anyhow::anyhow!("promote requires --name <NAME>.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Promote {
                discovered_id,
                name,
                datacenter_id: datacenter,
            })
        }
        "purge" => {
            if network.is_some() {
                return Err(anyhow::anyhow!(
                    "--network is not valid with purge.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::Purge { days })
        }
        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\n\n{}",
            usage_text()
        )),
    }
}
