use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    List,
    Replay { script: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub(crate) root: Option<PathBuf>,
    pub(crate) seed: Option<u64>,
    pub(crate) realtime: bool,
    pub(crate) command: Command,
}

pub(crate) fn parse_args<I>(args: I) -> Result<Invocation, String>
where
    I: IntoIterator<Item = String>,
{
    let args = args.into_iter().collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }

    let mut root = None;
    let mut seed = None;
    let mut realtime = false;
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                return Ok(Invocation {
                    root,
                    seed,
                    realtime,
                    command: Command::Help,
                });
            }
            "--root" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --root".to_string())?;
                root = Some(PathBuf::from(value));
                index += 2;
            }
            "--seed" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --seed".to_string())?;
                seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid --seed value '{value}' (expected u64)"))?,
                );
                index += 2;
            }
            "--realtime" => {
                realtime = true;
                index += 1;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let command = match command {
        "list" => {
            if !command_args.is_empty() {
                return Err("list takes no arguments".to_string());
            }
            Command::List
        }
        "replay" => match command_args {
            [script] => Command::Replay {
                script: PathBuf::from(script),
            },
            [] => return Err("replay requires <script.json>".to_string()),
            _ => return Err("replay takes exactly one script path".to_string()),
        },
        other => return Err(format!("unknown subcommand '{other}'\n\n{}", usage_text())),
    };

    Ok(Invocation {
        root,
        seed,
        realtime,
        command,
    })
}

pub(crate) fn usage_text() -> String {
    [
        "usage:",
        "  title_host [--root <dir>] [--seed <u64>] [--realtime] replay <script.json>",
        "  title_host [--root <dir>] list",
        "",
        "options:",
        "  --root <dir>   data root holding assets/ (default: TITLE_EDIT_ROOT, then upward search)",
        "  --seed <u64>   seed for random screen selection",
        "  --realtime     sleep through frame events instead of running them back to back",
    ]
    .join("\n")
}
