use std::env;
use std::process::ExitCode;

use tracing::error;

mod app;

use app::cli::{parse_args, usage_text, Command};
use app::{bootstrap, loop_runner, script};

fn main() -> ExitCode {
    let invocation = match parse_args(env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    if invocation.command == Command::Help {
        println!("{}", usage_text());
        return ExitCode::SUCCESS;
    }

    let settings = match bootstrap::load_settings(invocation.root.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            bootstrap::init_tracing(false);
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    bootstrap::init_tracing(settings.configuration.debug_logging);

    match invocation.command {
        Command::Help => ExitCode::SUCCESS,
        Command::List => match bootstrap::build_repository(&settings.paths) {
            Ok(repository) => loop_runner::run_list(&repository),
            Err(err) => {
                error!(error = %err, "startup_failed");
                ExitCode::FAILURE
            }
        },
        Command::Replay { script: script_path } => {
            let events = match script::load_script(&script_path) {
                Ok(events) => events,
                Err(err) => {
                    error!(error = %err, "replay_script_invalid");
                    return ExitCode::FAILURE;
                }
            };
            match bootstrap::build_host(settings, invocation.seed) {
                Ok(host) => loop_runner::run_replay(host, &events, invocation.realtime),
                Err(err) => {
                    error!(error = %err, "startup_failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
