use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use vtop::app::App;
use vtop::cli::{Args, Command};
use vtop::config::Config;
use vtop::interactive::{self, LoginOptions};
use vtop::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config and setup logging before anything else so startup logs are never silently dropped
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting vtop"
    );

    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Command::Serve { port } => app.serve(port).await,
        Command::Login {
            username,
            password,
            solver_command,
            timetable,
        } => {
            let solver = interactive::solver_for(solver_command.as_deref());
            let options = LoginOptions {
                username,
                password,
                print_timetable: timetable,
            };
            interactive::run(app.portal(), solver.as_ref(), options).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = ?e, "fatal error");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
