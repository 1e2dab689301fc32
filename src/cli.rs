use clap::{Parser, Subcommand, ValueEnum};

/// VTOP portal login and timetable scraping.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service
    Serve {
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Log in interactively on this terminal
    Login {
        /// Registration number; prompted for when absent
        #[arg(long)]
        username: Option<String>,
        /// Password; prompted for when absent
        #[arg(long, env = "VTOP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// External recognizer reading the image on stdin and printing the text
        #[arg(long, env = "CAPTCHA_SOLVER")]
        solver_command: Option<String>,
        /// Print the timetable as JSON after logging in
        #[arg(long)]
        timetable: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    Pretty,
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}
