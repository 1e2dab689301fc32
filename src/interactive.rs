//! The `login` command: one console session from captcha to landing page.

use anyhow::{Context, Result, bail};
use std::process::ExitCode;
use tracing::{debug, info};
use yansi::Paint;

use crate::utils::prompt;
use crate::vtop::{
    CaptchaSolver, CommandSolver, LoginSubmission, Portal, PromptSolver, Semester, VtopError,
};

/// Inputs the console would otherwise be asked for are optional.
pub struct LoginOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    pub print_timetable: bool,
}

/// Pick the recognizer: an external command when configured, else the operator.
pub fn solver_for(command: Option<&str>) -> Box<dyn CaptchaSolver> {
    match command.and_then(CommandSolver::from_command_line) {
        Some(solver) => Box::new(solver),
        None => Box::new(PromptSolver::default()),
    }
}

/// Log in on one session, reading the captcha through `solver`.
///
/// Returns a failure exit code when the portal rejects the login; transport
/// and captcha recognition problems are errors.
pub async fn run(
    portal: &Portal,
    solver: &dyn CaptchaSolver,
    options: LoginOptions,
) -> Result<ExitCode> {
    let pending = portal
        .begin_login()
        .await
        .context("Failed to open login page")?;

    let captcha_text = match &pending.captcha_image {
        Some(image) => {
            let text = solver
                .solve(image)
                .await
                .context("Captcha recognition failed")?;
            println!("Recognized Captcha:{text}");
            Some(text)
        }
        None if pending.captcha_needed => bail!("Captcha image could not be fetched"),
        None => None,
    };

    let username = match options.username {
        Some(username) => username,
        None => prompt("Registration Number:").await?,
    };
    let password = match options.password {
        Some(password) => password,
        None => prompt("Password:").await?,
    };

    let semester = Semester::current();
    info!(semester = %semester, "current semester");
    println!("Semester: {semester}");
    println!("Logging in User:");

    let submission = LoginSubmission {
        username,
        password,
        captcha_text,
        form_action: None,
    };

    let session = match portal.complete_login(pending, &submission).await {
        Ok(session) => session,
        Err(e @ (VtopError::Auth(_) | VtopError::UnclassifiedLogin)) => {
            debug!(error = %e, "login rejected");
            println!("{}", "Recheck Credentials".red());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Login request failed"),
    };
    println!("{}", "Successfully Logged In".green());

    if options.print_timetable {
        let rows = portal
            .timetable(session.cookies, None)
            .await
            .context("Failed to fetch timetable")?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(ExitCode::SUCCESS)
}
