use crate::{
    auth::{AuthConfig, AuthEvent, AuthMachine, AuthState, IssueFailurePolicy},
    cli::{
        console::{Console, prompt_label},
        globals::GlobalArgs,
    },
    gateway::HttpGateway,
};
use anyhow::{Result, anyhow, bail};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub issue_failure: IssueFailurePolicy,
}

/// Execute the login action.
/// # Errors
/// Returns an error if input ends or the operator interrupts before the
/// second factor is verified.
pub async fn execute(args: Args) -> Result<()> {
    let mut console = Console::new();
    let sessions = args.globals.sessions();
    let gateway = Arc::new(args.globals.gateway(Arc::clone(&sessions))?);
    let config = AuthConfig {
        issue_failure: args.issue_failure,
        ..AuthConfig::default()
    };
    let (mut auth, mut ticks) = AuthMachine::new(gateway, sessions, console.notifier(), config);

    if auth.restore().await {
        let name = auth
            .profile()
            .map_or_else(String::new, |profile| profile.display_name.clone());
        println!("Already signed in as {name}. Run `rollcall logout` to switch accounts.");
        return Ok(());
    }

    let mut username = args.username;
    let mut password = args.password;

    loop {
        let result = match auth.state() {
            AuthState::Authenticated => break,
            AuthState::Login => {
                let user = match username.take() {
                    Some(user) => user,
                    None => ask_username(&mut console, auth.username()).await?,
                };
                let pass = match password.take() {
                    Some(pass) => pass,
                    None => console.secret("Password: ").await?,
                };
                auth.submit_credentials(&user, pass).await
            }
            AuthState::AwaitingCode => {
                prompt_label(&code_prompt(&auth));
                let line = next_input(&mut console, &mut auth, &mut ticks).await?;
                match line.as_str() {
                    "r" => auth.resend_code().await,
                    "a" => {
                        auth.abort();
                        Ok(())
                    }
                    code => auth.submit_code(code).await,
                }
            }
            AuthState::DeliveryProblem => {
                prompt_label("The code could not be delivered. [r]etry or [a]bort: ");
                let line = next_input(&mut console, &mut auth, &mut ticks).await?;
                match line.as_str() {
                    "r" => auth.retry_delivery().await,
                    "a" => {
                        auth.abort();
                        Ok(())
                    }
                    _ => continue,
                }
            }
        };

        let reported = console.flush_notices();
        if let Err(err) = result {
            debug!(kind = ?err.kind(), "login step failed");
            if !reported {
                eprintln!("✖ {}", auth.error().map_or_else(|| err.to_string(), ToString::to_string));
            }
        }
    }

    if let Some(profile) = auth.profile() {
        println!("Signed in as {} ({})", profile.display_name, profile.id);
    }
    Ok(())
}

async fn ask_username(console: &mut Console, previous: &str) -> Result<String> {
    if previous.is_empty() {
        return console.prompt("Username: ").await;
    }
    let line = console.prompt(&format!("Username [{previous}]: ")).await?;
    Ok(if line.is_empty() {
        previous.to_string()
    } else {
        line
    })
}

fn code_prompt(auth: &AuthMachine<HttpGateway>) -> String {
    let remaining = auth.cooldown_remaining();
    if auth.can_resend() {
        "Verification code ([r]esend, [a]bort): ".to_string()
    } else if remaining > 0 {
        format!("Verification code (resend in {remaining}s, [a]bort): ")
    } else {
        "Verification code ([a]bort): ".to_string()
    }
}

/// Waits for a line while keeping the resend cooldown running.
async fn next_input(
    console: &mut Console,
    auth: &mut AuthMachine<HttpGateway>,
    ticks: &mut UnboundedReceiver<AuthEvent>,
) -> Result<String> {
    loop {
        tokio::select! {
            line = console.next_line() => {
                return line.ok_or_else(|| {
                    auth.abort();
                    anyhow!("input closed before the code was entered")
                });
            }
            Some(tick) = ticks.recv() => auth.handle(tick),
            _ = tokio::signal::ctrl_c() => {
                auth.abort();
                bail!("Login interrupted.");
            }
        }
    }
}
