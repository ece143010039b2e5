pub mod logging;

use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;
use url::Url;

pub const ARG_API_URL: &str = "api-url";
pub const ARG_SESSION_FILE: &str = "session-file";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_EVENT: &str = "event";
pub const ARG_USERNAME: &str = "username";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_DELIVERY_FAILURE: &str = "on-delivery-failure";
pub const ARG_ID: &str = "id";
pub const ARG_ABSENT: &str = "absent";
pub const ARG_DEVICE: &str = "device";
pub const ARG_CONTINUOUS: &str = "continuous";
pub const ARG_INTERVAL: &str = "interval";
pub const ARG_SEARCH: &str = "search";
pub const ARG_STATUS: &str = "status";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("rollcall")
        .about("Event check-in console")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_API_URL)
                .long(ARG_API_URL)
                .help("Base URL of the registration backend, example: https://backend.example.org")
                .env("ROLLCALL_API_URL")
                .global(true)
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("Where the signed-in session is kept (default: ~/.config/rollcall/session.json)")
                .env("ROLLCALL_SESSION_FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long(ARG_TIMEOUT)
                .help("Request timeout in seconds")
                .env("ROLLCALL_TIMEOUT")
                .global(true)
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .subcommand(login())
        .subcommand(Command::new("logout").about("Forget the stored session"))
        .subcommand(Command::new("activities").about("List events open for check-in"))
        .subcommand(
            Command::new("stats")
                .about("Attendance statistics for an event")
                .arg(event_arg(true)),
        )
        .subcommand(roster())
        .subcommand(attendance())
        .subcommand(scan())
        .subcommand(watch());

    logging::with_args(command)
}

fn event_arg(required: bool) -> Arg {
    Arg::new(ARG_EVENT)
        .short('e')
        .long(ARG_EVENT)
        .help("Event collection, as listed by `rollcall activities`")
        .env("ROLLCALL_EVENT")
        .required(required)
}

fn login() -> Command {
    Command::new("login")
        .about("Sign in with password and verification code")
        .arg(
            Arg::new(ARG_USERNAME)
                .short('u')
                .long(ARG_USERNAME)
                .help("Organizer username (prompted when missing)")
                .env("ROLLCALL_USERNAME"),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Organizer password (prompted when missing)")
                .env("ROLLCALL_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_DELIVERY_FAILURE)
                .long(ARG_DELIVERY_FAILURE)
                .help("What to do when the code cannot be delivered: go back to login, or stay and retry")
                .env("ROLLCALL_DELIVERY_FAILURE")
                .default_value("login")
                .value_parser(["login", "remediate"]),
        )
}

fn roster() -> Command {
    Command::new("roster")
        .about("Registrations of an event with their attendance")
        .arg(event_arg(true))
        .arg(
            Arg::new(ARG_SEARCH)
                .short('s')
                .long(ARG_SEARCH)
                .help("Only list registrations whose name, email or phone contains this text")
                .env("ROLLCALL_SEARCH"),
        )
        .arg(
            Arg::new(ARG_STATUS)
                .long(ARG_STATUS)
                .help("Only list registrations with this attendance status")
                .env("ROLLCALL_STATUS")
                .default_value("all")
                .value_parser(["all", "attended", "absent"]),
        )
}

fn attendance() -> Command {
    Command::new("attendance")
        .about("Mark or unmark one participant as attended")
        .arg(
            Arg::new(ARG_ID)
                .help("Registration id")
                .required(true),
        )
        .arg(event_arg(true))
        .arg(
            Arg::new(ARG_ABSENT)
                .long(ARG_ABSENT)
                .help("Clear the attendance mark instead of setting it")
                .action(ArgAction::SetTrue),
        )
}

fn scan() -> Command {
    Command::new("scan")
        .about("Check participants in by scanning their QR codes")
        .arg(event_arg(false))
        .arg(
            Arg::new(ARG_DEVICE)
                .short('d')
                .long(ARG_DEVICE)
                .help("Scanner device emitting one decoded QR payload per line; repeat or separate with commas")
                .env("ROLLCALL_SCANNER_DEVICE")
                .required(true)
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_CONTINUOUS)
                .long(ARG_CONTINUOUS)
                .help("Reopen the scanner after every result")
                .action(ArgAction::SetTrue),
        )
}

fn watch() -> Command {
    Command::new("watch")
        .about("Follow attendance changes of an event")
        .arg(event_arg(true))
        .arg(
            Arg::new(ARG_INTERVAL)
                .long(ARG_INTERVAL)
                .help("Polling period in seconds")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
