//! Purpose: `quillpress` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable JSON stdout formats.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::json;

mod command_dispatch;
mod serve;

use quillpress::api::{ApiClient, Error, ErrorKind, SessionFile, to_exit_code};
use quillpress::paths::{default_config_dir, default_data_dir};
use quillpress::store::{PostStore, SessionStore, StoreError};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `quillpress --help` for usage."));
            }
        },
    };

    let server = cli
        .server
        .or_else(|| std::env::var("QUILLPRESS_SERVER").ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let config_dir = cli.config_dir.unwrap_or_else(default_config_dir);

    command_dispatch::dispatch_command(cli.command, server, config_dir)
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

const DEFAULT_SERVER: &str = "http://127.0.0.1:9680";
const DEFAULT_BIND: &str = "127.0.0.1:9680";
const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Parser)]
#[command(
    name = "quillpress",
    version,
    about = "Blog publishing platform: CLI client and API server",
    after_help = r#"EXAMPLES
  $ quillpress serve --secret devsecret       # Terminal 1: run the backend
  $ quillpress register alice a@example.com pw --admin
  $ quillpress create --title "Hello" --content "First post"
  $ quillpress posts

LEARN MORE
  $ quillpress <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        help = "Backend base URL (default: http://127.0.0.1:9680; env: QUILLPRESS_SERVER)"
    )]
    server: Option<String>,
    #[arg(
        long,
        help = "Config directory for the persisted session (default: ~/.quillpress)",
        value_hint = ValueHint::DirPath
    )]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Serve the blog API over HTTP (loopback default)",
        after_help = r#"EXAMPLES
  $ quillpress serve --secret devsecret
  $ quillpress serve --bind 127.0.0.1:9681 --data-dir ./qp-data --secret devsecret

NOTES
  - Loopback is the default; non-loopback binds require --allow-non-loopback
  - The secret signs bearer tokens; reuse the same one across restarts"#
    )]
    Serve {
        #[arg(long, default_value = DEFAULT_BIND, help = "Bind address")]
        bind: String,
        #[arg(
            long,
            help = "Data directory for users and posts (default: ~/.quillpress/data)",
            value_hint = ValueHint::DirPath
        )]
        data_dir: Option<PathBuf>,
        #[arg(long, help = "Token signing secret (env: QUILLPRESS_SECRET)")]
        secret: Option<String>,
        #[arg(long, help = "Allow non-loopback binds (unsafe on open networks)")]
        allow_non_loopback: bool,
        #[arg(
            long,
            default_value_t = DEFAULT_MAX_BODY_BYTES,
            help = "Max request body size in bytes"
        )]
        max_body_bytes: u64,
    },
    #[command(
        arg_required_else_help = true,
        about = "Register a new account and log in",
        after_help = r#"EXAMPLES
  $ quillpress register alice a@example.com secret
  $ quillpress register admin admin@example.com secret --admin"#
    )]
    Register {
        #[arg(help = "Display name")]
        username: String,
        #[arg(help = "Email address (unique)")]
        email: String,
        #[arg(help = "Password")]
        password: String,
        #[arg(long, help = "Register with publishing rights")]
        admin: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Log in and persist the session",
        after_help = r#"EXAMPLES
  $ quillpress login a@example.com secret"#
    )]
    Login {
        #[arg(help = "Email address")]
        email: String,
        #[arg(help = "Password")]
        password: String,
    },
    #[command(about = "Forget the persisted session")]
    Logout,
    #[command(about = "Show the profile of the logged-in account")]
    Whoami,
    #[command(about = "List all posts")]
    Posts,
    #[command(arg_required_else_help = true, about = "Fetch one post by id")]
    Post {
        #[arg(help = "Post id")]
        id: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Create a post (publishing rights required)",
        after_help = r#"EXAMPLES
  $ quillpress create --title "Hello" --content "First post"
  $ quillpress create --title "Hello" --content "..." --tag intro --tag meta"#
    )]
    Create {
        #[arg(long, help = "Post title")]
        title: String,
        #[arg(long, help = "Post body")]
        content: String,
        #[arg(long = "image-url", help = "Optional cover image URL")]
        image_url: Option<String>,
        #[arg(long = "tag", help = "Repeatable tag for the post")]
        tags: Vec<String>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Edit a post (author or admin)",
        after_help = r#"EXAMPLES
  $ quillpress edit 66f0... --title "New title"
  $ quillpress edit 66f0... --content "Rewritten" --tag update

NOTES
  - Omitted fields keep their current values"#
    )]
    Edit {
        #[arg(help = "Post id")]
        id: String,
        #[arg(long, help = "New title")]
        title: Option<String>,
        #[arg(long, help = "New body")]
        content: Option<String>,
        #[arg(long = "image-url", help = "New cover image URL")]
        image_url: Option<String>,
        #[arg(long = "tag", help = "Replacement tag set (repeatable)")]
        tags: Vec<String>,
    },
    #[command(arg_required_else_help = true, about = "Delete a post (author or admin)")]
    Delete {
        #[arg(help = "Post id")]
        id: String,
    },
    #[command(about = "Print version info as JSON")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ quillpress completion bash > ~/.local/share/bash-completion/completions/quillpress
  $ quillpress completion zsh > ~/.zfunc/_quillpress"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    rendered
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => "internal",
        ErrorKind::Usage => "usage",
        ErrorKind::NotFound => "not-found",
        ErrorKind::AlreadyExists => "already-exists",
        ErrorKind::Permission => "permission",
        ErrorKind::Corrupt => "corrupt",
        ErrorKind::Io => "io",
    }
}

fn emit_error(err: &Error) {
    let body = json!({
        "error": {
            "kind": kind_label(err.kind()),
            "message": err.display_message("error"),
            "hint": err.hint(),
        }
    });
    eprintln!("{body}");
}

fn emit_json(value: &serde_json::Value) -> Result<(), Error> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output")
            .with_source(err)
    })?;
    println!("{rendered}");
    Ok(())
}

fn emit_value<T: serde::Serialize>(value: &T) -> Result<(), Error> {
    let encoded = serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output")
            .with_source(err)
    })?;
    emit_json(&encoded)
}

fn store_error(err: &StoreError) -> Error {
    Error::new(err.kind).with_message(err.message.clone())
}
