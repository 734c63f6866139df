//! Purpose: Hold top-level CLI command dispatch for `quillpress`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Client commands go through the store layer, never raw transport.
//! Invariants: Output envelopes and exit code semantics stay unchanged.

use super::*;

use std::path::Path;

use quillpress::api::{BlogApi, PostDraft, PostPatch};

pub(super) fn dispatch_command(
    command: Command,
    server: String,
    config_dir: PathBuf,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "quillpress", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(&json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }))?;
            Ok(RunOutcome::ok())
        }
        Command::Serve {
            bind,
            data_dir,
            secret,
            allow_non_loopback,
            max_body_bytes,
        } => {
            let bind = bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_hint("Use a host:port value like 127.0.0.1:9680.")
            })?;
            let secret = secret
                .or_else(|| std::env::var("QUILLPRESS_SECRET").ok())
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message("token secret is required")
                        .with_hint("Pass --secret or set QUILLPRESS_SECRET.")
                })?;
            let config = serve::ServeConfig {
                bind,
                data_dir: data_dir.unwrap_or_else(default_data_dir),
                secret,
                allow_non_loopback,
                max_body_bytes,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::Register {
            username,
            email,
            password,
            admin,
        } => {
            let mut sessions = session_store(&server, &config_dir)?;
            sessions.register(&username, &email, &password, admin);
            finish_session_command(&sessions, "Registration failed")
        }
        Command::Login { email, password } => {
            let mut sessions = session_store(&server, &config_dir)?;
            sessions.login(&email, &password);
            finish_session_command(&sessions, "Login failed")
        }
        Command::Logout => {
            let mut sessions = session_store(&server, &config_dir)?;
            sessions.logout();
            emit_json(&json!({ "ok": true }))?;
            Ok(RunOutcome::ok())
        }
        Command::Whoami => {
            let profile = api_client(&server, &config_dir)?.profile()?;
            emit_value(&profile)?;
            Ok(RunOutcome::ok())
        }
        Command::Posts => {
            let mut posts = post_store(&server, &config_dir)?;
            posts.fetch_posts();
            if let Some(err) = posts.error() {
                return Err(store_error(err));
            }
            emit_value(&posts.posts())?;
            Ok(RunOutcome::ok())
        }
        Command::Post { id } => {
            let mut posts = post_store(&server, &config_dir)?;
            posts.fetch_post(&id);
            if let Some(err) = posts.error() {
                return Err(store_error(err));
            }
            match posts.selected_post() {
                Some(post) => emit_value(post)?,
                None => {
                    return Err(Error::new(ErrorKind::NotFound)
                        .with_message("Blog post not found"));
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Create {
            title,
            content,
            image_url,
            tags,
        } => {
            let mut posts = post_store(&server, &config_dir)?;
            let draft = PostDraft {
                title,
                content,
                image_url,
                tags,
            };
            let post = posts.add_post(&draft)?;
            emit_value(&post)?;
            Ok(RunOutcome::ok())
        }
        Command::Edit {
            id,
            title,
            content,
            image_url,
            tags,
        } => {
            let mut posts = post_store(&server, &config_dir)?;
            let patch = PostPatch {
                title,
                content,
                image_url,
                // No --tag flags means leave the tag set alone.
                tags: if tags.is_empty() { None } else { Some(tags) },
            };
            let post = posts.edit_post(&id, &patch)?;
            emit_value(&post)?;
            Ok(RunOutcome::ok())
        }
        Command::Delete { id } => {
            let mut posts = post_store(&server, &config_dir)?;
            let message = posts.delete_post(&id)?;
            emit_json(&json!({ "message": message }))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn api_client(server: &str, config_dir: &Path) -> Result<ApiClient, Error> {
    Ok(ApiClient::new(server)?.with_session_file(SessionFile::new(config_dir)))
}

fn session_store(server: &str, config_dir: &Path) -> Result<SessionStore<ApiClient>, Error> {
    Ok(SessionStore::open(
        api_client(server, config_dir)?,
        SessionFile::new(config_dir),
    ))
}

fn post_store(server: &str, config_dir: &Path) -> Result<PostStore<ApiClient>, Error> {
    Ok(PostStore::new(api_client(server, config_dir)?))
}

fn finish_session_command(
    sessions: &SessionStore<ApiClient>,
    fallback: &str,
) -> Result<RunOutcome, Error> {
    if let Some(err) = sessions.error() {
        return Err(store_error(err));
    }
    match sessions.user_info() {
        Some(user) => {
            emit_value(user)?;
            Ok(RunOutcome::ok())
        }
        None => Err(Error::new(ErrorKind::Internal).with_message(fallback)),
    }
}
