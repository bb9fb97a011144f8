use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpPostsApi, Outcome, PostController};
use futures::StreamExt;
use shared::domain::PostId;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod view;

use config::load_settings;

const WATCH_TICK: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "posty", about = "List, publish and remove short posts")]
struct Args {
    /// Config file; defaults to ./posty.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current posts.
    List,
    /// Publish a post.
    Create {
        message: String,
        /// Stay until the delayed reload has replaced the optimistic list.
        #[arg(long)]
        wait_reconcile: bool,
    },
    /// Delete a post by id.
    Remove { id: String },
    /// Print the view whenever posts or visible messages change, until interrupted.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    info!(server_url = %settings.server_url, "using posts backend");

    let api = HttpPostsApi::new(&settings.server_url)
        .with_context(|| format!("cannot use server url '{}'", settings.server_url))?;
    let controller = PostController::new(Arc::new(api), settings.controller_settings());

    let result = run(&controller, args.command).await;
    controller.shutdown().await;
    result
}

async fn run(controller: &Arc<PostController>, command: Command) -> Result<()> {
    match command {
        Command::List => {
            let outcome = controller.start().await;
            view::print_state(&controller.snapshot());
            into_result(outcome)
        }
        Command::Create {
            message,
            wait_reconcile,
        } => {
            controller.start().await;
            controller.set_draft(message.clone());
            let outcome = controller.create_post(&message).await;
            view::print_state(&controller.snapshot());
            if outcome.is_applied() && wait_reconcile {
                controller.wait_reconciled().await;
                println!("-- reconciled --");
                view::print_state(&controller.snapshot());
            }
            into_result(outcome)
        }
        Command::Remove { id } => {
            into_result(controller.start().await)?;
            let id = PostId::from(id);
            let Some(post) = controller
                .posts()
                .into_iter()
                .find(|post| post.id == id)
            else {
                bail!("no post with id {id}");
            };
            let outcome = controller.remove_post(&post).await;
            view::print_state(&controller.snapshot());
            into_result(outcome)
        }
        Command::Watch => watch(controller).await,
    }
}

async fn watch(controller: &Arc<PostController>) -> Result<()> {
    let mut updates = WatchStream::new(controller.subscribe());
    // Message decay is computed from the clock, so re-render on a tick as well.
    let mut tick = tokio::time::interval(WATCH_TICK);
    let mut latest = controller.snapshot();
    let mut last_rendered = String::new();
    controller.start().await;

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(state) = update else {
                    return Ok(());
                };
                latest = state;
            }
            _ = tick.tick() => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                info!("stopping watch");
                return Ok(());
            }
        }
        let now = Instant::now();
        if let Some(rendered) = view::render_if_changed(&mut last_rendered, &latest, now) {
            print!("{rendered}");
        }
    }
}

fn into_result(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Applied | Outcome::Discarded => Ok(()),
        Outcome::Failed { message } => Err(anyhow!(message)),
    }
}
