use anyhow::Result;
use clap::Parser;
use motivaty::chat::{Transcript, group_by_level};
use motivaty::config::Config;
use motivaty::types::{Message, ResponseBody, Role};
use motivaty::workflow::{ChannelListener, WorkflowClient, WorkflowQuery, WorkflowResult};
use std::path::Path;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

/// Ask the learning assistant about a topic and watch the results arrive
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Question or topic to explore
    #[arg(required = true)]
    query: Vec<String>,

    /// Document to run the workflow against
    #[arg(short, long, value_name = "PATH")]
    file: Option<String>,

    /// Stop waiting for results after this many seconds
    #[arg(short, long, value_name = "SECS", value_parser = parse_seconds)]
    timeout: Option<Duration>,

    /// Print the learning roadmap of every application found
    #[arg(short, long)]
    roadmaps: bool,
}

impl Args {
    fn query_text(&self) -> String {
        self.query.join(" ")
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, std::num::ParseIntError> {
    raw.parse().map(Duration::from_secs)
}

fn format_message_timestamp(timestamp: OffsetDateTime) -> String {
    let mut datetime = timestamp;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).unwrap_or_default()
}

fn print_message(msg: &Message) {
    let who = match msg.role {
        Role::User => "you",
        Role::Assistant => "motivaty",
    };
    let marker = if msg.is_loading { " …" } else { "" };
    println!(
        "[{}] {who}: {}{marker}",
        format_message_timestamp(msg.created_at),
        msg.content
    );
    for attachment in &msg.attachments {
        println!("    attached {attachment}");
    }

    match &msg.body {
        ResponseBody::Text | ResponseBody::TextWithImages => {}
        ResponseBody::Concepts(concepts) => {
            for concept in concepts {
                println!(
                    "  • {} ({}, {}) {:.0}%",
                    concept.name,
                    concept.kind,
                    concept.domain,
                    concept.confidence * 100.0
                );
            }
        }
        ResponseBody::Applications(applications) => {
            for application in applications {
                println!("  • {}: {}", application.name, application.brief_description);
            }
        }
        ResponseBody::Roadmap(nodes) => {
            for (level, nodes) in group_by_level(nodes) {
                println!("  Level {level}");
                for node in nodes {
                    let time = node.estimated_time.as_deref().unwrap_or_default();
                    println!("    - {} [{time}] {}", node.title, node.description);
                }
            }
        }
    }
}

async fn wait_for(handle: &mut Option<JoinHandle<WorkflowResult<()>>>) -> WorkflowResult<()> {
    match handle {
        Some(task) => {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(error = %err, "submission task ended abnormally");
                    Ok(())
                }
            };
            *handle = None;
            outcome
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let query_text = args.query_text();
    tracing::info!(backend = %config.backend_url, "starting motivaty");

    let client = WorkflowClient::from_config(&config);
    let mut transcript = Transcript::new();

    let attachments = args.file.iter().cloned().collect();
    let turn = transcript.send(&query_text, attachments);
    for msg in transcript.messages() {
        print_message(msg);
    }

    let mut query = WorkflowQuery::new(query_text);
    if let Some(file) = &args.file {
        let name = Path::new(file)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());
        query = query.with_file(name);
    }
    let mut submission = Some(client.submit_query(query));

    let (listener, mut updates) = ChannelListener::new();
    client.start_polling(listener);

    let deadline = args.timeout.map(|timeout| tokio::time::Instant::now() + timeout);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = wait_until(deadline) => {
                tracing::info!("timeout reached");
                break;
            }
            outcome = wait_for(&mut submission) => {
                if outcome.is_err() && transcript.fail_placeholder(&turn.applications_id)
                    && let Some(msg) = transcript.get(&turn.applications_id)
                {
                    print_message(msg);
                }
            }
            update = updates.recv() => {
                let Some(update) = update else { break };
                if let Some(id) = transcript.apply_update(&update)
                    && let Some(msg) = transcript.get(&id)
                {
                    print_message(msg);
                }
            }
        }
    }

    client.stop_polling();

    if args.roadmaps {
        let applications = match transcript.get(&turn.applications_id).map(|msg| &msg.body) {
            Some(ResponseBody::Applications(apps)) => apps.clone(),
            _ => Vec::new(),
        };
        for application in &applications {
            let id = transcript.open_application(application);
            if let Some(msg) = transcript.get(&id) {
                print_message(msg);
            }
        }
    }

    Ok(())
}
