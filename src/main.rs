use std::fs;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use agentpool::agent::{AgentLoop, AgentSettings, Dispatcher, PoolConfig};
use agentpool::api::{ChatCompletionsBackend, ModelBackend};
use agentpool::cli::Args;
use agentpool::config::{default_top_k, Config, ServersFile};
use agentpool::local_tools::LocalSettings;
use agentpool::mcp::McpGateway;
use agentpool::models::{Task, TaskResult};
use agentpool::rag::{ContextRetriever, KeywordIndex};
use agentpool::registry::ToolRegistry;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let prompts = match collect_prompts(&args) {
        Ok(prompts) => prompts,
        Err(e) => fail(e),
    };
    if prompts.is_empty() {
        print_usage();
        process::exit(1);
    }

    let config = match Config::from_env_and_args(&args) {
        Ok(config) => config,
        Err(e) => fail(e),
    };
    init_tracing(config.verbose);

    if let Err(e) = run(args, prompts, config).await {
        fail(e);
    }
}

fn fail(e: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red(), e);
    process::exit(1);
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args, prompts: Vec<String>, config: Config) -> Result<()> {
    // The one startup failure that is fatal: no usable model backend.
    let backend: Arc<dyn ModelBackend> = Arc::new(
        ChatCompletionsBackend::new(&config.api_key, &config.api_endpoint, &config.model)
            .context("failed to create model backend")?,
    );
    tracing::info!(model = %backend.model_name(), endpoint = %config.api_endpoint, "model backend ready");

    let servers = match ServersFile::load(&config.servers_file) {
        Ok(file) => file.servers,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "ignoring tool server config");
            Vec::new()
        }
    };
    let gateway = Arc::new(McpGateway::connect(&servers, config.handshake_timeout).await);

    let local = LocalSettings::from_current_dir().context("failed to determine working directory")?;
    let registry = Arc::new(ToolRegistry::new(local, Some(gateway.clone())));
    let agent = Arc::new(AgentLoop::new(
        backend,
        registry,
        AgentSettings {
            max_rounds: config.max_rounds,
            model_timeout: config.model_timeout,
            max_tokens: config.max_tokens,
        },
    ));

    let retriever = build_retriever(&args)?;
    let top_k = args.top_k.unwrap_or_else(default_top_k);

    let mut dispatcher = Dispatcher::start(
        agent,
        &PoolConfig {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
        },
    );
    let cancel = dispatcher.cancellation_token();

    let sender = dispatcher
        .sender()
        .context("task queue closed before any task was submitted")?;
    dispatcher.close_input();
    let producer = tokio::spawn(produce(prompts, sender, retriever, top_k, cancel.clone()));

    let mut interrupted = false;
    loop {
        tokio::select! {
            result = dispatcher.next_result() => match result {
                Some(result) => print_result(&result),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                tracing::info!("interrupt received, finishing in-flight tasks");
                cancel.cancel();
            }
        }
    }

    if !interrupted {
        println!("\n{}", "All tasks complete.".green());
    }

    if let Err(e) = producer.await {
        tracing::error!(error = %e, "task producer failed");
    }
    dispatcher.join().await;
    gateway.close().await;
    Ok(())
}

async fn produce(
    prompts: Vec<String>,
    sender: mpsc::Sender<Task>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    top_k: usize,
    cancel: CancellationToken,
) {
    for (id, prompt) in prompts.into_iter().enumerate() {
        let context = match &retriever {
            Some(retriever) => retriever.retrieve(&prompt, top_k).await,
            None => String::new(),
        };
        let task = Task::new(id as u64, prompt).with_context(context);

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = sender.send(task) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

fn collect_prompts(args: &Args) -> Result<Vec<String>> {
    let mut prompts = args.prompts.clone();
    if let Some(path) = &args.prompts_file {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompts file: {}", path.display()))?;
        prompts.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    Ok(prompts)
}

fn build_retriever(args: &Args) -> Result<Option<Arc<dyn ContextRetriever>>> {
    if args.knowledge.is_empty() {
        return Ok(None);
    }
    let mut index = KeywordIndex::new();
    for path in &args.knowledge {
        index.ingest_file(path)?;
    }
    let retriever: Arc<dyn ContextRetriever> = Arc::new(index);
    Ok(Some(retriever))
}

fn print_result(result: &TaskResult) {
    let header = format!("[Worker {} | Task {}]", result.worker_id, result.task_id);
    match &result.error {
        Some(error) => println!("\n{} {}", header.red(), format!("ERROR: {}", error).red()),
        None => println!("\n{}\n{}", header.cyan(), result.content),
    }
}

fn print_usage() {
    println!("{}", "Usage: agentpool [OPTIONS] <PROMPT>...".yellow());
    println!();
    println!("Each prompt becomes one task handled by the worker pool.");
    println!();
    println!("Examples:");
    println!("  agentpool \"What files are in this directory?\"");
    println!("  agentpool -w 4 --prompts-file prompts.txt");
    println!("  agentpool --knowledge notes.txt \"Who maintains this project?\"");
    println!();
    println!("Environment:");
    println!("  OPENROUTER_API_KEY  API key (required)");
    println!("  AI_MODEL            Model identifier");
    println!("  AI_API_ENDPOINT     Chat completions base URL");
    println!("  AGENTPOOL_WORKERS   Number of workers");
}
