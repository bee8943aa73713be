use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "agentpool")]
#[command(about = "Run prompts through a pool of tool-using agents", long_about = None)]
pub struct Args {
    #[arg(short = 'w', long = "workers", help = "Number of concurrent workers")]
    pub workers: Option<usize>,

    #[arg(long = "prompts-file", help = "File with one prompt per line")]
    pub prompts_file: Option<PathBuf>,

    #[arg(long = "servers", help = "Tool server config file (default: mcp_servers.json)")]
    pub servers: Option<PathBuf>,

    #[arg(
        long = "knowledge",
        help = "Text file to search for extra prompt context (repeatable)"
    )]
    pub knowledge: Vec<PathBuf>,

    #[arg(long = "top-k", help = "Number of knowledge chunks prepended to each prompt")]
    pub top_k: Option<usize>,

    #[arg(long = "model", help = "Model identifier")]
    pub model: Option<String>,

    #[arg(
        long = "api-endpoint",
        help = "Custom API base URL (e.g., http://localhost:11434/v1)"
    )]
    pub api_endpoint: Option<String>,

    #[arg(short = 'v', long = "verbose", help = "Log protocol traffic")]
    pub verbose: bool,

    #[arg(help = "Prompts to run, one task each")]
    pub prompts: Vec<String>,
}
