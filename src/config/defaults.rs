pub const DEFAULT_API_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4.5";
pub const DEFAULT_SERVERS_FILE: &str = "mcp_servers.json";

pub fn default_workers() -> usize {
    1
}

pub fn default_queue_capacity() -> usize {
    10
}

pub fn default_max_rounds() -> usize {
    15
}

pub fn default_model_timeout_secs() -> u64 {
    45
}

pub fn default_max_tokens() -> u32 {
    1024
}

pub fn default_handshake_timeout_secs() -> u64 {
    30
}

pub fn default_top_k() -> usize {
    3
}
