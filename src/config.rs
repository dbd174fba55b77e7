//! Service configuration.
//!
//! Environment variables with documented defaults; no config files. The
//! renderer endpoint keeps the same trust rule as local development setups:
//! an explicitly configured endpoint is used without probing.

use std::env;

/// Default listen address for the HTTP/WebSocket server.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default render-service endpoint (headless browser sidecar).
pub const DEFAULT_RENDERER_URL: &str = "http://localhost:9222";
/// Default chat-completion host.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default chat-completion model.
pub const DEFAULT_MODEL: &str = "minimax-m2:cloud";

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (`MIXTABLE_BIND`).
    pub bind_addr: String,
    /// Render service endpoint (`MIXTABLE_RENDERER_URL`).
    pub renderer_url: String,
    /// True when the renderer endpoint was set explicitly; skips the
    /// availability probe.
    pub renderer_explicit: bool,
    /// Chat completion host (`MIXTABLE_OLLAMA_URL`).
    pub ollama_url: String,
    /// Chat completion model (`MIXTABLE_MODEL`).
    pub model: String,
}

impl Config {
    /// Resolve configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let renderer_explicit = env::var("MIXTABLE_RENDERER_URL")
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        Self {
            bind_addr: env_or("MIXTABLE_BIND", DEFAULT_BIND),
            renderer_url: env_or("MIXTABLE_RENDERER_URL", DEFAULT_RENDERER_URL),
            renderer_explicit,
            ollama_url: env_or("MIXTABLE_OLLAMA_URL", DEFAULT_OLLAMA_URL),
            model: env_or("MIXTABLE_MODEL", DEFAULT_MODEL),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}
