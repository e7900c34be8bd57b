//! ttkia: TTKIA 知识助手命令行客户端
//!
//! Usage:
//!   ttkia health                         Check service health
//!   ttkia ask <question...> [options]    Send a query
//!   ttkia envs | prompts | styles        List catalog entries
//!   ttkia history [-n <limit>]           List conversations
//!   ttkia export <id> [-o <file>]        Export a conversation
//!
//! Connection settings come from `--url/--api-key/--token`, then the
//! `TTKIA_*` environment variables, then `~/.ttkia/config.json`.

use anyhow::{bail, Context, Result};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use ttkia_sdk::blocking::Client;
use ttkia_sdk::config::{self, ConfigLayer};
use ttkia_sdk::types::QueryRequest;
use ttkia_sdk::Error;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let (explicit, rest) = split_connection_flags(&args[2..]);
    let result = match args[1].as_str() {
        "health" => cmd_health(&explicit),
        "ask" => cmd_ask(&explicit, &rest),
        "envs" => cmd_envs(&explicit),
        "prompts" => cmd_catalog(&explicit, "prompts"),
        "styles" => cmd_catalog(&explicit, "styles"),
        "history" => cmd_history(&explicit, &rest),
        "export" => cmd_export(&explicit, &rest),
        "version" | "--version" | "-V" => {
            println!("ttkia {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {}", describe(&e));
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"ttkia - TTKIA knowledge assistant CLI

USAGE:
    ttkia <COMMAND> [OPTIONS]

COMMANDS:
    health                          Check service health
    ask <question...>               Send a query
        -c, --conversation <id>     Continue a conversation
        -s, --style <style>         Response style (default: concise)
        -p, --prompt <prompt>       Prompt template (default: default)
        --web                       Enable web search
        --cot                       Request the reasoning trace
        --sources                   Print sources
        --json                      Print the full result as JSON
    envs                            List environments
    prompts                         List prompt templates
    styles                          List response styles
    history [-n <limit>]            List conversations (default limit: 20)
    export <id> [-o <file>]         Export a conversation
    version                         Show version information
    help                            Show this help message

CONNECTION OPTIONS (any command):
    --url <url>  --api-key <key>  --token <token>

ENVIRONMENT:
    TTKIA_URL, TTKIA_API_KEY, TTKIA_TOKEN, TTKIA_TIMEOUT, TTKIA_VERIFY_SSL, TTKIA_PROXY_URL
    RUST_LOG                        Log filter (default: warn)"#
    );
}

/// Pull `--url`, `--api-key` and `--token` out of the argument list.
fn split_connection_flags(args: &[String]) -> (ConfigLayer, Vec<String>) {
    let mut layer = ConfigLayer::new();
    let mut rest = Vec::new();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--url" => {
                if let Some(v) = it.next() {
                    layer = layer.with_url(v.clone());
                }
            }
            "--api-key" => {
                if let Some(v) = it.next() {
                    layer = layer.with_api_key(v.clone());
                }
            }
            "--token" => {
                if let Some(v) = it.next() {
                    layer = layer.with_token(v.clone());
                }
            }
            _ => rest.push(arg.clone()),
        }
    }
    (layer, rest)
}

fn connect(explicit: &ConfigLayer) -> Result<Client> {
    let mut layers = vec![explicit.clone(), ConfigLayer::from_env()];
    if let Some(path) = config::default_config_path() {
        layers.push(ConfigLayer::from_file(&path)?);
    }
    let resolved = config::resolve(&layers)?;
    Ok(Client::from_config(resolved)?)
}

fn flag_value<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor the value of one of `value_flags`.
fn positionals<'a>(args: &'a [String], value_flags: &[&str]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for a in args {
        if skip_next {
            skip_next = false;
        } else if value_flags.contains(&a.as_str()) {
            skip_next = true;
        } else if !a.starts_with('-') {
            out.push(a.as_str());
        }
    }
    out
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn cmd_health(explicit: &ConfigLayer) -> Result<()> {
    let client = connect(explicit)?;
    let health = client.health()?;
    println!("TTKIA: {}", health.status);
    println!("  backend:      {}", health.backend);
    println!("  embedding:    {}", health.embedding);
    println!("  vector store: {}", health.vector_store);
    if !health.is_healthy() {
        bail!("service is not healthy");
    }
    Ok(())
}

fn cmd_ask(explicit: &ConfigLayer, args: &[String]) -> Result<()> {
    const VALUE_FLAGS: [&str; 6] = ["-c", "--conversation", "-s", "--style", "-p", "--prompt"];

    let question = positionals(args, &VALUE_FLAGS).join(" ");
    if question.trim().is_empty() {
        bail!("provide a question: ttkia ask \"your question here\"");
    }

    let mut request = QueryRequest::new(question)
        .web_search(has_flag(args, "--web"))
        .teacher_mode(has_flag(args, "--cot"));
    if let Some(id) = flag_value(args, &["-c", "--conversation"]) {
        request = request.conversation_id(id);
    }
    if let Some(style) = flag_value(args, &["-s", "--style"]) {
        request = request.style(style);
    }
    if let Some(prompt) = flag_value(args, &["-p", "--prompt"]) {
        request = request.prompt(prompt);
    }

    let client = connect(explicit)?;
    let started = Instant::now();
    let response = client.query(&request)?;
    let elapsed = started.elapsed();

    if response.is_error() {
        bail!("{}", response.error.as_deref().unwrap_or("query failed"));
    }

    if has_flag(args, "--json") {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("failed to render JSON")?
        );
        return Ok(());
    }

    println!("\n{}\n", response.text);
    println!(
        "  confidence: {}  sources: {}d/{}w  tokens: {}  time: {:.1}s",
        response
            .confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "n/a".to_string()),
        response.docs.len(),
        response.webs.len(),
        response.token_usage.total(),
        elapsed.as_secs_f64()
    );
    println!("  conversation: {}", response.conversation_id);

    if has_flag(args, "--sources") {
        for s in response.sources() {
            let kind = if s.is_web() { "web" } else { "doc" };
            println!("    [{kind}] {}", s.label());
        }
    }
    if request.teacher_mode {
        for step in &response.thinking {
            let preview: String = step.content.chars().take(120).collect();
            println!("    {}. {}", step.index + 1, preview);
        }
    }
    Ok(())
}

fn cmd_envs(explicit: &ConfigLayer) -> Result<()> {
    let envs = connect(explicit)?.get_environments()?;
    println!("Environments ({}):", envs.len());
    for env in envs {
        println!("  {env}");
    }
    Ok(())
}

fn cmd_catalog(explicit: &ConfigLayer, kind: &str) -> Result<()> {
    let client = connect(explicit)?;
    let entries = if kind == "prompts" {
        client.get_prompts()?
    } else {
        client.get_styles()?
    };
    println!("{} ({}):", kind, entries.len());
    for e in entries {
        println!("  {}: {}", e.id, e.description.as_deref().unwrap_or(""));
    }
    Ok(())
}

fn cmd_history(explicit: &ConfigLayer, args: &[String]) -> Result<()> {
    let limit = match flag_value(args, &["-n", "--limit"]) {
        Some(n) => n.parse::<usize>().context("--limit must be a number")?,
        None => 20,
    };
    let convs = connect(explicit)?.list_conversations()?;
    if convs.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }
    println!("Conversations ({}):", convs.len());
    for c in convs.iter().take(limit) {
        let title = if c.title.is_empty() { "(untitled)" } else { &c.title };
        let date: String = c.last_activity().unwrap_or("").chars().take(10).collect();
        println!("  {}  {}  {}", c.conversation_id, title, date);
    }
    Ok(())
}

fn cmd_export(explicit: &ConfigLayer, args: &[String]) -> Result<()> {
    let Some(id) = positionals(args, &["-o", "--output"]).into_iter().next() else {
        bail!("usage: ttkia export <id> [-o <file>]");
    };
    let output = flag_value(args, &["-o", "--output"])
        .map(str::to_string)
        .unwrap_or_else(|| format!("conversation_{}.zip", id.chars().take(8).collect::<String>()));
    let bytes = connect(explicit)?.export_conversation(id, &output)?;
    println!("Exported {bytes} bytes to {output}");
    Ok(())
}

fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<Error>() {
        Some(Error::Authentication { .. }) => {
            format!("{err} (check TTKIA_API_KEY / TTKIA_TOKEN)")
        }
        _ => format!("{err:#}"),
    }
}
