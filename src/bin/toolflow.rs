use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use toolflow::cli::{load_plugin_manifests, run_node_as_event_stream};
use toolflow::config::FileUrlConfig;
use toolflow::plugin::PluginManifest;
use toolflow::tools::MemoryToolFileManager;
use toolflow::utils::LoggingConfig;

#[derive(Parser)]
#[command(name = "toolflow", version, about = "Workflow tool node CLI", author)]
struct Cli {
    /// 输出调试日志（写到 stderr）
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Plugins {
        #[command(subcommand)]
        command: PluginCommand,
    },
    /// 运行一个工具节点，按事件流格式输出节点事件
    Run {
        #[arg(long)]
        node: PathBuf,
        #[arg(long)]
        pool: PathBuf,
        #[arg(long, default_value = "cli-user")]
        user: String,
        #[arg(long, default_value = "local")]
        tenant: String,
    },
}

#[derive(Subcommand)]
enum PluginCommand {
    List {
        #[arg(long, default_value = "plugins")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    LoggingConfig::from_env().verbose(cli.verbose).install();

    match cli.command {
        Command::Plugins { command } => match command {
            PluginCommand::List { dir } => handle_plugins_list(dir)?,
        },
        Command::Run {
            node,
            pool,
            user,
            tenant,
        } => handle_run(node, pool, user, tenant).await?,
    }
    Ok(())
}

fn handle_plugins_list(dir: PathBuf) -> anyhow::Result<()> {
    let manifests = load_plugin_manifests(&dir)?;
    if manifests.is_empty() {
        println!("No plugins found in directory `{}`", dir.display());
    } else {
        render_plugin_table(&manifests);
    }
    Ok(())
}

fn render_plugin_table(manifests: &[PluginManifest]) {
    println!(
        "{:<32} {:<10} {:<10} {:<6} {}",
        "Name", "Version", "Providers", "Tools", "Description"
    );
    for manifest in manifests {
        let description = manifest.description.clone().unwrap_or_default();
        println!(
            "{:<32} {:<10} {:<10} {:<6} {}",
            manifest.name,
            manifest.version,
            manifest.providers.len(),
            manifest.tool_count(),
            description
        );
        for provider in &manifest.providers {
            let tools: Vec<&str> = provider.tools.iter().map(|tool| tool.name()).collect();
            println!("  - {}: {}", provider.identity.name, tools.join(", "));
        }
    }
}

async fn handle_run(
    node: PathBuf,
    pool: PathBuf,
    user: String,
    tenant: String,
) -> anyhow::Result<()> {
    let files = Arc::new(MemoryToolFileManager::with_url_config(FileUrlConfig::from_env()));
    let mut frames = run_node_as_event_stream(&node, &pool, &tenant, &user, files)?;

    let mut stdout = std::io::stdout().lock();
    while let Some(frame) = frames.next().await {
        stdout.write_all(&frame)?;
        stdout.flush()?;
    }
    Ok(())
}
