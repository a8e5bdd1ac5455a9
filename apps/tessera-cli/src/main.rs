use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use tessera_layout::{PropertyLayout, ValueType};
use tracing_subscriber::EnvFilter;

mod demo;
mod graph;

use graph::GraphConfig;

#[derive(Parser)]
#[command(name = "tessera-cli", about = "CLI tool for tessera render core operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Compile a property block layout and print its offsets
    Layout {
        /// Fields as `type:name`, e.g. `vec3:position float:weight`
        #[arg(required = true)]
        fields: Vec<String>,
        /// Block name used in the printed declaration
        #[arg(short, long, default_value = "Properties")]
        block: String,
    },
    /// Sort a task graph and print the render order
    Schedule {
        /// JSON graph description; the seven-task demo graph when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Render a small scene on the headless device
    Demo {
        /// Number of frames to render
        #[arg(short, long, default_value = "3")]
        frames: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tessera-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", tessera_common::crate_info());
            println!("layout: {}", tessera_layout::crate_info());
            println!("assets: {}", tessera_assets::crate_info());
            println!("gpu: {}", tessera_gpu::crate_info());
            println!("transfer: {}", tessera_transfer::crate_info());
            println!("binding: {}", tessera_binding::crate_info());
            println!("schedule: {}", tessera_schedule::crate_info());
        }
        Commands::Layout { fields, block } => {
            print!("{}", describe_layout(&fields, &block)?);
        }
        Commands::Schedule { config } => {
            let config = match config {
                Some(path) => GraphConfig::load(&path)?,
                None => GraphConfig::demo(),
            };
            let order = graph::sorted_names(&config).context("scheduling task graph")?;
            println!("Render order ({} tasks):", order.len());
            for (position, name) in order.iter().enumerate() {
                println!("  {position}: {name}");
            }
        }
        Commands::Demo { frames } => {
            let report = demo::run(frames)?;
            println!("Headless demo: {} frames, order {:?}", report.frames, report.order);
            println!(
                "Driver: creates={}, uploads={}, draws={}",
                report.creates, report.uploads, report.draws
            );
            let stats = report.cache;
            println!(
                "Cache: binds={}, hits={}, misses={}, uploads={}, skipped={}, hit rate {:.1}%",
                stats.binds,
                stats.hits,
                stats.misses,
                stats.uploads,
                stats.skipped,
                stats.hit_rate() * 100.0
            );
            for (task, average) in &report.averages {
                println!("  {task}: {average:.4} ms");
            }
        }
    }

    Ok(())
}

/// Parses `type:name` pairs, compiles them and renders a table plus the
/// shader declaration.
fn describe_layout(fields: &[String], block: &str) -> anyhow::Result<String> {
    let mut items = Vec::with_capacity(fields.len());
    for field in fields {
        let (ty, name) = field
            .split_once(':')
            .with_context(|| format!("field `{field}` is not `type:name`"))?;
        let ty: ValueType = ty.parse()?;
        items.push((name.to_string(), ty));
    }
    let layout = PropertyLayout::compile(items)?;

    let mut out = String::new();
    writeln!(out, "{:<16} {:<6} {:>6} {:>6}", "field", "type", "offset", "size")?;
    for field in layout.fields() {
        writeln!(
            out,
            "{:<16} {:<6} {:>6} {:>6}",
            field.name(),
            field.ty(),
            field.offset(),
            field.size()
        )?;
    }
    writeln!(out, "size {} bytes, alignment {}", layout.size(), layout.alignment())?;
    writeln!(out, "{}", layout.declaration(block))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(specs: &[&str]) -> Vec<String> {
        specs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn layout_table_lists_offsets() {
        let out = describe_layout(&fields(&["float:a", "vec3:b"]), "Block").unwrap();
        let rows: Vec<&str> = out.lines().collect();
        assert!(rows[1].starts_with("a"));
        assert!(rows[1].trim_end().ends_with("0      4"));
        assert!(rows[2].trim_end().ends_with("16     12"));
        assert!(out.contains("size 32 bytes, alignment 16"));
        assert!(out.contains("Block"));
    }

    #[test]
    fn malformed_fields_are_rejected() {
        assert!(describe_layout(&fields(&["position"]), "P").is_err());
        assert!(describe_layout(&fields(&["double:x"]), "P").is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["tessera-cli", "-v", "demo", "--frames", "5"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Demo { frames: 5 }));

        let cli = Cli::try_parse_from(["tessera-cli", "layout", "vec4:tint"]).unwrap();
        let Commands::Layout { fields, block } = cli.command else {
            panic!("expected layout");
        };
        assert_eq!(fields, vec!["vec4:tint"]);
        assert_eq!(block, "Properties");

        assert!(Cli::try_parse_from(["tessera-cli", "layout"]).is_err());
    }
}
