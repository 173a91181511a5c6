//! `tfboard` – replay recorded dashboard traffic from the command line.
//!
//! ```text
//! tfboard replay <file.jsonl> [--base-frame <frame>] [--stride <n>]
//! tfboard frames <file.jsonl>
//! tfboard lookup <file.jsonl> <source> <target>
//! tfboard config [init]
//! ```
//!
//! Each input line is one JSON message carrying `_topic_name` and
//! `_topic_type`, exactly as the dashboard transport delivers it.

mod config;
mod replay;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::ExitCode;

use colored::Colorize;
use tfboard_middleware::{Dashboard, ViewerRegistry};
use tfboard_perception::FrameGraph;
use tfboard_types::BoardError;
use tracing::warn;

use crate::config::Config;
use crate::replay::ReplaySummary;

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG picks the level (default "info"); TFBOARD_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("TFBOARD_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(cmd) => cmd,
        Err(msg) => {
            eprintln!("{}: {}", "error".red().bold(), msg);
            print_usage();
            return ExitCode::from(2);
        }
    };

    let mut cfg = config::load().unwrap_or_else(|e| {
        warn!(error = %e, "falling back to default configuration");
        let mut cfg = Config::default();
        config::apply_env_overrides(&mut cfg);
        cfg
    });

    match run(command, &mut cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Command {
    Replay {
        path: String,
        base_frame: Option<String>,
        stride: Option<usize>,
    },
    Frames {
        path: String,
    },
    Lookup {
        path: String,
        source: String,
        target: String,
    },
    ConfigShow,
    ConfigInit,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some((cmd, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };
    match cmd.as_str() {
        "replay" => {
            let mut path = None;
            let mut base_frame = None;
            let mut stride = None;
            let mut it = rest.iter();
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--base-frame" => {
                        base_frame = Some(it.next().ok_or("--base-frame needs a value")?.clone());
                    }
                    "--stride" => {
                        let raw = it.next().ok_or("--stride needs a value")?;
                        stride = Some(raw.parse::<usize>().map_err(|_| format!("invalid stride '{raw}'"))?);
                    }
                    other if other.starts_with("--") => return Err(format!("unknown option '{other}'")),
                    other if path.is_none() => path = Some(other.to_string()),
                    other => return Err(format!("unexpected argument '{other}'")),
                }
            }
            Ok(Command::Replay {
                path: path.ok_or("replay needs a file")?,
                base_frame,
                stride,
            })
        }
        "frames" => match rest {
            [path] => Ok(Command::Frames { path: path.clone() }),
            _ => Err("usage: tfboard frames <file.jsonl>".to_string()),
        },
        "lookup" => match rest {
            [path, source, target] => Ok(Command::Lookup {
                path: path.clone(),
                source: source.clone(),
                target: target.clone(),
            }),
            _ => Err("usage: tfboard lookup <file.jsonl> <source> <target>".to_string()),
        },
        "config" => match rest {
            [] => Ok(Command::ConfigShow),
            [sub] if sub == "init" => Ok(Command::ConfigInit),
            _ => Err("usage: tfboard config [init]".to_string()),
        },
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(format!("unknown command '{other}'")),
    }
}

fn print_usage() {
    println!("{}", "tfboard".bold().cyan());
    println!("  {} <file.jsonl> [--base-frame <frame>] [--stride <n>]", "replay".bold());
    println!("  {} <file.jsonl>", "frames".bold());
    println!("  {} <file.jsonl> <source> <target>", "lookup".bold());
    println!("  {} [init]", "config".bold());
    println!();
    println!("  Config: {}", config::config_path().display().to_string().dimmed());
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run(command: Command, cfg: &mut Config) -> Result<(), BoardError> {
    match command {
        Command::Help => {
            print_usage();
            Ok(())
        }
        Command::Replay {
            path,
            base_frame,
            stride,
        } => {
            if let Some(frame) = base_frame {
                cfg.base_frame = frame;
            }
            if let Some(stride) = stride {
                cfg.decimation_stride = stride;
            }
            let (dash, summary) = replay_file(&path, cfg)?;
            print_summary(&summary);
            print_frames(&dash);
            Ok(())
        }
        Command::Frames { path } => {
            let (dash, _) = replay_file(&path, cfg)?;
            print_frames(&dash);
            Ok(())
        }
        Command::Lookup { path, source, target } => {
            let (dash, _) = replay_file(&path, cfg)?;
            print_lookup(dash.graph(), &source, &target);
            Ok(())
        }
        Command::ConfigShow => {
            println!("{} {}", "Config".bold().cyan(), config::config_path().display().to_string().dimmed());
            let raw = toml::to_string_pretty(&*cfg).map_err(|e| BoardError::Config(e.to_string()))?;
            for line in raw.lines() {
                println!("  {line}");
            }
            Ok(())
        }
        Command::ConfigInit => {
            let path = config::config_path().display().to_string();
            if config::init()? {
                println!("{} {}", "Wrote default config to".green(), path.bold());
            } else {
                println!("{} {}", "Config already exists at".yellow(), path.bold());
            }
            Ok(())
        }
    }
}

fn replay_file(path: &str, cfg: &Config) -> Result<(Dashboard, ReplaySummary), BoardError> {
    let file = File::open(Path::new(path)).map_err(|e| BoardError::Io(format!("{path}: {e}")))?;
    let mut dash = Dashboard::new(
        FrameGraph::with_max_depth(cfg.max_frame_depth),
        ViewerRegistry::default(),
        cfg.viewer_settings(),
    );
    let summary = replay::replay(&mut dash, BufReader::new(file))?;
    Ok((dash, summary))
}

fn print_summary(summary: &ReplaySummary) {
    println!("{}", "Replay".bold().cyan());
    println!(
        "  {} lines · {} tf · {} viewer · {} ignored · {} renders",
        summary.lines, summary.tf_messages, summary.viewer_messages, summary.ignored, summary.renders
    );
    if summary.errors > 0 {
        println!("  {}", format!("{} message(s) dropped", summary.errors).yellow());
    }
    if summary.layers.is_empty() {
        println!("  {}", "no layers rendered".dimmed());
        return;
    }
    println!();
    println!("{}", "Layers".bold().cyan());
    for (topic, layer) in &summary.layers {
        println!(
            "  {:<28} {:>8} pts  in {}  ({} renders)",
            topic.bold(),
            layer.points,
            layer.frame.green(),
            layer.renders
        );
    }
}

fn print_frames(dash: &Dashboard) {
    let graph = dash.graph();
    println!();
    println!("{}", "Frames".bold().cyan());
    if graph.is_empty() {
        println!("  {}", "none".dimmed());
        return;
    }
    for frame in graph.frames() {
        match graph.edge(&frame) {
            Some(edge) => {
                let tag = if edge.is_static { " (static)".dimmed() } else { "".normal() };
                println!("  {} → {}{}", frame.bold(), edge.parent, tag);
            }
            None => println!("  {} {}", frame.bold(), "(root)".dimmed()),
        }
    }
}

fn print_lookup(graph: &FrameGraph, source: &str, target: &str) {
    match graph.try_get_transform(source, target) {
        Ok(t) => {
            let [x, y, z] = t.translation_array();
            let [qx, qy, qz, qw] = t.rotation_array();
            println!("{} {} → {}", "Transform".bold().green(), source, target);
            println!("  translation: [{x:.6}, {y:.6}, {z:.6}]");
            println!("  rotation:    [{qx:.6}, {qy:.6}, {qz:.6}, {qw:.6}]");
        }
        Err(e) => {
            println!("{} {} → {}: {}", "Unavailable".bold().yellow(), source, target, e);
        }
    }
}
