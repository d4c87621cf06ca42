// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Use library instead of local modules
use ratio_desk::{
    export_csv, format_value, get_events_for_entity, insert_records, load_csv, run_pipeline,
    setup_database, trend_series, verify_count, AppConfig, DialogueEngine, PipelineOutput,
};

#[derive(Parser)]
#[command(name = "ratio-desk", version, about = "Financial ratios + conversational metric lookup")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Input CSV (overrides config)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Clean the input, compute ratios, export CSV + SQLite
    Import,
    /// Interactive question/answer session on stdin
    Chat,
    /// Replay a scripted conversation
    Demo,
    /// Print a metric's yearly trend per company
    Trends {
        #[arg(short, long, default_value = "Total Revenue")]
        metric: String,
    },
    /// Terminal UI: chat, trend charts, data table
    Ui,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ratio_desk=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(input) = cli.input {
        config.input_path = input;
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Import => run_import(&config),
        Command::Chat => run_chat(&config),
        Command::Demo => run_demo(&config),
        Command::Trends { metric } => run_trends(&config, &metric),
        Command::Ui => run_ui_mode(&config),
    }
}

fn build_dataset(input: &Path) -> Result<PipelineOutput> {
    let table = load_csv(input)?;
    run_pipeline(table).with_context(|| format!("Failed to build dataset from {:?}", input))
}

fn new_engine(config: &AppConfig, output: PipelineOutput) -> DialogueEngine {
    DialogueEngine::with_phrase_recognizer(
        Arc::new(output.dataset),
        Arc::new(config.vocabulary()),
        &config.extra_companies,
    )
}

fn run_import(config: &AppConfig) -> Result<()> {
    println!("🗄️  Ratio Pipeline - CSV → Ratios → CSV + SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load + clean + ratios
    println!("\n📂 Loading {:?}...", config.input_path);
    let output = build_dataset(&config.input_path)?;
    println!("✓ {}", output.normalization.summary());
    println!("✓ {}", output.ratios.summary());
    for failure in &output.ratios.failures {
        println!("⚠️  {}", failure);
    }

    // 2. CSV export
    println!("\n💾 Writing {:?}...", config.output_csv);
    let written = export_csv(&output.dataset, &config.output_csv)?;
    println!("✓ Enhanced financial data saved ({} rows)", written);

    // 3. SQLite export
    println!("\n🔧 Writing {:?}...", config.database_path);
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;
    let inserted = insert_records(&conn, &output.dataset)?;
    let count = verify_count(&conn)?;
    println!("✓ Inserted {} new records, {} total in database", inserted, count);

    // 4. Audit trail
    let exports = get_events_for_entity(&conn, "dataset", "financial_records")?;
    if let Some(last) = exports.first() {
        println!(
            "✓ Export #{} logged at {} by {}: {}",
            exports.len(),
            last.timestamp.format("%Y-%m-%d %H:%M:%S"),
            last.actor,
            last.data
        );
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete");

    Ok(())
}

fn run_chat(config: &AppConfig) -> Result<()> {
    let output = build_dataset(&config.input_path)?;
    println!(
        "💬 Loaded {} records for {} companies. Ask away (\"reset\" to start over, \"quit\" to exit).",
        output.dataset.len(),
        output.dataset.companies().len()
    );
    let mut bot = new_engine(config, output);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("You: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => {
                bot.reset();
                println!("Bot: Okay, starting over.");
            }
            _ => println!("Bot: {}", bot.respond(line)),
        }
    }

    Ok(())
}

/// Synonyms, cross-turn memory, then error handling
const DEMO_SCRIPT: &[&str] = &[
    "What was Apple's profit in 2023?",
    "What about their leverage?",
    "show me Microsoft's sales for 2024",
    "what about 2022?",
    "how about their ROA?",
    "What is the liquidity for Tesla?",
    "What about Google?",
];

fn run_demo(config: &AppConfig) -> Result<()> {
    let output = build_dataset(&config.input_path)?;
    let mut bot = new_engine(config, output);

    for query in DEMO_SCRIPT {
        let response = bot.respond(query);
        println!("User: {}", query);
        println!("Bot: {}", response);
        println!("{}", "-".repeat(40));
    }
    println!("Chatbot testing complete.");

    Ok(())
}

fn run_trends(config: &AppConfig, metric: &str) -> Result<()> {
    let output = build_dataset(&config.input_path)?;
    let series = trend_series(&output.dataset, metric).with_context(|| {
        format!(
            "'{}' is not a numeric column. Available: {}",
            metric,
            output.dataset.numeric_columns().join(", ")
        )
    })?;

    println!("📈 {} Trend", metric);
    for s in &series {
        println!("\n{}", s.company);
        for p in &s.points {
            println!("  {}  {}", p.year, format_value(p.value, metric));
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading Ratio Desk UI...\n");

    let output = build_dataset(&config.input_path)?;
    println!("✓ Loaded {} records\n", output.dataset.len());
    println!("Starting UI... (Press Esc to quit)\n");

    let mut app = ui::App::new(new_engine(config, output));
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use web API: cargo run --bin ratio-server --features server");
    std::process::exit(1);
}
