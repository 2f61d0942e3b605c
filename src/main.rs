use std::io::Read;

use clap::{Parser, ValueEnum};
use microagg_guard::{AnalyzerConfig, SeverityPolicy};

#[derive(Parser)]
#[command(
    name = "microagg-guard",
    about = "Score short texts for microaggression content",
    version
)]
struct Cli {
    /// File paths to analyze (reads stdin if none provided)
    files: Vec<String>,

    /// Severity policy to apply
    #[arg(long, value_enum, default_value_t = PolicyArg::Binary)]
    policy: PolicyArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Detected / not detected with a threshold per score
    Binary,
    /// Three severity bands with conjunctive thresholds
    Graded,
}

impl From<PolicyArg> for SeverityPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Binary => SeverityPolicy::Binary,
            PolicyArg::Graded => SeverityPolicy::Graded,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = AnalyzerConfig {
        policy: cli.policy.into(),
        ..AnalyzerConfig::default()
    };

    if cli.files.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .expect("Failed to read stdin");
        analyze_and_print(&input, &config);
    } else {
        for path in &cli.files {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading {path}: {e}");
                std::process::exit(1);
            });
            analyze_and_print(&text, &config);
        }
    }
}

fn analyze_and_print(text: &str, config: &AnalyzerConfig) {
    let result = microagg_guard::analyze_with(
        text,
        &microagg_guard::LexiconExtractor,
        &microagg_guard::LexiconScorer,
        config,
    )
    .expect("built-in collaborators do not fail");
    println!("{}", serde_json::to_string_pretty(&result).unwrap());
}
