use clap::{Parser, ValueEnum};
use colored::Colorize;
use spindle_core::engine::QueryExecutor;
use spindle_core::provider::KubeProvider;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "spindle", version)]
#[command(about = "Query and mutate Kubernetes resources with a graph query language", long_about = None)]
struct Cli {
    /// The query to execute.
    query: String,

    #[arg(short = 'n', long, default_value = "default", env = "SPINDLE_NAMESPACE")]
    namespace: String,

    /// Query across all namespaces.
    #[arg(short = 'A', long)]
    all_namespaces: bool,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Suppress writes; emit the would-be patches instead.
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    no_color: bool,

    /// Print results without pretty-printing.
    #[arg(short = 'r', long)]
    raw_output: bool,

    /// Kubeconfig context to use.
    #[arg(long, env = "SPINDLE_CONTEXT")]
    context: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    // Input that is nothing but comments is an empty statement.
    if spindle_cypher::is_blank(&cli.query) {
        return ExitCode::SUCCESS;
    }

    let expr = match spindle_cypher::parse(&cli.query) {
        Ok(expr) => expr,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let provider = Arc::new(KubeProvider::new(cli.context.clone()));
    let executor = QueryExecutor::new(provider).with_dry_run(cli.dry_run);
    let namespace = if cli.all_namespaces {
        "*".to_string()
    } else {
        cli.namespace.clone()
    };

    let result = runtime.block_on(async { executor.execute(&expr, &namespace).await });
    match result {
        Ok(result) => {
            if let Err(err) = print_data(&cli, &result.data) {
                eprintln!("{} {err}", "error:".red().bold());
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn print_data(
    cli: &Cli,
    data: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), Box<dyn std::error::Error>> {
    if data.is_empty() {
        return Ok(());
    }
    let value = serde_json::Value::Object(data.clone());
    let rendered = if cli.raw_output {
        serde_json::to_string(&value)?
    } else {
        match cli.format {
            Format::Json => serde_json::to_string_pretty(&value)?,
            Format::Yaml => serde_yaml::to_string(&value)?,
        }
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("SPINDLE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_args_are_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "spindle",
            "-A",
            "--dry-run",
            "--format",
            "yaml",
            "-r",
            "MATCH (d:Deployment) RETURN d",
        ]);
        assert!(cli.all_namespaces);
        assert!(cli.dry_run);
        assert!(cli.raw_output);
        assert!(matches!(cli.format, Format::Yaml));
        assert_eq!(cli.query, "MATCH (d:Deployment) RETURN d");
    }
}
