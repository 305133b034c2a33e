//! ivsnet: Encrypted infection-risk propagation
//!
//! Main entry point for the interactive query shell.

use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ivsnet::adapters::sanitize::SanitizingMakeWriter;
use ivsnet::adapters::tfhe::TfheCodec;
use ivsnet::application::{GeneratedNetwork, QueryProgress, QueryWorker, RiskService};
use ivsnet::config::OutputFormat;
use ivsnet::domain::Cell;
use ivsnet::ports::VectorCodec;
use ivsnet::{EngineConfig, RiskAssessment};

fn main() -> Result<()> {
    // Logs and the prompt share the terminal, so interactive sessions log
    // to a file unless told otherwise.
    let log_mode = std::env::var("IVS_LOG_MODE").unwrap_or_else(|_| "auto".to_string());

    let interactive = std::io::stdin().is_terminal();
    let use_file = match log_mode.as_str() {
        "file" => true,
        "stdout" => false,
        _ => interactive,
    };

    let (writer, _guard) = if use_file {
        let log_file = std::env::var("IVS_LOG_FILE").unwrap_or_else(|_| "ivsnet.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("opening log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting ivsnet...");

    let config = EngineConfig::from_env().context("loading configuration")?;
    tracing::info!(
        "Configuration: persons={}, infections={}, max_distance={}, activation={}",
        config.persons,
        config.infections,
        config.max_distance,
        config.edge_activation
    );

    println!("Generating FHE keys (this may take a while)...");
    let codec = Arc::new(TfheCodec::generate(config.precision_bits).context("generating keys")?);

    let mut rng = match config.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };
    let (service, generated) =
        RiskService::bootstrap(codec, &config, &mut rng).context("building contact network")?;
    let service = Arc::new(service);

    if config.show_network {
        print_network(&service, &generated)?;
    }

    run_prompt(&service, config.output)?;

    tracing::info!("ivsnet shutdown complete.");
    Ok(())
}

/// Read person indices until `exit` or end of input.
fn run_prompt(service: &Arc<RiskService<TfheCodec>>, output: OutputFormat) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!(
            "\nEnter a person index (0-{}) or 'exit': ",
            service.persons().saturating_sub(1)
        );
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        let person = match service.parse_person(&line) {
            Ok(person) => person,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        let handle = QueryWorker::spawn(Arc::clone(service), person);
        loop {
            match handle.recv() {
                Ok(QueryProgress::Propagating) => println!("Propagating encrypted statuses..."),
                Ok(QueryProgress::Decoding) => println!("Decoding aggregate score..."),
                Ok(QueryProgress::Complete(assessment)) => {
                    print_assessment(&assessment, output)?;
                    break;
                }
                Ok(QueryProgress::Error(msg)) => {
                    println!("Query aborted: {msg}");
                    break;
                }
                Err(_) => {
                    println!("Query aborted: worker exited without a result");
                    break;
                }
            }
        }
    }

    Ok(())
}

fn print_network(service: &RiskService<TfheCodec>, generated: &GeneratedNetwork) -> Result<()> {
    println!("\nContact network (weights; diagonal holds encrypted statuses):");
    for (row, cells) in service.network().rows().enumerate() {
        let line: Vec<String> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Weight(w) => format!("{w:>9.2}"),
                Cell::Status(_) => format!("{:>9}", "ENCRYPTED"),
            })
            .collect();
        println!("{row:>4}: {}", line.join(" "));
    }

    println!("\nDecrypted statuses:");
    for (person, status) in generated.encrypted_statuses().into_iter().enumerate() {
        let decoded = service
            .codec()
            .decode(status)
            .with_context(|| format!("decoding status of person {person}"))?;
        let rounded: Vec<String> = decoded.iter().map(|v| format!("{v:.0}")).collect();
        println!("{person:>4}: [{}]", rounded.join(", "));
    }

    println!("\nStatuses before encryption:");
    for (person, status) in generated.statuses.iter().enumerate() {
        let flags: Vec<&str> = status.0.iter().map(|&b| if b { "1" } else { "0" }).collect();
        println!("{person:>4}: [{}]", flags.join(", "));
    }

    Ok(())
}

fn print_assessment(assessment: &RiskAssessment, output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(assessment)?);
        return Ok(());
    }

    println!("\nRisk assessment for person {}", assessment.person);
    println!("Contacts reached: {}", assessment.visited.len());
    for score in &assessment.scores {
        println!(
            "  Infection {}: IVS {:.2} (weight {:.3}) -> {}",
            score.infection, score.score, score.weight, score.level
        );
    }
    println!("Composite IVS: {:.2}", assessment.composite);
    println!(
        "Decision: {} ({})",
        assessment.verdict,
        assessment.verdict.description()
    );

    Ok(())
}
