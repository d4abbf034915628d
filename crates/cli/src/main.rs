use clap::{Parser, Subcommand};
use epi_core::{
    analyze_link_usage, composition_class_usage, html, optimize_fragment_checked,
    preprocess_bundle, PreprocessConfig,
};
use fhir::{Composition, EpiBundle, FhirError, HtmlElementLinkStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "epi")]
#[command(about = "ePI preprocessing CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess an ePI bundle file
    Preprocess {
        /// Bundle JSON file
        input: PathBuf,
        /// Write the result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip narrative optimization
        #[arg(long)]
        no_optimize: bool,
        /// Keep HtmlElementLinks whose class is unused
        #[arg(long)]
        no_link_cleanup: bool,
        /// Keep inline styles and unannotated classes
        #[arg(long)]
        no_style_cleanup: bool,
        /// Print the preprocessing report to stderr
        #[arg(long)]
        report: bool,
    },
    /// Optimize a single markup fragment file
    Optimize {
        /// Markup fragment file
        html_file: PathBuf,
    },
    /// List the classes used by each Composition's narrative
    Classes {
        /// Bundle JSON file
        input: PathBuf,
    },
    /// List HtmlElementLink annotations
    Links {
        /// Bundle JSON file
        input: PathBuf,
    },
    /// Compare annotations with the classes in use
    Analyze {
        /// Bundle JSON file
        input: PathBuf,
    },
    /// Find elements in a markup fragment file
    Find {
        /// Markup fragment file
        html_file: PathBuf,
        /// Match elements carrying this class
        #[arg(long, conflicts_with = "tag")]
        class: Option<String>,
        /// Match elements with this tag
        #[arg(long)]
        tag: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("epi_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Preprocess {
            input,
            output,
            no_optimize,
            no_link_cleanup,
            no_style_cleanup,
            report,
        }) => {
            let mut config = config_from_env();
            config.html_optimization &= !no_optimize;
            config.link_cleanup &= !no_link_cleanup;
            config.style_cleanup &= !no_style_cleanup;

            let mut bundle = read_bundle(&input)?;
            let summary = preprocess_bundle(&mut bundle, &config)?;
            let rendered = serde_json::to_string_pretty(&bundle)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Wrote preprocessed ePI to {}", path.display());
                }
                None => println!("{}", rendered),
            }
            if report {
                eprintln!("{}", summary.to_json()?);
            }
        }
        Some(Commands::Optimize { html_file }) => {
            let html = std::fs::read_to_string(&html_file)?;
            let outcome = optimize_fragment_checked(&html, &config_from_env().optimizer);
            println!("{}", outcome.html);
            eprintln!(
                "validation: {}, pruned: {}, merged: {}, bytes: {} -> {}",
                if outcome.accepted { "passed" } else { "failed" },
                outcome.pruned,
                outcome.merged,
                outcome.bytes_before,
                outcome.bytes_after
            );
        }
        Some(Commands::Classes { input }) => {
            for (label, composition) in compositions(&read_bundle(&input)?)? {
                let classes: Vec<String> =
                    composition_class_usage(&composition).into_iter().collect();
                println!("{}: {}", label, classes.join(", "));
            }
        }
        Some(Commands::Links { input }) => {
            for (label, composition) in compositions(&read_bundle(&input)?)? {
                let links = composition.list_links();
                if links.is_empty() {
                    println!("{}: no HtmlElementLinks", label);
                    continue;
                }
                println!("{}:", label);
                for link in links {
                    println!("  {}", link);
                }
            }
        }
        Some(Commands::Analyze { input }) => {
            for (label, composition) in compositions(&read_bundle(&input)?)? {
                let analysis = analyze_link_usage(&composition);
                println!("{}: {}", label, serde_json::to_string_pretty(&analysis)?);
            }
        }
        Some(Commands::Find {
            html_file,
            class,
            tag,
        }) => {
            let html = std::fs::read_to_string(&html_file)?;
            let found = match (class, tag) {
                (Some(class), _) => html::find_elements_by_class(&html, &class),
                (None, Some(tag)) => html::find_elements_by_tag(&html, &tag),
                (None, None) => return Err("one of --class or --tag is required".into()),
            };
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
        None => {
            println!("Use 'epi --help' for commands");
        }
    }

    Ok(())
}

/// Feature flags from the environment, with every pass enabled by default.
fn config_from_env() -> PreprocessConfig {
    PreprocessConfig::from_env_values(
        std::env::var(epi_core::constants::ENABLE_HTML_OPTIMIZATION_ENV).ok(),
        std::env::var(epi_core::constants::ENABLE_LINK_CLEANUP_ENV).ok(),
        std::env::var(epi_core::constants::ENABLE_STYLE_CLEANUP_ENV).ok(),
    )
}

fn read_bundle(path: &Path) -> Result<EpiBundle, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(EpiBundle::parse(&text)?)
}

/// Every Composition in the bundle, labelled by id (or entry position).
fn compositions(bundle: &EpiBundle) -> Result<Vec<(String, Composition)>, FhirError> {
    bundle
        .entries_by_resource_type(fhir::composition::COMPOSITION_RESOURCE_TYPE)
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| entry.resource.clone().map(|resource| (index, resource)))
        .map(|(index, resource)| {
            let composition = Composition::from_value(resource)?;
            let label = composition
                .id()
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Composition #{}", index + 1));
            Ok((label, composition))
        })
        .collect()
}
