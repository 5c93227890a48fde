//! Command line front end for template detection, mapping and population.

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use log::LevelFilter;
use rusty_template::service::TemplateMeta;
use rusty_template::template::mapping::JsonMappingStore;
use rusty_template::template::mapping::Mapping;
use rusty_template::template::mapping::MappingStore;
use rusty_template::template::mapping::MemoryMappingStore;
use rusty_template::template::mapping::SaveRequest;
use rusty_template::template::pdf::PdfExtractSource;
use rusty_template::Company;
use rusty_template::RustyTemplateError;
use rusty_template::StaffRecord;
use rusty_template::TemplateConfig;
use rusty_template::TemplateKind;
use rusty_template::TemplateService;
use std::path::Path;
use std::path::PathBuf;

/// Detect, map and populate staff templates.
#[derive(Parser)]
#[command(name = "rusty-template")]
#[command(about = "Detect, map and populate staff templates")]
struct Cli {
    /// Configuration file (defaults to the built-in vocabulary and aliases)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header labels of every workbook matching a glob pattern.
    Detect {
        /// Glob pattern of workbook templates, e.g. "templates/*.xlsx"
        pattern: String,

        /// Saved mapping (JSON) shown alongside the labels
        #[arg(long)]
        mapping: Option<PathBuf>,
    },

    /// Apply a save request to a company's stored mapping.
    SaveMapping {
        /// Directory holding `company_{id}.json` mappings
        #[arg(long, default_value = "mappings")]
        store: PathBuf,

        #[arg(long)]
        company: i64,

        /// Save request JSON: {"mapping": {...}, "pdf_mappings": [...]}
        request: PathBuf,
    },

    /// Populate a workbook template with staff records.
    Populate {
        template: PathBuf,

        /// Staff records as a JSON array
        #[arg(long)]
        staff: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[arg(long, default_value = "mappings")]
        store: PathBuf,

        #[arg(long, default_value_t = 0)]
        company: i64,
    },

    /// Generate an HTML template from the header line of a PDF template.
    AnalyzePdf {
        pdf: PathBuf,

        #[arg(long, default_value = "mappings")]
        store: PathBuf,

        #[arg(long)]
        company: i64,

        /// Company name used in the generated file name
        #[arg(long)]
        name: String,
    },
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) if !verbose => {
            builder.parse_filters(&filters);
        }
        _ => {
            builder.filter_level(if verbose { LevelFilter::Debug } else { LevelFilter::Info });
        }
    }
    builder.init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn company_name(path: &Path) -> String {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default()
}

fn detect(config: TemplateConfig, pattern: &str, mapping: Option<&Path>) -> Result<()> {
    let paths = glob::glob(pattern)
        .with_context(|| format!("Invalid pattern '{pattern}'"))?
        .collect::<Result<Vec<PathBuf>, _>>()?;
    if paths.is_empty() {
        return Err(anyhow!("No templates match '{pattern}'"));
    }

    let store = MemoryMappingStore::new();
    if let Some(mapping) = mapping {
        let mapping: Mapping = read_json(mapping)?;
        store.store(0, &mapping)?;
    }
    let service = TemplateService::new(config, store);

    // One thread per template; they share the service read-only
    let results: Vec<(&PathBuf, Result<TemplateMeta, RustyTemplateError>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                let service = &service;
                scope.spawn(move || {
                    let company = Company {
                        id: 0,
                        name: company_name(path),
                        template_path: Some(path.to_owned()),
                        template_kind: TemplateKind::Excel,
                    };
                    (path, service.template_meta(&company))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow!("Detection thread panicked")))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut failures = 0usize;
    for (path, result) in results {
        let entry = match result {
            Ok(meta) => serde_json::json!({ "file": path, "template": meta }),
            Err(error) => {
                log::error!("{}: {}", path.display(), error);
                failures += 1;
                serde_json::json!({ "file": path, "error": error.to_string() })
            }
        };
        println!("{}", serde_json::to_string_pretty(&entry)?);
    }
    if failures > 0 {
        return Err(anyhow!("{failures} of {} templates failed", paths.len()));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => TemplateConfig::load(path)?,
        None => TemplateConfig::default(),
    };

    match cli.command {
        Commands::Detect { pattern, mapping } => detect(config, &pattern, mapping.as_deref())?,
        Commands::SaveMapping { store, company, request } => {
            let request: SaveRequest = read_json(&request)?;
            let service = TemplateService::new(config, JsonMappingStore::new(&store));
            let company = Company {
                id: company,
                name: String::new(),
                template_path: None,
                template_kind: TemplateKind::Excel,
            };
            let mapping = service.save_mapping(&company, request)?;
            println!("{}", serde_json::to_string_pretty(&mapping)?);
        }
        Commands::Populate { template, staff, output, store, company } => {
            let staff: Vec<StaffRecord> = read_json(&staff)?;
            let service = TemplateService::new(config, JsonMappingStore::new(&store));
            let company = Company {
                id: company,
                name: company_name(&template),
                template_path: Some(template),
                template_kind: TemplateKind::Excel,
            };
            service
                .populate_workbook_to(&company, &staff, &output)
                .with_context(|| format!("Failed to populate {}", output.display()))?;
            println!("{}", output.display());
        }
        Commands::AnalyzePdf { pdf, store, company, name } => {
            let service = TemplateService::new(config, JsonMappingStore::new(&store));
            let mut company = Company {
                id: company,
                name,
                template_path: Some(pdf),
                template_kind: TemplateKind::Pdf,
            };
            let analysis = service.analyze_pdf(&mut company, &PdfExtractSource)?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
    }
    Ok(())
}
