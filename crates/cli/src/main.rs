use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visit_core::attributes::AttributeCheck;
use visit_core::{
    submitter, CancellationHandle, Collaborators, SubmissionMachine, SubmissionReport,
    SubmitRejected, VisitCreationPayload, VisitFormSchema, VisitTypeCatalog, VisitTypeTab,
    WorkflowConfig,
};
use visit_types::NonEmptyText;

mod dry_run;
mod files;

const ENV_SHOW_RECOMMENDED_VISIT_TYPE_TAB: &str = "VISIT_SHOW_RECOMMENDED_VISIT_TYPE_TAB";
const ENV_SHOW_SERVICE_QUEUE_FIELDS: &str = "VISIT_SHOW_SERVICE_QUEUE_FIELDS";

#[derive(Parser)]
#[command(name = "visit")]
#[command(about = "Visit registration workflow tooling")]
struct Cli {
    /// Workflow configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a visit-type catalog file
    Types {
        /// Catalog file (YAML or JSON list of uuid/display)
        catalog: PathBuf,
        /// Case-insensitive search text
        #[arg(long, default_value = "")]
        query: String,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Overrides the configured page size
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Validate a form file and print the visit request it would send
    Check {
        /// Form file (YAML)
        form: PathBuf,
        /// Date to validate against (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Submit a form file against offline collaborators
    Simulate {
        /// Form file (YAML)
        form: PathBuf,
        /// Catalog used to label the created visit
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Date to validate against (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Make the visit-creation call fail with this message
        #[arg(long)]
        fail_visit: Option<String>,
        /// Make the queue-admission call fail with this message
        #[arg(long)]
        fail_queue: Option<String>,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("visit=info".parse()?)
                .add_directive("visit_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = files::load_config(cli.config.as_deref())?
        .with_overrides(
            std::env::var(ENV_SHOW_RECOMMENDED_VISIT_TYPE_TAB).ok(),
            std::env::var(ENV_SHOW_SERVICE_QUEUE_FIELDS).ok(),
        )
        .context("invalid environment override")?;
    tracing::debug!(config = ?cfg, "resolved workflow configuration");
    let cfg = Arc::new(cfg);

    match cli.command {
        Some(Commands::Types {
            catalog,
            query,
            page,
            page_size,
        }) => search_types(&cfg, &catalog, &query, page, page_size)?,
        Some(Commands::Check { form, today }) => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let payload = check_form(&cfg, &form, today)?;
            println!("{:#}", payload.to_json()?);
        }
        Some(Commands::Simulate {
            form,
            catalog,
            today,
            fail_visit,
            fail_queue,
        }) => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let options = SimulateOptions {
                catalog,
                fail_visit,
                fail_queue,
            };
            let report = simulate(Arc::clone(&cfg), &form, today, options).await?;
            println!("final state: {}", report.state.name());
            if !report.state.is_success() {
                bail!("visit was not started");
            }
        }
        Some(Commands::Config) => {
            println!(
                "show_recommended_visit_type_tab: {}",
                cfg.show_recommended_visit_type_tab()
            );
            println!("show_service_queue_fields: {}", cfg.show_service_queue_fields());
            println!("visit_types_page_size: {}", cfg.visit_types_page_size());
            println!(
                "visit_queue_number_attribute_uuid: {}",
                cfg.visit_queue_number_attribute_uuid().unwrap_or("-")
            );
            for attribute in cfg.visit_attribute_types() {
                println!(
                    "visit attribute type: {} (required: {})",
                    attribute.uuid, attribute.required
                );
            }
        }
        None => {
            println!("No command provided. Use --help for usage information.");
        }
    }

    Ok(())
}

fn search_types(
    cfg: &WorkflowConfig,
    catalog: &Path,
    query: &str,
    page: usize,
    page_size: Option<usize>,
) -> anyhow::Result<()> {
    let catalog = VisitTypeCatalog::new(files::load_catalog(catalog)?);
    let page_size = page_size.unwrap_or(cfg.visit_types_page_size());

    let Some(page) = catalog.search(VisitTypeTab::All, query, page_size, page) else {
        bail!("visit types are not loaded");
    };

    if page.results.is_empty() {
        println!("No visit types match {query:?}.");
    }
    for visit_type in &page.results {
        println!("{}  {}", visit_type.uuid, visit_type.display);
    }
    println!("page {} of {}", page.current_page, page.total_pages);
    Ok(())
}

/// Validate a form file and build the visit request it would produce.
fn check_form(
    cfg: &WorkflowConfig,
    form: &Path,
    today: NaiveDate,
) -> anyhow::Result<VisitCreationPayload> {
    let file = files::load_form(form)?;
    let patient = NonEmptyText::new(&file.patient_uuid).context("patient_uuid")?;

    let validated = match VisitFormSchema::validated(&file.form, today) {
        Ok(validated) => validated,
        Err(errors) => {
            for (field, message) in errors.iter() {
                eprintln!("{field:?}: {message}");
            }
            return Err(SubmitRejected::FormInvalid(errors).into());
        }
    };

    if let AttributeCheck::Missing(missing) =
        file.attribute_catalog(cfg).check(&file.attributes)
    {
        for attribute in &missing {
            eprintln!("missing required attribute: {}", attribute.label());
        }
        bail!("{} required attribute(s) missing", missing.len());
    }

    Ok(VisitCreationPayload::build(
        &patient,
        &validated,
        &file.attributes,
    )?)
}

struct SimulateOptions {
    catalog: Option<PathBuf>,
    fail_visit: Option<String>,
    fail_queue: Option<String>,
}

/// Run a form file through the submission workflow against offline collaborators.
async fn simulate(
    cfg: Arc<WorkflowConfig>,
    form: &Path,
    today: NaiveDate,
    options: SimulateOptions,
) -> anyhow::Result<SubmissionReport> {
    let file = files::load_form(form)?;
    let patient = NonEmptyText::new(&file.patient_uuid).context("patient_uuid")?;
    let catalog = match &options.catalog {
        Some(path) => files::load_catalog(path)?,
        None => Vec::new(),
    };

    let validated =
        VisitFormSchema::validated(&file.form, today).map_err(SubmitRejected::FormInvalid)?;

    let surface = Arc::new(dry_run::ConsoleSurface);
    let collaborators = Collaborators {
        visits: Arc::new(dry_run::DryRunVisits {
            catalog,
            fail_with: options.fail_visit,
        }),
        queue: Arc::new(dry_run::DryRunQueue {
            fail_with: options.fail_queue,
        }),
        queue_fields: Arc::new(dry_run::FileQueueFields(file.queue.clone())),
        notifications: surface.clone(),
        cache: surface.clone(),
        surface,
    };

    let mut machine = SubmissionMachine::new(Arc::clone(&cfg), patient.clone());
    let step = machine.submit(&validated, &file.attribute_catalog(&cfg), &file.attributes)?;
    tracing::info!(patient = %patient, "simulating visit submission");
    let close = CancellationHandle::new();

    Ok(submitter::drive(&mut machine, step, &collaborators, close.signal(), patient.as_str()).await)
}
