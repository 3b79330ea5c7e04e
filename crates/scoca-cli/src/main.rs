mod ingest;
mod report;
mod review;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use scoca_core::{CaseFiling, Config, OpinionType, aggregate};
use scoca_store::DuckStore;
use scoca_sync::{CourtListenerClient, fetch_is_current, next_posting_date};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "scoca",
    about = "Pairwise agreement rates between Supreme Court of California justices",
    version
)]
struct Cli {
    /// DuckDB database file
    #[arg(long, env = "SCOCA_DB", default_value = "scoca.duckdb", global = true)]
    db: PathBuf,

    /// Configuration file (roster, CourtListener settings)
    #[arg(long, env = "SCOCA_CONFIG", default_value = "scoca.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema and load the justice roster
    Init,

    /// Fetch new case filings from CourtListener and store their opinions
    Ingest {
        /// Only dockets with opinions filed on or after this date
        #[arg(long)]
        since: Option<NaiveDate>,

        /// CourtListener API token
        #[arg(long, env = "COURTLISTENER_API_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Walk the docket even if nothing was posted since the last ingest
        #[arg(long)]
        force: bool,
    },

    /// Extract opinions from a plain-text file without touching the database
    Parse {
        file: PathBuf,

        /// Docket number used for effective-type lookups (default: file stem)
        #[arg(long)]
        docket: Option<String>,
    },

    /// Compute the agreement chart
    Chart {
        /// Write an HTML page here instead of printing a text matrix
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Classify a concurring-and-dissenting opinion
    Resolve {
        opinion_id: i64,
        effective_type: Stance,
    },

    /// Add an opinion to a stored case filing by hand
    AddOpinion {
        docket_number: String,

        /// Authoring justice (short name or shorthand)
        author: String,

        #[arg(value_enum)]
        kind: Kind,

        /// Effective type of a concurring-and-dissenting opinion
        #[arg(long, value_enum)]
        effective: Option<Stance>,

        /// Joining justices
        #[arg(long = "with", num_args = 1..)]
        with: Vec<String>,
    },

    /// Set or clear the review flags of a case filing
    Flags {
        docket_number: String,

        /// Docket number ends in a letter (variant filing)
        #[arg(long)]
        variant: Option<bool>,

        /// No opinions could be read from the text
        #[arg(long)]
        no_opinions: Option<bool>,

        /// Held back from the chart
        #[arg(long)]
        exclude: Option<bool>,
    },

    /// Exclude a case filing from the chart
    Exclude {
        docket_number: String,

        /// Put the filing back into the chart
        #[arg(long)]
        undo: bool,
    },

    /// List filings held back from the chart and unresolved opinions
    Flagged,
}

#[derive(Clone, Copy, ValueEnum)]
enum Stance {
    Concurring,
    Dissenting,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Majority,
    Concurring,
    Dissenting,
    ConcurringAndDissenting,
}

impl From<Kind> for OpinionType {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Majority => OpinionType::Majority,
            Kind::Concurring => OpinionType::Concurring,
            Kind::Dissenting => OpinionType::Dissenting,
            Kind::ConcurringAndDissenting => OpinionType::ConcurringAndDissenting,
        }
    }
}

impl From<Stance> for OpinionType {
    fn from(value: Stance) -> Self {
        match value {
            Stance::Concurring => OpinionType::Concurring,
            Stance::Dissenting => OpinionType::Dissenting,
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Config::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn open_store(path: &Path) -> anyhow::Result<DuckStore> {
    let store = DuckStore::open_persistent(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    store.init_schema().context("creating schema")?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Init => {
            let config = load_config(&cli.config)?;
            let roster = config.roster().context("building roster")?;
            let store = open_store(&cli.db)?;
            store.load_roster(&roster).context("loading roster")?;
            println!("Initialised {} with {} justices", cli.db.display(), roster.len());
        }

        Command::Ingest {
            since,
            token,
            force,
        } => {
            let config = load_config(&cli.config)?;
            let roster = config.roster().context("building roster")?;
            let effective_types = config.effective_types()?;
            let mut store = open_store(&cli.db)?;
            store.load_roster(&roster).context("loading roster")?;

            let now = chrono::Local::now().naive_local();
            if !force
                && let Some(last) = store.last_ingest_run()?
                && fetch_is_current(last, now)
            {
                let next = next_posting_date(last);
                info!(%last, %next, "no opinions posted since the last ingest; skipping CourtListener");
                println!("Up to date (last ingest {last}, next posting {next}); use --force to walk anyway");
                return Ok(());
            }

            let cl = &config.courtlistener;
            let since = since.unwrap_or(cl.start_date);
            let client = CourtListenerClient::new(cl.base_url.clone(), token);
            info!(court = %cl.court, %since, "fetching active docket");
            let mut ingester = ingest::Ingester::new(&mut store, &roster, &effective_types);
            let walk = client.active_docket(&cl.court, since, &mut ingester).await;
            let stats = ingester.finish();
            let walk = walk.with_context(|| {
                format!(
                    "fetching docket from CourtListener ({} filings stored before the failure)",
                    stats.inserted
                )
            })?;
            store
                .record_ingest_run(chrono::Local::now().naive_local(), walk.fetched, stats.inserted)
                .context("recording ingest run")?;

            println!(
                "Stored {} new case filings ({} opinions, {} already stored) in {} ms",
                stats.inserted, stats.opinions, stats.already_stored, stats.elapsed_ms
            );
            if stats.variants + stats.no_opinions + stats.excluded > 0 {
                println!(
                    "  flagged: {} variant, {} without opinions, {} excluded",
                    stats.variants, stats.no_opinions, stats.excluded
                );
            }
            if walk.malformed > 0 {
                println!("  skipped {} malformed docket entries", walk.malformed);
            }
            if stats.unresolved > 0 {
                println!(
                    "  {} concurring and dissenting opinions need `scoca resolve`",
                    stats.unresolved
                );
            }
            let next = next_posting_date(now);
            info!(%next, "next opinion posting");
        }

        Command::Parse { file, docket } => {
            let config = load_config(&cli.config)?;
            let roster = config.roster().context("building roster")?;
            let effective_types = config.effective_types()?;
            let plain_text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let docket_number = docket.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let filing = CaseFiling {
                docket_number,
                url: None,
                plain_text,
                sha1: None,
                filed_on: None,
            };
            let extraction = filing.extract(&effective_types)?;
            println!("{}: {:?}", filing.docket_number, extraction.flags);
            for opinion in extraction.opinions.opinions() {
                println!("  {opinion}");
                if let Some(resolved) = opinion.resolve(&roster) {
                    println!(
                        "    -> {} [{}]",
                        resolved.author,
                        resolved.concurring.join(", ")
                    );
                    for name in &resolved.unknown {
                        println!("    ?? {name}");
                    }
                }
            }
        }

        Command::Chart { html } => {
            let config = load_config(&cli.config)?;
            let roster = config.roster().context("building roster")?;
            let store = open_store(&cli.db)?;
            let rows = store.opinion_rows().context("reading opinions")?;
            info!(rows = rows.len(), "aggregating");
            let tally = aggregate(&roster, rows).context("agreement chart aborted")?;
            let rates = tally.rates();
            match html {
                Some(path) => {
                    std::fs::write(&path, report::render_html(&roster, &rates))
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", report::render_text(&roster, &rates)),
            }
        }

        Command::Resolve {
            opinion_id,
            effective_type,
        } => {
            let store = open_store(&cli.db)?;
            store
                .set_effective_type(opinion_id, effective_type.into())
                .with_context(|| format!("resolving opinion {opinion_id}"))?;
        }

        Command::AddOpinion {
            docket_number,
            author,
            kind,
            effective,
            with,
        } => {
            let config = load_config(&cli.config)?;
            let roster = config.roster().context("building roster")?;
            let mut store = open_store(&cli.db)?;
            let id = review::add_opinion(
                &mut store,
                &roster,
                &docket_number,
                &author,
                kind.into(),
                effective.map(OpinionType::from),
                with,
            )?;
            println!("Added opinion #{id} to {docket_number}");
        }

        Command::Flags {
            docket_number,
            variant,
            no_opinions,
            exclude,
        } => {
            let store = open_store(&cli.db)?;
            let flags = review::update_flags(
                &store,
                &docket_number,
                review::FlagChanges {
                    ends_in_letter: variant,
                    no_opinions,
                    exclude_from_chart: exclude,
                },
            )
            .with_context(|| format!("updating {docket_number}"))?;
            println!("{docket_number}: {flags:?}");
        }

        Command::Exclude {
            docket_number,
            undo,
        } => {
            let store = open_store(&cli.db)?;
            store
                .set_excluded(&docket_number, !undo)
                .with_context(|| format!("updating {docket_number}"))?;
        }

        Command::Flagged => {
            let store = open_store(&cli.db)?;
            let flagged = store.flagged_filings()?;
            let unresolved = store.unresolved_opinions()?;
            if flagged.is_empty() && unresolved.is_empty() {
                println!("Nothing flagged");
            }
            for f in &flagged {
                let mut reasons = Vec::new();
                if f.flags.ends_in_letter {
                    reasons.push("variant docket");
                }
                if f.flags.no_opinions {
                    reasons.push("no opinions");
                }
                if f.flags.exclude_from_chart {
                    reasons.push("excluded");
                }
                println!(
                    "{:<12} {:<32} {}",
                    f.docket_number,
                    reasons.join(", "),
                    f.url.as_deref().unwrap_or("")
                );
            }
            if !unresolved.is_empty() {
                warn!(count = unresolved.len(), "unresolved concurring and dissenting opinions");
                for o in &unresolved {
                    println!(
                        "#{:<8} {:<12} {:<6} {}",
                        o.id,
                        o.docket_number,
                        o.authoring_justice,
                        o.url.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
    Ok(())
}
