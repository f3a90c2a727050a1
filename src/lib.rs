pub mod config;
pub mod model;
pub mod search;
pub mod storage;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use config::StoreConfig;
use model::types::{ClassifiedSentence, ClassifiedSentenceStatus, SentencesQuery};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use storage::ClassifiedSentenceDao;
use storage::sqlite::LazySentenceStore;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "sentences",
    version,
    about = "Curate classified NLP training sentences"
)]
pub struct Cli {
    /// Path to the SQLite database (defaults to the configured or platform data dir path)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Selection by intent, language and status.
#[derive(Args, Debug, Clone, Default)]
pub struct SentenceSelector {
    /// Intent id (repeatable)
    #[arg(long = "intent")]
    pub intents: Vec<String>,

    /// Locale tag
    #[arg(long)]
    pub language: Option<String>,

    /// Status tag (inbox, validated, model, deleted)
    #[arg(long)]
    pub status: Option<ClassifiedSentenceStatus>,
}

impl SentenceSelector {
    fn intent_set(&self) -> Option<HashSet<String>> {
        (!self.intents.is_empty()).then(|| self.intents.iter().cloned().collect())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List sentences by intent, language and/or status
    List {
        #[command(flatten)]
        selector: SentenceSelector,
    },
    /// Paged search over one application and language
    Search {
        #[arg(long = "app")]
        application_id: String,
        #[arg(long)]
        language: String,
        /// Free text to look for
        #[arg(long)]
        text: Option<String>,
        /// Match the full text exactly instead of a case-insensitive substring
        #[arg(long, default_value_t = false)]
        exact: bool,
        #[arg(long)]
        intent: Option<String>,
        /// Only these statuses (repeatable); takes precedence over --not-status
        #[arg(long = "status")]
        statuses: Vec<ClassifiedSentenceStatus>,
        #[arg(long)]
        not_status: Option<ClassifiedSentenceStatus>,
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Page size (defaults to the configured page size)
        #[arg(long)]
        size: Option<usize>,
    },
    /// Save sentences from a JSON-lines file (`-` for stdin)
    Import { input: PathBuf },
    /// Switch the status of every selected sentence
    SwitchStatus {
        #[command(flatten)]
        selector: SentenceSelector,
        /// New status
        #[arg(long)]
        to: ClassifiedSentenceStatus,
    },
    /// Move an application's sentences from one intent to another
    SwitchIntent {
        #[arg(long = "app")]
        application_id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Remove an entity role from an intent's sentences
    RemoveEntity {
        #[arg(long = "app")]
        application_id: String,
        #[arg(long)]
        intent: String,
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        role: String,
    },
    /// Delete sentences by status or by application
    Delete {
        #[arg(long, conflicts_with = "application_id", required_unless_present = "application_id")]
        status: Option<ClassifiedSentenceStatus>,
        #[arg(long = "app")]
        application_id: Option<String>,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

#[derive(Serialize)]
struct Affected {
    affected: usize,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "sentences", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(())
        }
        command => {
            let config = StoreConfig::load(cli.config.as_deref())?;
            let lazy = LazySentenceStore::with_options(
                config.resolve_db_path(cli.db),
                config.store_options(),
            );
            run_store_command(command, &lazy, &config)
        }
    }
}

fn run_store_command(command: Commands, lazy: &LazySentenceStore, config: &StoreConfig) -> Result<()> {
    let store = lazy.get(command_name(&command))?;
    match command {
        Commands::List { selector } => {
            let sentences = store.get_sentences(
                selector.intent_set().as_ref(),
                selector.language.as_deref(),
                selector.status,
            )?;
            print_json(&sentences)
        }
        Commands::Search {
            application_id,
            language,
            text,
            exact,
            intent,
            statuses,
            not_status,
            start,
            size,
        } => {
            let mut query = SentencesQuery::new(
                application_id,
                language,
                start,
                size.unwrap_or(config.default_page_size),
            );
            query.search = text;
            query.only_exact_match = exact;
            query.intent_id = intent;
            query.status = statuses.into_iter().collect();
            query.not_status = not_status;
            print_json(&store.search(&query)?)
        }
        Commands::Import { input } => {
            let sentences = read_sentences(&input)?;
            for sentence in &sentences {
                store.save(sentence)?;
            }
            print_json(&Affected {
                affected: sentences.len(),
            })
        }
        Commands::SwitchStatus { selector, to } => {
            let sentences = store.get_sentences(
                selector.intent_set().as_ref(),
                selector.language.as_deref(),
                selector.status,
            )?;
            store.switch_sentences_status(&sentences, to)?;
            print_json(&Affected {
                affected: sentences.len(),
            })
        }
        Commands::SwitchIntent {
            application_id,
            from,
            to,
        } => {
            let affected = store.switch_sentences_intent(&application_id, &from, &to)?;
            print_json(&Affected { affected })
        }
        Commands::RemoveEntity {
            application_id,
            intent,
            entity_type,
            role,
        } => {
            let affected =
                store.remove_entity_from_sentences(&application_id, &intent, &entity_type, &role)?;
            print_json(&Affected { affected })
        }
        Commands::Delete {
            status,
            application_id,
        } => {
            let affected = match (status, application_id) {
                (Some(status), _) => store.delete_sentences_by_status(status)?,
                (None, Some(app)) => store.delete_sentences_by_application_id(&app)?,
                (None, None) => bail!("either --status or --app is required"),
            };
            print_json(&Affected { affected })
        }
        Commands::Completions { .. } | Commands::Man => Ok(()),
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::List { .. } => "list",
        Commands::Search { .. } => "search",
        Commands::Import { .. } => "import",
        Commands::SwitchStatus { .. } => "switch-status",
        Commands::SwitchIntent { .. } => "switch-intent",
        Commands::RemoveEntity { .. } => "remove-entity",
        Commands::Delete { .. } => "delete",
        Commands::Completions { .. } => "completions",
        Commands::Man => "man",
    }
}

/// Parse JSON-lines sentences from `input`, or stdin for `-`.
fn read_sentences(input: &Path) -> Result<Vec<ClassifiedSentence>> {
    let reader: Box<dyn Read> = if input == Path::new("-") {
        Box::new(std::io::stdin())
    } else {
        Box::new(
            std::fs::File::open(input)
                .with_context(|| format!("opening {}", input.display()))?,
        )
    };
    let mut out = Vec::new();
    for (n, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sentence = serde_json::from_str(&line)
            .with_context(|| format!("parsing sentence on line {}", n + 1))?;
        out.push(sentence);
    }
    Ok(out)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn default_db_path() -> PathBuf {
    default_data_dir().join("sentences.db")
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "classified-sentences", "classified-sentences")
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf())
}
