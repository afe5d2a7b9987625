#[cfg(feature = "cli")]
mod cli {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use assistant_memory::{
        config::Config,
        context_engine::{ChatTurn, ContextAssembler},
        memory_db::MemoryDatabase,
        metrics,
        personality::PersonalityTraits,
        profile::UserProfile,
        search::SimilaritySearch,
        summarization::{ConfiguredSummarizer, SummarizationEngine, SummarizationMethod},
        telemetry,
        worker_threads::{OpenAiCompatibleClient, PassOutcome, Summarizer, SummaryEvent},
    };
    use clap::{Parser, Subcommand};
    use tokio::sync::{mpsc, watch};
    use tracing::info;

    const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful personal assistant. Use the provided context when it is relevant.";

    /// Long-term conversational memory for a personal assistant.
    #[derive(Parser, Debug)]
    #[command(name = "assistant-memory", version, about, long_about = None)]
    struct Cli {
        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand, Debug)]
    enum Commands {
        /// Embed and store a message.
        Add { text: String },
        /// Show the most recent messages, newest first.
        Recent {
            #[arg(long, default_value_t = 10)]
            limit: usize,
        },
        /// Rank stored messages (or summaries) against a query.
        Search {
            query: String,
            #[arg(long)]
            top_k: Option<usize>,
            #[arg(long)]
            summaries: bool,
        },
        /// Run one summarization pass now.
        Summarize {
            #[arg(long)]
            method: Option<SummarizationMethod>,
        },
        /// Print the summary with the latest end time.
        LatestSummary,
        /// Database statistics as JSON.
        Stats,
        /// Print the context bundle for a message without calling the model.
        Context { message: String },
        /// Run a full turn against the configured model.
        Chat {
            message: String,
            #[arg(long)]
            system: Option<String>,
        },
        /// Run the periodic summarizer until Ctrl-C.
        Watch,
    }

    struct App {
        config: Config,
        database: Arc<MemoryDatabase>,
    }

    impl App {
        fn open(config: Config) -> Result<Self> {
            let embedder = config.build_embedder();
            let database = MemoryDatabase::new(&config.db_path, embedder, config.pool_size)
                .with_context(|| format!("opening {}", config.db_path.display()))?;
            Ok(Self {
                config,
                database: Arc::new(database),
            })
        }

        fn model(&self) -> Arc<OpenAiCompatibleClient> {
            Arc::new(
                OpenAiCompatibleClient::with_timeout(
                    self.config.model_url.clone(),
                    self.config.model_name.clone(),
                    self.config.model_timeout(),
                )
                .with_api_key(self.config.model_api_key.clone()),
            )
        }

        fn assembler(&self) -> ContextAssembler {
            ContextAssembler {
                message_top_k: self.config.message_top_k,
                summary_top_k: self.config.summary_top_k,
                top_topics: self.config.top_topics,
                corpus_cap: self.config.search_corpus_cap,
            }
        }

        fn chat_turn(&self) -> Result<ChatTurn> {
            let profile = UserProfile::load_or_default(&self.config.profile_path)?;
            Ok(ChatTurn::new(
                Arc::clone(&self.database),
                self.assembler(),
                Arc::new(profile),
                Arc::new(PersonalityTraits::default()),
                self.model(),
            ))
        }

        fn summarizer(&self, method: SummarizationMethod) -> Summarizer {
            let engine = SummarizationEngine::new(self.config.summary_sentences).with_model(self.model());
            let configured = ConfiguredSummarizer::new(Arc::new(engine), method);
            Summarizer::new(Arc::clone(&self.database), Arc::new(configured), self.config.summary_window)
        }
    }

    fn print_pass(outcome: &PassOutcome) {
        match outcome {
            PassOutcome::Created(record) => println!(
                "summary {} ({} .. {}): {}",
                record.id, record.start_time, record.end_time, record.summary_text
            ),
            PassOutcome::Empty => println!("no messages to summarize"),
        }
    }

    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        telemetry::init_tracing();
        metrics::init_metrics();

        let config = Config::from_env()?;
        config.print_config();
        let app = App::open(config)?;

        match cli.command {
            Commands::Add { text } => {
                let stored = app.database.messages.add_message(&text).await?;
                println!("stored message {} at {}", stored.id, stored.timestamp);
            }
            Commands::Recent { limit } => {
                for message in app.database.messages.recent_messages(limit)? {
                    println!("[{}] {}", message.timestamp, message.text);
                }
            }
            Commands::Search { query, top_k, summaries } => {
                let search = SimilaritySearch::new(Arc::clone(&app.database))
                    .with_corpus_cap(app.config.search_corpus_cap);
                let results = if summaries {
                    search
                        .relevant_summaries(&query, top_k.unwrap_or(app.config.summary_top_k))
                        .await?
                } else {
                    search
                        .similar_messages(&query, top_k.unwrap_or(app.config.message_top_k))
                        .await?
                };
                for result in results {
                    println!("{:.4}  #{}  {}", result.similarity_score, result.source_id, result.content);
                }
            }
            Commands::Summarize { method } => {
                let summarizer = app.summarizer(method.unwrap_or(app.config.summary_method));
                let handle = summarizer
                    .trigger()
                    .context("a summarization pass is already running")?;
                let outcome = handle.await.context("summarization task panicked")??;
                print_pass(&outcome);
            }
            Commands::LatestSummary => match app.database.summaries.latest_summary()? {
                Some(summary) => println!("{}", summary),
                None => println!("no summaries yet"),
            },
            Commands::Stats => {
                let stats = app.database.get_stats()?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Commands::Context { message } => {
                let bundle = app.chat_turn()?.preview(&message).await?;
                println!("{}", bundle);
            }
            Commands::Chat { message, system } => {
                let turn = app.chat_turn()?;
                let mut session = turn.new_session(system.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)).await?;
                let outcome = turn.run(&mut session, &message).await?;
                println!("{}", outcome.response);
            }
            Commands::Watch => {
                let (events_tx, mut events_rx) = mpsc::unbounded_channel();
                let summarizer = Arc::new(app.summarizer(app.config.summary_method).with_events(events_tx));
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let periodic = summarizer.spawn_periodic(app.config.summary_interval(), shutdown_rx);

                loop {
                    tokio::select! {
                        Some(event) = events_rx.recv() => match event {
                            SummaryEvent::Created(record) => print_pass(&PassOutcome::Created(record)),
                            SummaryEvent::Empty => println!("no messages to summarize"),
                            SummaryEvent::Failed(error) => eprintln!("summarization failed: {}", error),
                        },
                        _ = tokio::signal::ctrl_c() => {
                            info!("Shutdown requested");
                            break;
                        }
                    }
                }
                let _ = shutdown_tx.send(true);
                periodic.await?;
            }
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
