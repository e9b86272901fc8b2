use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use madrasa::agent::Agent;
use madrasa::api::{ApiServer, ApiServerConfig};
use madrasa::llm::ChatClient;
use madrasa::preprocess::{self, ArabicPreprocessor, PreprocessOptions};
use madrasa_kg::{episode, schema, search, KnowledgeGraph};

#[derive(Parser)]
#[command(name = "madrasa")]
#[command(about = "RAG assistant over a temporal knowledge graph of the Arabic curriculum", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build graph indices and constraints
    Init,

    /// Preprocess a curriculum PDF into an episode file
    Preprocess {
        /// Path to the PDF document
        #[arg(short, long)]
        pdf: PathBuf,

        /// Output episode file
        #[arg(short, long, default_value = "episodes.json")]
        output: PathBuf,

        /// Maximum chunk size in characters
        #[arg(long, default_value = "1500")]
        chunk_size: usize,

        /// Overlap between consecutive chunks in characters
        #[arg(long, default_value = "250")]
        chunk_overlap: usize,
    },

    /// Submit an episode file to the knowledge graph
    Ingest {
        /// Episode file produced by preprocess
        #[arg(short, long, default_value = "episodes.json")]
        episodes: PathBuf,
    },

    /// Search facts in the knowledge graph
    Search {
        /// Search query
        query: String,

        /// Maximum results to return
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Rerank by graph distance from this node uuid
        #[arg(long)]
        center: Option<String>,
    },

    /// Print the graph's label/relationship/property schema
    Schema,

    /// Chat with the curriculum agent
    Chat,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "madrasa=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let kg = KnowledgeGraph::from_env().await?;
            episode::build_indices_and_constraints(kg.graph()).await?;
            println!("Graph indices and constraints built.");
        }

        Commands::Preprocess {
            ref pdf,
            ref output,
            chunk_size,
            chunk_overlap,
        } => {
            let llm = ChatClient::from_env()?;
            let preprocessor = ArabicPreprocessor::new();
            let options = PreprocessOptions {
                chunk_size,
                chunk_overlap,
            };

            let episodes = preprocessor.process_pdf(&llm, pdf, &options).await?;
            preprocess::write_episodes(output, &episodes)?;
            println!("Wrote {} episodes to {:?}", episodes.len(), output);
        }

        Commands::Ingest { ref episodes } => {
            let kg = KnowledgeGraph::from_env().await?;
            episode::build_indices_and_constraints(kg.graph()).await?;

            let records = preprocess::load_episodes(episodes)?;
            let total = records.len();
            for (i, record) in records.iter().enumerate() {
                let uuid = episode::add_episode(kg.graph(), record, Utc::now()).await?;
                println!("[{}/{}] {} -> {}", i + 1, total, record.name, uuid);
            }
            println!("Ingested {} episodes.", total);
        }

        Commands::Search {
            ref query,
            limit,
            ref center,
        } => {
            let kg = KnowledgeGraph::from_env().await?;

            if let Some(center_uuid) = center {
                let results =
                    search::search_facts_reranked(kg.graph(), query, center_uuid, limit).await?;
                print_facts(&results);
            } else {
                let results = search::search_facts(kg.graph(), query, limit).await?;
                print_facts(&results);

                // Rerank around the best hit's source node, as a second view
                // on the same results.
                if let Some(top) = results.first() {
                    println!("\nReranking search results based on graph distance:");
                    println!("Using center node UUID: {}", top.source_node_uuid);

                    let reranked = search::search_facts_reranked(
                        kg.graph(),
                        query,
                        &top.source_node_uuid,
                        limit,
                    )
                    .await?;
                    print_facts(&reranked);
                } else {
                    println!("No results found in the initial search to use as center node.");
                }
            }
        }

        Commands::Schema => {
            let kg = KnowledgeGraph::from_env().await?;
            let graph_schema = schema::inspect_schema(kg.graph()).await?;
            println!("Node Types: {:?}", graph_schema.node_types);
            println!("Edge Types: {:?}", graph_schema.edge_types);
            println!("Node Properties: {:?}", graph_schema.node_properties);
            println!("Edge Properties: {:?}", graph_schema.edge_properties);
        }

        Commands::Chat => {
            let kg = KnowledgeGraph::from_env().await?;

            match episode::build_indices_and_constraints(kg.graph()).await {
                Ok(()) => println!("Graph indices built successfully."),
                Err(e) => {
                    println!("Note: {}", e);
                    println!("Continuing with existing indices...");
                }
            }

            let llm = ChatClient::from_env()?;
            let mut agent = Agent::new(llm, Arc::new(kg));
            agent.run_repl().await?;
        }

        Commands::Serve { ref host, port } => {
            let kg = KnowledgeGraph::from_env().await?;
            let config = ApiServerConfig {
                host: host.clone(),
                port,
            };
            ApiServer::new(config, Arc::new(kg)).start().await?;
        }
    }

    Ok(())
}

fn print_facts(results: &[madrasa_kg::FactSearchResult]) {
    for result in results {
        println!("UUID: {}", result.uuid);
        println!("Fact: {}", result.fact);
        if let Some(valid_at) = &result.valid_at {
            println!("Valid from: {}", valid_at);
        }
        if let Some(invalid_at) = &result.invalid_at {
            println!("Valid until: {}", invalid_at);
        }
        println!("---");
    }
}
