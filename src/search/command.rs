//! `roster search` and `roster model`.

use anyhow::{bail, Result};

use super::{search, selected_model, HttpRankingClient, RankingModel, SearchOutcome};
use crate::config::Config;
use crate::render::{html, project, text, Expansion, RenderSettings};
use crate::store::ProfileStore;

/// How `roster search` prints its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

pub async fn run_search(
    config: &Config,
    query: &str,
    model: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let store = ProfileStore::open(config).await?;
    let model = match model {
        Some(m) => m.parse::<RankingModel>(),
        None => selected_model(&store, &config.search).await,
    };
    let profiles = store.profiles().to_vec();
    store.close().await;
    let model = model?;

    let client = HttpRankingClient::new(config.search.timeout_secs)?;
    let outcome = match search(&client, &config.search, model, query, &profiles).await {
        Ok(outcome) => outcome,
        Err(e) => bail!("{}", e.user_message()),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Html => print_html(&outcome, config),
        OutputFormat::Text => print_text(&outcome, config),
    }
    Ok(())
}

fn print_text(outcome: &SearchOutcome, config: &Config) {
    match outcome {
        SearchOutcome::Unparsed { raw } => {
            eprintln!("Error parsing AI response");
            println!("{}", raw);
        }
        SearchOutcome::Ranked {
            summary_text,
            matches,
            ..
        } => {
            if matches.is_empty() {
                println!("{}", summary_text);
                return;
            }
            println!("Search Results: {}", summary_text);
            println!();
            println!(
                "Found {} high-quality {}:",
                matches.len(),
                if matches.len() == 1 { "match" } else { "matches" }
            );
            let settings = RenderSettings::from(&config.render);
            let expansion = Expansion::new();
            for m in matches {
                println!();
                print!(
                    "{}",
                    text::render_card(&project(&m.profile, Some(&m.matched), &expansion, &settings))
                );
            }
        }
    }
}

fn print_html(outcome: &SearchOutcome, config: &Config) {
    match outcome {
        SearchOutcome::Unparsed { raw } => {
            println!(r#"<div class="ai-result-summary">{}</div>"#, html::escape(raw));
        }
        SearchOutcome::Ranked {
            summary_text,
            matches,
            ..
        } => {
            println!(
                r#"<div class="ai-result-summary">{}</div>"#,
                html::escape(summary_text)
            );
            let settings = RenderSettings::from(&config.render);
            let expansion = Expansion::new();
            let views: Vec<_> = matches
                .iter()
                .map(|m| project(&m.profile, Some(&m.matched), &expansion, &settings))
                .collect();
            println!("{}", html::render_cards(&views));
        }
    }
}

/// `roster model`: print the selected model, or store a new selection.
pub async fn run_model(config: &Config, id: Option<&str>) -> Result<()> {
    let store = ProfileStore::open(config).await?;
    let result = match id {
        Some(id) => match id.parse::<RankingModel>() {
            Ok(model) => store.set_selected_model(model.as_str()).await.map(|_| {
                println!("Selected model: {}", model);
            }),
            Err(e) => Err(e),
        },
        None => selected_model(&store, &config.search).await.map(|model| {
            println!("{}", model);
        }),
    };
    store.close().await;
    result
}
