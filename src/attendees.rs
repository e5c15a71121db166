//! CLI commands that read or edit the collection directly.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

use crate::config::Config;
use crate::filter::{filter_profiles, ListQuery};
use crate::models::ProfileId;
use crate::render::{html, project, text, ExpandAll, Expansion, RenderSettings};
use crate::store::{parse_profile_input, AddOutcome, ProfileStore};

/// `roster add`: read one profile from `file` (stdin when `None`).
pub async fn run_add(
    config: &Config,
    file: Option<&Path>,
    school: Option<&str>,
    image: Option<&str>,
) -> Result<()> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read profile from stdin")?;
            buf
        }
    };
    if input.trim().is_empty() {
        bail!("Please paste profile JSON");
    }
    let profile = parse_profile_input(&input, school, image).context("Invalid profile JSON")?;
    let name = profile.display_name().to_string();

    let mut store = ProfileStore::open(config).await?;
    let outcome = store.add(profile).await;
    store.close().await;

    match outcome? {
        AddOutcome::Added(id) => {
            println!("Successfully added {}!", name);
            println!("id: {}", id);
            Ok(())
        }
        AddOutcome::Duplicate { url } => {
            bail!("An attendee with this profile URL already exists: {}", url)
        }
    }
}

/// `roster list`: one line per profile, or card markup with `as_html`.
pub async fn run_list(config: &Config, query: &ListQuery, as_html: bool) -> Result<()> {
    let store = ProfileStore::open(config).await?;
    let selected = filter_profiles(store.profiles(), query);
    let settings = RenderSettings::from(&config.render);
    let expansion = Expansion::new();

    if as_html {
        let views: Vec<_> = selected
            .iter()
            .map(|p| project(p, None, &expansion, &settings))
            .collect();
        println!("{}", html::render_cards(&views));
    } else if selected.is_empty() {
        if store.is_empty() {
            println!("No attendees yet. Add some with `roster add` or `roster import`.");
        } else {
            println!("No attendees match your filters.");
        }
    } else {
        for p in &selected {
            println!("{}", text::render_line(&project(p, None, &expansion, &settings)));
        }
        println!();
        println!("{} of {} attendees", selected.len(), store.len());
    }

    store.close().await;
    Ok(())
}

/// `roster show`: the full card, every section expanded.
pub async fn run_show(config: &Config, id: &str, as_html: bool) -> Result<()> {
    let store = ProfileStore::open(config).await?;
    let found = store.get(&ProfileId::from(id)).cloned();
    store.close().await;

    let Some(profile) = found else {
        bail!("attendee not found: {}", id);
    };
    let view = project(
        &profile,
        None,
        &ExpandAll,
        &RenderSettings::from(&config.render),
    );
    if as_html {
        println!("{}", html::render_card(&view));
    } else {
        print!("{}", text::render_card(&view));
    }
    Ok(())
}

/// `roster remove`: succeeds whether or not the id exists.
pub async fn run_remove(config: &Config, id: &str) -> Result<()> {
    let mut store = ProfileStore::open(config).await?;
    let removed = store.remove(&ProfileId::from(id)).await;
    store.close().await;

    if removed? {
        println!("Removed {}", id);
    } else {
        println!("No attendee with id {}", id);
    }
    Ok(())
}

/// `roster clear`: requires `--yes`.
pub async fn run_clear(config: &Config, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Refusing to delete all attendees without --yes. This action cannot be undone.");
    }
    let mut store = ProfileStore::open(config).await?;
    let count = store.len();
    let cleared = store.clear().await;
    store.close().await;
    cleared?;

    println!("Deleted {} attendees", count);
    Ok(())
}

/// `roster schools`: the values offered by the school filter.
pub async fn run_schools(config: &Config) -> Result<()> {
    let store = ProfileStore::open(config).await?;
    for school in store.schools() {
        println!("{}", school);
    }
    store.close().await;
    Ok(())
}
