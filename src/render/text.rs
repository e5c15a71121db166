//! Plain-text rendering for the terminal.

use std::fmt::Write;

use super::{FieldView, ProfileView, SectionLayout};

/// One-line summary used by `roster list`.
pub fn render_line(view: &ProfileView) -> String {
    let id = view.id.as_ref().map(|i| i.as_str()).unwrap_or("-");
    let mut line = format!("{}  {}", id, view.name);
    if let Some(school) = &view.school {
        let _ = write!(line, " · {}", school.value);
    }
    if let Some(headline) = &view.headline {
        let _ = write!(line, " · {}", headline.value);
    }
    line
}

/// Multi-line card used by `roster show` and `roster search`.
pub fn render_card(view: &ProfileView) -> String {
    let mut out = String::new();

    match &view.score {
        Some(score) => {
            let _ = writeln!(out, "{}  [{:.0}]", view.name, score.score);
        }
        None => {
            let _ = writeln!(out, "{}", view.name);
        }
    }
    if let Some(rel) = &view.relevance {
        match &rel.descriptor {
            Some(d) => {
                let _ = writeln!(out, "  {} {}", d, rel.text);
            }
            None => {
                let _ = writeln!(out, "  {}", rel.text);
            }
        }
    }

    field(&mut out, "", view.headline.as_ref());
    field(&mut out, "Location: ", view.location.as_ref());
    field(&mut out, "School: ", view.school.as_ref());
    if let Some(id) = &view.id {
        let _ = writeln!(out, "  id: {}", id);
    }
    if let Some(url) = &view.url {
        let _ = writeln!(out, "  {}", url);
    }
    field(&mut out, "", view.about.as_ref());

    for section in &view.sections {
        let _ = writeln!(out, "\n  {}", section.title);
        match section.layout {
            SectionLayout::List => {
                for item in section.visible() {
                    let mut line = format!("    - {}", item.primary);
                    if let Some(s) = &item.secondary {
                        let _ = write!(line, ", {}", s);
                    }
                    if let Some(d) = &item.duration {
                        let _ = write!(line, " ({})", d);
                    }
                    if let Some(badge) = &item.badge {
                        let _ = write!(line, "  ✨ {}", badge.reason);
                    }
                    let _ = writeln!(out, "{}", line);
                }
            }
            SectionLayout::Tags => {
                let tags: Vec<String> = section
                    .visible()
                    .iter()
                    .map(|item| match &item.badge {
                        Some(_) => format!("{} ✨", item.primary),
                        None => item.primary.clone(),
                    })
                    .collect();
                let _ = writeln!(out, "    {}", tags.join(", "));
            }
        }
        if !section.expanded && section.is_expandable() {
            let _ = writeln!(out, "    (+{} more)", section.hidden_count());
        }
    }

    out
}

fn field(out: &mut String, label: &str, field: Option<&FieldView>) {
    let Some(field) = field else {
        return;
    };
    let _ = write!(out, "  {}{}", label, field.value);
    if let Some(badge) = &field.badge {
        let _ = write!(out, "  ✨ {}", badge.reason);
    }
    out.push('\n');
}
