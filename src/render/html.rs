//! HTML fragments for [`ProfileView`]s.
//!
//! This is the only module that emits markup, and every value taken from a
//! profile or a match passes through [`escape`]. Interactive elements carry
//! `data-action` / `data-id` / `data-section` attributes for the page to bind
//! listeners to; no inline handlers are generated.

use std::fmt::Write;

use super::{BadgeDisplay, FieldView, ItemView, MatchBadge, ProfileView, SectionLayout, SectionView};

/// Escape text for use in element content and quoted attribute values.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render one attendee card.
pub fn render_card(view: &ProfileView) -> String {
    let mut html = String::new();
    let id = view.id.as_ref().map(|i| escape(i.as_str())).unwrap_or_default();
    let class = if view.score.is_some() {
        "attendee-card ai-match-card"
    } else {
        "attendee-card"
    };

    let _ = write!(html, r#"<article class="{}" data-id="{}">"#, class, id);
    let _ = write!(
        html,
        r#"<button class="delete-btn" data-action="delete" data-id="{}" title="Delete profile">×</button>"#,
        id
    );

    if let Some(score) = &view.score {
        let _ = write!(
            html,
            concat!(
                r#"<div class="match-score {}">"#,
                r#"<svg class="score-circle" width="80" height="80" viewBox="0 0 80 80">"#,
                r#"<circle class="score-circle-bg" cx="40" cy="40" r="34"></circle>"#,
                r#"<circle class="score-circle-progress" cx="40" cy="40" r="34" stroke-dasharray="{:.2}" stroke-dashoffset="{:.2}"></circle>"#,
                r#"</svg><div class="score-number">{}</div><div class="score-label">Match Score</div></div>"#
            ),
            score.bucket.css_class(),
            score.ring_circumference,
            score.ring_dash_offset,
            score.score.round() as i64
        );
    }

    if let Some(rel) = &view.relevance {
        html.push_str(r#"<div class="match-relevance">"#);
        if let Some(descriptor) = &rel.descriptor {
            let _ = write!(html, "<strong>{}</strong> ", escape(descriptor));
        }
        html.push_str(&escape(&rel.text));
        html.push_str("</div>");
    }

    html.push_str(r#"<div class="attendee-header">"#);
    if let Some(image) = &view.image {
        let _ = write!(
            html,
            r#"<img src="{}" alt="{}" class="attendee-image">"#,
            escape(image),
            escape(&view.name)
        );
    }
    html.push_str(r#"<div class="attendee-info">"#);
    let _ = write!(html, r#"<div class="attendee-name">{}</div>"#, escape(&view.name));
    field(&mut html, "attendee-headline", view.headline.as_ref());
    field(&mut html, "attendee-location", view.location.as_ref());
    field(&mut html, "attendee-school", view.school.as_ref());
    html.push_str("</div></div>");

    field(&mut html, "attendee-about", view.about.as_ref());

    for section in &view.sections {
        render_section(&mut html, &id, section);
    }

    if let Some(url) = &view.url {
        let _ = write!(
            html,
            r#"<a href="{}" target="_blank" rel="noopener" class="profile-link">View Profile →</a>"#,
            escape(url)
        );
    }

    html.push_str("</article>");
    html
}

/// Render a list of cards inside a container.
pub fn render_cards(views: &[ProfileView]) -> String {
    let mut html = String::from(r#"<div class="attendees-list">"#);
    for view in views {
        html.push_str(&render_card(view));
    }
    html.push_str("</div>");
    html
}

fn field(html: &mut String, class: &str, field: Option<&FieldView>) {
    let Some(field) = field else {
        return;
    };
    let _ = write!(html, r#"<div class="{}">{}"#, class, escape(&field.value));
    if let Some(badge) = &field.badge {
        render_badge(html, badge);
    }
    html.push_str("</div>");
}

fn render_section(html: &mut String, id: &str, section: &SectionView) {
    let key = section.section.as_str();
    let _ = write!(
        html,
        r#"<section class="attendee-section" data-section="{}"><h4>{}</h4>"#,
        key, section.title
    );

    match section.layout {
        SectionLayout::List => {
            for item in section.visible() {
                render_item(html, item);
            }
        }
        SectionLayout::Tags => {
            html.push_str(r#"<div class="tag-list">"#);
            for item in section.visible() {
                let _ = write!(html, r#"<span class="tag">{}"#, escape(&item.primary));
                if let Some(badge) = &item.badge {
                    render_badge(html, badge);
                }
                html.push_str("</span>");
            }
            html.push_str("</div>");
        }
    }

    if section.is_expandable() {
        let label = if section.expanded {
            "Show less".to_string()
        } else {
            format!("Show {} more", section.hidden_count())
        };
        let _ = write!(
            html,
            r#"<button class="expand-btn" data-action="toggle" data-id="{}" data-section="{}" aria-expanded="{}">{}</button>"#,
            id, key, section.expanded, label
        );
    }

    html.push_str("</section>");
}

fn render_item(html: &mut String, item: &ItemView) {
    let _ = write!(
        html,
        r#"<div class="section-item" data-index="{}"><div class="item-title">{}"#,
        item.index,
        escape(&item.primary)
    );
    if let Some(badge) = &item.badge {
        render_badge(html, badge);
    }
    html.push_str("</div>");
    if let Some(secondary) = &item.secondary {
        let _ = write!(html, r#"<div class="item-subtitle">{}</div>"#, escape(secondary));
    }
    if let Some(duration) = &item.duration {
        let _ = write!(html, r#"<div class="item-duration">{}</div>"#, escape(duration));
    }
    if let Some(description) = &item.description {
        let _ = write!(
            html,
            r#"<div class="item-description">{}</div>"#,
            escape(description)
        );
    }
    html.push_str("</div>");
}

fn render_badge(html: &mut String, badge: &MatchBadge) {
    match badge.display {
        BadgeDisplay::Popup => {
            let _ = write!(
                html,
                r#"<span class="match-badge-with-popup"><span class="inline-match-badge">✨ Match</span><span class="match-popup">{}</span></span>"#,
                escape(&badge.reason)
            );
        }
        BadgeDisplay::Tooltip => {
            let _ = write!(
                html,
                r#"<span class="inline-match-badge" title="{}">✨ Match</span>"#,
                escape(&badge.reason)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendeeProfile, Experience, Highlight, ProfileId, SearchMatch};
    use crate::render::{project, Expansion, RenderSettings};

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_profile_text_is_escaped() {
        let profile = AttendeeProfile {
            id: Some(ProfileId::from("p\"1")),
            name: Some("<img src=x onerror=alert(1)>".into()),
            headline: Some("R&D".into()),
            url: Some("https://example.com/?a=1&b=\"2\"".into()),
            experience: vec![Experience {
                title: Some("<b>Boss</b>".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let html = render_card(&project(&profile, None, &Expansion::new(), &RenderSettings::default()));

        assert!(!html.contains("<img src=x"));
        assert!(!html.contains("<b>Boss</b>"));
        assert!(html.contains("&lt;b&gt;Boss&lt;/b&gt;"));
        assert!(html.contains("R&amp;D"));
        assert!(html.contains(r#"data-id="p&quot;1""#));
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn test_match_card_has_score_and_badge() {
        let profile = AttendeeProfile {
            id: Some(ProfileId::from("p1")),
            name: Some("Max".into()),
            experience: vec![Experience {
                title: Some("Tech Lead".into()),
                company: Some("Palantir Technologies".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let m = SearchMatch {
            id: ProfileId::from("p1"),
            score: 98.0,
            relevance: "Perfect match: at Palantir".into(),
            highlights: vec![Highlight {
                section: "experience".into(),
                index: Some(0),
                field: Some("company".into()),
                reason: "Works at <Palantir>".into(),
                weight: Some("high".into()),
            }],
        };
        let html = render_card(&project(&profile, Some(&m), &Expansion::new(), &RenderSettings::default()));

        assert!(html.contains("ai-match-card"));
        assert!(html.contains("score-high"));
        assert!(html.contains(r#"<div class="score-number">98</div>"#));
        assert!(html.contains("<strong>Perfect match:</strong> at Palantir"));
        assert!(html.contains(r#"title="Works at &lt;Palantir&gt;""#));
    }

    #[test]
    fn test_expand_button_label() {
        let profile = AttendeeProfile {
            id: Some(ProfileId::from("p1")),
            experience: (0..5)
                .map(|i| Experience {
                    title: Some(format!("Job {}", i)),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let mut expansion = Expansion::new();
        let settings = RenderSettings::default();

        let collapsed = render_card(&project(&profile, None, &expansion, &settings));
        assert!(collapsed.contains("Show 2 more"));
        assert!(!collapsed.contains("Job 4"));

        expansion.toggle(&ProfileId::from("p1"), crate::models::Section::Experience);
        let expanded = render_card(&project(&profile, None, &expansion, &settings));
        assert!(expanded.contains("Show less"));
        assert!(expanded.contains("Job 4"));
    }
}
