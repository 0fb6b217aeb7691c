//! Typst markup builders for the `versatile-apa` template.
//!
//! # Responsibility
//! - Turn a `DocumentSnapshot` into the entry document and per-section files.
//! - Escape user text for markup and string-literal positions.
//!
//! # Invariants
//! - Builders are pure: same snapshot and config, same output.
//! - Affiliations are referenced as `AF-<n>` where `n` is the 1-based
//!   position in the affiliation list, not the stored id.

use crate::config::SessionConfig;
use crate::model::section::{is_valid_image_label, is_valid_section_id, ContentBlock};
use crate::model::snapshot::{DocumentSnapshot, SectionRecord};
use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP_SPECIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\\[\]#$]").expect("valid markup escape regex"));
static STRING_SPECIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\"]"#).expect("valid string escape regex"));
static KEYWORD_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*,\s*").expect("valid keyword separator regex"));

/// Generated content of one top-level section file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFile {
    /// Id of the level-1 section; also the file stem.
    pub id: String,
    pub content: String,
}

/// Escapes text placed inside `[...]` content.
pub fn escape_markup(text: &str) -> String {
    MARKUP_SPECIAL_RE.replace_all(text, r"\$0").into_owned()
}

/// Escapes text placed inside a `"..."` string literal.
pub fn escape_string(text: &str) -> String {
    STRING_SPECIAL_RE.replace_all(text, r"\$0").into_owned()
}

/// Splits comma-separated keywords, dropping blanks.
pub fn split_keywords(keywords: &str) -> Vec<&str> {
    KEYWORD_SEPARATOR_RE
        .split(keywords.trim())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// Renders keywords as a Typst array, e.g. `("a", "b")`.
pub fn keyword_array(keywords: &str) -> String {
    let items: Vec<String> = split_keywords(keywords)
        .into_iter()
        .map(|keyword| format!("\"{}\"", escape_string(keyword)))
        .collect();
    format!("({})", items.join(", "))
}

fn import_line(config: &SessionConfig) -> String {
    format!("#import \"{}\": *", escape_string(&config.template_package))
}

/// Builds the entry document.
pub fn render_main(snapshot: &DocumentSnapshot, config: &SessionConfig) -> String {
    let mut lines = vec![import_line(config), String::new()];

    lines.push("// Document titles should be formatted in title case".to_string());
    lines.push(format!("#let doc-title = [{}]", escape_markup(&snapshot.title)));
    lines.push(String::new());

    lines.push("#show: versatile-apa.with(".to_string());
    lines.push("  title: doc-title,".to_string());
    lines.push(String::new());

    if !snapshot.authors.is_empty() && !snapshot.affiliations.is_empty() {
        push_authors(&mut lines, snapshot);
    }

    if !snapshot.course.is_empty() || !snapshot.instructor.is_empty() || !snapshot.due_date.is_empty()
    {
        lines.push("  // Student-specific fields".to_string());
        if !snapshot.course.is_empty() {
            lines.push(format!("  course: [{}],", escape_markup(&snapshot.course)));
        }
        if !snapshot.instructor.is_empty() {
            lines.push(format!("  instructor: [{}],", escape_markup(&snapshot.instructor)));
        }
        if snapshot.due_date.is_empty() {
            lines.push("  due-date: datetime.today().display(),".to_string());
        } else {
            lines.push(format!("  due-date: [{}],", escape_markup(&snapshot.due_date)));
        }
        lines.push(String::new());
    }

    if !snapshot.running_head.is_empty() || !snapshot.author_notes.is_empty() {
        lines.push("  // Professional-specific fields".to_string());
        if !snapshot.running_head.is_empty() {
            lines.push(format!(
                "  running-head: [{}],",
                escape_markup(&snapshot.running_head)
            ));
        }
        if !snapshot.author_notes.is_empty() {
            push_author_notes(&mut lines, snapshot);
        }
        lines.push(String::new());
    }

    if !snapshot.abstract_text.is_empty() || !snapshot.keywords.is_empty() {
        if !snapshot.abstract_text.is_empty() {
            lines.push(format!("  abstract: [{}],", escape_markup(&snapshot.abstract_text)));
        }
        if !snapshot.keywords.is_empty() {
            lines.push(format!("  keywords: {},", keyword_array(&snapshot.keywords)));
        }
        lines.push(String::new());
    }

    lines.push("  // Common fields".to_string());
    lines.push(format!("  font-family: \"{}\",", escape_string(&snapshot.font_family)));
    lines.push(format!("  font-size: {}pt,", snapshot.font_size));
    lines.push(format!("  region: \"{}\",", escape_string(&snapshot.region)));
    lines.push(format!("  language: \"{}\",", escape_string(&snapshot.language)));
    lines.push(format!("  paper-size: \"{}\",", escape_string(&snapshot.paper_size)));
    // The introduction is emitted as a regular section include instead.
    lines.push("  implicit-introduction-heading: false,".to_string());
    lines.push(format!(
        "  abstract-as-description: {},",
        snapshot.abstract_as_desc
    ));
    lines.push(")".to_string());
    lines.push(String::new());

    lines.push("// Document outlines".to_string());
    lines.push("#outline()".to_string());
    lines.push("#pagebreak()".to_string());
    for (kind, title) in [
        ("table", "Tables"),
        ("image", "Figures"),
        ("math.equation", "Equations"),
        ("raw", "Listings"),
    ] {
        lines.push(format!(
            "#outline(target: figure.where(kind: {kind}), title: [{title}])"
        ));
        lines.push("#pagebreak()".to_string());
    }
    lines.push(String::new());

    lines.push("// Main document content".to_string());
    for section in snapshot.sections.iter().filter(|s| s.level <= 1) {
        if is_valid_section_id(&section.id) {
            lines.push(format!(
                "#include \"{}/{}.typ\"",
                escape_string(&config.sections_dir),
                escape_string(&section.id)
            ));
        }
    }
    lines.push(String::new());

    lines.push("#pagebreak()".to_string());
    lines.push("#bibliography(".to_string());
    lines.push(format!("  \"{}\",", escape_string(&config.bibliography_file)));
    lines.push(format!("  style: \"{}\",", escape_string(&config.csl_file)));
    lines.push("  full: true,".to_string());
    lines.push("  title: auto,".to_string());
    lines.push(")".to_string());

    lines.join("\n")
}

fn push_authors(lines: &mut Vec<String>, snapshot: &DocumentSnapshot) {
    lines.push("  // Authors and affiliations".to_string());
    lines.push("  authors: (".to_string());
    for author in &snapshot.authors {
        // The template requires at least one affiliation per author.
        if author.name.trim().is_empty() || author.affiliation_ids.is_empty() {
            continue;
        }
        lines.push("    (".to_string());
        lines.push(format!("      name: [{}],", escape_markup(&author.name)));
        let references: Vec<String> = author
            .affiliation_ids
            .iter()
            .filter_map(|id| snapshot.affiliations.iter().position(|a| a.id == *id))
            .map(|position| format!("\"AF-{}\"", position + 1))
            .collect();
        if !references.is_empty() {
            lines.push(format!("      affiliations: ({}),", references.join(", ")));
        }
        lines.push("    ),".to_string());
    }
    lines.push("  ),".to_string());

    lines.push("  affiliations: (".to_string());
    for (position, affiliation) in snapshot.affiliations.iter().enumerate() {
        if !affiliation.is_named() {
            continue;
        }
        lines.push("    (".to_string());
        lines.push(format!("      id: \"AF-{}\",", position + 1));
        lines.push(format!("      name: [{}],", escape_markup(&affiliation.name)));
        lines.push("    ),".to_string());
    }
    lines.push("  ),".to_string());
    lines.push(String::new());
}

fn push_author_notes(lines: &mut Vec<String>, snapshot: &DocumentSnapshot) {
    lines.push("  author-notes: [".to_string());
    for author in &snapshot.authors {
        if author.name.is_empty() || author.orcid.is_empty() {
            continue;
        }
        lines.push(format!(
            "    #include-orcid([{}], \"{}\")",
            escape_markup(&author.name),
            escape_string(&author.orcid)
        ));
        lines.push(String::new());
    }
    lines.push(format!("    {}", escape_markup(&snapshot.author_notes)));
    lines.push("  ],".to_string());
}

/// Builds one file per level-1 section, appending its subsections.
///
/// Subsections that precede the first level-1 section have no file to
/// land in and are skipped.
pub fn render_section_files(snapshot: &DocumentSnapshot, config: &SessionConfig) -> Vec<SectionFile> {
    // A level-1 section without a usable file stem takes its subsections
    // down with it.
    let mut files: Vec<(Option<String>, Vec<String>)> = Vec::new();
    for section in &snapshot.sections {
        let rendered = render_section(section);
        if section.level <= 1 {
            let stem = is_valid_section_id(&section.id).then(|| section.id.clone());
            files.push((stem, vec![rendered]));
        } else if let Some((_, parts)) = files.last_mut() {
            parts.push(rendered);
        }
    }

    let import = import_line(config);
    files
        .into_iter()
        .filter_map(|(id, parts)| id.map(|id| (id, parts)))
        .map(|(id, parts)| SectionFile {
            id,
            content: format!("{import}\n\n{}", parts.join("\n\n")),
        })
        .collect()
}

fn render_section(section: &SectionRecord) -> String {
    let body = match &section.blocks {
        Some(blocks) if !blocks.is_empty() => blocks
            .iter()
            .map(render_block)
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => section.content.clone().unwrap_or_default(),
    };
    let depth = section.level.clamp(1, 5) as usize;
    format!("{} {}\n\n{body}", "=".repeat(depth), escape_markup(&section.title))
}

fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { content } => content.clone(),
        ContentBlock::Image(image) => {
            let path = image.path.replace('\\', "/");
            let mut figure = String::from("#figure(\n");
            figure.push_str(&format!("  image(\"../{}\"),\n", escape_string(&path)));
            if !image.caption.is_empty() {
                figure.push_str(&format!("  caption: [{}],\n", escape_markup(&image.caption)));
            }
            figure.push(')');
            if is_valid_image_label(&image.label) {
                figure.push_str(&format!(" <{}>", image.label));
            }
            if !image.note.is_empty() {
                figure.push_str("\n#pad(top: 0.5em)[\n");
                figure.push_str(&format!(
                    "  #text(style: \"italic\")[Note.] {}\n",
                    escape_markup(&image.note)
                ));
                figure.push(']');
            }
            figure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        escape_markup, escape_string, keyword_array, render_main, render_section_files,
    };
    use crate::config::SessionConfig;
    use crate::model::people::{Affiliation, Author};
    use crate::model::section::{ContentBlock, ImageBlock};
    use crate::model::snapshot::{DocumentSnapshot, SectionRecord};

    fn record(id: &str, title: &str, level: i64, blocks: Vec<ContentBlock>) -> SectionRecord {
        SectionRecord {
            id: id.to_string(),
            title: title.to_string(),
            level,
            blocks: Some(blocks),
            ..SectionRecord::default()
        }
    }

    #[test]
    fn markup_escaping_covers_special_characters() {
        assert_eq!(escape_markup(r"a\b [c] #d $e"), r"a\\b \[c\] \#d \$e");
        assert_eq!(escape_string(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }

    #[test]
    fn keywords_are_split_trimmed_and_quoted() {
        assert_eq!(keyword_array(" memory,  attention ,, sleep "), r#"("memory", "attention", "sleep")"#);
        assert_eq!(keyword_array(" , "), "()");
    }

    #[test]
    fn authors_reference_affiliations_by_position() {
        let snapshot = DocumentSnapshot {
            title: "Sleep & Memory".to_string(),
            affiliations: vec![
                Affiliation {
                    id: 7,
                    name: String::new(),
                },
                Affiliation {
                    id: 3,
                    name: "Dept. of Psychology".to_string(),
                },
            ],
            authors: vec![
                Author {
                    id: 1,
                    name: "Ada".to_string(),
                    orcid: "0000-0001".to_string(),
                    affiliation_ids: vec![3],
                },
                Author {
                    id: 2,
                    name: "Unaffiliated".to_string(),
                    ..Author::default()
                },
            ],
            author_notes: "Thanks.".to_string(),
            ..DocumentSnapshot::default()
        };

        let main = render_main(&snapshot, &SessionConfig::default());
        assert!(main.starts_with("#import \"@preview/versatile-apa:7.1.5\": *\n"));
        assert!(main.contains("      affiliations: (\"AF-2\"),"));
        assert!(main.contains("      id: \"AF-2\","));
        assert!(!main.contains("\"AF-1\""));
        assert!(!main.contains("Unaffiliated"));
        assert!(main.contains("#include-orcid([Ada], \"0000-0001\")"));
        assert!(main.contains("#bibliography(\n  \"bibliography/ref.bib\","));
    }

    #[test]
    fn student_fields_default_due_date_to_today() {
        let snapshot = DocumentSnapshot {
            course: "PSY 101".to_string(),
            ..DocumentSnapshot::default()
        };
        let main = render_main(&snapshot, &SessionConfig::default());
        assert!(main.contains("  course: [PSY 101],"));
        assert!(main.contains("  due-date: datetime.today().display(),"));
    }

    #[test]
    fn subsections_are_appended_to_their_top_level_file() {
        let snapshot = DocumentSnapshot {
            sections: vec![
                record("orphan", "Orphan", 2, vec![ContentBlock::text("lost")]),
                record("a", "Method", 1, vec![ContentBlock::text("Participants.")]),
                record(
                    "b",
                    "Design",
                    2,
                    vec![ContentBlock::Image(ImageBlock {
                        path: "images\\fig.png".to_string(),
                        caption: "Setup".to_string(),
                        note: "Schematic.".to_string(),
                        label: "img:1".to_string(),
                    })],
                ),
                SectionRecord {
                    id: "c".to_string(),
                    title: "Results".to_string(),
                    content: Some("Legacy body".to_string()),
                    ..SectionRecord::default()
                },
            ],
            ..DocumentSnapshot::default()
        };

        let config = SessionConfig::default();
        let files = render_section_files(&snapshot, &config);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].id, "a");
        assert!(files[0].content.contains("= Method\n\nParticipants."));
        assert!(files[0].content.contains("== Design\n\n#figure(\n  image(\"../images/fig.png\"),"));
        assert!(files[0].content.contains(") <img:1>\n#pad(top: 0.5em)["));
        assert!(!files[0].content.contains("lost"));
        assert_eq!(
            files[1].content,
            "#import \"@preview/versatile-apa:7.1.5\": *\n\n= Results\n\nLegacy body"
        );

        let main = render_main(&snapshot, &config);
        assert!(main.contains("#include \"sections/a.typ\"\n#include \"sections/c.typ\""));
    }

    #[test]
    fn unusable_section_ids_and_labels_are_not_written() {
        let snapshot = DocumentSnapshot {
            sections: vec![
                record("", "Blank", 1, vec![ContentBlock::text("blank body")]),
                record("child", "Under blank", 2, vec![ContentBlock::text("child body")]),
                record("../../escaped", "Escape", 1, vec![ContentBlock::text("x")]),
                record(
                    "ok",
                    "Kept",
                    1,
                    vec![ContentBlock::Image(ImageBlock {
                        path: "images/a.png".to_string(),
                        label: "x> #evil".to_string(),
                        ..ImageBlock::default()
                    })],
                ),
            ],
            ..DocumentSnapshot::default()
        };

        let config = SessionConfig::default();
        let files = render_section_files(&snapshot, &config);
        let ids: Vec<&str> = files.iter().map(|file| file.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
        assert!(files[0].content.contains("  image(\"../images/a.png\"),\n)"));
        assert!(!files[0].content.contains("#evil"));

        let main = render_main(&snapshot, &config);
        assert!(main.contains("#include \"sections/ok.typ\""));
        assert!(!main.contains("escaped"));
        assert!(!main.contains("sections/.typ"));
    }
}
