//! Turns the free-text answer of the description service into a
//! [`DescriptionRecord`].
//!
//! The answer is expected to carry three labeled sections (title, description
//! and keywords) but models are loose about the exact shape: labels come in
//! any casing, wrapped in markdown emphasis, numbered, as headings on their own
//! line, or inline after the previous section. A label counts when it starts a
//! word and is followed by a colon, or when it opens a line and is followed by
//! a dash or a line break. A bracketed hint such as `Title (max 10 words):`
//! may sit between the label and its separator. Labels opening a line take
//! precedence: a mid-line `label:` only starts a section when no line in the
//! answer starts with a label for that section. Each section runs until the
//! next recognized label or the end of the text.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::KEYWORD_SEPARATOR;
use crate::error::ParseError;
use crate::models::DescriptionRecord;

/// Label words recognized for each section, compared ASCII case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionLabels {
    pub title: Vec<String>,
    pub description: Vec<String>,
    pub keywords: Vec<String>,
}

impl Default for SectionLabels {
    fn default() -> Self {
        Self {
            title: vec!["title".into()],
            description: vec!["description".into(), "caption".into()],
            keywords: vec!["keywords".into(), "tags".into()],
        }
    }
}

impl SectionLabels {
    pub fn validate(&self) -> Result<(), String> {
        for (name, labels) in [
            ("title", &self.title),
            ("description", &self.description),
            ("keywords", &self.keywords),
        ] {
            if labels.iter().all(|label| label.trim().is_empty()) {
                return Err(format!("no label configured for the {name} section"));
            }
        }
        Ok(())
    }

    /// (section, label) pairs, longest label first so overlapping labels
    /// resolve to the most specific one.
    fn flattened(&self) -> Vec<(Section, String)> {
        let mut labels: Vec<(Section, String)> = [
            (Section::Title, &self.title),
            (Section::Description, &self.description),
            (Section::Keywords, &self.keywords),
        ]
        .into_iter()
        .flat_map(|(section, labels)| {
            labels
                .iter()
                .map(|label| label.trim())
                .filter(|label| !label.is_empty())
                .map(move |label| (section, label.to_string()))
        })
        .collect();
        labels.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        labels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Description,
    Keywords,
}

impl Section {
    fn name(&self) -> &'static str {
        match self {
            Section::Title => "title",
            Section::Description => "description",
            Section::Keywords => "keywords",
        }
    }
}

#[derive(Debug)]
struct LabelHit {
    section: Section,
    /// Where the previous section's text ends.
    region_start: usize,
    /// Where this section's text begins.
    content_start: usize,
    at_line_start: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    labels: SectionLabels,
}

impl ResponseParser {
    pub fn new(labels: SectionLabels) -> Self {
        Self { labels }
    }

    pub fn parse(&self, raw_text: &str) -> Result<DescriptionRecord, ParseError> {
        let hits = find_labels(raw_text, &self.labels.flattened());

        let mut title: Option<String> = None;
        let mut description: Option<String> = None;
        let mut keywords: Option<String> = None;

        for (index, hit) in hits.iter().enumerate() {
            let end = hits
                .get(index + 1)
                .map(|next| next.region_start)
                .unwrap_or(raw_text.len());
            let body = &raw_text[hit.content_start..end.max(hit.content_start)];

            let slot = match hit.section {
                Section::Title => &mut title,
                Section::Description => &mut description,
                Section::Keywords => &mut keywords,
            };
            // First non-empty occurrence of a section wins.
            if slot.as_deref().is_none_or(|text| clean_field(text).is_empty()) {
                *slot = Some(body.to_string());
            }
        }

        let title = required_field(Section::Title, title)?;
        let description = required_field(Section::Description, description)?;
        let keywords = keywords
            .map(|body| split_keywords(&body))
            .unwrap_or_default();

        Ok(DescriptionRecord {
            title,
            description,
            keywords,
        })
    }
}

/// Parses with the default label set.
pub fn parse_response(raw_text: &str) -> Result<DescriptionRecord, ParseError> {
    ResponseParser::default().parse(raw_text)
}

fn required_field(section: Section, body: Option<String>) -> Result<String, ParseError> {
    let body = body.ok_or(ParseError::MissingSection(section.name()))?;
    let cleaned = clean_field(&body);
    if cleaned.is_empty() {
        return Err(ParseError::EmptySection(section.name()));
    }
    Ok(cleaned)
}

fn find_labels(text: &str, labels: &[(Section, String)]) -> Vec<LabelHit> {
    let bytes = text.as_bytes();
    let mut hits = Vec::new();
    let mut position = 0;

    while position < text.len() {
        if !text.is_char_boundary(position) || !starts_word(text, position) {
            position += 1;
            continue;
        }

        let matched = labels.iter().find_map(|(section, label)| {
            let candidate = bytes.get(position..position + label.len())?;
            if !candidate.eq_ignore_ascii_case(label.as_bytes()) {
                return None;
            }
            accept_label(text, position, position + label.len()).map(
                |(region_start, content_start, at_line_start)| LabelHit {
                    section: *section,
                    region_start,
                    content_start,
                    at_line_start,
                },
            )
        });

        match matched {
            Some(hit) => {
                position = hit.content_start;
                hits.push(hit);
            }
            None => position += 1,
        }
    }

    // "price tags: red" inside a description is prose when a line starts with
    // a keywords label.
    let line_start_sections: Vec<Section> = hits
        .iter()
        .filter(|hit| hit.at_line_start)
        .map(|hit| hit.section)
        .collect();
    hits.retain(|hit| hit.at_line_start || !line_start_sections.contains(&hit.section));
    hits
}

fn starts_word(text: &str, position: usize) -> bool {
    text[..position]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric())
}

/// Decides whether a label match at `start..end` opens a section, returning
/// the region start, the content start and whether the label opens its line.
fn accept_label(text: &str, start: usize, end: usize) -> Option<(usize, usize, bool)> {
    let rest = &text[end..];
    if rest.chars().next().is_some_and(char::is_alphanumeric) {
        return None;
    }

    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let at_line_start = text[line_start..start].chars().all(is_line_prefix_char);
    let region_start = if at_line_start { line_start } else { start };

    let after_decoration = skip_hint(rest.trim_start_matches(is_inline_decoration));
    let separator_offset = end + (rest.len() - after_decoration.len());
    let mut chars = after_decoration.chars();

    let content_start = match chars.next() {
        Some(c @ (':' | '：')) => separator_offset + c.len_utf8(),
        Some(c @ ('-' | '–' | '—' | '=')) if at_line_start => separator_offset + c.len_utf8(),
        Some('\n') | Some('\r') | None if at_line_start => separator_offset,
        _ => return None,
    };

    let content = &text[content_start..];
    let trimmed = content.trim_start_matches([' ', '\t', '*', '_', '`']);
    Some((
        region_start,
        content_start + (content.len() - trimmed.len()),
        at_line_start,
    ))
}

/// Skips a `(...)` or `[...]` hint closed on the same line.
fn skip_hint(rest: &str) -> &str {
    let close = match rest.chars().next() {
        Some('(') => ')',
        Some('[') => ']',
        _ => return rest,
    };
    let line = rest.split('\n').next().unwrap_or(rest);
    match line.find(close) {
        Some(index) => rest[index + 1..].trim_start_matches(is_inline_decoration),
        None => rest,
    }
}

fn is_line_prefix_char(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_digit() || matches!(c, '#' | '*' | '_' | '-' | '>' | '.' | ')' | '•')
}

fn is_inline_decoration(c: char) -> bool {
    matches!(c, ' ' | '\t' | '*' | '_' | '`' | '"' | '\'')
}

fn is_field_decoration(c: char) -> bool {
    c.is_whitespace() || matches!(c, '*' | '_' | '`' | '#' | ',' | '{' | '}')
}

/// Collapses whitespace and strips markup and balanced quotes around a field.
fn clean_field(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(is_field_decoration);
    strip_balanced_quotes(trimmed).trim().to_string()
}

fn strip_balanced_quotes(value: &str) -> &str {
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if value.len() >= open.len_utf8() + close.len_utf8()
            && value.starts_with(open)
            && value.ends_with(close)
        {
            return &value[open.len_utf8()..value.len() - close.len_utf8()];
        }
    }
    value
}

/// Splits the keyword section on commas and line breaks, dropping empty
/// entries and case-insensitive duplicates while keeping first-seen order.
fn split_keywords(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    body.split([KEYWORD_SEPARATOR, '\n'])
        .map(clean_keyword)
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| seen.insert(keyword.to_lowercase()))
        .collect()
}

fn clean_keyword(raw: &str) -> String {
    let mut keyword = raw
        .trim()
        .trim_start_matches(['-', '*', '•', '#', '['])
        .trim();

    // "1." / "2)" list numbering
    let digits = keyword.len() - keyword.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 && matches!(keyword[digits..].chars().next(), Some('.' | ')')) {
        let rest = keyword[digits + 1..].trim_start();
        if !rest.is_empty() {
            keyword = rest;
        }
    }

    let keyword = keyword.trim_end_matches(['.', ';', ']', '*', '}']).trim();
    strip_balanced_quotes(keyword).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(record: &DescriptionRecord) -> Vec<&str> {
        record.keywords.iter().map(String::as_str).collect()
    }

    #[test]
    fn parses_plain_labeled_sections_and_drops_duplicates() {
        let record =
            parse_response("Title: Sunset\nDescription: A red sky.\nKeywords: sky, red, sunset, red")
                .unwrap();
        assert_eq!(record.title, "Sunset");
        assert_eq!(record.description, "A red sky.");
        assert_eq!(keywords(&record), vec!["sky", "red", "sunset"]);
    }

    #[test]
    fn tolerates_casing_spacing_and_markdown() {
        let raw = "**TITLE**:   Misty   Forest  \n\n\
                   **description :** Fog rolls\nthrough tall pines.\n\n\
                   **keywords:** fog,pine ,  Forest,forest , morning.";
        let record = parse_response(raw).unwrap();
        assert_eq!(record.title, "Misty Forest");
        assert_eq!(record.description, "Fog rolls through tall pines.");
        assert_eq!(keywords(&record), vec!["fog", "pine", "Forest", "morning"]);
    }

    #[test]
    fn accepts_numbered_lists_and_dash_separators() {
        let raw = "1. Title - Harbor at dawn\n2. Description - Boats rest in calm water.\n3. Keywords - boat, harbor";
        let record = parse_response(raw).unwrap();
        assert_eq!(record.title, "Harbor at dawn");
        assert_eq!(record.description, "Boats rest in calm water.");
        assert_eq!(keywords(&record), vec!["boat", "harbor"]);
    }

    #[test]
    fn accepts_heading_style_labels_and_bullet_keywords() {
        let raw = "## Title\nCity lights\n\n## Description\nA skyline at night.\n\n## Keywords\n- city\n- night\n- skyline\n- City";
        let record = parse_response(raw).unwrap();
        assert_eq!(record.title, "City lights");
        assert_eq!(record.description, "A skyline at night.");
        assert_eq!(keywords(&record), vec!["city", "night", "skyline"]);
    }

    #[test]
    fn accepts_inline_sections_and_quoted_values() {
        let raw = r#"Title: "Old Barn" Description: 'A weathered barn in a field.' Keywords: barn, rural"#;
        let record = parse_response(raw).unwrap();
        assert_eq!(record.title, "Old Barn");
        assert_eq!(record.description, "A weathered barn in a field.");
        assert_eq!(keywords(&record), vec!["barn", "rural"]);
    }

    #[test]
    fn label_inside_a_word_is_not_a_label() {
        let raw = "Title: Subtitles\nDescription: Entitled: a film still.\nKeywords: film";
        let record = parse_response(raw).unwrap();
        assert_eq!(record.title, "Subtitles");
        assert_eq!(record.description, "Entitled: a film still.");
    }

    #[test]
    fn label_words_inside_a_sentence_do_not_open_sections() {
        let record = parse_response(
            "Title: Market\nDescription: A stall with price tags: red and green.\nKeywords: market, fruit",
        )
        .unwrap();
        assert_eq!(record.title, "Market");
        assert_eq!(record.description, "A stall with price tags: red and green.");
        assert_eq!(keywords(&record), vec!["market", "fruit"]);

        let record = parse_response(
            "Title: Reading\nDescription: A worn book whose title: reads Dune lies open.\nKeywords: book",
        )
        .unwrap();
        assert_eq!(record.title, "Reading");
        assert_eq!(record.description, "A worn book whose title: reads Dune lies open.");
        assert_eq!(keywords(&record), vec!["book"]);
    }

    #[test]
    fn bracketed_hints_after_labels_are_skipped() {
        let raw = "Title (max 10 words): Sunset\nDescription [1-2 sentences]: A red sky.\nKeywords (comma separated): sky, red";
        let record = parse_response(raw).unwrap();
        assert_eq!(record.title, "Sunset");
        assert_eq!(record.description, "A red sky.");
        assert_eq!(keywords(&record), vec!["sky", "red"]);
    }

    #[test]
    fn keywords_section_is_optional() {
        let record = parse_response("Title: Lone tree\nDescription: A tree on a hill.").unwrap();
        assert!(record.keywords.is_empty());
    }

    #[test]
    fn missing_title_is_an_error() {
        assert_eq!(
            parse_response("Description: Something.\nKeywords: a, b"),
            Err(ParseError::MissingSection("title"))
        );
    }

    #[test]
    fn missing_description_is_an_error() {
        assert_eq!(
            parse_response("Title: Something\nKeywords: a, b"),
            Err(ParseError::MissingSection("description"))
        );
    }

    #[test]
    fn empty_title_is_an_error() {
        assert_eq!(
            parse_response("Title: **\nDescription: Something."),
            Err(ParseError::EmptySection("title"))
        );
    }

    #[test]
    fn unlabeled_text_is_rejected() {
        assert!(parse_response("I'm sorry, I can't help with that.").is_err());
    }

    #[test]
    fn caption_and_tags_are_default_aliases() {
        let record = parse_response("Title: Dune\nCaption: Sand waves.\nTags: desert; sand, dune").unwrap();
        assert_eq!(record.description, "Sand waves.");
        assert_eq!(keywords(&record), vec!["desert; sand", "dune"]);
    }

    #[test]
    fn custom_labels_replace_defaults() {
        let parser = ResponseParser::new(SectionLabels {
            title: vec!["Titel".into()],
            description: vec!["Beschreibung".into()],
            keywords: vec!["Schlagwörter".into()],
        });
        let record = parser
            .parse("TITEL: Berg\nbeschreibung: Ein hoher Berg.\nSchlagwörter: berg, alpen")
            .unwrap();
        assert_eq!(record.title, "Berg");
        assert_eq!(record.description, "Ein hoher Berg.");
        assert_eq!(keywords(&record), vec!["berg", "alpen"]);
        assert!(parser.parse("Title: x\nDescription: y").is_err());
    }

    #[test]
    fn first_non_empty_occurrence_wins() {
        let raw = "Title:\nTitle: Second try\nDescription: Text.\nDescription: Other.";
        let record = parse_response(raw).unwrap();
        assert_eq!(record.title, "Second try");
        assert_eq!(record.description, "Text.");
    }

    #[test]
    fn empty_label_sets_are_invalid() {
        let labels = SectionLabels {
            title: vec![" ".into()],
            ..SectionLabels::default()
        };
        assert!(labels.validate().is_err());
        assert!(SectionLabels::default().validate().is_ok());
    }
}
