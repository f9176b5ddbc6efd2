//! Export of generated artifacts as downloadable Markdown or plain text.
//!
//! Office formats (docx, pdf, xlsx, pptx) are not produced; only the text
//! formats that need no external converter.

use super::relay::MARKDOWN_CONTENT_TYPE;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" | "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Text => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => MARKDOWN_CONTENT_TYPE,
            Self::Text => TEXT_CONTENT_TYPE,
        }
    }

    /// Download name for an artifact stored as `name`, e.g.
    /// `summary_a.pdf.md` becomes `summary_a.pdf.txt`.
    pub fn file_name(&self, name: &str) -> String {
        let stem = name.strip_suffix(".md").unwrap_or(name);
        format!("{}.{}", stem, self.extension())
    }

    pub fn render(&self, markdown: &str) -> String {
        match self {
            Self::Markdown => markdown.to_string(),
            Self::Text => clean_markdown(markdown),
        }
    }
}

/// Strip basic Markdown: links keep their label, emphasis and code marks go,
/// and heading markers are removed from the start of lines.
pub fn clean_markdown(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let line = strip_links(line).replace("**", "").replace(['*', '`'], "");
            strip_heading(&line).to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_heading(line: &str) -> &str {
    let rest = line.trim_start_matches('#');
    if rest.len() < line.len() && rest.starts_with(char::is_whitespace) {
        rest.trim_start()
    } else {
        line
    }
}

/// `[label](target)` becomes `label`; anything else is left alone.
fn strip_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let link = after.find(']').filter(|&close| close > 0).and_then(|close| {
            let target = after[close + 1..].strip_prefix('(')?;
            let len = target.find(')').filter(|&len| len > 0)?;
            Some((close, close + 2 + len + 1))
        });
        match link {
            Some((close, consumed)) => {
                out.push_str(&after[..close]);
                rest = &after[consumed..];
            }
            None => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_export_strips_markdown() {
        let md = "# Title\n## Key **Points**\n- see [the docs](https://x.test/a) now\n`code` and *stress*\n#hashtag stays";
        assert_eq!(
            clean_markdown(md),
            "Title\nKey Points\n- see the docs now\ncode and stress\n#hashtag stays"
        );
    }

    #[test]
    fn broken_links_are_left_alone() {
        assert_eq!(clean_markdown("[a] (b) [](c) [d]()"), "[a] (b) [](c) [d]()");
    }

    #[test]
    fn formats_parse_and_rename() {
        assert_eq!(ExportFormat::parse("MD"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("txt"), Some(ExportFormat::Text));
        assert_eq!(ExportFormat::parse("docx"), None);
        assert_eq!(ExportFormat::Text.file_name("quiz_ch1.pdf.md"), "quiz_ch1.pdf.txt");
        assert_eq!(ExportFormat::Markdown.file_name("notes"), "notes.md");
    }
}
