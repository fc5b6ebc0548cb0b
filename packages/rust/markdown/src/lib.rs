//! HTML-to-Markdown conversion, cleanup passes and image reference rewriting.
//!
//! Converts sanitized content HTML to Markdown using the `htmd` crate with a
//! dedicated rule for fenced code blocks, then applies a series of cleanup
//! passes. [`rewrite`] later points image references at downloaded copies.

mod cleanup;
mod rewrite;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use mdharvest_shared::{HarvestError, Result};

pub use rewrite::rewrite;

static PRE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("pre").expect("valid selector"));
static CODE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("code").expect("valid selector"));
static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static TR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static TH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static TD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid selector"));

/// Markers standing in for lifted blocks while htmd runs. Letters and digits
/// only, so no Markdown escaping applies to them.
const CODE_BLOCK_MARKER: &str = "MDHARVESTCODEBLOCK";
const TABLE_MARKER: &str = "MDHARVESTTABLE";

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert sanitized content HTML to a Markdown body.
///
/// 1. Lifts every table out as a pipe table
/// 2. Lifts every `<pre>` holding a `<code>` out as a fenced block
/// 3. Converts HTML → Markdown via `htmd` (ATX headings)
/// 4. Runs the cleanup passes, resolving relative links against `page_url`
/// 5. Puts the lifted blocks back
#[instrument(skip(content_html), fields(url = page_url.map(Url::as_str).unwrap_or_default()))]
pub fn convert(content_html: &str, page_url: Option<&Url>) -> Result<String> {
    let (html, tables) = lift_tables(content_html);
    let (html, blocks) = extract_code_blocks(&html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    let raw_markdown = converter
        .convert(&html)
        .map_err(|e| HarvestError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(
        raw_len = raw_markdown.len(),
        code_blocks = blocks.len(),
        tables = tables.len(),
        "htmd conversion complete"
    );

    let mut markdown = cleanup::Cleanup::new(page_url).apply(&raw_markdown);
    for (i, table) in tables.iter().enumerate() {
        markdown = restore(&markdown, &marker(TABLE_MARKER, i), table);
    }
    for (i, block) in blocks.iter().enumerate() {
        markdown = restore(&markdown, &marker(CODE_BLOCK_MARKER, i), &block.fenced());
    }

    Ok(markdown)
}

// ---------------------------------------------------------------------------
// Fenced code blocks
// ---------------------------------------------------------------------------

/// A `<pre><code>` block lifted out of the HTML before conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeBlock {
    language: String,
    text: String,
}

impl CodeBlock {
    fn from_pre(pre: ElementRef<'_>) -> Option<Self> {
        let code = pre.select(&CODE_SEL).next()?;
        let language = code
            .value()
            .classes()
            .find_map(|class| class.strip_prefix("language-"))
            .unwrap_or_default()
            .to_string();

        Some(Self {
            language,
            text: code.text().collect(),
        })
    }

    /// The code text verbatim inside a backtick fence.
    fn fenced(&self) -> String {
        format!("```{}\n{}\n```", self.language, self.text)
    }
}

fn marker(kind: &str, i: usize) -> String {
    format!("{kind}{i}X")
}

/// Put `block` where `marker` is. Continuation lines get the marker's
/// column as indent, so a block inside a list item or quote stays there.
fn restore(markdown: &str, marker: &str, block: &str) -> String {
    let Some(at) = markdown.find(marker) else {
        return markdown.to_string();
    };

    let line_start = markdown[..at].rfind('\n').map_or(0, |i| i + 1);
    let indent: String = markdown[line_start..at]
        .chars()
        .map(|c| if matches!(c, ' ' | '\t' | '>') { c } else { ' ' })
        .collect();

    let mut lines = block.split('\n');
    let mut placed = lines.next().unwrap_or_default().to_string();
    for line in lines {
        placed.push('\n');
        if line.is_empty() {
            placed.push_str(indent.trim_end());
        } else {
            placed.push_str(&indent);
            placed.push_str(line);
        }
    }

    format!("{}{placed}{}", &markdown[..at], &markdown[at + marker.len()..])
}

/// Whether `el` sits inside another element named like itself.
fn is_nested(el: ElementRef<'_>) -> bool {
    let name = el.value().name();
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == name)
}

/// Replace each outermost `<pre>` containing `<code>` with a marker paragraph.
///
/// Returns the re-serialized HTML and the lifted blocks, indexed by marker.
fn extract_code_blocks(html: &str) -> (String, Vec<CodeBlock>) {
    let fragment = Html::parse_fragment(html);
    let mut result = fragment.root_element().inner_html();
    let mut blocks = Vec::new();

    for pre in fragment.select(&PRE_SEL).filter(|pre| !is_nested(*pre)) {
        let Some(block) = CodeBlock::from_pre(pre) else {
            continue;
        };

        let placeholder = format!("<p>{}</p>", marker(CODE_BLOCK_MARKER, blocks.len()));
        result = result.replacen(&pre.html(), &placeholder, 1);
        blocks.push(block);
    }

    (result, blocks)
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Replace each outermost `<table>` with a marker paragraph.
///
/// htmd 0.1 has no table rule and collapses the line breaks a pipe table
/// needs, so tables are rendered here and restored after conversion.
fn lift_tables(html: &str) -> (String, Vec<String>) {
    let fragment = Html::parse_fragment(html);
    let mut result = fragment.root_element().inner_html();
    let mut tables = Vec::new();

    for table in fragment.select(&TABLE_SEL).filter(|t| !is_nested(*t)) {
        let rendered = pipe_table(table);
        let placeholder = if rendered.is_empty() {
            String::new()
        } else {
            format!("<p>{}</p>", marker(TABLE_MARKER, tables.len()))
        };
        result = result.replacen(&table.html(), &placeholder, 1);
        if !rendered.is_empty() {
            tables.push(rendered);
        }
    }

    (result, tables)
}

/// Pipe table for `table`. The first row is the header whether or not it
/// uses `<th>`; rows are padded to the widest one.
fn pipe_table(table: ElementRef<'_>) -> String {
    let rows: Vec<Vec<String>> = table
        .select(&TR_SEL)
        .map(|tr| {
            let header: Vec<String> = tr.select(&TH_SEL).map(cell_text).collect();
            if header.is_empty() {
                tr.select(&TD_SEL).map(cell_text).collect()
            } else {
                header
            }
        })
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };

    let line = |cells: &[String]| {
        let padded = (0..width).map(|i| cells.get(i).map_or("", String::as_str));
        format!("| {} |", padded.collect::<Vec<_>>().join(" | "))
    };

    let mut lines = vec![line(header), format!("|{}", " --- |".repeat(width))];
    lines.extend(body.iter().map(|row| line(row)));
    lines.join("\n")
}

/// Cell text on one line, with pipes escaped. Code inside a cell becomes an
/// inline code span, since a fenced block cannot live in a pipe table.
fn cell_text(cell: ElementRef<'_>) -> String {
    let mut text = String::new();
    push_inline(cell, &mut text);
    collapse_whitespace(&text).replace('|', "\\|")
}

fn push_inline(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            match child_el.value().name() {
                "code" => out.push_str(&code_span(child_el)),
                "pre" => {
                    out.push(' ');
                    out.push_str(&code_span(child_el));
                    out.push(' ');
                }
                _ => push_inline(child_el, out),
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

fn code_span(el: ElementRef<'_>) -> String {
    let code = collapse_whitespace(&el.text().collect::<String>());
    if code.contains('`') {
        format!("`` {code} ``")
    } else {
        format!("`{code}`")
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://docs.example.com/main/guide/intro").unwrap()
    }

    #[test]
    fn convert_simple_html() {
        let md = convert("<h1>Hello World</h1><p>Some text.</p>", None).unwrap();
        assert!(md.contains("# Hello World"));
        assert!(md.contains("Some text."));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn code_block_keeps_language_tag() {
        let html = r#"<p>Run it:</p><pre><code class="hljs language-rust">fn main() {
    println!("hello");
}</code></pre>"#;

        let md = convert(html, None).unwrap();
        assert!(
            md.contains("```rust\nfn main() {\n    println!(\"hello\");\n}\n```"),
            "unexpected markdown: {md}"
        );
    }

    #[test]
    fn code_block_without_language_has_bare_fence() {
        let md = convert("<pre><code>plain text</code></pre>", None).unwrap();
        assert!(md.contains("```\nplain text\n```"), "unexpected markdown: {md}");
    }

    #[test]
    fn code_text_is_not_escaped_or_cleaned() {
        let html = "<pre><code class=\"language-md\">*not emphasis*   \n[link](/relative)\n\n\n\n\n&lt;div&gt;kept&lt;/div&gt;</code></pre>";
        let md = convert(html, Some(&page_url())).unwrap();

        assert!(md.contains("*not emphasis*   \n"));
        assert!(md.contains("[link](/relative)"));
        assert!(md.contains("\n\n\n\n\n<div>kept</div>"));
    }

    #[test]
    fn code_text_from_nested_spans_is_flattened() {
        let html = r#"<pre><code class="language-js"><span class="kw">const</span> x = <span>1</span>;</code></pre>"#;
        let md = convert(html, None).unwrap();
        assert!(md.contains("```js\nconst x = 1;\n```"), "unexpected markdown: {md}");
    }

    #[test]
    fn multiple_code_blocks_stay_in_order() {
        let html = r#"<pre><code class="language-sh">first</code></pre><p>between</p><pre><code class="language-py">second</code></pre>"#;
        let md = convert(html, None).unwrap();

        let first = md.find("```sh\nfirst\n```").expect("first block");
        let second = md.find("```py\nsecond\n```").expect("second block");
        assert!(first < second);
        assert!(!md.contains(CODE_BLOCK_MARKER));
    }

    #[test]
    fn pre_without_code_uses_default_conversion() {
        let md = convert("<pre>ascii art</pre>", None).unwrap();
        assert!(md.contains("ascii art"));
        assert!(!md.contains(CODE_BLOCK_MARKER));
    }

    #[test]
    fn convert_preserves_tables() {
        let html = r#"<h1>Data</h1>
            <table>
                <thead><tr><th>Name</th><th>Value</th></tr></thead>
                <tbody>
                    <tr><td>foo</td><td>bar</td></tr>
                    <tr><td>baz</td><td>qux</td></tr>
                </tbody>
            </table>"#;

        let md = convert(html, None).unwrap();
        assert!(
            md.contains("| Name | Value |\n| --- | --- |\n| foo | bar |\n| baz | qux |"),
            "unexpected markdown: {md}"
        );
        assert!(!md.contains(TABLE_MARKER));
    }

    #[test]
    fn table_without_th_uses_first_row_as_header() {
        let html = "<table><tr><td>a</td><td>b | c</td></tr><tr><td>1</td></tr></table>";
        let md = convert(html, None).unwrap();
        assert!(
            md.contains("| a | b \\| c |\n| --- | --- |\n| 1 |  |"),
            "unexpected markdown: {md}"
        );
    }

    #[test]
    fn empty_table_is_dropped() {
        let md = convert("<p>Before</p><table></table><p>After</p>", None).unwrap();
        assert_eq!(md, "Before\n\nAfter\n");
    }

    #[test]
    fn code_in_table_cell_becomes_inline_code() {
        let html = "<table><tr><th>Step</th><th>Command</th></tr>\
            <tr><td>Install</td><td><pre><code class=\"language-sh\">npm i\nnpm run build</code></pre></td></tr>\
            <tr><td>Filter</td><td>use <code>a|b</code> here</td></tr></table>";
        let md = convert(html, None).unwrap();

        assert!(md.contains("| Install | `npm i npm run build` |"), "unexpected markdown: {md}");
        assert!(md.contains("| Filter | use `a\\|b` here |"), "unexpected markdown: {md}");
        assert!(!md.contains("```"));
        assert!(!md.contains(CODE_BLOCK_MARKER));
    }

    #[test]
    fn code_block_in_bullet_item_is_indented_with_it() {
        let html = "<ul><li><p>Step one</p><pre><code class=\"language-sh\">npm i\nnpm run</code></pre></li><li>Step two</li></ul>";
        let md = convert(html, None).unwrap();

        assert_eq!(
            md,
            "*   Step one\n\n    ```sh\n    npm i\n    npm run\n    ```\n\n*   Step two\n"
        );
    }

    #[test]
    fn code_block_in_numbered_item_keeps_every_line_indented() {
        let html = "<ol><li><p>Install</p><pre><code class=\"language-bash\">npm i\n\nnpm run build</code></pre></li><li>Deploy</li></ol>";
        let md = convert(html, None).unwrap();

        let lines: Vec<&str> = md.lines().collect();
        let open = lines
            .iter()
            .position(|l| l.trim_start() == "```bash")
            .expect("opening fence");
        let indent = &lines[open][..lines[open].len() - "```bash".len()];
        assert!(!indent.is_empty(), "fence not indented: {md}");

        assert_eq!(lines[open + 1], format!("{indent}npm i"));
        assert_eq!(lines[open + 2], "");
        assert_eq!(lines[open + 3], format!("{indent}npm run build"));
        assert_eq!(lines[open + 4], format!("{indent}```"));
        assert!(lines[open + 5..].iter().any(|l| l.contains("Deploy") && !l.starts_with(' ')));
    }

    #[test]
    fn restore_indents_after_list_bullet() {
        let md = restore("*   MDHARVESTCODEBLOCK0X\n", "MDHARVESTCODEBLOCK0X", "```\na\n```");
        assert_eq!(md, "*   ```\n    a\n    ```\n");
    }

    #[test]
    fn restore_keeps_quote_prefix() {
        let md = restore("> MDHARVESTTABLE0X\n", "MDHARVESTTABLE0X", "| a |\n| --- |");
        assert_eq!(md, "> | a |\n> | --- |\n");
    }

    #[test]
    fn convert_handles_lists() {
        let html = r#"<ul><li>Item one</li><li>Item two</li></ul><ol><li>First</li><li>Second</li></ol>"#;
        let md = convert(html, None).unwrap();
        assert!(md.contains("Item one"));
        assert!(md.contains("First"));
    }

    #[test]
    fn convert_no_html_tags_in_output() {
        let html = r#"<h1>Clean Output</h1>
            <p>This should be <strong>clean</strong> markdown.</p>
            <div class="note"><p>A note.</p></div>"#;

        let md = convert(html, None).unwrap();
        assert!(!md.contains("<p>"), "output contains <p> tags");
        assert!(!md.contains("<h1>"), "output contains <h1> tags");
        assert!(!md.contains("<div"), "output contains <div> tags");
    }

    #[test]
    fn images_are_emitted_as_markdown_references() {
        let html = r#"<p><img src="https://cdn.example.com/a/pic.png?v=2" alt="diagram"></p>"#;
        let md = convert(html, Some(&page_url())).unwrap();
        assert!(md.contains("![diagram](https://cdn.example.com/a/pic.png?v=2)"));
    }

    #[test]
    fn relative_links_resolved_against_page() {
        let md = convert(r#"<p><a href="../setup">Setup</a></p>"#, Some(&page_url())).unwrap();
        assert!(md.contains("[Setup](https://docs.example.com/main/setup)"));
    }

    #[test]
    fn convert_empty_html() {
        let md = convert("", None).unwrap();
        assert_eq!(md.trim(), "");
    }

    #[test]
    fn nested_pre_is_lifted_once() {
        let (html, blocks) =
            extract_code_blocks("<pre><code class=\"language-a\">outer</code><pre><code>inner</code></pre></pre>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "a");
        assert_eq!(blocks[0].text, "outer");
        assert!(!html.contains("<pre>"));
        assert!(html.contains(&marker(CODE_BLOCK_MARKER, 0)));
    }
}
