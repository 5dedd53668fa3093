//! Content formatting for log messages
//!
//! Messages are escaped first and then annotated with highlight spans of the
//! form `<span class="log-highlight-*">…</span>`. The annotated text is valid
//! markup for HTML renderers, and [`fragments`] turns it back into styled text
//! runs for everything else (the TUI).
//!
//! Every pass works on a small node tree rather than on the raw string, so a
//! pass only ever sees text, never tag markup or text already claimed by an
//! earlier highlight.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use dockscope_types::{EntryKind, LogEntry};

// ASCII word boundaries and digits: accented letters count as separators
static SEVERITY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)\b(error|failed|exception|warning|warn|critical)\b").expect("valid regex")
});

static SUCCESS_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)\b(success|completed|started|listening on|ready)\b").expect("valid regex")
});

static IPV4_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(:\d+)?\b").expect("valid regex")
});

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}([.,]\d{3})?(Z|[+-]\d{2}:?\d{2})?\b")
        .expect("valid regex")
});

const SPAN_OPEN: &str = "<span class=\"";
const SPAN_CLOSE: &str = "</span>";

/// Kind of annotation applied to a run of text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Highlight {
    Error,
    Success,
    Address,
    Timestamp,
    Search,
    /// Inline kind label such as `SYSTEM:`
    Label(EntryKind),
}

impl Highlight {
    /// CSS class used in annotated markup
    pub fn class(&self) -> &'static str {
        match self {
            Self::Error => "log-highlight-error",
            Self::Success => "log-highlight-success",
            Self::Address => "log-highlight-ip",
            Self::Timestamp => "log-highlight-timestamp",
            Self::Search => "log-highlight-search",
            Self::Label(kind) => match kind {
                EntryKind::System => "log-system",
                EntryKind::Error => "log-error",
                EntryKind::LogsStarted => "log-success",
                EntryKind::LogsStopped => "log-info",
                EntryKind::LogError => "log-stderr",
                EntryKind::LogLine => "log-line",
            },
        }
    }

    fn from_class(class: &str) -> Option<Self> {
        let highlight = match class {
            "log-highlight-error" => Self::Error,
            "log-highlight-success" => Self::Success,
            "log-highlight-ip" => Self::Address,
            "log-highlight-timestamp" => Self::Timestamp,
            "log-highlight-search" => Self::Search,
            "log-system" => Self::Label(EntryKind::System),
            "log-error" => Self::Label(EntryKind::Error),
            "log-success" => Self::Label(EntryKind::LogsStarted),
            "log-info" => Self::Label(EntryKind::LogsStopped),
            "log-stderr" => Self::Label(EntryKind::LogError),
            "log-line" => Self::Label(EntryKind::LogLine),
            _ => return None,
        };
        Some(highlight)
    }
}

/// A run of plain (unescaped) text and the highlights enclosing it, outermost first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub highlights: Vec<Highlight>,
}

impl Fragment {
    /// Innermost highlight, which wins when styling
    pub fn innermost(&self) -> Option<Highlight> {
        self.highlights.last().copied()
    }
}

#[derive(Clone, Debug)]
enum Node {
    /// Decoded text
    Text(String),
    Span(Highlight, Vec<Node>),
}

/// Escape characters that would be interpreted as markup
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape an optional message; a missing message becomes the empty string
pub fn escape_opt(text: Option<&str>) -> String {
    text.map(escape).unwrap_or_default()
}

/// Apply severity, success, address and timestamp highlighting, in that order
pub fn highlight(escaped: &str) -> String {
    if escaped.is_empty() {
        return String::new();
    }

    let mut nodes = parse(escaped);
    for (pattern, highlight) in [
        (&*SEVERITY_WORDS, Highlight::Error),
        (&*SUCCESS_WORDS, Highlight::Success),
        (&*IPV4_ADDRESS, Highlight::Address),
        (&*ISO_TIMESTAMP, Highlight::Timestamp),
    ] {
        nodes = wrap_matches(nodes, pattern, highlight, false);
    }
    render(&nodes)
}

/// Wrap every case-insensitive literal occurrence of `term` in a search highlight
///
/// Matches are found in every text run, including runs already inside a
/// highlight, so search spans nest inside content spans.
pub fn highlight_search_term(text: &str, term: &str) -> String {
    if text.is_empty() || term.is_empty() {
        return text.to_string();
    }

    let pattern = match RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::warn!(error = %e, "search term could not be compiled");
            return text.to_string();
        }
    };

    render(&wrap_matches(parse(text), &pattern, Highlight::Search, true))
}

/// Annotated markup for one entry: kind label plus escaped, highlighted message
pub fn render_entry(entry: &LogEntry, search: Option<&str>) -> String {
    let mut message = escape(&entry.message);
    if entry.kind.is_output() {
        message = highlight(&message);
    }
    if let Some(term) = search.filter(|t| !t.is_empty()) {
        message = highlight_search_term(&message, term);
    }

    match entry.kind.label() {
        Some(label) => format!(
            "{SPAN_OPEN}{}\">{label}{SPAN_CLOSE} {message}",
            Highlight::Label(entry.kind).class()
        ),
        None => message,
    }
}

/// Plain text rendering: `[HH:MM:SS] LABEL: message`
pub fn plain_line(entry: &LogEntry) -> String {
    match entry.kind.label() {
        Some(label) => format!("[{}] {} {}", entry.display_time(), label, entry.message),
        None => format!("[{}] {}", entry.display_time(), entry.message),
    }
}

/// Split annotated markup into plain text runs with their highlight stacks
pub fn fragments(annotated: &str) -> Vec<Fragment> {
    let mut out = Vec::new();
    let mut stack = Vec::new();
    flatten(&parse(annotated), &mut stack, &mut out);
    out
}

fn flatten(nodes: &[Node], stack: &mut Vec<Highlight>, out: &mut Vec<Fragment>) {
    for node in nodes {
        match node {
            Node::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                out.push(Fragment {
                    text: text.clone(),
                    highlights: stack.clone(),
                });
            }
            Node::Span(highlight, children) => {
                stack.push(*highlight);
                flatten(children, stack, out);
                stack.pop();
            }
        }
    }
}

/// Rewrite text nodes, wrapping each regex match in a span
///
/// With `nested` false only top-level text is touched; existing spans are
/// left alone.
fn wrap_matches(nodes: Vec<Node>, pattern: &Regex, highlight: Highlight, nested: bool) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(text) => split_text(&text, pattern, highlight, &mut out),
            Node::Span(h, children) if nested => {
                out.push(Node::Span(h, wrap_matches(children, pattern, highlight, true)));
            }
            span => out.push(span),
        }
    }
    out
}

fn split_text(text: &str, pattern: &Regex, highlight: Highlight, out: &mut Vec<Node>) {
    let mut last = 0;
    for m in pattern.find_iter(text) {
        if m.start() == m.end() {
            continue;
        }
        if m.start() > last {
            out.push(Node::Text(text[last..m.start()].to_string()));
        }
        out.push(Node::Span(highlight, vec![Node::Text(m.as_str().to_string())]));
        last = m.end();
    }
    if last < text.len() {
        out.push(Node::Text(text[last..].to_string()));
    }
}

/// Parse annotated markup into a node tree
///
/// Only our own span tags are recognised; any other `<` is literal text and
/// will be escaped again on render. Unclosed spans are closed at the end.
fn parse(markup: &str) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<(Highlight, Vec<Node>)> = Vec::new();
    let mut text = String::new();
    let mut rest = markup;

    while let Some(pos) = rest.find('<') {
        text.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some((highlight, consumed)) = open_tag(rest) {
            flush_text(&mut text, current(&mut root, &mut stack));
            stack.push((highlight, Vec::new()));
            rest = &rest[consumed..];
        } else if rest.starts_with(SPAN_CLOSE) && !stack.is_empty() {
            flush_text(&mut text, current(&mut root, &mut stack));
            if let Some((highlight, children)) = stack.pop() {
                current(&mut root, &mut stack).push(Node::Span(highlight, children));
            }
            rest = &rest[SPAN_CLOSE.len()..];
        } else {
            text.push('<');
            rest = &rest[1..];
        }
    }
    text.push_str(rest);
    flush_text(&mut text, current(&mut root, &mut stack));

    while let Some((highlight, children)) = stack.pop() {
        current(&mut root, &mut stack).push(Node::Span(highlight, children));
    }
    root
}

/// Recognise `<span class="known-class">`, returning the highlight and bytes consumed
fn open_tag(s: &str) -> Option<(Highlight, usize)> {
    let after = s.strip_prefix(SPAN_OPEN)?;
    let end = after.find("\">")?;
    let highlight = Highlight::from_class(&after[..end])?;
    Some((highlight, SPAN_OPEN.len() + end + 2))
}

fn current<'a>(root: &'a mut Vec<Node>, stack: &'a mut [(Highlight, Vec<Node>)]) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some((_, children)) => children,
        None => root,
    }
}

fn flush_text(text: &mut String, into: &mut Vec<Node>) {
    if !text.is_empty() {
        into.push(Node::Text(unescape(text)));
        text.clear();
    }
}

fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_into(nodes, &mut out);
    out
}

fn render_into(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Span(highlight, children) => {
                out.push_str(SPAN_OPEN);
                out.push_str(highlight.class());
                out.push_str("\">");
                render_into(children, out);
                out.push_str(SPAN_CLOSE);
            }
        }
    }
}

/// Decode the entities produced by [`escape`]; anything else passes through
fn unescape(text: &str) -> String {
    const ENTITIES: [(&str, char); 6] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
        ("&#x27;", '\''),
    ];

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, c)) => {
                out.push(*c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
