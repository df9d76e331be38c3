use scraper::{ElementRef, Node};

/// Markup and flattened text of an element with some descendants removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedFragment {
    /// Serialized HTML of the element itself and its kept descendants
    pub markup: String,
    /// Concatenated text of the kept descendants
    pub text: String,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Renders `element` as a new fragment, leaving out every descendant
/// element for which `skip` returns true (together with its subtree)
///
/// The source document is not modified.
pub fn render_without<F>(element: &ElementRef<'_>, skip: F) -> CleanedFragment
where
    F: Fn(&ElementRef<'_>) -> bool,
{
    let mut fragment = CleanedFragment {
        markup: String::new(),
        text: String::new(),
    };
    render_element(element, &skip, &mut fragment);
    fragment
}

fn render_element<F>(element: &ElementRef<'_>, skip: &F, out: &mut CleanedFragment)
where
    F: Fn(&ElementRef<'_>) -> bool,
{
    let value = element.value();
    let name = value.name();

    out.markup.push('<');
    out.markup.push_str(name);
    for (attr, attr_value) in value.attrs() {
        out.markup.push(' ');
        out.markup.push_str(attr);
        out.markup.push_str("=\"");
        escape_into(attr_value, true, &mut out.markup);
        out.markup.push('"');
    }
    out.markup.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                escape_into(text, false, &mut out.markup);
                out.text.push_str(text);
            }
            Node::Comment(comment) => {
                out.markup.push_str("<!--");
                out.markup.push_str(comment);
                out.markup.push_str("-->");
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !skip(&child) {
                        render_element(&child, skip, out);
                    }
                }
            }
            _ => {}
        }
    }

    out.markup.push_str("</");
    out.markup.push_str(name);
    out.markup.push('>');
}

fn escape_into(raw: &str, in_attribute: bool, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !in_attribute => out.push_str("&lt;"),
            '>' if !in_attribute => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
