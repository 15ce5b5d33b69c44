//! Minimal deterministic XML document model.
//!
//! Descriptor documents are modelled as immutable trees of named elements
//! built functionally and serialized by a single writer, so element order
//! is exactly construction order and regeneration is byte-stable. No XML
//! prolog is emitted; the grid's scheduler expects bare fragments.

use std::fmt;

/// One XML element: a name plus either text content, ordered child
/// elements, or nothing (serialized self-closing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    /// An empty element. Stays self-closing until children are attached.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children: Vec::new(),
        }
    }

    /// A leaf element with text content.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// Append one child element.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append a sequence of child elements in order.
    pub fn children(mut self, iter: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(iter);
        self
    }

    /// Serialize the tree without a prolog, trailing newline included.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn write_into(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let name = &self.name;
        for _ in 0..depth {
            f.write_str("  ")?;
        }
        if !self.children.is_empty() {
            writeln!(f, "<{name}>")?;
            for child in &self.children {
                child.write_into(f, depth + 1)?;
            }
            for _ in 0..depth {
                f.write_str("  ")?;
            }
            writeln!(f, "</{name}>")
        } else if let Some(text) = &self.text {
            writeln!(f, "<{name}>{}</{name}>", Escaped(text))
        } else {
            writeln!(f, "<{name}/>")
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_into(f, 0)
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                _ => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_tree_without_prolog() {
        let doc = Element::new("daemons")
            .child(Element::new("daemon").child(Element::text("cmd", "feeder -d 3")));

        assert_eq!(
            doc.render(),
            "<daemons>\n  <daemon>\n    <cmd>feeder -d 3</cmd>\n  </daemon>\n</daemons>\n"
        );
    }

    #[test]
    fn empty_elements_self_close() {
        let doc = Element::new("task").child(Element::new("append_cmdline_args"));
        assert_eq!(doc.render(), "<task>\n  <append_cmdline_args/>\n</task>\n");
    }

    #[test]
    fn text_content_is_escaped() {
        let doc = Element::text("cmd", "a < b && c > d");
        assert_eq!(doc.render(), "<cmd>a &lt; b &amp;&amp; c &gt; d</cmd>\n");
    }

    #[test]
    fn rendering_is_deterministic() {
        let build = || {
            Element::new("version")
                .child(Element::new("file").child(Element::text("physical_name", "a_v1.jar")))
                .child(Element::new("file").child(Element::text("physical_name", "b_v1")))
        };
        assert_eq!(build().render(), build().render());
    }
}
