use blocksync_content::ContentNormalizer;
use proptest::prelude::*;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    content: Content,
}

#[derive(Debug, Clone)]
enum Content {
    /// `<X/>`
    Empty,
    /// `<X></X>`
    EmptyPair,
    /// Leaf value, possibly padded or whitespace-only
    Text(String),
    CData(String),
    /// Element content: layout whitespace between items is free
    Children(Vec<Item>),
    /// Text interleaved with markup; every character is data
    Mixed(Vec<Part>),
    /// Like `Mixed`, under `xml:space="preserve"`
    Preserved(Vec<Part>),
}

#[derive(Debug, Clone)]
enum Item {
    Element(Node),
    Comment(String),
}

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    Element(Node),
}

fn attrs() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[a-z]{1,5}", "[a-zA-Z0-9 &<>\"]{0,8}", 0..4)
        .prop_map(|m| m.into_iter().collect())
}

fn leaf_content() -> impl Strategy<Value = Content> {
    prop_oneof![
        Just(Content::Empty),
        Just(Content::EmptyPair),
        "[a-z&<]{1,6}".prop_map(Content::Text),
        "[ \t\n]{0,2}[a-z ]{0,6}[ \n]{0,2}".prop_map(Content::Text),
        "[ \n]{1,3}".prop_map(Content::Text),
        "[a-z <>&]{0,6}".prop_map(Content::CData),
    ]
}

fn node() -> impl Strategy<Value = Node> {
    let leaf = ("[A-Z][a-z]{0,6}", attrs(), leaf_content())
        .prop_map(|(name, attrs, content)| Node { name, attrs, content });
    leaf.prop_recursive(3, 24, 4, |inner| {
        let item = prop_oneof![
            4 => inner.clone().prop_map(Item::Element),
            1 => "[a-z ]{0,6}".prop_map(Item::Comment),
        ];
        let part = prop_oneof![
            "[ \n]{0,2}[a-z]{1,4}[ ]{0,2}".prop_map(Part::Text),
            inner.clone().prop_map(Part::Element),
        ];
        let preserved_part = prop_oneof![
            "[ \n]{1,3}".prop_map(Part::Text),
            "[a-z ]{1,5}".prop_map(Part::Text),
            inner.prop_map(Part::Element),
        ];
        let content = prop_oneof![
            3 => prop::collection::vec(item, 1..4).prop_map(Content::Children),
            1 => ("[a-z]{1,4}", prop::collection::vec(part, 1..3)).prop_map(|(head, mut parts)| {
                parts.insert(0, Part::Text(head));
                Content::Mixed(parts)
            }),
            1 => prop::collection::vec(preserved_part, 1..4).prop_map(Content::Preserved),
        ];
        ("[A-Z][a-z]{0,6}", attrs(), content)
            .prop_map(|(name, attrs, content)| Node { name, attrs, content })
    })
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Layout used when rendering a tree.
struct Style<'a> {
    indent: &'a str,
    newline: &'a str,
    reverse_attrs: bool,
}

/// Render `node`. Indentation only goes where the content is element
/// content; leaf values, mixed and preserved content are written inline.
fn render(node: &Node, depth: usize, style: &Style<'_>, out: &mut String) {
    let mut attrs: Vec<(String, String)> = node.attrs.clone();
    if matches!(node.content, Content::Preserved(_)) {
        attrs.push(("xml:space".into(), "preserve".into()));
    }
    if style.reverse_attrs {
        attrs.reverse();
    }
    let rendered_attrs: String = attrs
        .iter()
        .map(|(k, v)| format!(" {k}=\"{}\"", escape(v)))
        .collect();
    let name = &node.name;

    match &node.content {
        Content::Empty => out.push_str(&format!("<{name}{rendered_attrs}/>")),
        Content::EmptyPair => out.push_str(&format!("<{name}{rendered_attrs}></{name}>")),
        Content::Text(text) => {
            out.push_str(&format!("<{name}{rendered_attrs}>{}</{name}>", escape(text)));
        }
        Content::CData(data) => {
            out.push_str(&format!("<{name}{rendered_attrs}><![CDATA[{data}]]></{name}>"));
        }
        Content::Children(items) => {
            out.push_str(&format!("<{name}{rendered_attrs}>"));
            for item in items {
                out.push_str(style.newline);
                out.push_str(&style.indent.repeat(depth + 1));
                match item {
                    Item::Element(child) => render(child, depth + 1, style, out),
                    Item::Comment(text) => out.push_str(&format!("<!--{text}-->")),
                }
            }
            out.push_str(style.newline);
            out.push_str(&style.indent.repeat(depth));
            out.push_str(&format!("</{name}>"));
        }
        Content::Mixed(parts) | Content::Preserved(parts) => {
            // Under xml:space="preserve" every descendant is laid out inline.
            let inline = Style {
                indent: "",
                newline: "",
                reverse_attrs: style.reverse_attrs,
            };
            let child_style = if matches!(node.content, Content::Preserved(_)) {
                &inline
            } else {
                style
            };
            out.push_str(&format!("<{name}{rendered_attrs}>"));
            for part in parts {
                match part {
                    Part::Text(text) => out.push_str(&escape(text)),
                    Part::Element(child) => render(child, depth, child_style, out),
                }
            }
            out.push_str(&format!("</{name}>"));
        }
    }
}

fn render_with(tree: &Node, style: &Style<'_>) -> String {
    let mut out = String::new();
    render(tree, 0, style, &mut out);
    out
}

const PLAIN: Style<'static> = Style {
    indent: "  ",
    newline: "\n",
    reverse_attrs: false,
};

/// Character data of every element, in document order.
///
/// An element whose direct text is only layout whitespace between child
/// elements reports `None`; every other element reports its text exactly.
fn element_values(markup: &str) -> Vec<(String, Option<String>)> {
    struct Open {
        name: String,
        text: String,
        has_children: bool,
        slot: usize,
    }

    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(false);
    let mut values: Vec<(String, Option<String>)> = Vec::new();
    let mut open: Vec<Open> = Vec::new();

    let close = |element: Open, values: &mut Vec<(String, Option<String>)>| {
        let layout_only = element.has_children && element.text.trim().is_empty();
        values[element.slot] = (element.name, (!layout_only).then_some(element.text));
    };

    loop {
        match reader.read_event().unwrap() {
            Event::Start(start) => {
                if let Some(parent) = open.last_mut() {
                    parent.has_children = true;
                }
                values.push((String::new(), None));
                open.push(Open {
                    name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                    text: String::new(),
                    has_children: false,
                    slot: values.len() - 1,
                });
            }
            Event::Empty(start) => {
                if let Some(parent) = open.last_mut() {
                    parent.has_children = true;
                }
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                values.push((name, Some(String::new())));
            }
            Event::End(_) => {
                let element = open.pop().unwrap();
                close(element, &mut values);
            }
            Event::Text(text) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&text.unescape().unwrap());
                }
            }
            Event::CData(data) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Comment(_) => {
                if let Some(parent) = open.last_mut() {
                    parent.has_children = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    values
}

proptest! {
    #[test]
    fn normalization_is_idempotent(tree in node()) {
        let raw = render_with(&tree, &PLAIN);

        let normalizer = ContentNormalizer::new();
        let once = normalizer.normalize(&raw).unwrap();
        let twice = normalizer.normalize(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn attribute_order_and_indentation_do_not_matter(tree in node()) {
        let compact = render_with(&tree, &Style { indent: "", newline: "", reverse_attrs: false });
        let noisy = render_with(&tree, &Style { indent: "\t\t", newline: "\r\n", reverse_attrs: true });

        let normalizer = ContentNormalizer::new();
        prop_assert_eq!(
            normalizer.normalize(&compact).unwrap(),
            normalizer.normalize(&noisy).unwrap()
        );
    }

    #[test]
    fn element_values_survive_normalization(tree in node()) {
        let raw = render_with(&tree, &PLAIN);

        let normalized = ContentNormalizer::new().normalize(&raw).unwrap();

        prop_assert_eq!(element_values(&raw), element_values(&normalized));
    }
}
