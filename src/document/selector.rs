//! The selector subset findings use to point at document nodes: type, `*`,
//! `.class`, `#id`, `[attr]`, `[attr=value]`, descendant and `>` combinators,
//! and comma-separated groups.

use anyhow::{bail, Result};

use super::markup::{Element, MarkupTree, NodeId};

#[derive(Debug, Clone, PartialEq)]
enum AttrTest {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&element.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        self.attrs.iter().all(|test| match test {
            AttrTest::Exists(name) => element.has_attr(name),
            AttrTest::Equals(name, value) => element.attr(name) == Some(value.as_str()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// One comma-free selector: compounds joined by combinators, left to right.
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    first: Compound,
    rest: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    groups: Vec<Complex>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let mut groups = Vec::new();
        for part in input.split(',') {
            groups.push(parse_complex(part.trim())?);
        }
        Ok(Self { groups })
    }

    pub fn matches(&self, tree: &MarkupTree, id: NodeId) -> bool {
        self.groups.iter().any(|complex| matches_complex(complex, tree, id))
    }

    /// Attached elements matching the selector, in document order.
    pub fn select(&self, tree: &MarkupTree) -> Vec<NodeId> {
        tree.elements()
            .into_iter()
            .filter(|id| self.matches(tree, *id))
            .collect()
    }
}

fn parse_complex(input: &str) -> Result<Complex> {
    if input.is_empty() {
        bail!("empty selector group");
    }

    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            i += 1;
            continue;
        }
        if c == '>' {
            if compounds.is_empty() {
                bail!("selector '{input}' starts with a combinator");
            }
            pending = Some(Combinator::Child);
            i += 1;
            continue;
        }

        let (compound, next) = parse_compound(&chars, i, input)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        compounds.push(compound);
        pending = None;
        i = next;
    }

    if pending == Some(Combinator::Child) {
        bail!("selector '{input}' ends with a combinator");
    }

    let mut compounds = compounds.into_iter();
    let first = match compounds.next() {
        Some(first) => first,
        None => bail!("empty selector group"),
    };
    Ok(Complex {
        first,
        rest: combinators.into_iter().zip(compounds).collect(),
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_compound(chars: &[char], mut i: usize, input: &str) -> Result<(Compound, usize)> {
    let mut compound = Compound::default();

    if chars[i] == '*' {
        compound.tag = Some("*".into());
        i += 1;
    } else if is_ident_char(chars[i]) {
        let (tag, next) = read_ident(chars, i);
        compound.tag = Some(tag.to_ascii_lowercase());
        i = next;
    }

    while i < chars.len() {
        match chars[i] {
            '.' | '#' => {
                let marker = chars[i];
                let (name, next) = read_ident(chars, i + 1);
                if name.is_empty() {
                    bail!("selector '{input}' has an empty name after '{marker}'");
                }
                if marker == '.' {
                    compound.classes.push(name);
                } else {
                    compound.id = Some(name);
                }
                i = next;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + offset);
                let Some(close) = close else {
                    bail!("selector '{input}' has an unterminated attribute test");
                };
                let body: String = chars[i + 1..close].iter().collect();
                compound.attrs.push(parse_attr_test(&body, input)?);
                i = close + 1;
            }
            c if c.is_whitespace() || c == '>' => break,
            other => bail!("unsupported selector syntax '{other}' in '{input}'"),
        }
    }

    if compound.is_empty() {
        bail!("selector '{input}' has an empty compound");
    }
    Ok((compound, i))
}

fn parse_attr_test(body: &str, input: &str) -> Result<AttrTest> {
    match body.split_once('=') {
        None => {
            let name = body.trim();
            if name.is_empty() {
                bail!("selector '{input}' has an empty attribute test");
            }
            Ok(AttrTest::Exists(name.to_ascii_lowercase()))
        }
        Some((name, value)) => {
            let name = name.trim();
            if name.is_empty() || name.ends_with(['~', '|', '^', '$', '*']) {
                bail!("unsupported attribute test '[{body}]' in '{input}'");
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Ok(AttrTest::Equals(name.to_ascii_lowercase(), value.to_string()))
        }
    }
}

fn matches_complex(complex: &Complex, tree: &MarkupTree, id: NodeId) -> bool {
    // Walk right to left: the last compound must match `id` itself.
    let mut parts: Vec<(Option<Combinator>, &Compound)> = Vec::with_capacity(complex.rest.len() + 1);
    parts.push((None, &complex.first));
    for (combinator, compound) in &complex.rest {
        parts.push((Some(*combinator), compound));
    }
    match_from(&parts, parts.len() - 1, tree, id)
}

fn match_from(
    parts: &[(Option<Combinator>, &Compound)],
    index: usize,
    tree: &MarkupTree,
    id: NodeId,
) -> bool {
    let (combinator, compound) = parts[index];
    let Some(element) = tree.element(id) else {
        return false;
    };
    if !compound.matches(element) {
        return false;
    }
    let Some(combinator) = combinator else {
        return true;
    };

    match combinator {
        Combinator::Child => tree
            .parent(id)
            .is_some_and(|parent| match_from(parts, index - 1, tree, parent)),
        Combinator::Descendant => {
            let mut ancestor = tree.parent(id);
            while let Some(candidate) = ancestor {
                if match_from(parts, index - 1, tree, candidate) {
                    return true;
                }
                ancestor = tree.parent(candidate);
            }
            false
        }
    }
}
