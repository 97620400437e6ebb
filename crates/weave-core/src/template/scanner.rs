//! Joins static fragments into one markup string with hole markers.
//!
//! The scan tracks just enough of the HTML tokenizer state to know what each
//! hole sits in: text, a raw-text element body, an attribute value or a tag name.

use std::fmt::Write as _;

use crate::dom::is_raw_text;
use crate::error::TemplateError;

pub(crate) const MARK_OPEN: char = '\u{E000}';
pub(crate) const MARK_CLOSE: char = '\u{E001}';
pub(crate) const NODE_MARKER: &str = "weave:";
pub(crate) const TAG_MARKER: &str = "weave-tag-";

/// Where a hole landed in the joined markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HoleSite {
    Node,
    Attribute,
    RawText,
    OpenTag,
    CloseTag { opening: usize },
}

#[derive(Debug)]
pub(crate) struct Scan {
    pub markup: String,
    pub sites: Vec<HoleSite>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Text,
    TagOpen,
    EndTagOpen,
    TagName { closing: bool },
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    AttrValue(char),
    AttrValueUnquoted,
    SelfClosing,
    MarkupDecl { dashes: u8 },
    BogusComment,
    Comment { dashes: u8 },
    RawText,
}

impl State {
    fn describe(self) -> &'static str {
        match self {
            State::TagName { .. } => "a tag name",
            State::BeforeAttrName | State::AttrName | State::AfterAttrName => "an attribute name",
            State::SelfClosing => "a self-closing tag",
            State::MarkupDecl { .. } | State::BogusComment => "a markup declaration",
            State::Comment { .. } => "a comment",
            _ => "markup",
        }
    }
}

struct Scanner {
    out: String,
    sites: Vec<HoleSite>,
    state: State,
    tag: String,
    raw_tag: Option<String>,
    dynamic_tags: Vec<usize>,
    current_dynamic: bool,
}

pub(crate) fn scan(fragments: &[&str]) -> Result<Scan, TemplateError> {
    let mut scanner = Scanner {
        out: String::new(),
        sites: Vec::with_capacity(fragments.len().saturating_sub(1)),
        state: State::Text,
        tag: String::new(),
        raw_tag: None,
        dynamic_tags: Vec::new(),
        current_dynamic: false,
    };
    for (index, fragment) in fragments.iter().enumerate() {
        scanner.feed(fragment);
        if index + 1 < fragments.len() {
            scanner.hole(index)?;
        }
    }
    Ok(Scan {
        markup: scanner.out,
        sites: scanner.sites,
    })
}

impl Scanner {
    fn feed(&mut self, fragment: &str) {
        for (offset, ch) in fragment.char_indices() {
            if self.state == State::RawText && ch == '<' && self.closes_raw_text(&fragment[offset..]) {
                self.raw_tag = None;
                self.state = State::TagOpen;
                self.out.push(ch);
                continue;
            }
            self.out.push(ch);
            self.step(ch);
        }
    }

    fn closes_raw_text(&self, rest: &str) -> bool {
        let Some(tag) = &self.raw_tag else {
            return false;
        };
        let Some(after) = rest.strip_prefix("</") else {
            return false;
        };
        after.len() >= tag.len()
            && after.is_char_boundary(tag.len())
            && after[..tag.len()].eq_ignore_ascii_case(tag)
    }

    fn step(&mut self, ch: char) {
        self.state = match self.state {
            State::Text => match ch {
                '<' => State::TagOpen,
                _ => State::Text,
            },
            State::TagOpen => match ch {
                '/' => State::EndTagOpen,
                '!' => State::MarkupDecl { dashes: 0 },
                c if c.is_ascii_alphabetic() => {
                    self.tag.clear();
                    self.tag.push(c.to_ascii_lowercase());
                    self.current_dynamic = false;
                    State::TagName { closing: false }
                }
                _ => State::Text,
            },
            State::EndTagOpen => match ch {
                c if c.is_ascii_alphabetic() => {
                    self.tag.clear();
                    self.tag.push(c.to_ascii_lowercase());
                    State::TagName { closing: true }
                }
                _ => State::Text,
            },
            State::TagName { closing } => match ch {
                c if c.is_whitespace() => State::BeforeAttrName,
                '/' if !closing => State::SelfClosing,
                '>' => self.end_of_tag(closing, false),
                c => {
                    self.tag.push(c.to_ascii_lowercase());
                    State::TagName { closing }
                }
            },
            State::BeforeAttrName => match ch {
                c if c.is_whitespace() => State::BeforeAttrName,
                '/' => State::SelfClosing,
                '>' => self.end_of_tag(false, false),
                _ => State::AttrName,
            },
            State::AttrName => match ch {
                c if c.is_whitespace() => State::AfterAttrName,
                '=' => State::BeforeAttrValue,
                '/' => State::SelfClosing,
                '>' => self.end_of_tag(false, false),
                _ => State::AttrName,
            },
            State::AfterAttrName => match ch {
                c if c.is_whitespace() => State::AfterAttrName,
                '=' => State::BeforeAttrValue,
                '/' => State::SelfClosing,
                '>' => self.end_of_tag(false, false),
                _ => State::AttrName,
            },
            State::BeforeAttrValue => match ch {
                c if c.is_whitespace() => State::BeforeAttrValue,
                '"' | '\'' => State::AttrValue(ch),
                '>' => self.end_of_tag(false, false),
                _ => State::AttrValueUnquoted,
            },
            State::AttrValue(quote) => {
                if ch == quote {
                    State::BeforeAttrName
                } else {
                    State::AttrValue(quote)
                }
            }
            State::AttrValueUnquoted => match ch {
                c if c.is_whitespace() => State::BeforeAttrName,
                '>' => self.end_of_tag(false, false),
                _ => State::AttrValueUnquoted,
            },
            State::SelfClosing => match ch {
                '>' => self.end_of_tag(false, true),
                c if c.is_whitespace() => State::BeforeAttrName,
                _ => State::AttrName,
            },
            State::MarkupDecl { dashes } => match ch {
                '-' if dashes == 1 => State::Comment { dashes: 0 },
                '-' => State::MarkupDecl { dashes: 1 },
                '>' => State::Text,
                _ => State::BogusComment,
            },
            State::BogusComment => match ch {
                '>' => State::Text,
                _ => State::BogusComment,
            },
            State::Comment { dashes } => match ch {
                '-' => State::Comment {
                    dashes: dashes.saturating_add(1),
                },
                '>' if dashes >= 2 => State::Text,
                _ => State::Comment { dashes: 0 },
            },
            State::RawText => State::RawText,
        };
    }

    fn end_of_tag(&mut self, closing: bool, self_closing: bool) -> State {
        if closing {
            return State::Text;
        }
        if self_closing {
            if self.current_dynamic {
                self.dynamic_tags.pop();
            }
            return State::Text;
        }
        if is_raw_text(&self.tag) {
            self.raw_tag = Some(self.tag.clone());
            return State::RawText;
        }
        State::Text
    }

    fn marker(&mut self, index: usize) {
        let _ = write!(self.out, "{MARK_OPEN}{index}{MARK_CLOSE}");
    }

    fn hole(&mut self, index: usize) -> Result<(), TemplateError> {
        let site = match self.state {
            State::Text => {
                let _ = write!(self.out, "<!--{NODE_MARKER}{index}-->");
                HoleSite::Node
            }
            State::RawText => {
                self.marker(index);
                HoleSite::RawText
            }
            State::BeforeAttrValue => {
                self.marker(index);
                self.state = State::AttrValueUnquoted;
                HoleSite::Attribute
            }
            State::AttrValue(_) | State::AttrValueUnquoted => {
                self.marker(index);
                HoleSite::Attribute
            }
            State::TagOpen => {
                let _ = write!(self.out, "{TAG_MARKER}{index}");
                self.tag.clear();
                let _ = write!(self.tag, "{TAG_MARKER}{index}");
                self.current_dynamic = true;
                self.dynamic_tags.push(index);
                self.state = State::TagName { closing: false };
                HoleSite::OpenTag
            }
            State::EndTagOpen => {
                let opening = self
                    .dynamic_tags
                    .pop()
                    .ok_or(TemplateError::UnpairedTagHole { index })?;
                let _ = write!(self.out, "{TAG_MARKER}{opening}");
                self.tag.clear();
                self.state = State::TagName { closing: true };
                HoleSite::CloseTag { opening }
            }
            other => {
                return Err(TemplateError::UnplaceableHole {
                    index,
                    context: other.describe(),
                })
            }
        };
        self.sites.push(site);
        Ok(())
    }
}
