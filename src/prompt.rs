//! Chat prompt templates
//!
//! A [`ChatPromptTemplate`] is an ordered list of role-tagged message
//! templates. Placeholders use single braces (`{language}`); `{{` and `}}`
//! produce literal braces. Templates are parsed once, when constructed, and
//! rendered in a single pass, so braces inside substituted values are never
//! expanded.

use super::{Error, Message, MessageRole, Result};
use indexmap::{IndexMap, IndexSet};

/// Values substituted into a template, keyed by placeholder name
pub type Variables = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A single role-tagged message template
#[derive(Debug, Clone, PartialEq, Eq)]
struct MessageTemplate {
    role: MessageRole,
    segments: Vec<Segment>,
}

impl MessageTemplate {
    fn parse(role: MessageRole, template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(Error::Template(format!(
                                    "unclosed placeholder in template: {:?}",
                                    template
                                )))
                            }
                            Some(ch) => name.push(ch),
                        }
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(Error::Template(format!(
                            "empty placeholder in template: {:?}",
                            template
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(name.to_string()));
                }
                '}' => {
                    return Err(Error::Template(format!(
                        "single '}}' in template: {:?}",
                        template
                    )))
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(MessageTemplate { role, segments })
    }

    fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    fn render(&self, variables: &Variables) -> Result<Message> {
        let mut content = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => content.push_str(text),
                Segment::Variable(name) => {
                    let value = variables.get(name).ok_or_else(|| {
                        Error::Template(format!("missing value for variable '{}'", name))
                    })?;
                    content.push_str(value);
                }
            }
        }
        Ok(Message::new(self.role, content))
    }
}

/// Ordered, immutable list of role-tagged message templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPromptTemplate {
    messages: Vec<MessageTemplate>,
    input_variables: IndexSet<String>,
}

impl ChatPromptTemplate {
    /// Parse a template from `(role, template)` pairs.
    ///
    /// # Errors
    ///
    /// A template with an unclosed `{`, a single `}` or an empty placeholder.
    pub fn from_messages<I, S>(messages: I) -> Result<Self>
    where
        I: IntoIterator<Item = (MessageRole, S)>,
        S: AsRef<str>,
    {
        let messages = messages
            .into_iter()
            .map(|(role, template)| MessageTemplate::parse(role, template.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let input_variables = messages
            .iter()
            .flat_map(MessageTemplate::variables)
            .map(str::to_string)
            .collect();

        Ok(ChatPromptTemplate {
            messages,
            input_variables,
        })
    }

    /// Distinct placeholder names, in order of first appearance
    pub fn input_variables(&self) -> impl Iterator<Item = &str> {
        self.input_variables.iter().map(String::as_str)
    }

    /// Render every message template with the given values.
    ///
    /// Values for names the template does not use are ignored.
    pub fn format_messages(&self, variables: &Variables) -> Result<Vec<Message>> {
        self.messages
            .iter()
            .map(|template| template.render(variables))
            .collect()
    }
}
