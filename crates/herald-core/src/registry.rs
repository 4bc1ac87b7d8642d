//! Process-wide command registry.
//!
//! Built once at worker startup by the plugin loader and injected wherever
//! matching or menu aggregation is needed; never ambient global state.

use std::{collections::HashMap, sync::Arc};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::{dispatch::CommandHandler, Result};

/// How a command descriptor matches inbound text.
///
/// Explicit variants keep the matching semantics portable instead of hiding
/// everything behind ad-hoc regexes.
#[derive(Clone, Debug)]
pub enum Matcher {
    Exact(String),
    ExactIgnoreCase(String),
    Prefix(String),
    Pattern(Regex),
}

impl Matcher {
    pub fn pattern(src: &str) -> Result<Self> {
        Ok(Self::Pattern(Regex::new(src)?))
    }

    pub fn pattern_ci(src: &str) -> Result<Self> {
        Ok(Self::Pattern(
            RegexBuilder::new(src).case_insensitive(true).build()?,
        ))
    }

    /// Parse the external loader notation: `/body/flags` (only the `i` flag
    /// is honored) or a bare string, which matches exactly.
    pub fn parse(src: &str) -> Result<Self> {
        if let Some(rest) = src.strip_prefix('/') {
            if let Some(idx) = rest.rfind('/') {
                let (body, flags) = rest.split_at(idx);
                let flags = &flags[1..];
                return Ok(Self::Pattern(
                    RegexBuilder::new(body)
                        .case_insensitive(flags.contains('i'))
                        .build()?,
                ));
            }
        }
        Ok(Self::Exact(src.to_string()))
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(s) => text == s,
            Self::ExactIgnoreCase(s) => text.eq_ignore_ascii_case(s),
            Self::Prefix(p) => text.starts_with(p),
            Self::Pattern(re) => re.is_match(text),
        }
    }
}

/// Matching rule + metadata for one invocable command.
#[derive(Clone)]
pub struct CommandDescriptor {
    pub matcher: Matcher,
    pub tags: Vec<String>,
    pub help: Vec<String>,
    pub disabled: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn new(matcher: Matcher, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            matcher,
            tags: vec!["general".to_string()],
            help: Vec::new(),
            disabled: false,
            handler,
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        if self.tags.is_empty() {
            self.tags.push("general".to_string());
        }
        self
    }

    pub fn help<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.help = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

struct Slot {
    key: String,
    descriptor: CommandDescriptor,
}

#[derive(Default)]
pub struct Registry {
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under `key`. Re-registering a key replaces the
    /// previous descriptor in place; load order is the loader's business.
    pub fn register(&mut self, key: impl Into<String>, descriptor: CommandDescriptor) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => self.slots[i].descriptor = descriptor,
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push(Slot { key, descriptor });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Enabled descriptors in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &CommandDescriptor)> {
        self.slots
            .iter()
            .filter(|s| !s.descriptor.disabled)
            .map(|s| (s.key.as_str(), &s.descriptor))
    }

    /// Help entries grouped by tag: deduplicated, first-seen order per tag.
    /// Final sorting is the presenter's job.
    pub fn aggregate_by_tag(&self) -> HashMap<String, Vec<String>> {
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        for (_, desc) in self.enabled() {
            for tag in &desc.tags {
                let entries = out.entry(tag.clone()).or_default();
                for entry in &desc.help {
                    if !entries.iter().any(|e| e == entry) {
                        entries.push(entry.clone());
                    }
                }
            }
        }
        out
    }
}

/// Wire shape consumed from the external plugin loader:
/// `{ help, tags, command, disabled? }` with scalar-or-array `help`/`tags`.
#[derive(Clone, Debug, Deserialize)]
pub struct DescriptorSpec {
    #[serde(default)]
    pub help: OneOrMany<String>,
    #[serde(default)]
    pub tags: OneOrMany<String>,
    pub command: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }
}

impl DescriptorSpec {
    /// Attach a handler and produce a registrable descriptor.
    pub fn into_descriptor(self, handler: Arc<dyn CommandHandler>) -> Result<CommandDescriptor> {
        let matcher = Matcher::parse(&self.command)?;
        Ok(CommandDescriptor::new(matcher, handler)
            .tags(self.tags.into_vec())
            .help(self.help.into_vec())
            .disabled(self.disabled))
    }
}
