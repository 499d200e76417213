//! Handler descriptors and the groups they are registered in.
//!
//! A descriptor is the explicit form of "a method with pattern
//! annotations": an identity used for ordering, a pattern per facet, a
//! list of parameter bindings and the closure to call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::dispatch::reply::Reply;
use crate::dispatch::value::{Args, TargetType};
use crate::error::PatternError;
use crate::template::{Template, TemplateMatch};

/// Invocation target bound at registration time.
pub type HandlerFn = Arc<dyn Fn(&Args) -> anyhow::Result<Reply> + Send + Sync>;

// ── Facet pattern ───────────────────────────────────────────────────

/// Which path accepted a facet value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPath {
    /// The pattern is empty and accepts anything.
    Any,
    /// The raw pattern matched as a regular expression.
    Regex,
    /// The pattern matched as a template.
    Template,
}

/// A per-facet pattern compiled both ways.
///
/// The raw text is first tried as a plain regular expression; only if
/// that does not compile or does not match is the template form used.
/// A pattern that happens to be valid regex syntax therefore uses regex
/// semantics even when it was written as a template.
#[derive(Debug, Clone)]
pub struct FacetPattern {
    raw: String,
    regex: Option<Regex>,
    template: Option<Template>,
}

impl FacetPattern {
    /// Compile `raw`. Fails only when neither form compiles.
    pub fn compile(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Ok(Self {
                raw: String::new(),
                regex: None,
                template: None,
            });
        }

        let regex = Regex::new(&format!("^(?:{raw})$")).ok();
        let template = match Template::compile(raw) {
            Ok(template) => Some(template),
            Err(e) if regex.is_some() => {
                debug!(pattern = %raw, error = %e, "Pattern is regex-only");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            raw: raw.to_string(),
            regex,
            template,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// How `value` is accepted, or `None` if it is not.
    ///
    /// An absent value is accepted only by an empty pattern.
    pub fn match_path(&self, value: Option<&str>) -> Option<MatchPath> {
        if self.raw.is_empty() {
            return Some(MatchPath::Any);
        }
        let value = value?;
        if self.regex.as_ref().is_some_and(|r| r.is_match(value)) {
            return Some(MatchPath::Regex);
        }
        if self.template.as_ref().is_some_and(|t| t.is_match(value)) {
            return Some(MatchPath::Template);
        }
        None
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        self.match_path(value).is_some()
    }

    /// Template captures for `value`. Regex-only patterns capture nothing.
    pub fn captures(&self, value: Option<&str>) -> Option<TemplateMatch> {
        self.template.as_ref()?.match_input(value)
    }
}

// ── Parameter binding ───────────────────────────────────────────────

/// Where one handler parameter takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub facet: String,
    /// Named capture; `None` binds the whole facet value.
    pub variable: Option<String>,
    pub target: TargetType,
}

impl ParamBinding {
    /// Bind the whole facet value.
    pub fn whole(facet: impl Into<String>, target: TargetType) -> Self {
        Self {
            facet: facet.into(),
            variable: None,
            target,
        }
    }

    /// Bind a named capture of the facet's template.
    pub fn capture(facet: impl Into<String>, variable: impl Into<String>, target: TargetType) -> Self {
        Self {
            facet: facet.into(),
            variable: Some(variable.into()),
            target,
        }
    }
}

// ── Descriptor ──────────────────────────────────────────────────────

/// A registered dispatch candidate.
#[derive(Clone)]
pub struct HandlerDescriptor {
    identity: String,
    patterns: BTreeMap<String, FacetPattern>,
    bindings: Vec<ParamBinding>,
    invoke_all_matches: bool,
    handler: HandlerFn,
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("identity", &self.identity)
            .field("patterns", &self.patterns)
            .field("bindings", &self.bindings)
            .field("invoke_all_matches", &self.invoke_all_matches)
            .finish_non_exhaustive()
    }
}

impl HandlerDescriptor {
    /// Start describing a handler identified by `identity`.
    pub fn builder(identity: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            identity: identity.into(),
            patterns: Vec::new(),
            bindings: Vec::new(),
            handler: None,
        }
    }

    /// Deterministic sort key.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Pattern declared for `facet`.
    pub fn pattern(&self, facet: &str) -> Option<&FacetPattern> {
        self.patterns.get(facet)
    }

    pub fn patterns(&self) -> impl Iterator<Item = (&str, &FacetPattern)> {
        self.patterns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn bindings(&self) -> &[ParamBinding] {
        &self.bindings
    }

    pub fn invoke_all_matches(&self) -> bool {
        self.invoke_all_matches
    }

    pub(crate) fn call(&self, args: &Args) -> anyhow::Result<Reply> {
        (self.handler)(args)
    }
}

/// Builder for [`HandlerDescriptor`].
pub struct DescriptorBuilder {
    identity: String,
    patterns: Vec<(String, String)>,
    bindings: Vec<ParamBinding>,
    handler: Option<HandlerFn>,
}

impl DescriptorBuilder {
    /// Require `facet` to match `pattern`. An empty pattern accepts anything.
    pub fn on(mut self, facet: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.patterns.push((facet.into(), pattern.into()));
        self
    }

    /// Append a parameter binding.
    pub fn bind(mut self, binding: ParamBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Append a binding of the whole `facet` value.
    pub fn param(self, facet: impl Into<String>, target: TargetType) -> Self {
        self.bind(ParamBinding::whole(facet, target))
    }

    /// Append a binding of the `variable` capture of `facet`.
    pub fn capture(
        self,
        facet: impl Into<String>,
        variable: impl Into<String>,
        target: TargetType,
    ) -> Self {
        self.bind(ParamBinding::capture(facet, variable, target))
    }

    /// Set the closure invoked when this descriptor is dispatched.
    pub fn handle<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&Args) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let handler: HandlerFn =
            Arc::new(move |args: &Args| -> anyhow::Result<Reply> { f(args).map(Into::into) });
        self.handler = Some(handler);
        self
    }

    /// Compile the patterns. Without a handler the descriptor replies with nothing.
    pub fn build(self) -> Result<HandlerDescriptor, PatternError> {
        let mut patterns = BTreeMap::new();
        for (facet, raw) in self.patterns {
            patterns.insert(facet, FacetPattern::compile(&raw)?);
        }
        Ok(HandlerDescriptor {
            identity: self.identity,
            patterns,
            bindings: self.bindings,
            invoke_all_matches: false,
            handler: self.handler.unwrap_or_else(reply_nothing),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

fn reply_nothing() -> HandlerFn {
    Arc::new(|_: &Args| -> anyhow::Result<Reply> { Ok(Reply::Nothing) })
}

// ── Group ───────────────────────────────────────────────────────────

/// The descriptors of one handler object, sorted by identity.
#[derive(Debug, Clone)]
pub struct HandlerGroup {
    name: String,
    invoke_all_matches: bool,
    descriptors: Vec<HandlerDescriptor>,
}

impl HandlerGroup {
    pub fn builder(name: impl Into<String>) -> HandlerGroupBuilder {
        HandlerGroupBuilder {
            name: name.into(),
            invoke_all_matches: false,
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke every matching descriptor instead of only the first.
    pub fn invoke_all_matches(&self) -> bool {
        self.invoke_all_matches
    }

    pub fn descriptors(&self) -> &[HandlerDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Builder for [`HandlerGroup`].
pub struct HandlerGroupBuilder {
    name: String,
    invoke_all_matches: bool,
    handlers: Vec<DescriptorBuilder>,
}

impl HandlerGroupBuilder {
    pub fn invoke_all_matches(mut self, invoke_all: bool) -> Self {
        self.invoke_all_matches = invoke_all;
        self
    }

    pub fn handler(mut self, handler: DescriptorBuilder) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Build the group, skipping (and logging) descriptors whose patterns
    /// do not compile.
    pub fn build(self) -> HandlerGroup {
        let (group, rejected) = self.compile();
        for (identity, e) in rejected {
            warn!(
                group = %group.name,
                identity = %identity,
                error = %e,
                "Skipping handler with bad pattern"
            );
        }
        group
    }

    /// Build the group, failing on the first bad pattern.
    pub fn try_build(self) -> Result<HandlerGroup, PatternError> {
        let (group, rejected) = self.compile();
        match rejected.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(group),
        }
    }

    fn compile(self) -> (HandlerGroup, Vec<(String, PatternError)>) {
        let mut descriptors = Vec::with_capacity(self.handlers.len());
        let mut rejected = Vec::new();

        for builder in self.handlers {
            let identity = builder.identity().to_string();
            match builder.build() {
                Ok(mut descriptor) => {
                    descriptor.invoke_all_matches = self.invoke_all_matches;
                    descriptors.push(descriptor);
                }
                Err(e) => rejected.push((identity, e)),
            }
        }
        descriptors.sort_by(|a, b| a.identity.cmp(&b.identity));

        let group = HandlerGroup {
            name: self.name,
            invoke_all_matches: self.invoke_all_matches,
            descriptors,
        };
        (group, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::message::{BODY, SUBJECT};

    #[test]
    fn empty_pattern_accepts_anything() {
        let p = FacetPattern::compile("").unwrap();
        assert_eq!(p.match_path(Some("whatever")), Some(MatchPath::Any));
        assert_eq!(p.match_path(None), Some(MatchPath::Any));
    }

    #[test]
    fn raw_regex_is_tried_first() {
        let p = FacetPattern::compile(".*#Foo.*").unwrap();
        assert_eq!(p.match_path(Some("hello #Foo world")), Some(MatchPath::Regex));
        assert_eq!(p.match_path(Some("hello #Bar world")), None);
    }

    #[test]
    fn template_is_the_fallback() {
        let p = FacetPattern::compile("what is {a} plus {b}").unwrap();
        assert_eq!(p.match_path(Some("what is 1 plus 2")), Some(MatchPath::Template));
        let caps = p.captures(Some("what is 1 plus 2")).unwrap();
        assert_eq!(caps.first("b"), Some("2"));
    }

    #[test]
    fn absent_value_fails_non_empty_pattern() {
        let p = FacetPattern::compile("help").unwrap();
        assert!(!p.matches(None));
    }

    #[test]
    fn pattern_that_compiles_neither_way_is_rejected() {
        assert!(FacetPattern::compile("oops {name").is_err());
    }

    #[test]
    fn group_sorts_by_identity_and_propagates_flag() {
        let group = HandlerGroup::builder("g")
            .invoke_all_matches(true)
            .handler(HandlerDescriptor::builder("b"))
            .handler(HandlerDescriptor::builder("a").on(BODY, "x"))
            .build();
        let ids: Vec<&str> = group.descriptors().iter().map(|d| d.identity()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(group.descriptors().iter().all(|d| d.invoke_all_matches()));
    }

    #[test]
    fn bad_descriptor_is_skipped_others_kept() {
        let group = HandlerGroup::builder("g")
            .handler(HandlerDescriptor::builder("bad").on(SUBJECT, "{unclosed"))
            .handler(HandlerDescriptor::builder("good").on(SUBJECT, "hello"))
            .build();
        assert_eq!(group.len(), 1);
        assert_eq!(group.descriptors()[0].identity(), "good");
    }

    #[test]
    fn try_build_reports_bad_pattern() {
        let result = HandlerGroup::builder("g")
            .handler(HandlerDescriptor::builder("bad").on(SUBJECT, "{unclosed"))
            .try_build();
        assert!(matches!(result, Err(PatternError::Unterminated { .. })));
    }

    #[test]
    fn handler_result_converts_into_reply() {
        let d = HandlerDescriptor::builder("echo")
            .handle(|args| Ok(format!("got {}", args.len())))
            .build()
            .unwrap();
        let reply = d.call(&Args::default()).unwrap();
        assert_eq!(reply.message(), Some("got 0"));
    }
}
