//! Route template compilation.
//!
//! Hosts describe their routes as pattern strings such as `/users/{id}` or
//! `orders/{page=1}`. Templates are compiled once into segment lists and are
//! immutable afterwards; they exist only for labeling, never for dispatch.

use std::collections::{BTreeMap, HashSet};

use crate::error::{Result, RouteMetricsError};

/// Route descriptor as supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub template: String,
    /// Parameter name -> default value.
    pub defaults: BTreeMap<String, String>,
}

impl RouteDescriptor {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }
}

/// One `/`-delimited piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    Parameter {
        name: String,
        default: Option<String>,
        optional: bool,
    },
}

impl TemplateSegment {
    /// Whether this segment may be omitted from the path when it is last.
    pub fn can_be_omitted(&self) -> bool {
        match self {
            TemplateSegment::Literal(_) => false,
            TemplateSegment::Parameter { default, optional, .. } => default.is_some() || *optional,
        }
    }
}

/// Compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    pattern: String,
    segments: Vec<TemplateSegment>,
}

impl RouteTemplate {
    /// Compile a bare pattern with no descriptor-level defaults.
    pub fn parse(pattern: &str) -> Result<Self> {
        Self::compile(&RouteDescriptor::new(pattern))
    }

    /// Compile a host descriptor. Inline defaults (`{page=1}`) and descriptor
    /// defaults are merged; declaring both for the same parameter is an error.
    pub fn compile(desc: &RouteDescriptor) -> Result<Self> {
        let raw = desc.template.trim();
        let body = raw.trim_matches('/');
        let pattern = format!("/{body}");

        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        if !body.is_empty() {
            for piece in body.split('/') {
                let seg = parse_segment(&pattern, piece)?;
                if let TemplateSegment::Parameter { name, .. } = &seg {
                    if !seen.insert(name.clone()) {
                        return Err(RouteMetricsError::malformed(
                            &pattern,
                            format!("duplicate parameter `{name}`"),
                        ));
                    }
                }
                segments.push(seg);
            }
        }

        for (name, value) in &desc.defaults {
            let slot = segments.iter_mut().find_map(|s| match s {
                TemplateSegment::Parameter { name: n, default, optional } if n == name => {
                    Some((default, optional))
                }
                _ => None,
            });
            match slot {
                Some((default, optional)) => {
                    if default.is_some() || *optional {
                        return Err(RouteMetricsError::malformed(
                            &pattern,
                            format!("parameter `{name}` declares its default twice"),
                        ));
                    }
                    *default = Some(value.clone());
                }
                None => {
                    return Err(RouteMetricsError::malformed(
                        &pattern,
                        format!("default given for unknown parameter `{name}`"),
                    ));
                }
            }
        }

        Ok(Self { pattern, segments })
    }

    /// Normalized pattern with a leading `/`; this is what labels carry.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }
}

fn parse_segment(pattern: &str, piece: &str) -> Result<TemplateSegment> {
    if piece.is_empty() {
        return Err(RouteMetricsError::malformed(pattern, "empty segment"));
    }

    let opens = piece.matches('{').count();
    let closes = piece.matches('}').count();
    if opens == 0 && closes == 0 {
        return Ok(TemplateSegment::Literal(piece.to_string()));
    }
    if opens != 1 || closes != 1 {
        return Err(RouteMetricsError::malformed(pattern, format!("unbalanced braces in `{piece}`")));
    }
    let inner = piece
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| {
            RouteMetricsError::malformed(
                pattern,
                format!("segment `{piece}` mixes literal text with a parameter"),
            )
        })?;

    if inner.starts_with('*') {
        return Err(RouteMetricsError::malformed(pattern, "catch-all parameters are not supported"));
    }

    // {name=default}
    let (head, default) = match inner.split_once('=') {
        Some((h, d)) => (h, Some(d.to_string())),
        None => (inner, None),
    };
    // {name?}
    let (head, optional) = match head.strip_suffix('?') {
        Some(h) => (h, true),
        None => (head, false),
    };
    // {name:constraint} - constraints do not affect labeling
    let name = head.split_once(':').map(|(n, _)| n).unwrap_or(head).trim();

    if name.is_empty() {
        return Err(RouteMetricsError::malformed(pattern, "empty parameter name"));
    }
    if optional && default.is_some() {
        return Err(RouteMetricsError::malformed(
            pattern,
            format!("parameter `{name}` is both optional and defaulted"),
        ));
    }

    Ok(TemplateSegment::Parameter {
        name: name.to_string(),
        default,
        optional,
    })
}

/// Compile every descriptor, keeping registration order. Malformed entries are
/// skipped with a warning so a single bad route never disables the rest.
pub fn compile_routes<'a, I>(descriptors: I) -> Vec<RouteTemplate>
where
    I: IntoIterator<Item = &'a RouteDescriptor>,
{
    let mut out = Vec::new();
    for desc in descriptors {
        match RouteTemplate::compile(desc) {
            Ok(t) => out.push(t),
            Err(e) => {
                tracing::warn!(template = %desc.template, kind = e.kind(), error = %e, "skipping route template");
            }
        }
    }
    out
}
