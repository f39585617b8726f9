use crate::error::{DecodeError, PatternError};
use crate::params::Params;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// Compilation flags for a [`Pattern`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
	/// Compare literal segments case-sensitively.
	pub case_sensitive: bool,
	/// Require the trailing slash of the request path to agree with the pattern's.
	pub strict: bool,
	/// Require the pattern to consume the whole path. When `false` the pattern matches a prefix
	/// of whole segments and reports the rest as the remainder.
	pub end: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
	Static(String),
	Dynamic { name: String, optional: bool },
	Wildcard(String),
}

impl PathSegment {
	pub fn name(&self) -> Option<&str> {
		match self {
			PathSegment::Static(_) => None,
			PathSegment::Dynamic { name, .. } | PathSegment::Wildcard(name) => Some(name.as_str()),
		}
	}
}

/// The outcome of a successful [`Pattern::matches`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
	pub params: Params,
	/// The part of the path the pattern consumed.
	pub consumed: String,
	/// The unconsumed suffix, always starting with `/`. Empty for whole-path patterns.
	pub remainder: String,
}

/// A compiled path pattern.
///
/// ```text
/// /users/:id          named parameter
/// /users/:id?         optional named parameter
/// /files/*path        named catch-all, must be last
/// /files/*            positional catch-all, captured as "0"
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
	spec: String,
	segments: Vec<PathSegment>,
	trailing_slash: bool,
	universal: bool,
	options: PatternOptions,
}

impl Pattern {
	/// The pattern used by method-less middleware: matches every path and consumes nothing.
	pub fn universal() -> Self {
		Self {
			spec: "/".to_owned(),
			segments: Vec::new(),
			trailing_slash: false,
			universal: true,
			options: PatternOptions::default(),
		}
	}

	pub fn compile(spec: &str, options: PatternOptions) -> Result<Self, PatternError> {
		let tail = spec
			.strip_prefix('/')
			.ok_or_else(|| PatternError::MissingLeadingSlash(spec.to_owned()))?;

		if tail.is_empty() && !options.end {
			return Ok(Self {
				options,
				..Self::universal()
			});
		}

		let trailing_slash = tail.ends_with('/');
		let body = if trailing_slash {
			&tail[..tail.len() - 1]
		} else {
			tail
		};

		if trailing_slash && body.is_empty() {
			return Err(PatternError::EmptySegment(spec.to_owned()));
		}

		let mut segments: Vec<PathSegment> = Vec::new();
		if !body.is_empty() {
			for raw in body.split('/') {
				if let Some(PathSegment::Wildcard(_)) = segments.last() {
					return Err(PatternError::WildcardNotLast(spec.to_owned()));
				}

				let segment = parse_segment(spec, raw)?;
				if let Some(name) = segment.name() {
					if segments.iter().any(|seen| seen.name() == Some(name)) {
						return Err(PatternError::DuplicateParam {
							pattern: spec.to_owned(),
							name: name.to_owned(),
						});
					}
				}
				segments.push(segment);
			}
		}

		Ok(Self {
			spec: spec.to_owned(),
			segments,
			trailing_slash,
			universal: false,
			options,
		})
	}

	pub fn path(&self) -> &str {
		&self.spec
	}

	pub fn options(&self) -> PatternOptions {
		self.options
	}

	pub fn is_universal(&self) -> bool {
		self.universal
	}

	pub fn segments(&self) -> &[PathSegment] {
		&self.segments
	}

	/// Names of the parameters this pattern captures, in path order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.segments.iter().filter_map(PathSegment::name)
	}

	/// Tests `path` against this pattern.
	///
	/// Returns `Ok(None)` when the path does not match, and an error when it matches but a
	/// captured value is not valid percent-encoded UTF-8.
	pub fn matches(&self, path: &str) -> Result<Option<Match>, DecodeError> {
		if self.universal {
			return Ok(Some(Match {
				params: Params::new(),
				consumed: String::new(),
				remainder: path.to_owned(),
			}));
		}

		let tail = match path.strip_prefix('/') {
			Some(tail) => tail,
			None => return Ok(None),
		};

		let trailing_slash = tail.ends_with('/');
		if self.options.end && self.options.strict && trailing_slash != self.trailing_slash {
			return Ok(None);
		}

		let body = if trailing_slash {
			&tail[..tail.len() - 1]
		} else {
			tail
		};
		let segments: Vec<&str> = if body.is_empty() {
			Vec::new()
		} else {
			body.split('/').collect()
		};

		let mut captures = Vec::new();
		let matched = match self.match_segments(0, &segments, 0, &mut captures) {
			Some(matched) => matched,
			None => return Ok(None),
		};

		let mut params = Params::new();
		for (name, raw) in captures {
			params.insert(name, decode(name, &raw)?);
		}

		if self.options.end {
			return Ok(Some(Match {
				params,
				consumed: path.to_owned(),
				remainder: String::new(),
			}));
		}

		// leading slash, the matched segments, and the separators between them
		let consumed_len = match matched {
			0 => 0,
			n => 1 + segments[..n].iter().map(|s| s.len()).sum::<usize>() + (n - 1),
		};

		if self.options.strict && self.trailing_slash && path.len() <= consumed_len {
			return Ok(None);
		}

		let (consumed, rest) = path.split_at(consumed_len);
		let remainder = if rest.is_empty() { "/" } else { rest };

		Ok(Some(Match {
			params,
			consumed: consumed.to_owned(),
			remainder: remainder.to_owned(),
		}))
	}

	/// Matches `self.segments[index..]` against `segments[at..]`, returning how many request
	/// segments were consumed in total.
	///
	/// Optional params try to take a segment first and are skipped if the rest of the pattern
	/// then fails. `captures` is left as it was whenever `None` is returned.
	fn match_segments<'p>(
		&'p self,
		index: usize,
		segments: &[&str],
		at: usize,
		captures: &mut Vec<(&'p str, String)>,
	) -> Option<usize> {
		let segment = match self.segments.get(index) {
			Some(segment) => segment,
			None if self.options.end && at != segments.len() => return None,
			None => return Some(at),
		};

		match segment {
			PathSegment::Static(literal) => match segments.get(at) {
				Some(value) if self.literal_eq(literal, value) => {
					self.match_segments(index + 1, segments, at + 1, captures)
				}
				_ => None,
			},
			PathSegment::Dynamic { name, optional } => {
				if let Some(value) = segments.get(at).filter(|value| !value.is_empty()) {
					captures.push((name.as_str(), (*value).to_owned()));
					if let Some(matched) = self.match_segments(index + 1, segments, at + 1, captures) {
						return Some(matched);
					}
					captures.pop();
				}

				if *optional {
					self.match_segments(index + 1, segments, at, captures)
				} else {
					None
				}
			}
			PathSegment::Wildcard(name) => {
				let rest = segments
					.get(at..)
					.map(|rest| rest.join("/"))
					.unwrap_or_default();
				captures.push((name.as_str(), rest));
				Some(segments.len())
			}
		}
	}

	fn literal_eq(&self, literal: &str, value: &str) -> bool {
		if self.options.case_sensitive {
			literal == value
		} else {
			literal
				.chars()
				.flat_map(char::to_lowercase)
				.eq(value.chars().flat_map(char::to_lowercase))
		}
	}
}

fn parse_segment(spec: &str, raw: &str) -> Result<PathSegment, PatternError> {
	if raw.is_empty() {
		return Err(PatternError::EmptySegment(spec.to_owned()));
	}

	if let Some(name) = raw.strip_prefix(':') {
		let (name, optional) = match name.strip_suffix('?') {
			Some(name) => (name, true),
			None => (name, false),
		};

		return Ok(PathSegment::Dynamic {
			name: param_name(spec, name)?,
			optional,
		});
	}

	if let Some(name) = raw.strip_prefix('*') {
		let name = if name.is_empty() {
			"0".to_owned()
		} else {
			param_name(spec, name)?
		};
		return Ok(PathSegment::Wildcard(name));
	}

	if let Some(found) = raw.chars().find(|c| matches!(c, '(' | ')' | '*')) {
		return Err(PatternError::UnexpectedChar {
			pattern: spec.to_owned(),
			segment: raw.to_owned(),
			found,
		});
	}

	Ok(PathSegment::Static(raw.to_owned()))
}

fn param_name(spec: &str, name: &str) -> Result<String, PatternError> {
	if name.is_empty() {
		return Err(PatternError::UnnamedParam(spec.to_owned()));
	}

	if !is_param_name(name) {
		return Err(PatternError::InvalidParamName {
			pattern: spec.to_owned(),
			name: name.to_owned(),
		});
	}

	Ok(name.to_owned())
}

pub(crate) fn is_param_name(name: &str) -> bool {
	!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn decode(name: &str, value: &str) -> Result<String, DecodeError> {
	percent_decode_str(value)
		.decode_utf8()
		.map(Cow::into_owned)
		.map_err(|_| DecodeError {
			name: name.to_owned(),
			value: value.to_owned(),
		})
}
