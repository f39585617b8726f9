use thiserror::Error;

/// Errors raised while wiring up routers and routes.
///
/// These are always returned synchronously from registration calls; a failed call leaves the
/// stack it was registering into untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
	#[error("argument handler is required")]
	MissingHandler,

	#[error("invalid parameter name `{0}`")]
	InvalidParamName(String),

	#[error(transparent)]
	Pattern(#[from] PatternError),
}

/// A path pattern that cannot be compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
	#[error("pattern `{0}` must start with `/`")]
	MissingLeadingSlash(String),

	#[error("pattern `{0}` contains an empty segment")]
	EmptySegment(String),

	#[error("pattern `{0}` declares a parameter without a name")]
	UnnamedParam(String),

	#[error("pattern `{pattern}` has an invalid parameter name `{name}`")]
	InvalidParamName { pattern: String, name: String },

	#[error("pattern `{pattern}` declares parameter `{name}` more than once")]
	DuplicateParam { pattern: String, name: String },

	#[error("pattern `{0}` has a wildcard that is not the last segment")]
	WildcardNotLast(String),

	#[error("pattern `{pattern}` has unsupported character `{found}` in segment `{segment}`")]
	UnexpectedChar {
		pattern: String,
		segment: String,
		found: char,
	},
}

/// A captured path parameter that is not valid percent-encoded UTF-8.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to decode param `{name}` from `{value}`")]
pub struct DecodeError {
	pub name: String,
	pub value: String,
}

pub type Result<T> = std::result::Result<T, Error>;
