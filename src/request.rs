use crate::params::Params;

/// The request side of a dispatch, as seen by the routing engine.
///
/// The engine reads the method and the effective path, writes captured params, and rewrites the
/// path and base path while a request travels through mounted routers. It restores those
/// values itself before moving on to the next layer of the router that rewrote them.
pub trait Request: Send + 'static {
	fn method(&self) -> &str;

	/// The path relative to the current mount point.
	fn path(&self) -> &str;

	fn set_path(&mut self, path: String);

	/// The prefix consumed by the mount points the request has passed through.
	fn base_path(&self) -> &str;

	fn set_base_path(&mut self, base_path: String);

	fn params(&self) -> &Params;

	fn set_params(&mut self, params: Params);

	/// Called with the declared path of a route right before its handlers run.
	fn set_route(&mut self, route: &str);
}

/// A plain in-memory request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleRequest {
	method: String,
	path: String,
	query: Option<String>,
	base_path: String,
	params: Params,
	route: Option<String>,
}

impl SimpleRequest {
	/// Creates a request for `target`; anything after a `?` is kept aside as the query string.
	pub fn new(method: impl Into<String>, target: &str) -> Self {
		let (path, query) = match target.split_once('?') {
			Some((path, query)) => (path, Some(query.to_owned())),
			None => (target, None),
		};

		Self {
			method: method.into(),
			path: path.to_owned(),
			query,
			..Self::default()
		}
	}

	pub fn query(&self) -> Option<&str> {
		self.query.as_deref()
	}

	/// The declared path of the last route this request was dispatched to.
	pub fn route(&self) -> Option<&str> {
		self.route.as_deref()
	}
}

impl Request for SimpleRequest {
	fn method(&self) -> &str {
		&self.method
	}

	fn path(&self) -> &str {
		&self.path
	}

	fn set_path(&mut self, path: String) {
		self.path = path;
	}

	fn base_path(&self) -> &str {
		&self.base_path
	}

	fn set_base_path(&mut self, base_path: String) {
		self.base_path = base_path;
	}

	fn params(&self) -> &Params {
		&self.params
	}

	fn set_params(&mut self, params: Params) {
		self.params = params;
	}

	fn set_route(&mut self, route: &str) {
		self.route = Some(route.to_owned());
	}
}

#[cfg(test)]
mod test {
	use super::{Request, SimpleRequest};

	#[test]
	fn splits_query() {
		let req = SimpleRequest::new("GET", "/search?q=rust");
		assert_eq!(req.path(), "/search");
		assert_eq!(req.query(), Some("q=rust"));
		assert_eq!(req.base_path(), "");
		assert!(req.params().is_empty());
	}
}
