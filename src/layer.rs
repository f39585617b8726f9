use crate::dispatch::Next;
use crate::pattern::Pattern;
use crate::request::Request;
use crate::route::Route;
use crate::router::Router;
use anyhow::Error;
use std::{
	fmt::{self, Debug, Formatter},
	sync::Arc,
};

/// A handler for the normal dispatch path: `(req, res, next)`.
pub type RequestFn<Req, Res> = dyn Fn(Req, Res, Next<Req, Res>) + Send + Sync;

/// A handler that only runs while an error is pending: `(err, req, res, next)`.
pub type ErrorFn<Req, Res> = dyn Fn(Error, Req, Res, Next<Req, Res>) + Send + Sync;

/// Something that can be registered on a router or route.
pub enum Handler<Req, Res> {
	Request(Arc<RequestFn<Req, Res>>),
	Error(Arc<ErrorFn<Req, Res>>),
	Router(Router<Req, Res>),
}

impl<Req, Res> Handler<Req, Res> {
	pub fn request<F>(f: F) -> Self
	where
		F: Fn(Req, Res, Next<Req, Res>) + Send + Sync + 'static,
	{
		Handler::Request(Arc::new(f))
	}

	pub fn error<F>(f: F) -> Self
	where
		F: Fn(Error, Req, Res, Next<Req, Res>) + Send + Sync + 'static,
	{
		Handler::Error(Arc::new(f))
	}

	pub fn is_error_handler(&self) -> bool {
		matches!(self, Handler::Error(_))
	}
}

impl<Req, Res> Clone for Handler<Req, Res> {
	fn clone(&self) -> Self {
		match self {
			Handler::Request(f) => Handler::Request(Arc::clone(f)),
			Handler::Error(f) => Handler::Error(Arc::clone(f)),
			Handler::Router(router) => Handler::Router(router.clone()),
		}
	}
}

impl<Req, Res> Debug for Handler<Req, Res> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Handler::Request(_) => f.write_str("Handler::Request"),
			Handler::Error(_) => f.write_str("Handler::Error"),
			Handler::Router(router) => f.debug_tuple("Handler::Router").field(router).finish(),
		}
	}
}

impl<Req, Res> From<Router<Req, Res>> for Handler<Req, Res> {
	fn from(router: Router<Req, Res>) -> Self {
		Handler::Router(router)
	}
}

/// A flat, ordered list of handlers for a single registration call.
///
/// Nested lists are flattened when converted, so `vec![a.into(), vec![b, c].into()]` registers
/// `a`, `b` and `c` in that order.
pub struct Handlers<Req, Res>(Vec<Handler<Req, Res>>);

impl<Req, Res> Handlers<Req, Res> {
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub(crate) fn require(self) -> crate::Result<Vec<Handler<Req, Res>>> {
		if self.0.is_empty() {
			return Err(crate::Error::MissingHandler);
		}
		Ok(self.0)
	}
}

impl<Req, Res> Debug for Handlers<Req, Res> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

impl<Req, Res> From<Handler<Req, Res>> for Handlers<Req, Res> {
	fn from(handler: Handler<Req, Res>) -> Self {
		Handlers(vec![handler])
	}
}

impl<Req, Res> From<Router<Req, Res>> for Handlers<Req, Res> {
	fn from(router: Router<Req, Res>) -> Self {
		Handlers(vec![Handler::Router(router)])
	}
}

impl<Req, Res> From<Vec<Handler<Req, Res>>> for Handlers<Req, Res> {
	fn from(handlers: Vec<Handler<Req, Res>>) -> Self {
		Handlers(handlers)
	}
}

impl<Req, Res, const N: usize> From<[Handler<Req, Res>; N]> for Handlers<Req, Res> {
	fn from(handlers: [Handler<Req, Res>; N]) -> Self {
		Handlers(handlers.into_iter().collect())
	}
}

impl<Req, Res> From<Vec<Handlers<Req, Res>>> for Handlers<Req, Res> {
	fn from(lists: Vec<Handlers<Req, Res>>) -> Self {
		Handlers(lists.into_iter().flat_map(|list| list.0).collect())
	}
}

impl<Req, Res> FromIterator<Handler<Req, Res>> for Handlers<Req, Res> {
	fn from_iter<I: IntoIterator<Item = Handler<Req, Res>>>(iter: I) -> Self {
		Handlers(iter.into_iter().collect())
	}
}

pub(crate) enum Target<Req, Res> {
	Request(Arc<RequestFn<Req, Res>>),
	Error(Arc<ErrorFn<Req, Res>>),
	Route(Arc<Route<Req, Res>>),
	Router(Router<Req, Res>),
}

/// One entry of a router's or route's stack.
pub struct Layer<Req, Res> {
	pattern: Pattern,
	method: Option<String>,
	target: Target<Req, Res>,
}

impl<Req, Res> Layer<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	pub(crate) fn new(pattern: Pattern, handler: Handler<Req, Res>) -> Self {
		let target = match handler {
			Handler::Request(f) => Target::Request(f),
			Handler::Error(f) => Target::Error(f),
			Handler::Router(router) => Target::Router(router),
		};

		Self {
			pattern,
			method: None,
			target,
		}
	}

	pub(crate) fn for_route(pattern: Pattern, route: Arc<Route<Req, Res>>) -> Self {
		Self {
			pattern,
			method: None,
			target: Target::Route(route),
		}
	}

	pub(crate) fn with_method(mut self, method: Option<String>) -> Self {
		self.method = method;
		self
	}

	pub fn pattern(&self) -> &Pattern {
		&self.pattern
	}

	/// The lower-case method this layer is restricted to, if any.
	pub fn method(&self) -> Option<&str> {
		self.method.as_deref()
	}

	pub fn route(&self) -> Option<&Arc<Route<Req, Res>>> {
		match &self.target {
			Target::Route(route) => Some(route),
			_ => None,
		}
	}

	pub fn router(&self) -> Option<&Router<Req, Res>> {
		match &self.target {
			Target::Router(router) => Some(router),
			_ => None,
		}
	}

	pub fn is_error_handler(&self) -> bool {
		matches!(self.target, Target::Error(_))
	}

	/// Runs this layer on the normal path. Error-only handlers pass straight through.
	pub fn handle_request(&self, req: Req, res: Res, next: Next<Req, Res>) {
		match &self.target {
			Target::Request(f) => f(req, res, next),
			Target::Error(_) => next.run(req, res),
			Target::Route(route) => route.dispatch(req, res, next),
			Target::Router(router) => router.handle(req, res, next),
		}
	}

	/// Runs this layer with a pending error. Anything but an error handler forwards it.
	pub fn handle_error(&self, err: Error, req: Req, res: Res, next: Next<Req, Res>) {
		match &self.target {
			Target::Error(f) => f(err, req, res, next),
			_ => next.fail(err, req, res),
		}
	}
}

impl<Req, Res> Debug for Layer<Req, Res> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let target = match &self.target {
			Target::Request(_) => "request",
			Target::Error(_) => "error",
			Target::Route(_) => "route",
			Target::Router(_) => "router",
		};

		f.debug_struct("Layer")
			.field("path", &self.pattern.path())
			.field("method", &self.method)
			.field("target", &target)
			.finish()
	}
}

#[cfg(test)]
mod test {
	use super::{Handler, Handlers, Layer};
	use crate::{Next, Pattern, SimpleRequest};
	use std::sync::{Arc, Mutex};

	type Log = Arc<Mutex<Vec<String>>>;

	fn record(log: &Log, entry: &str) -> Next<SimpleRequest, Log> {
		let entry = entry.to_owned();
		let log = Arc::clone(log);
		Next::new(move |_req, _res, err: Option<anyhow::Error>| {
			let suffix = err.map(|e| format!(":{}", e)).unwrap_or_default();
			log.lock().unwrap().push(format!("{}{}", entry, suffix));
		})
	}

	fn log() -> Log {
		Arc::new(Mutex::new(Vec::new()))
	}

	#[test]
	fn error_handlers_pass_through_on_the_normal_path() {
		let log = log();
		let layer = Layer::new(
			Pattern::universal(),
			Handler::error(|_err, _req: SimpleRequest, res: Log, _next| {
				res.lock().unwrap().push("handler".into())
			}),
		);

		layer.handle_request(SimpleRequest::new("GET", "/"), Arc::clone(&log), record(&log, "next"));
		assert_eq!(*log.lock().unwrap(), vec!["next"]);
	}

	#[test]
	fn request_handlers_forward_errors() {
		let log = log();
		let layer = Layer::new(
			Pattern::universal(),
			Handler::request(|_req: SimpleRequest, res: Log, _next| {
				res.lock().unwrap().push("handler".into())
			}),
		);

		layer.handle_error(
			anyhow::anyhow!("boom"),
			SimpleRequest::new("GET", "/"),
			Arc::clone(&log),
			record(&log, "next"),
		);
		assert_eq!(*log.lock().unwrap(), vec!["next:boom"]);
	}

	#[test]
	fn nested_lists_flatten_in_order() {
		let a: Handler<SimpleRequest, Log> =
			Handler::request(|req: SimpleRequest, res: Log, next: Next<SimpleRequest, Log>| {
				next.run(req, res)
			});
		let b: Handler<SimpleRequest, Log> = Handler::error(
			|err, req: SimpleRequest, res: Log, next: Next<SimpleRequest, Log>| next.fail(err, req, res),
		);
		let nested: Handlers<SimpleRequest, Log> = vec![
			Handlers::from(a.clone()),
			Handlers::from(vec![a, b]),
		]
		.into();

		assert_eq!(nested.len(), 3);
		assert!(nested.require().unwrap()[2].is_error_handler());
	}

	#[test]
	fn empty_lists_are_rejected() {
		let empty: Handlers<SimpleRequest, Log> = Vec::<Handler<_, _>>::new().into();
		assert_eq!(empty.require().unwrap_err(), crate::Error::MissingHandler);
	}
}
