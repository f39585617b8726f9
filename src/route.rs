use crate::dispatch::{Dispatch, Next, Stack};
use crate::layer::{Handlers, Layer};
use crate::pattern::Pattern;
use crate::request::Request;
use crate::scheduler::{Scheduler, Trampoline};
use anyhow::Error;
use std::{
	collections::BTreeSet,
	fmt::{self, Debug, Formatter},
	sync::Arc,
};
use tracing::debug;

/// Registry marker for handlers registered with [`Route::all`].
const ALL: &str = "_all";

/// A single declared path and the method-specific handlers bound to it.
///
/// Handlers run in registration order. A `HEAD` request uses the `GET` handlers unless a `HEAD`
/// handler was registered; [`Route::all`] handlers run for every method.
pub struct Route<Req, Res> {
	path: String,
	stack: Vec<Layer<Req, Res>>,
	methods: BTreeSet<String>,
	scheduler: Arc<dyn Scheduler>,
}

impl<Req, Res> Route<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			stack: Vec::new(),
			methods: BTreeSet::new(),
			scheduler: Arc::new(Trampoline),
		}
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn layers(&self) -> &[Layer<Req, Res>] {
		&self.stack
	}

	/// Replaces the scheduler used when a long synchronous chain has to be deferred.
	///
	/// Routes created through a [`RouterBuilder`](crate::RouterBuilder) get the router's
	/// scheduler when it is built.
	pub fn set_scheduler(&mut self, scheduler: Arc<dyn Scheduler>) -> &mut Self {
		self.scheduler = scheduler;
		self
	}

	pub fn handles_method(&self, method: &str) -> bool {
		if self.methods.contains(ALL) {
			return true;
		}

		let method = method.to_ascii_lowercase();
		if method == "head" && !self.methods.contains("head") {
			return self.methods.contains("get");
		}

		self.methods.contains(&method)
	}

	/// Methods with dedicated handlers on this route, in lower case. `head` is listed whenever
	/// `get` is, since it falls back to it.
	pub fn methods(&self) -> Vec<String> {
		let mut methods: BTreeSet<String> = self
			.methods
			.iter()
			.filter(|method| *method != ALL)
			.cloned()
			.collect();

		if methods.contains("get") {
			methods.insert("head".to_owned());
		}

		methods.into_iter().collect()
	}

	/// Appends handlers that run for every method.
	pub fn all<H>(&mut self, handlers: H) -> crate::Result<&mut Self>
	where
		H: Into<Handlers<Req, Res>>,
	{
		self.push(None, handlers.into())
	}

	/// Appends handlers for `method`, which need not be one of the [`METHODS`](crate::METHODS).
	pub fn method<H>(&mut self, method: &str, handlers: H) -> crate::Result<&mut Self>
	where
		H: Into<Handlers<Req, Res>>,
	{
		self.push(Some(method.to_ascii_lowercase()), handlers.into())
	}

	fn push(&mut self, method: Option<String>, handlers: Handlers<Req, Res>) -> crate::Result<&mut Self> {
		let handlers = handlers.require()?;
		debug!(
			path = %self.path,
			method = method.as_deref().unwrap_or("*"),
			handlers = handlers.len(),
			"registering route handlers"
		);

		for handler in handlers {
			self.stack
				.push(Layer::new(Pattern::universal(), handler).with_method(method.clone()));
		}
		self.methods
			.insert(method.unwrap_or_else(|| ALL.to_owned()));

		Ok(self)
	}

	/// Runs the handlers matching the request's method, then `done`.
	pub fn dispatch(self: &Arc<Self>, mut req: Req, res: Res, done: Next<Req, Res>) {
		if self.stack.is_empty() {
			return done.run(req, res);
		}

		let mut method = req.method().to_ascii_lowercase();
		if method == "head" && !self.methods.contains("head") {
			method = "get".to_owned();
		}

		req.set_route(&self.path);
		Dispatch::start(Arc::clone(self), Arc::from(method), req, res, done);
	}
}

impl<Req, Res> Stack<Req, Res> for Route<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	type Frame = Arc<str>;

	fn layers(&self) -> &[Layer<Req, Res>] {
		&self.stack
	}

	fn scheduler(&self) -> &Arc<dyn Scheduler> {
		&self.scheduler
	}

	fn enter(&self, method: &Arc<str>, layer: &Layer<Req, Res>, _req: &mut Req) -> Result<bool, Error> {
		Ok(layer.method().map_or(true, |m| m == &**method))
	}
}

impl<Req, Res> Debug for Route<Req, Res> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Route")
			.field("path", &self.path)
			.field("stack", &self.stack)
			.field("methods", &self.methods)
			.finish()
	}
}

macro_rules! route_methods {
	($($name:ident => $method:literal),* $(,)?) => {
		impl<Req, Res> Route<Req, Res>
		where
			Req: Request,
			Res: Send + 'static,
		{
			$(
				#[doc = concat!("Appends handlers that run for `", $method, "` requests.")]
				pub fn $name<H>(&mut self, handlers: H) -> crate::Result<&mut Self>
				where
					H: Into<Handlers<Req, Res>>,
				{
					self.method($method, handlers)
				}
			)*
		}
	};
}

for_each_method!(route_methods);

#[cfg(test)]
mod test {
	use super::Route;
	use crate::testing::{
		done, entries, fail, finish, inspect, log, nested, recover, step, Counting, Log,
	};
	use crate::{Error, Handler, SimpleRequest, MAX_SYNC_STACK};
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	};

	fn run(route: &Arc<Route<SimpleRequest, Log>>, method: &str) -> Vec<String> {
		let log = log();
		route.dispatch(SimpleRequest::new(method, "/a"), Arc::clone(&log), done(&log));
		entries(&log)
	}

	#[test]
	fn runs_method_handlers_then_all_handlers_in_order() {
		let mut route = Route::new("/a");
		route.get(step("h1")).unwrap().all(step("h2")).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "GET"), vec!["h1", "h2", "done"]);
		assert_eq!(run(&route, "POST"), vec!["h2", "done"]);
	}

	#[test]
	fn method_matching_ignores_case() {
		let mut route = Route::new("/a");
		route.method("PATCH", step("patch")).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "patch"), vec!["patch", "done"]);
		assert_eq!(run(&route, "Patch"), vec!["patch", "done"]);
	}

	#[test]
	fn head_falls_back_to_get() {
		let mut route = Route::new("/a");
		route.get(step("get")).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "HEAD"), vec!["get", "done"]);
		assert!(route.handles_method("HEAD"));
		assert_eq!(route.methods(), vec!["get", "head"]);
	}

	#[test]
	fn explicit_head_never_falls_back() {
		let mut route = Route::new("/a");
		route.get(step("get")).unwrap().head(step("head")).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "HEAD"), vec!["head", "done"]);
		assert_eq!(run(&route, "GET"), vec!["get", "done"]);
	}

	#[test]
	fn all_handlers_match_methods_registered_later() {
		let mut route = Route::new("/a");
		route.all(step("all")).unwrap().put(step("put")).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "PUT"), vec!["all", "put", "done"]);
		assert_eq!(run(&route, "PURGE"), vec!["all", "done"]);
		assert!(route.handles_method("unknown"));
	}

	#[test]
	fn empty_route_calls_done() {
		let route: Arc<Route<SimpleRequest, Log>> = Arc::new(Route::new("/a"));
		assert_eq!(run(&route, "GET"), vec!["done"]);
	}

	#[test]
	fn no_matching_method_calls_done() {
		let mut route = Route::new("/a");
		route.post(step("post")).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "GET"), vec!["done"]);
	}

	#[test]
	fn handler_may_end_the_request() {
		let mut route = Route::new("/a");
		route
			.get(vec![step("first"), finish("second"), step("third")])
			.unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "GET"), vec!["first", "second"]);
	}

	#[test]
	fn errors_skip_to_the_next_error_handler() {
		let mut route = Route::new("/a");
		route
			.get(vec![fail("fails", "boom"), step("skipped"), recover("recover"), step("after")])
			.unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "GET"), vec!["fails", "recover:boom", "after", "done"]);
	}

	#[test]
	fn error_handlers_do_not_run_without_an_error() {
		let mut route = Route::new("/a");
		route.get(vec![recover("recover"), step("after")]).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "GET"), vec!["after", "done"]);
	}

	#[test]
	fn unhandled_errors_reach_done() {
		let mut route = Route::new("/a");
		route.get(vec![fail("fails", "boom"), step("skipped")]).unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "GET"), vec!["fails", "done:boom"]);
	}

	#[test]
	fn records_route_on_request() {
		let mut route = Route::new("/users/:id");
		route
			.get(Handler::request(|req: SimpleRequest, res: Log, _next| {
				res.lock()
					.unwrap()
					.push(req.route().unwrap_or_default().to_owned());
			}))
			.unwrap();
		let route = Arc::new(route);

		assert_eq!(run(&route, "GET"), vec!["/users/:id"]);
	}

	#[test]
	fn registering_nothing_leaves_route_untouched() {
		let mut route: Route<SimpleRequest, Log> = Route::new("/a");
		let err = route.get(Vec::<Handler<_, _>>::new()).unwrap_err();
		assert_eq!(err, Error::MissingHandler);
		assert!(route.all(Vec::<Handler<_, _>>::new()).is_err());

		assert!(route.layers().is_empty());
		assert!(!route.handles_method("GET"));
		assert!(route.methods().is_empty());
	}

	#[test]
	fn long_synchronous_chains_are_deferred() {
		let counting = Arc::new(Counting::default());
		let active = Arc::new(AtomicUsize::new(0));
		let deepest = Arc::new(AtomicUsize::new(0));

		let mut route = Route::new("/a");
		route.set_scheduler(counting.clone());
		let handlers: Vec<_> = (0..250).map(|_| nested(&active, &deepest)).collect();
		route.all(handlers).unwrap();
		route.all(inspect("last")).unwrap();
		let route = Arc::new(route);

		let log = run(&route, "GET");
		assert_eq!(log.len(), 2);
		assert_eq!(log[1], "done");
		assert_eq!(counting.deferred.load(Ordering::SeqCst), 2);
		assert_eq!(deepest.load(Ordering::SeqCst), MAX_SYNC_STACK);
		assert_eq!(active.load(Ordering::SeqCst), 0);
	}
}
