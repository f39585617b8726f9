use crate::dispatch::{Dispatch, Next, Stack};
use crate::error::Error;
use crate::layer::{Handlers, Layer};
use crate::params::Params;
use crate::pattern::{is_param_name, Pattern, PatternOptions};
use crate::request::Request;
use crate::route::Route;
use crate::scheduler::{Scheduler, Trampoline};
use std::{
	collections::{HashMap, VecDeque},
	fmt::{self, Debug, Formatter},
	sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, trace};

/// A callback run before any layer whose pattern declares the parameter it was registered for:
/// `(req, res, next, value)`.
pub type ParamFn<Req, Res> = dyn Fn(Req, Res, Next<Req, Res>, String) + Send + Sync;

/// Router-wide matching and parameter policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
	/// Compare literal path segments case-sensitively.
	pub case_sensitive: bool,
	/// Treat `/foo` and `/foo/` as different routes.
	pub strict: bool,
	/// Let a mounted router see the params its parent captured. The child's own captures win.
	pub merge_params: bool,
}

enum Entry<Req, Res> {
	Layer(Layer<Req, Res>),
	Route(usize),
}

/// Collects middleware, routes, mounted routers and param callbacks, then freezes them into a
/// [`Router`].
///
/// Every registration call either registers all of its handlers or returns an error and
/// registers nothing.
pub struct RouterBuilder<Req, Res> {
	options: RouterOptions,
	entries: Vec<Entry<Req, Res>>,
	routes: Vec<(Pattern, Route<Req, Res>)>,
	params: HashMap<String, Vec<Arc<ParamFn<Req, Res>>>>,
	scheduler: Option<Arc<dyn Scheduler>>,
}

impl<Req, Res> Default for RouterBuilder<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	fn default() -> Self {
		Self::new(RouterOptions::default())
	}
}

impl<Req, Res> RouterBuilder<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	pub fn new(options: RouterOptions) -> Self {
		Self {
			options,
			entries: Vec::new(),
			routes: Vec::new(),
			params: HashMap::new(),
			scheduler: None,
		}
	}

	/// Sets the scheduler that long synchronous chains are deferred to. Defaults to the
	/// [`Trampoline`].
	pub fn scheduler(&mut self, scheduler: Arc<dyn Scheduler>) -> &mut Self {
		self.scheduler = Some(scheduler);
		self
	}

	/// Appends handlers that run for every request reaching this router.
	pub fn middleware<H>(&mut self, handlers: H) -> crate::Result<&mut Self>
	where
		H: Into<Handlers<Req, Res>>,
	{
		self.mount("/", handlers)
	}

	/// Appends handlers that run for every path starting with the whole segments of `path`.
	///
	/// Beneath the mount point the request's path is the unmatched remainder and the matched
	/// prefix is appended to its base path. Routers mount the same way as plain handlers.
	pub fn mount<H>(&mut self, path: &str, handlers: H) -> crate::Result<&mut Self>
	where
		H: Into<Handlers<Req, Res>>,
	{
		let handlers: Handlers<Req, Res> = handlers.into();
		let handlers = handlers.require()?;
		let pattern = Pattern::compile(
			path,
			PatternOptions {
				case_sensitive: self.options.case_sensitive,
				strict: false,
				end: false,
			},
		)?;

		debug!(path, handlers = handlers.len(), "mounting handlers");
		for handler in handlers {
			self.entries
				.push(Entry::Layer(Layer::new(pattern.clone(), handler)));
		}

		Ok(self)
	}

	/// Appends a route for `path` and returns it for per-method registration.
	pub fn route(&mut self, path: &str) -> crate::Result<&mut Route<Req, Res>> {
		let pattern = Pattern::compile(
			path,
			PatternOptions {
				case_sensitive: self.options.case_sensitive,
				strict: self.options.strict,
				end: true,
			},
		)?;

		debug!(path, "adding route");
		let index = self.routes.len();
		self.routes.push((pattern, Route::new(path)));
		self.entries.push(Entry::Route(index));

		Ok(&mut self.routes[index].1)
	}

	/// Adds a route for `path` with `handlers` bound to `method`.
	pub fn register<H>(&mut self, method: &str, path: &str, handlers: H) -> crate::Result<&mut Self>
	where
		H: Into<Handlers<Req, Res>>,
	{
		let handlers: Handlers<Req, Res> = handlers.into();
		let handlers = Handlers::from(handlers.require()?);
		self.route(path)?.method(method, handlers)?;
		Ok(self)
	}

	/// Adds a route for `path` with `handlers` bound to every method.
	pub fn all<H>(&mut self, path: &str, handlers: H) -> crate::Result<&mut Self>
	where
		H: Into<Handlers<Req, Res>>,
	{
		let handlers: Handlers<Req, Res> = handlers.into();
		let handlers = Handlers::from(handlers.require()?);
		self.route(path)?.all(handlers)?;
		Ok(self)
	}

	/// Registers a callback for the route parameter `name`.
	///
	/// Callbacks run in registration order before the first handler of any matching layer
	/// whose pattern declares `name`. Within one pass through this router they run once per
	/// distinct value; a callback that fails skips the layer and continues with its error.
	pub fn param<F>(&mut self, name: &str, callback: F) -> crate::Result<&mut Self>
	where
		F: Fn(Req, Res, Next<Req, Res>, String) + Send + Sync + 'static,
	{
		if !is_param_name(name) {
			return Err(Error::InvalidParamName(name.to_owned()));
		}

		self.params
			.entry(name.to_owned())
			.or_default()
			.push(Arc::new(callback));
		Ok(self)
	}

	pub fn build(self) -> Router<Req, Res> {
		let scheduler = self
			.scheduler
			.unwrap_or_else(|| Arc::new(Trampoline));

		let mut routes: Vec<Option<(Pattern, Route<Req, Res>)>> =
			self.routes.into_iter().map(Some).collect();

		let stack = self
			.entries
			.into_iter()
			.filter_map(|entry| match entry {
				Entry::Layer(layer) => Some(layer),
				Entry::Route(index) => routes.get_mut(index).and_then(Option::take).map(
					|(pattern, mut route)| {
						route.set_scheduler(Arc::clone(&scheduler));
						Layer::for_route(pattern, Arc::new(route))
					},
				),
			})
			.collect();

		Router {
			inner: Arc::new(RouterInner {
				options: self.options,
				stack,
				params: self.params,
				scheduler,
			}),
		}
	}
}

impl<Req, Res> Debug for RouterBuilder<Req, Res> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut params: Vec<&String> = self.params.keys().collect();
		params.sort();

		f.debug_struct("RouterBuilder")
			.field("options", &self.options)
			.field("layers", &self.entries.len())
			.field("routes", &self.routes)
			.field("params", &params)
			.finish()
	}
}

macro_rules! router_methods {
	($($name:ident => $method:literal),* $(,)?) => {
		impl<Req, Res> RouterBuilder<Req, Res>
		where
			Req: Request,
			Res: Send + 'static,
		{
			$(
				#[doc = concat!("Adds a route for `path` with `handlers` bound to `", $method, "`.")]
				pub fn $name<H>(&mut self, path: &str, handlers: H) -> crate::Result<&mut Self>
				where
					H: Into<Handlers<Req, Res>>,
				{
					self.register($method, path, handlers)
				}
			)*
		}
	};
}

for_each_method!(router_methods);

struct RouterInner<Req, Res> {
	options: RouterOptions,
	stack: Vec<Layer<Req, Res>>,
	params: HashMap<String, Vec<Arc<ParamFn<Req, Res>>>>,
	scheduler: Arc<dyn Scheduler>,
}

/// A frozen stack of layers. Cheap to clone; clones share the same layers.
pub struct Router<Req, Res> {
	inner: Arc<RouterInner<Req, Res>>,
}

impl<Req, Res> Clone for Router<Req, Res> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<Req, Res> Router<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	pub fn builder() -> RouterBuilder<Req, Res> {
		RouterBuilder::default()
	}

	pub fn options(&self) -> RouterOptions {
		self.inner.options
	}

	pub fn layers(&self) -> &[Layer<Req, Res>] {
		&self.inner.stack
	}

	/// Dispatches a request through the stack.
	///
	/// `done` is called once the stack is exhausted, with the error if one is still pending,
	/// unless a handler ends the request first. The request's path, base path and params are
	/// back to their values on entry by the time `done` runs.
	pub fn handle(&self, req: Req, res: Res, done: Next<Req, Res>) {
		trace!(
			method = req.method(),
			path = req.path(),
			base_path = req.base_path(),
			"dispatching request"
		);

		let scope = Arc::new(Scope {
			method: req.method().to_ascii_lowercase(),
			path: req.path().to_owned(),
			base_path: req.base_path().to_owned(),
			params: req.params().clone(),
			called: Mutex::default(),
		});

		Dispatch::start(Arc::clone(&self.inner), scope, req, res, done);
	}

	/// A request handler that dispatches through this router.
	pub fn handler(&self) -> impl Fn(Req, Res, Next<Req, Res>) + Clone + Send + Sync + 'static {
		let router = self.clone();
		move |req, res, next| router.handle(req, res, next)
	}
}

impl<Req, Res> Debug for Router<Req, Res> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut params: Vec<&String> = self.inner.params.keys().collect();
		params.sort();

		f.debug_struct("Router")
			.field("options", &self.inner.options)
			.field("stack", &self.inner.stack)
			.field("params", &params)
			.finish()
	}
}

/// The view of a request as it entered the router.
struct Scope {
	method: String,
	path: String,
	base_path: String,
	params: Params,
	/// Param values whose callbacks have completed, by name.
	called: Mutex<HashMap<String, String>>,
}

struct ParamCall<Req, Res> {
	name: String,
	value: String,
	callback: Arc<ParamFn<Req, Res>>,
}

impl<Req, Res> RouterInner<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	fn param_calls(&self, scope: &Scope, layer: &Layer<Req, Res>, req: &Req) -> VecDeque<ParamCall<Req, Res>> {
		let called = scope.called.lock().unwrap_or_else(PoisonError::into_inner);
		let mut calls = VecDeque::new();

		for name in layer.pattern().keys() {
			let (callbacks, value) = match (self.params.get(name), req.params().get(name)) {
				(Some(callbacks), Some(value)) => (callbacks, value),
				_ => continue,
			};

			if called.get(name).map(String::as_str) == Some(value) {
				continue;
			}

			calls.extend(callbacks.iter().map(|callback| ParamCall {
				name: name.to_owned(),
				value: value.to_owned(),
				callback: Arc::clone(callback),
			}));
		}

		calls
	}

	fn run_params(
		self: Arc<Self>,
		scope: Arc<Scope>,
		index: usize,
		mut calls: VecDeque<ParamCall<Req, Res>>,
		req: Req,
		res: Res,
		next: Next<Req, Res>,
	) {
		let call = match calls.pop_front() {
			Some(call) => call,
			None => {
				return match self.stack.get(index) {
					Some(layer) => layer.handle_request(req, res, next),
					None => next.run(req, res),
				};
			}
		};

		let last_for_name = calls.front().map_or(true, |following| following.name != call.name);
		let ParamCall {
			name,
			value,
			callback,
		} = call;

		let argument = value.clone();
		callback(
			req,
			res,
			Next::new(move |req, res, err| match err {
				Some(err) => next.fail(err, req, res),
				None => {
					if last_for_name {
						scope
							.called
							.lock()
							.unwrap_or_else(PoisonError::into_inner)
							.insert(name, value);
					}
					self.run_params(scope, index, calls, req, res, next)
				}
			}),
			argument,
		);
	}
}

impl<Req, Res> Stack<Req, Res> for RouterInner<Req, Res>
where
	Req: Request,
	Res: Send + 'static,
{
	type Frame = Arc<Scope>;

	fn layers(&self) -> &[Layer<Req, Res>] {
		&self.stack
	}

	fn scheduler(&self) -> &Arc<dyn Scheduler> {
		&self.scheduler
	}

	fn rewind(&self, scope: &Arc<Scope>, req: &mut Req) {
		if req.path() != scope.path {
			req.set_path(scope.path.clone());
		}
		if req.base_path() != scope.base_path {
			req.set_base_path(scope.base_path.clone());
		}
		if *req.params() != scope.params {
			req.set_params(scope.params.clone());
		}
	}

	fn enter(&self, scope: &Arc<Scope>, layer: &Layer<Req, Res>, req: &mut Req) -> Result<bool, anyhow::Error> {
		let matched = match layer.pattern().matches(&scope.path)? {
			Some(matched) => matched,
			None => return Ok(false),
		};

		let route = layer.route();
		if let Some(route) = route {
			if !route.handles_method(&scope.method) && scope.method != "head" {
				return Ok(false);
			}
		}

		let params = if self.options.merge_params {
			scope.params.merged(matched.params)
		} else {
			matched.params
		};
		req.set_params(params);

		if route.is_none() && !matched.consumed.is_empty() {
			req.set_path(matched.remainder);
			req.set_base_path(format!(
				"{}{}",
				scope.base_path,
				matched.consumed.trim_end_matches('/')
			));
		}

		Ok(true)
	}

	fn invoke(
		self: &Arc<Self>,
		scope: &Arc<Scope>,
		index: usize,
		req: Req,
		res: Res,
		err: Option<anyhow::Error>,
		next: Next<Req, Res>,
	) {
		let layer = match self.stack.get(index) {
			Some(layer) => layer,
			None => return next.call(req, res, err),
		};

		if let Some(err) = err {
			return layer.handle_error(err, req, res, next);
		}

		let calls = self.param_calls(scope, layer, &req);
		if calls.is_empty() {
			return layer.handle_request(req, res, next);
		}

		Arc::clone(self).run_params(Arc::clone(scope), index, calls, req, res, next);
	}
}
