use crate::layer::Layer;
use crate::request::Request;
use crate::scheduler::{self, Scheduler};
use anyhow::Error;
use std::{
	fmt::{self, Debug, Formatter},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
};
use tracing::debug;

/// Consecutive synchronous `next` calls allowed before the chain is moved to the scheduler.
pub const MAX_SYNC_STACK: usize = 100;

/// The continuation handed to every handler.
///
/// It owns the rest of the dispatch: calling it moves the request and response on to the next
/// matching layer, or to the caller's `done` once the stack is exhausted. It can be called at
/// most once, from any thread, at any time.
pub struct Next<Req, Res> {
	inner: Box<dyn FnOnce(Req, Res, Option<Error>) + Send>,
}

impl<Req, Res> Next<Req, Res> {
	pub fn new<F>(f: F) -> Self
	where
		F: FnOnce(Req, Res, Option<Error>) + Send + 'static,
	{
		Self { inner: Box::new(f) }
	}

	/// Continues on the normal path.
	pub fn run(self, req: Req, res: Res) {
		(self.inner)(req, res, None)
	}

	/// Continues on the error path, skipping everything but error handlers.
	pub fn fail<E>(self, err: E, req: Req, res: Res)
	where
		E: Into<Error>,
	{
		(self.inner)(req, res, Some(err.into()))
	}

	pub fn call(self, req: Req, res: Res, err: Option<Error>) {
		(self.inner)(req, res, err)
	}
}

impl<Req, Res> Debug for Next<Req, Res> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("Next")
	}
}

/// A stack of layers the dispatcher can walk: a router or a route.
pub(crate) trait Stack<Req, Res>: Send + Sync + Sized + 'static
where
	Req: Request,
	Res: Send + 'static,
{
	/// Per-request state captured when the request enters the stack.
	type Frame: Clone + Send + Sync + 'static;

	fn layers(&self) -> &[Layer<Req, Res>];

	fn scheduler(&self) -> &Arc<dyn Scheduler>;

	/// Puts `req` back into the state it had when it entered the stack.
	fn rewind(&self, _frame: &Self::Frame, _req: &mut Req) {}

	/// Decides whether `layer` applies to `req`, preparing the request for it if so.
	fn enter(&self, frame: &Self::Frame, layer: &Layer<Req, Res>, req: &mut Req)
		-> Result<bool, Error>;

	/// Runs the layer at `index`.
	fn invoke(
		self: &Arc<Self>,
		_frame: &Self::Frame,
		index: usize,
		req: Req,
		res: Res,
		err: Option<Error>,
		next: Next<Req, Res>,
	) {
		match (self.layers().get(index), err) {
			(Some(layer), Some(err)) => layer.handle_error(err, req, res, next),
			(Some(layer), None) => layer.handle_request(req, res, next),
			(None, err) => next.call(req, res, err),
		}
	}
}

/// The cursor of one request walking one stack.
pub(crate) struct Dispatch<S, Req, Res>
where
	S: Stack<Req, Res>,
	Req: Request,
	Res: Send + 'static,
{
	stack: Arc<S>,
	frame: S::Frame,
	index: usize,
	sync: Arc<AtomicUsize>,
	done: Next<Req, Res>,
}

impl<S, Req, Res> Dispatch<S, Req, Res>
where
	S: Stack<Req, Res>,
	Req: Request,
	Res: Send + 'static,
{
	pub(crate) fn start(stack: Arc<S>, frame: S::Frame, req: Req, res: Res, done: Next<Req, Res>) {
		let dispatch = Dispatch {
			stack,
			frame,
			index: 0,
			sync: Arc::new(AtomicUsize::new(0)),
			done,
		};

		scheduler::enter(move || dispatch.next(req, res, None));
	}

	fn next(mut self, mut req: Req, res: Res, mut err: Option<Error>) {
		let stack = Arc::clone(&self.stack);
		stack.rewind(&self.frame, &mut req);

		let layers = stack.layers();
		if self.index >= layers.len() {
			return self.done.call(req, res, err);
		}

		if self.sync.fetch_add(1, Ordering::Relaxed) + 1 > MAX_SYNC_STACK {
			self.sync.store(0, Ordering::Relaxed);
			debug!(layer = self.index, "deferring synchronous dispatch chain");
			let scheduler = Arc::clone(stack.scheduler());
			return scheduler.defer(Box::new(move || self.next(req, res, err)));
		}

		let mut matched = None;
		while let Some(layer) = layers.get(self.index) {
			self.index += 1;
			match stack.enter(&self.frame, layer, &mut req) {
				Ok(true) => {
					matched = Some(self.index - 1);
					break;
				}
				Ok(false) => {}
				Err(e) => {
					err.get_or_insert(e);
				}
			}
		}

		let index = match matched {
			Some(index) => index,
			None => return self.done.call(req, res, err),
		};

		let frame = self.frame.clone();
		let sync = Arc::clone(&self.sync);
		let next = Next::new(move |req, res, err| scheduler::enter(move || self.next(req, res, err)));
		S::invoke(&stack, &frame, index, req, res, err, next);

		sync.store(0, Ordering::Relaxed);
	}
}
