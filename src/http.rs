use crate::{Next, Params, Request, Router};
use anyhow::{anyhow, Error, Result};
use hyper::{body::Body, service::Service, StatusCode};
use std::{
	convert::Infallible,
	fmt::{self, Debug, Formatter},
	future::{ready, Future, Ready},
	ops::{Deref, DerefMut},
	pin::Pin,
	task::{Context, Poll},
};
use tokio::sync::oneshot;
use tracing::error;

pub use hyper;

pub use hyper::http::response::Builder as ResponseBuilder;
pub type Response = hyper::Response<Body>;

/// The continuation type for handlers registered on an [`HttpRouter`].
pub type HttpNext = Next<HttpRequest, Reply>;

fn default_error_handler(e: Error) -> Response {
	let mut response = Response::new(e.to_string().into());
	*response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
	response
}

fn default_not_found_handler(_req: hyper::Request<Body>) -> Response {
	let mut response = Response::new(Body::empty());
	*response.status_mut() = StatusCode::NOT_FOUND;
	response
}

/// A function that can convert an error into a response.
pub type ErrorHandler = fn(e: Error) -> Response;

/// A function that handles unroutable requests and creates a response.
pub type NotFoundHandler = fn(req: hyper::Request<Body>) -> Response;

/// A hyper request together with the routing state the router keeps on it.
///
/// Derefs to the underlying [`hyper::Request`]. The URI is never rewritten: beneath a mount
/// point [`Request::path`] is the remainder while `uri()` still holds the original target.
pub struct HttpRequest {
	inner: hyper::Request<Body>,
	path: String,
	base_path: String,
	params: Params,
	route: Option<String>,
}

impl HttpRequest {
	pub fn new(inner: hyper::Request<Body>) -> Self {
		let path = inner.uri().path().to_owned();
		Self {
			inner,
			path,
			base_path: String::new(),
			params: Params::new(),
			route: None,
		}
	}

	/// The declared path of the last route this request was dispatched to.
	pub fn route(&self) -> Option<&str> {
		self.route.as_deref()
	}

	pub fn into_inner(self) -> hyper::Request<Body> {
		self.inner
	}
}

impl Deref for HttpRequest {
	type Target = hyper::Request<Body>;

	fn deref(&self) -> &Self::Target {
		&self.inner
	}
}

impl DerefMut for HttpRequest {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.inner
	}
}

impl Debug for HttpRequest {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("HttpRequest")
			.field("method", self.inner.method())
			.field("uri", self.inner.uri())
			.field("path", &self.path)
			.field("base_path", &self.base_path)
			.field("params", &self.params)
			.finish()
	}
}

impl Request for HttpRequest {
	fn method(&self) -> &str {
		self.inner.method().as_str()
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

enum Outcome {
	Sent(Response),
	Unhandled(HttpRequest, Option<Error>),
}

/// The response side of an HTTP dispatch.
///
/// A handler answers by calling [`Reply::send`], from any task and at any time. Dropping every
/// handle to the request without sending or calling `next` answers with an internal error.
pub struct Reply {
	sender: Option<oneshot::Sender<Outcome>>,
}

impl Reply {
	fn new(sender: oneshot::Sender<Outcome>) -> Self {
		Self {
			sender: Some(sender),
		}
	}

	/// Sends `response` to the client. Returns `false` if a response was already sent or the
	/// connection is gone.
	pub fn send(&mut self, response: Response) -> bool {
		match self.sender.take() {
			Some(sender) => sender.send(Outcome::Sent(response)).is_ok(),
			None => false,
		}
	}

	pub fn is_sent(&self) -> bool {
		self.sender.is_none()
	}

	fn finish(&mut self, req: HttpRequest, err: Option<Error>) {
		if let Some(sender) = self.sender.take() {
			let _ = sender.send(Outcome::Unhandled(req, err));
		}
	}
}

impl Debug for Reply {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Reply")
			.field("sent", &self.is_sent())
			.finish()
	}
}

/// Serves a [`Router`] with hyper.
///
/// Pass it to `Server::serve` as the make-service. Requests the router falls through on get
/// the not-found handler; errors that reach the end of the stack get the internal-error
/// handler.
pub struct HttpRouter {
	router: Router<HttpRequest, Reply>,
	internal_error: ErrorHandler,
	not_found: NotFoundHandler,
}

impl From<Router<HttpRequest, Reply>> for HttpRouter {
	fn from(router: Router<HttpRequest, Reply>) -> Self {
		Self {
			router,
			internal_error: default_error_handler,
			not_found: default_not_found_handler,
		}
	}
}

impl HttpRouter {
	pub fn internal_error_handler(mut self, handler: ErrorHandler) -> Self {
		self.internal_error = handler;
		self
	}

	pub fn not_found_handler(mut self, handler: NotFoundHandler) -> Self {
		self.not_found = handler;
		self
	}
}

impl<T> Service<T> for HttpRouter {
	type Response = RouteHandler;
	type Error = Infallible;
	type Future = Ready<Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, _: &mut Context) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, _: T) -> Self::Future {
		ready(Ok(RouteHandler {
			router: self.router.clone(),
			internal_error: self.internal_error,
			not_found: self.not_found,
		}))
	}
}

/// Responsible for handling the actual HTTP requests from hyper.
pub struct RouteHandler {
	router: Router<HttpRequest, Reply>,
	internal_error: ErrorHandler,
	not_found: NotFoundHandler,
}

impl Service<hyper::Request<Body>> for RouteHandler {
	type Response = Response;
	type Error = Infallible;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: hyper::Request<Body>) -> Self::Future {
		let (sender, receiver) = oneshot::channel();
		let done = Next::new(|req, mut res: Reply, err| res.finish(req, err));
		self.router
			.handle(HttpRequest::new(req), Reply::new(sender), done);

		let internal_error = self.internal_error;
		let not_found = self.not_found;
		Box::pin(async move {
			let response = match receiver.await {
				Ok(Outcome::Sent(response)) => response,
				Ok(Outcome::Unhandled(req, None)) => not_found(req.into_inner()),
				Ok(Outcome::Unhandled(req, Some(err))) => {
					error!(
						method = %req.method(),
						uri = %req.uri(),
						error = %err,
						"unhandled error"
					);
					internal_error(err)
				}
				Err(_) => {
					error!("request was dropped without a response");
					internal_error(anyhow!("request was dropped without a response"))
				}
			};
			Ok(response)
		})
	}
}
