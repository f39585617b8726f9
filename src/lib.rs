//! A middleware-stack router with continuation-passing dispatch, built to sit on hyper.
//!
//! ```
//! use switchyard::{Handler, Next, Request, RouterBuilder, SimpleRequest};
//! use std::sync::{Arc, Mutex};
//!
//! type Log = Arc<Mutex<Vec<String>>>;
//!
//! fn main() -> Result<(), switchyard::Error> {
//! 	let mut users = RouterBuilder::default();
//! 	users.get(
//! 		"/:id",
//! 		Handler::request(|req: SimpleRequest, res: Log, next: Next<SimpleRequest, Log>| {
//! 			let id = req.params().get("id").unwrap_or_default().to_owned();
//! 			res.lock().unwrap().push(format!("user {} under {}", id, req.base_path()));
//! 			next.run(req, res);
//! 		}),
//! 	)?;
//!
//! 	let mut builder = RouterBuilder::default();
//! 	builder
//! 		.middleware(Handler::request(|req: SimpleRequest, res: Log, next: Next<SimpleRequest, Log>| {
//! 			res.lock().unwrap().push(format!("{} {}", req.method(), req.path()));
//! 			next.run(req, res);
//! 		}))?
//! 		.mount("/users", users.build())?;
//! 	let router = builder.build();
//!
//! 	let log = Log::default();
//! 	router.handle(
//! 		SimpleRequest::new("GET", "/users/42"),
//! 		Arc::clone(&log),
//! 		Next::new(|_req, res: Log, err| res.lock().unwrap().push(format!("done {:?}", err.is_some()))),
//! 	);
//!
//! 	assert_eq!(
//! 		*log.lock().unwrap(),
//! 		vec!["GET /users/42", "user 42 under /users", "done false"]
//! 	);
//! 	Ok(())
//! }
//! ```
//!
//! Handlers receive the request, the response and a [`Next`] continuation. Calling
//! [`Next::run`] moves on to the next matching layer, [`Next::fail`] skips ahead to the next
//! error handler, and not calling it at all ends the request. A handler may hold on to `next`
//! and resume from another thread or task.
//!
//! Middleware registered with [`RouterBuilder::mount`] matches path prefixes and sees only the
//! unmatched remainder of the path; routes registered with [`RouterBuilder::route`] or the
//! per-method shortcuts match whole paths. With the `http` feature, [`HttpRouter`] serves a
//! router with hyper.

#[macro_use]
mod methods;

mod dispatch;
mod error;
mod layer;
mod params;
mod pattern;
mod request;
mod scheduler;

/// Per-path, per-method handler stacks.
pub mod route;

/// Contains the core structs of the router.
///
/// Use the RouterBuilder to create a Router, then call `handle` on it or serve it with hyper.
pub mod router;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::*;

#[cfg(test)]
mod testing;

pub use dispatch::{Next, MAX_SYNC_STACK};
pub use error::{DecodeError, Error, PatternError, Result};
pub use layer::{ErrorFn, Handler, Handlers, Layer, RequestFn};
pub use methods::METHODS;
pub use params::Params;
pub use pattern::{Match, PathSegment, Pattern, PatternOptions};
pub use request::{Request, SimpleRequest};
#[cfg(feature = "http")]
pub use scheduler::TokioScheduler;
pub use scheduler::{Scheduler, Task, Trampoline};

pub use route::*;
pub use router::*;
