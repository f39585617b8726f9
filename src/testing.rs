//! Handlers that record what they saw, for the dispatch tests.

use crate::{Handler, Next, Request, Scheduler, SimpleRequest, Task, Trampoline};
use anyhow::anyhow;
use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc, Mutex,
};

pub(crate) type Log = Arc<Mutex<Vec<String>>>;
pub(crate) type TestNext = Next<SimpleRequest, Log>;
pub(crate) type TestHandler = Handler<SimpleRequest, Log>;

pub(crate) fn log() -> Log {
	Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<String> {
	log.lock().unwrap().clone()
}

fn push(log: &Log, entry: String) {
	log.lock().unwrap().push(entry);
}

/// Records `name` and continues.
pub(crate) fn step(name: &'static str) -> TestHandler {
	Handler::request(move |req: SimpleRequest, res: Log, next: TestNext| {
		push(&res, name.to_owned());
		next.run(req, res);
	})
}

/// Records `name` and ends the request.
pub(crate) fn finish(name: &'static str) -> TestHandler {
	Handler::request(move |_req: SimpleRequest, res: Log, _next: TestNext| {
		push(&res, name.to_owned());
	})
}

/// Records `name` and continues with an error.
pub(crate) fn fail(name: &'static str, message: &'static str) -> TestHandler {
	Handler::request(move |req: SimpleRequest, res: Log, next: TestNext| {
		push(&res, name.to_owned());
		next.fail(anyhow!(message), req, res);
	})
}

/// Records `name:<error>` and resumes the normal path.
pub(crate) fn recover(name: &'static str) -> TestHandler {
	Handler::error(move |err, req: SimpleRequest, res: Log, next: TestNext| {
		push(&res, format!("{}:{}", name, err));
		next.run(req, res);
	})
}

/// Records what the request looks like at this point and continues.
pub(crate) fn inspect(name: &'static str) -> TestHandler {
	Handler::request(move |req: SimpleRequest, res: Log, next: TestNext| {
		push(&res, describe(name, &req));
		next.run(req, res);
	})
}

pub(crate) fn describe(name: &str, req: &SimpleRequest) -> String {
	let params: Vec<String> = req
		.params()
		.iter()
		.map(|(key, value)| format!("{}={}", key, value))
		.collect();
	format!(
		"{} path={} base={} params=[{}]",
		name,
		req.path(),
		req.base_path(),
		params.join(",")
	)
}

/// Records `done` or `done:<error>`.
pub(crate) fn done(log: &Log) -> TestNext {
	let log = Arc::clone(log);
	Next::new(move |_req, _res, err: Option<anyhow::Error>| match err {
		Some(err) => push(&log, format!("done:{}", err)),
		None => push(&log, "done".to_owned()),
	})
}

/// Like `done`, but also records the request's path, base path and params.
pub(crate) fn done_inspect(log: &Log) -> TestNext {
	let log = Arc::clone(log);
	Next::new(move |req: SimpleRequest, _res, _err| push(&log, describe("done", &req)))
}

/// Counts deferrals and hands them to the trampoline.
#[derive(Debug, Default)]
pub(crate) struct Counting {
	pub(crate) deferred: AtomicUsize,
}

impl Scheduler for Counting {
	fn defer(&self, task: Task) {
		self.deferred.fetch_add(1, Ordering::SeqCst);
		Trampoline.defer(task);
	}
}

/// A synchronous handler that tracks how many of its invocations are on the stack at once.
pub(crate) fn nested(active: &Arc<AtomicUsize>, deepest: &Arc<AtomicUsize>) -> TestHandler {
	let active = Arc::clone(active);
	let deepest = Arc::clone(deepest);
	Handler::request(move |req: SimpleRequest, res: Log, next: TestNext| {
		let depth = active.fetch_add(1, Ordering::SeqCst) + 1;
		deepest.fetch_max(depth, Ordering::SeqCst);
		next.run(req, res);
		active.fetch_sub(1, Ordering::SeqCst);
	})
}
