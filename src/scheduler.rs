use std::{
	cell::{Cell, RefCell},
	collections::VecDeque,
	thread,
};

/// A continuation handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs continuations that the dispatcher moved off the current call stack.
///
/// After a long chain of synchronous `next` calls the dispatcher stops recursing and hands the
/// rest of the chain to [`Scheduler::defer`]. Implementations must run the task later, from a
/// stack frame that is not nested inside the caller.
pub trait Scheduler: Send + Sync + 'static {
	fn defer(&self, task: Task);
}

/// The default scheduler: a per-thread work queue drained by the outermost dispatch frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct Trampoline;

thread_local! {
	static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
	static DRAINING: Cell<bool> = Cell::new(false);
}

impl Scheduler for Trampoline {
	fn defer(&self, task: Task) {
		QUEUE.with(|queue| queue.borrow_mut().push_back(task));

		// nothing further up this thread's stack will drain the queue
		if !DRAINING.with(Cell::get) {
			enter(|| {});
		}
	}
}

/// Defers onto the current tokio runtime, or onto the [`Trampoline`] outside of one.
#[cfg(feature = "http")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[cfg(feature = "http")]
impl Scheduler for TokioScheduler {
	fn defer(&self, task: Task) {
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move { enter(task) });
			}
			Err(_) => Trampoline.defer(task),
		}
	}
}

struct Draining;

impl Drop for Draining {
	fn drop(&mut self) {
		// tasks queued by the dispatch that panicked must not leak into the next one
		if thread::panicking() {
			QUEUE.with(|queue| queue.borrow_mut().clear());
		}
		DRAINING.with(|draining| draining.set(false));
	}
}

/// Runs `f`, then drains the trampoline queue if no enclosing frame on this thread will.
pub(crate) fn enter<F: FnOnce()>(f: F) {
	if DRAINING.with(|draining| draining.replace(true)) {
		return f();
	}

	let _draining = Draining;
	f();
	while let Some(task) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
		task();
	}
}

#[cfg(test)]
mod test {
	use super::{enter, Scheduler, Trampoline};
	use std::{
		panic::{self, AssertUnwindSafe},
		sync::{Arc, Mutex},
	};

	#[test]
	fn deferred_tasks_run_after_the_current_frame() {
		let log = Arc::new(Mutex::new(Vec::new()));

		let outer = Arc::clone(&log);
		enter(move || {
			for n in 0..3 {
				let log = Arc::clone(&outer);
				Trampoline.defer(Box::new(move || log.lock().unwrap().push(n)));
			}
			outer.lock().unwrap().push(100);
		});

		assert_eq!(*log.lock().unwrap(), vec![100, 0, 1, 2]);
	}

	#[test]
	fn tasks_deferred_while_draining_are_drained_too() {
		let log = Arc::new(Mutex::new(Vec::new()));

		let outer = Arc::clone(&log);
		enter(move || {
			let inner = Arc::clone(&outer);
			Trampoline.defer(Box::new(move || {
				let log = Arc::clone(&inner);
				Trampoline.defer(Box::new(move || log.lock().unwrap().push("second")));
				inner.lock().unwrap().push("first");
			}));
		});

		assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
	}

	#[test]
	fn panics_discard_queued_tasks() {
		let log = Arc::new(Mutex::new(Vec::new()));

		let outer = Arc::clone(&log);
		let result = panic::catch_unwind(AssertUnwindSafe(move || {
			enter(move || {
				let queued = Arc::clone(&outer);
				Trampoline.defer(Box::new(move || queued.lock().unwrap().push("stale")));
				panic!("handler failed");
			})
		}));
		assert!(result.is_err());

		let task_log = Arc::clone(&log);
		enter(move || task_log.lock().unwrap().push("next dispatch"));

		assert_eq!(*log.lock().unwrap(), vec!["next dispatch"]);
	}

	#[test]
	fn defer_outside_dispatch_runs_immediately() {
		let log = Arc::new(Mutex::new(Vec::new()));

		let task_log = Arc::clone(&log);
		Trampoline.defer(Box::new(move || task_log.lock().unwrap().push("ran")));

		assert_eq!(*log.lock().unwrap(), vec!["ran"]);
	}
}
