use std::sync::Arc;
use switchyard::{
	hyper::{Body, Server, StatusCode},
	Handler, HttpNext, HttpRequest, HttpRouter, Reply, Request, ResponseBuilder, RouterBuilder,
	TokioScheduler,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn respond(mut res: Reply, status: StatusCode, body: String) {
	match ResponseBuilder::default().status(status).body(Body::from(body)) {
		Ok(response) => {
			res.send(response);
		}
		Err(e) => tracing::error!(error = %e, "failed to build response"),
	}
}

fn log_request(req: HttpRequest, res: Reply, next: HttpNext) {
	info!(method = %req.method(), path = req.path(), "request");
	next.run(req, res);
}

fn index(_req: HttpRequest, res: Reply, _next: HttpNext) {
	respond(res, StatusCode::OK, "switchyard\n".to_owned());
}

fn show_user(req: HttpRequest, res: Reply, _next: HttpNext) {
	let id = req.params().get("id").unwrap_or_default().to_owned();
	respond(res, StatusCode::OK, format!("user {}\n", id));
}

fn load_user(req: HttpRequest, res: Reply, next: HttpNext, id: String) {
	if id.chars().all(|c| c.is_ascii_digit()) {
		next.run(req, res);
	} else {
		next.fail(anyhow::anyhow!("invalid user id `{}`", id), req, res);
	}
}

fn bad_request(err: anyhow::Error, _req: HttpRequest, res: Reply, _next: HttpNext) {
	respond(res, StatusCode::BAD_REQUEST, format!("{}\n", err));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let addr = ([127, 0, 0, 1], 3000).into();

	let mut api = RouterBuilder::default();
	api.param("id", load_user)?;
	api.get("/users/:id", Handler::request(show_user))?;
	api.middleware(Handler::error(bad_request))?;

	let mut builder = RouterBuilder::default();
	builder.scheduler(Arc::new(TokioScheduler));
	builder
		.middleware(Handler::request(log_request))?
		.get("/", Handler::request(index))?
		.mount("/api", api.build())?;

	let router = HttpRouter::from(builder.build());

	let server = Server::bind(&addr).serve(router);
	info!("Listening on http://{}", addr);

	server.await?;
	Ok(())
}
