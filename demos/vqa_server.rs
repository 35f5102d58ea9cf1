use argh::FromArgs;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use kornia_vqa::{
    ImageSource, MAX_IMAGE_BYTES, MODEL_SIZE_LABEL, SessionConfig, VqaApp, VqaError,
    paligemma::PaligemmaLoader,
};
use serde_json::{Value, json};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

mod messages;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_LENGTH: usize = kornia_vqa::DEFAULT_MAX_LENGTH;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(FromArgs)]
/// Ask questions about images with PaliGemma over HTTP.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// maximum number of generated tokens
    #[argh(option, default = "DEFAULT_MAX_LENGTH")]
    max_length: usize,

    /// timeout in seconds for fetching images from URLs
    #[argh(option, default = "DEFAULT_FETCH_TIMEOUT_SECS")]
    fetch_timeout: u64,
}

type App = VqaApp<PaligemmaLoader>;
type SharedApp = Arc<Mutex<App>>;
type Reply = (StatusCode, Json<Value>);

fn error_reply(err: &VqaError) -> Reply {
    let code = match err {
        VqaError::Validation(_) => StatusCode::BAD_REQUEST,
        VqaError::Network(_) | VqaError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VqaError::ModelLoad(_) | VqaError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        code,
        Json(json!({ "status": "error", "kind": err.kind(), "message": err.to_string() })),
    )
}

fn internal_error(message: String) -> Reply {
    log::error!("{}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "kind": "internal", "message": message })),
    )
}

// Runs a user action on the blocking pool; the mutex serialises actions.
async fn with_app<F>(app: SharedApp, action: F) -> Reply
where
    F: FnOnce(&mut App) -> Result<Value, VqaError> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || {
        let mut app = app
            .lock()
            .map_err(|_| "application state is poisoned".to_string())?;
        Ok::<_, String>(action(&mut *app))
    })
    .await;

    match outcome {
        Ok(Ok(Ok(body))) => (StatusCode::OK, Json(body)),
        Ok(Ok(Err(err))) => error_reply(&err),
        Ok(Err(message)) => internal_error(message),
        Err(join_err) => internal_error(join_err.to_string()),
    }
}

fn status_body(app: &App) -> Value {
    let status = messages::StatusResponse {
        status: app.status().as_str().to_string(),
        device: app
            .session()
            .map_or(app.device(), |session| session.device())
            .to_string(),
        model_loaded: app.session().is_some(),
        model_id: app.session().map(|s| s.model_id().to_string()),
        model_size: MODEL_SIZE_LABEL.to_string(),
        image_size: app.image().map(|img| (img.width(), img.height())),
    };
    json!(status)
}

async fn get_status(State(app): State<SharedApp>) -> Reply {
    with_app(app, |app| Ok(status_body(app))).await
}

async fn post_load_model(State(app): State<SharedApp>) -> Reply {
    with_app(app, |app| {
        let session = app.load_model()?;
        Ok(json!({
            "status": "loaded",
            "model_id": session.model_id(),
            "device": session.device().to_string(),
            "precision": session.precision().as_str(),
            "load_time_secs": session.load_time().as_secs_f64(),
        }))
    })
    .await
}

async fn select_image(app: SharedApp, source: ImageSource) -> Reply {
    with_app(app, move |app| {
        let image = app.select_image(&source)?;
        Ok(json!({
            "status": "selected",
            "source": source.as_str(),
            "width": image.width(),
            "height": image.height(),
        }))
    })
    .await
}

async fn post_upload(State(app): State<SharedApp>, body: Bytes) -> Reply {
    select_image(app, ImageSource::Upload(body.to_vec())).await
}

async fn post_camera(State(app): State<SharedApp>, body: Bytes) -> Reply {
    select_image(app, ImageSource::Camera(body.to_vec())).await
}

async fn post_url(
    State(app): State<SharedApp>,
    Json(payload): Json<messages::UrlRequest>,
) -> Reply {
    select_image(app, ImageSource::Url(payload.url)).await
}

async fn delete_image(State(app): State<SharedApp>) -> Reply {
    with_app(app, |app| {
        app.clear_image();
        Ok(status_body(app))
    })
    .await
}

async fn post_ask(
    State(app): State<SharedApp>,
    Json(payload): Json<messages::AskRequest>,
) -> Reply {
    with_app(app, move |app| {
        let result = app.ask(&payload.question)?;
        Ok(json!(messages::AskResponse {
            question: payload.question.trim().to_string(),
            latency_secs: result.latency_secs(),
            latency_display: result.latency_display(),
            answer: result.answer,
            model_size: MODEL_SIZE_LABEL.to_string(),
        }))
    })
    .await
}

// raw image bodies may be far larger than axum's 2 MiB default
fn router(app: SharedApp) -> Router {
    Router::new()
        .route("/", get(get_status))
        .route("/model/load", post(post_load_model))
        .route("/image/upload", post(post_upload))
        .route("/image/camera", post(post_camera))
        .route("/image/url", post(post_url))
        .route("/image", delete(delete_image))
        .route("/ask", post(post_ask))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
        .with_state(app)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let config = SessionConfig {
        max_length: args.max_length,
        fetch_timeout: Duration::from_secs(args.fetch_timeout),
        ..SessionConfig::default()
    };

    // the blocking http client must be built outside the async context
    let app = tokio::task::spawn_blocking(move || VqaApp::new(PaligemmaLoader, config)).await??;
    let app: SharedApp = Arc::new(Mutex::new(app));

    let router = router(app);

    log::info!("Starting the server");
    log::info!("Listening on: {}", addr);
    log::info!("Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
