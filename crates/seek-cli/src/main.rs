//! SEEK command-line shell.
//!
//! Commands:
//! - render: replay a pointer script into a PNG
//! - call: invoke a gateway endpoint and print its result
//! - submit: replay a drawing and hand it in as a student response

mod script;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use futures::future::LocalFutureObj;
use futures::task::{LocalSpawn, SpawnError};
use seek_client::{ApiConfig, HttpRpcClient, HttpUploader};
use seek_core::capture::{CaptureConfig, PaletteColor, PenStyle, Rgb, StrokeWidth};
use seek_core::coordinator::{Coordinator, CoordinatorConfig, WritePolicy};
use seek_core::model::{Lesson, LessonQuestion, LessonResponse, Student};
use seek_core::remote::{AuthSession, RpcClient, SessionUser, StaticSession};
use seek_core::submission::{ResponseDraft, submit_drawn_response};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "seek")]
#[command(version)]
#[command(about = "SEEK drawing capture and gateway client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a pointer script and write the drawing as PNG
    Render {
        #[command(flatten)]
        canvas: CanvasArgs,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,

        /// Also print the image as a data URI
        #[arg(long)]
        data_uri: bool,
    },
    /// Call a gateway endpoint and print the result as JSON
    Call {
        #[command(flatten)]
        api: ApiArgs,

        /// Endpoint name, e.g. getLessonPlans
        endpoint: String,

        /// JSON payload sent as `data`
        #[arg(long)]
        data: Option<String>,
    },
    /// Replay a pointer script and submit it as a student response
    Submit {
        #[command(flatten)]
        api: ApiArgs,

        #[command(flatten)]
        canvas: CanvasArgs,

        /// Lesson join code
        #[arg(long)]
        lesson: String,

        /// Question id within the lesson plan
        #[arg(long)]
        question: String,

        /// Student id
        #[arg(long)]
        student: String,

        /// Typed answer submitted with the drawing
        #[arg(long)]
        text: Option<String>,

        /// Send writes without waiting for earlier writes to the same record
        #[arg(long)]
        concurrent_writes: bool,
    },
}

#[derive(Args)]
struct CanvasArgs {
    /// JSON pointer script, or `-` for stdin
    #[arg(short, long)]
    script: PathBuf,

    #[arg(long, default_value_t = seek_core::capture::DEFAULT_SURFACE_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = seek_core::capture::DEFAULT_SURFACE_HEIGHT)]
    height: u32,

    /// Opaque background as #rrggbb; transparent when omitted
    #[arg(long)]
    background: Option<String>,

    /// Palette color name (black, white, red, green, blue, yellow, orange)
    #[arg(long, default_value = "black")]
    color: String,

    /// Stroke width in pixels, snapped to the nearest available width
    #[arg(long)]
    stroke_width: Option<f64>,

    /// Maximum rendered pointer moves per second; 0 renders every move
    #[arg(long, default_value_t = seek_core::capture::DEFAULT_MAX_EXTEND_RATE_HZ)]
    max_rate_hz: u32,
}

impl CanvasArgs {
    fn capture_config(&self) -> Result<CaptureConfig> {
        let background = match &self.background {
            Some(hex) => Some(Rgb::from_hex(hex).ok_or_else(|| anyhow!("invalid background color {hex}"))?),
            None => None,
        };
        let palette =
            PaletteColor::from_name(&self.color).ok_or_else(|| anyhow!("unknown color {}", self.color))?;
        let width = match self.stroke_width {
            Some(px) => StrokeWidth::nearest(px),
            None => palette.default_width(),
        };
        Ok(CaptureConfig {
            width: self.width,
            height: self.height,
            background,
            max_extend_rate_hz: self.max_rate_hz,
            pen: PenStyle {
                color: palette.rgb(),
                width,
            },
        })
    }
}

#[derive(Args)]
struct ApiArgs {
    /// Gateway URL with a {function_name} placeholder
    #[arg(long, env = seek_client::config::URL_TEMPLATE_VAR)]
    api_url_template: String,

    /// Deployment environment; anything but local-dev lowercases endpoint names
    #[arg(long, env = seek_client::config::APP_ENV_VAR, default_value = seek_client::config::LOCAL_DEV_ENV)]
    app_env: String,

    /// Multipart upload endpoint
    #[arg(long, env = seek_client::config::UPLOAD_URL_VAR)]
    upload_url: Option<String>,

    /// Bearer token for the gateway
    #[arg(long, env = "SEEK_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

impl ApiArgs {
    fn config(&self) -> Result<ApiConfig> {
        let mut config = ApiConfig::new(&self.api_url_template, &self.app_env);
        config.upload_url = self.upload_url.clone();
        config.validate()?;
        Ok(config)
    }

    fn session(&self) -> Rc<dyn AuthSession> {
        let user = if self.token.is_some() {
            SessionUser::Unknown
        } else {
            SessionUser::SignedOut
        };
        Rc::new(StaticSession::new(user, self.token.clone()))
    }
}

/// Runs coordinator writes on the tokio `LocalSet` driving the command.
struct TokioLocalSpawner;

impl LocalSpawn for TokioLocalSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        tokio::task::spawn_local(future);
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    tokio::task::LocalSet::new().run_until(run(cli)).await
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render {
            canvas,
            out,
            data_uri,
        } => render(&canvas, &out, data_uri),
        Commands::Call {
            api,
            endpoint,
            data,
        } => call(&api, &endpoint, data.as_deref()).await,
        Commands::Submit {
            api,
            canvas,
            lesson,
            question,
            student,
            text,
            concurrent_writes,
        } => {
            let policy = if concurrent_writes {
                WritePolicy::Concurrent
            } else {
                WritePolicy::Serialized
            };
            submit(&api, &canvas, &lesson, &question, &student, text.as_deref(), policy).await
        }
    }
}

fn render(canvas: &CanvasArgs, out: &Path, data_uri: bool) -> Result<()> {
    let config = canvas.capture_config()?;
    let events = script::load_script(&canvas.script)?;
    let engine = script::replay(&events, &config);
    let artifact = engine.snapshot().context("capturing drawing")?;

    std::fs::write(out, artifact.bytes()).with_context(|| format!("writing {}", out.display()))?;
    log::info!(
        "rendered {} events into {} strokes, {}x{}",
        events.len(),
        engine.strokes().len(),
        artifact.width(),
        artifact.height()
    );
    match script::ink_bounds(&engine) {
        Some(bounds) => println!(
            "{}: {} strokes within ({:.0}, {:.0})-({:.0}, {:.0})",
            out.display(),
            engine.strokes().len(),
            bounds.x0,
            bounds.y0,
            bounds.x1,
            bounds.y1
        ),
        None => println!("{}: blank", out.display()),
    }
    if data_uri {
        println!("{}", artifact.to_data_uri());
    }
    Ok(())
}

async fn call(api: &ApiArgs, endpoint: &str, data: Option<&str>) -> Result<()> {
    let payload: Option<Value> = data
        .map(serde_json::from_str)
        .transpose()
        .context("parsing --data as JSON")?;
    let rpc = HttpRpcClient::new(api.config()?, api.session());
    let result = rpc.call(endpoint, payload, None).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn submit(
    api: &ApiArgs,
    canvas: &CanvasArgs,
    lesson_id: &str,
    question_id: &str,
    student_id: &str,
    text: Option<&str>,
    write_policy: WritePolicy,
) -> Result<()> {
    let config = api.config()?;
    let session = api.session();
    let upload_url = config
        .upload_url
        .clone()
        .ok_or_else(|| anyhow!("submitting a drawing needs --upload-url or SEEK_UPLOAD_URL"))?;
    let uploader = HttpUploader::new(upload_url, Rc::clone(&session));
    let rpc: Rc<dyn RpcClient> = Rc::new(HttpRpcClient::new(config, session));
    let coordinator_config = CoordinatorConfig { write_policy };
    let spawner: Rc<dyn LocalSpawn> = Rc::new(TokioLocalSpawner);

    let lessons = Coordinator::<Lesson>::new(Rc::clone(&rpc), Rc::clone(&spawner), coordinator_config);
    let questions =
        Coordinator::<LessonQuestion>::new(Rc::clone(&rpc), Rc::clone(&spawner), coordinator_config);
    let students = Coordinator::<Student>::new(Rc::clone(&rpc), Rc::clone(&spawner), coordinator_config);
    let responses = Coordinator::<LessonResponse>::new(rpc, spawner, coordinator_config);
    lessons.refresh().await.context("loading lessons")?;
    questions.refresh().await.context("loading questions")?;
    students.refresh().await.context("loading students")?;
    responses.refresh().await.context("loading responses")?;

    let question = questions
        .get(question_id)
        .ok_or_else(|| anyhow!("unknown question {question_id}"))?;
    let student = students
        .get(student_id)
        .ok_or_else(|| anyhow!("unknown student {student_id}"))?;

    let events = script::load_script(&canvas.script)?;
    let engine = script::replay(&events, &canvas.capture_config()?);
    let response = submit_drawn_response(
        &engine,
        &uploader,
        &lessons,
        &responses,
        ResponseDraft {
            lesson_id,
            question: &question,
            student: &student,
            response_text: text,
        },
    )
    .await?;
    if responses.has_pending_writes() {
        log::warn!("exiting with response writes still in flight");
    }
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
