use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
    process,
    sync::Arc,
};

use post_render::{
    application::{
        error::AppError,
        render::{
            ContentRenderer, MemoizedRenderer, RenderOptions, content_renderer, syntax_theme_css,
        },
    },
    config::{self, Command, RenderArgs, Settings},
    infra::{error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();

    if dispatcher::has_been_set() {
        error!(source = report.source, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(source = report.source, chain = ?report.messages, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Render(args) => run_render(&settings, &args),
        Command::ThemeCss => write_stdout(syntax_theme_css()),
    }
}

fn run_render(settings: &Settings, args: &RenderArgs) -> Result<(), AppError> {
    let options = &settings.render;
    let renderer = Renderer::new(settings);

    info!(
        target = "post_render::cli",
        inputs = args.inputs.len(),
        unsanitized = args.unsanitized,
        memo = settings.memo.capacity.map(|capacity| capacity.get()),
        "Rendering inputs"
    );

    for input in &args.inputs {
        let source = read_input(input)?;
        let html = if args.unsanitized {
            content_renderer().render_unsanitized(&source, options)?
        } else {
            renderer.render(&source, options)
        };
        write_stdout(&html)?;
    }

    Ok(())
}

enum Renderer {
    Direct(Arc<ContentRenderer>),
    Memoized(MemoizedRenderer),
}

impl Renderer {
    fn new(settings: &Settings) -> Self {
        match settings.memo.capacity {
            Some(capacity) => Self::Memoized(MemoizedRenderer::new(content_renderer(), capacity)),
            None => Self::Direct(content_renderer()),
        }
    }

    fn render(&self, source: &str, options: &RenderOptions) -> String {
        match self {
            Self::Direct(renderer) => renderer.render(source, options),
            Self::Memoized(memo) => memo.render(source, options),
        }
    }
}

fn read_input(path: &Path) -> Result<String, AppError> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(InfraError::from)?;
        return Ok(buffer);
    }

    let source = fs::read_to_string(path).map_err(InfraError::from)?;
    Ok(source)
}

fn write_stdout(html: &str) -> Result<(), AppError> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(html.as_bytes()).map_err(InfraError::from)?;
    if !html.ends_with('\n') {
        stdout.write_all(b"\n").map_err(InfraError::from)?;
    }
    stdout.flush().map_err(InfraError::from)?;
    Ok(())
}
